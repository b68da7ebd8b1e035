//! Named actions bound to an atom.
//!
//! Actions are supplied once, through
//! [`AtomOptions::action`](crate::AtomOptions::action), and always run with
//! the atom as their receiver, so an action body can call `atom.update(..)`
//! or `atom.get(..)` directly. Arguments are positional JSON values; a
//! missing argument reads as `null` through [`arg`].

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::atom::Atom;
use crate::error::{AtomError, Result};

/// An action body: `(atom, args) -> result`.
pub type Action = Rc<dyn Fn(&Atom, &[Value]) -> Result<Value>>;

/// Positional argument `index`, or `null` when not supplied.
#[must_use]
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

/// An action together with the atom it is bound to.
#[derive(Clone)]
pub struct BoundAction {
    atom: Atom,
    name: String,
    action: Action,
}

impl BoundAction {
    /// Invoke the action.
    ///
    /// # Errors
    ///
    /// Whatever the action body returns.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.action)(&self.atom, args)
    }

    /// Name the action was bound under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The receiver.
    #[must_use]
    pub fn atom(&self) -> &Atom {
        &self.atom
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("atom", &self.atom.key())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Atom {
    /// Run the action `name` with `args`.
    ///
    /// # Errors
    ///
    /// [`AtomError::UnknownAction`] if no such action was bound, otherwise
    /// whatever the action returns.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let action = self
            .hooks()
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| AtomError::UnknownAction {
                key: self.key().to_owned(),
                action: name.to_owned(),
            })?;
        action(self, args)
    }

    /// The action `name` bound to this atom, for calling later.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<BoundAction> {
        let action = self.hooks().actions.get(name)?;
        Some(BoundAction {
            atom: self.clone(),
            name: name.to_owned(),
            action: Rc::clone(action),
        })
    }

    /// Names of all bound actions, sorted.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.hooks().actions.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AtomOptions, AtomStore};
    use serde_json::json;

    fn counter(store: &AtomStore) -> Atom {
        store
            .atom(
                AtomOptions::new("counter", 0)
                    .action("increment", |atom, args| {
                        let by = arg(args, 0).as_i64().unwrap_or(1);
                        atom.update_with(|v, _| json!(v.as_i64().unwrap_or(0) + by));
                        Ok(atom.value())
                    })
                    .action("double", |atom, _| {
                        let v = atom.get("").as_i64().unwrap_or(0);
                        atom.update(v * 2);
                        Ok(Value::Null)
                    }),
            )
            .unwrap()
    }

    #[test]
    fn call_uses_atom_as_receiver() {
        let store = AtomStore::new();
        let atom = counter(&store);
        assert_eq!(atom.call("increment", &[]).unwrap(), json!(1));
        assert_eq!(atom.call("increment", &[json!(4)]).unwrap(), json!(5));
        atom.call("double", &[]).unwrap();
        assert_eq!(atom.value(), json!(10));
    }

    #[test]
    fn unknown_action_errors() {
        let store = AtomStore::new();
        let atom = counter(&store);
        assert_eq!(
            atom.call("nope", &[]),
            Err(AtomError::UnknownAction {
                key: "counter".into(),
                action: "nope".into(),
            })
        );
        assert!(atom.action("nope").is_none());
    }

    #[test]
    fn bound_action_can_be_stored() {
        let store = AtomStore::new();
        let atom = counter(&store);
        let inc = atom.action("increment").unwrap();
        drop(atom);

        inc.call(&[json!(3)]).unwrap();
        assert_eq!(inc.name(), "increment");
        assert_eq!(inc.atom().value(), json!(3));
    }

    #[test]
    fn action_names_sorted() {
        let store = AtomStore::new();
        assert_eq!(counter(&store).action_names(), vec!["double", "increment"]);
    }

    #[test]
    fn clones_keep_actions_bound_to_themselves() {
        let store = AtomStore::new();
        let atom = counter(&store);
        let copy = atom.clone_atom().unwrap();
        copy.call("increment", &[]).unwrap();
        assert_eq!(copy.value(), json!(1));
        assert_eq!(atom.value(), json!(0));
    }

    #[test]
    fn arg_defaults_to_null() {
        assert_eq!(arg(&[json!(1)], 0), json!(1));
        assert_eq!(arg(&[], 2), Value::Null);
    }
}
