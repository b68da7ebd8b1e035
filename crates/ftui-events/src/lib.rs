#![forbid(unsafe_code)]

//! Namespaced publish/subscribe for FrankenTUI state containers.
//!
//! # Role in FrankenTUI
//! `ftui-events` is the notification backbone beneath `ftui-atom`. It knows
//! nothing about atoms or values: producers trigger dotted topics with a
//! payload of their choosing, and consumers subscribe to exact topics.
//!
//! - [`EventBus`]: shared topic table with ordered listeners.
//! - [`Subscription`]: handle with explicit, idempotent `unsubscribe()`.
//! - [`SubscriptionGuard`]: RAII variant that unsubscribes on drop.
//!
//! # Invariants
//!
//! 1. Listeners on a topic fire in subscription order.
//! 2. Releasing a namespace releases every topic at or below it, and those
//!    listeners are never invoked again.
//! 3. All types are single-threaded (`Rc`-based, `!Send`).

pub mod bus;

pub use bus::{EventBus, Subscription, SubscriptionGuard, in_namespace};
