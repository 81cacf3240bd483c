//! Outbound notification pipeline: poller and delivery reconciliation

pub mod poller;
pub mod reconciler;

pub use poller::{NotificationPoller, TickResult};
pub use reconciler::{DeliveryOutcome, DeliveryReconciler};
