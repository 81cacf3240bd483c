//! Delivery reconciliation
//!
//! Given an incident that owes its users a message, try the delivery
//! channels most-specific first: the incident's conversation thread, then a
//! direct message to the primary reporter, then the shared fallback channel
//! with a mention. The first channel to land wins; only when every channel
//! fails does delivery error out, leaving the incident undelivered for the
//! next poll cycle.

use std::sync::Arc;

use crate::clients::ChatGateway;
use crate::error::{Error, Result};
use crate::types::Incident;

/// Which channel ultimately carried the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Thread,
    Direct,
    Fallback,
}

pub struct DeliveryReconciler {
    gateway: Arc<dyn ChatGateway>,
}

impl DeliveryReconciler {
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self { gateway }
    }

    /// Deliver `text` to the incident's users over the best available channel.
    ///
    /// A channel that is not applicable (no thread reference, no numeric
    /// user) is skipped, not counted as a failure. An incident with no
    /// user reference at all has nobody to mention on the fallback
    /// channel, so it is reported as a delivery error instead.
    pub async fn deliver(&self, incident: &Incident, text: &str) -> Result<DeliveryOutcome> {
        if let Some(thread_ref) = incident.thread_ref.as_deref() {
            match self.gateway.send_to_thread(thread_ref, text).await {
                Ok(()) => {
                    tracing::debug!(id = %incident.id, thread = thread_ref, "Delivered to thread");
                    return Ok(DeliveryOutcome::Thread);
                }
                Err(e) => {
                    tracing::warn!(id = %incident.id, error = %e, "Thread delivery failed, trying direct message");
                }
            }
        }

        let user = incident.primary_user();

        if let Some(user_ref) = user {
            match self.gateway.send_direct(user_ref, text).await {
                Ok(()) => {
                    tracing::debug!(id = %incident.id, user = user_ref, "Delivered by direct message");
                    return Ok(DeliveryOutcome::Direct);
                }
                Err(e) => {
                    tracing::warn!(id = %incident.id, error = %e, "Direct delivery failed, trying fallback channel");
                }
            }
        }

        // The fallback post must name somebody or nobody will claim it.
        // Prefer the resolvable reporter, else the first raw user entry;
        // with neither there is no attributable delivery to attempt.
        let Some(mention) = user.or_else(|| {
            incident.users.iter().map(String::as_str).find(|u| !u.is_empty())
        }) else {
            tracing::warn!(id = %incident.id, "No user reference to mention, skipping fallback channel");
            return Err(Error::Delivery(format!(
                "no user reference on {} for a fallback mention",
                incident.id
            )));
        };

        match self.gateway.send_to_fallback(mention, text).await {
            Ok(()) => {
                tracing::debug!(id = %incident.id, "Delivered to fallback channel");
                Ok(DeliveryOutcome::Fallback)
            }
            Err(e) => {
                tracing::warn!(id = %incident.id, error = %e, "All delivery channels failed");
                Err(Error::Delivery(format!(
                    "no channel reached users of {}: {}",
                    incident.id, e
                )))
            }
        }
    }
}
