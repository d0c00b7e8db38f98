use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::constants::events;
use crate::queue::SignalQueue;
use crate::signal::parse_body;

/// Synchronous webhook acknowledgement. Only says whether the signal was
/// queued; execution happens later and never changes this answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

impl WebhookAck {
    fn accepted(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// Producer side of the pipeline: parse, enqueue, acknowledge.
#[derive(Clone)]
pub struct SignalReceiver {
    queue: SignalQueue,
}

impl SignalReceiver {
    pub fn new(queue: SignalQueue) -> Self {
        Self { queue }
    }

    pub fn receive(&self, content_type: Option<&str>, body: &[u8]) -> WebhookAck {
        info!(
            "[WEBHOOK] Raw webhook data received: {}",
            String::from_utf8_lossy(body)
        );

        let directive = match parse_body(content_type, body) {
            Ok(directive) => directive,
            Err(e) => {
                warn!(event = events::SIGNAL_REJECTED, "[WEBHOOK] {}", e);
                return WebhookAck::rejected(e.to_string());
            }
        };

        let kind = directive.kind;
        match self.queue.enqueue(directive) {
            Ok(()) => {
                info!(
                    event = events::SIGNAL_QUEUED,
                    "[WEBHOOK] TradingView signal received: {} ({} pending)",
                    kind,
                    self.queue.len()
                );
                WebhookAck::accepted(format!("{} signal queued", kind))
            }
            Err(e) => {
                error!("[WEBHOOK] Dropping {} signal: {}", kind, e);
                WebhookAck::rejected("Trading engine is not accepting signals".to_string())
            }
        }
    }

    /// Signals accepted but not yet picked up by the engine
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
