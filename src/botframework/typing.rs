//! Typing indicator shown while a message turn is being processed.
//!
//! After an initial delay a `typing` activity is sent, then repeated every
//! period until the turn finishes. Fast turns never show it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TypingConfig;

use super::activity::Activity;
use super::connector::ActivitySender;

pub struct TypingIndicator {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl TypingIndicator {
    /// Start the indicator for the conversation `inbound` belongs to.
    pub fn start(sender: Arc<dyn ActivitySender>, inbound: &Activity, config: &TypingConfig) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let mut typing = Activity::typing();
        typing.apply_conversation_reference(inbound);
        let (delay, period) = (config.delay, config.period);

        let task = tokio::spawn(async move {
            let mut wait = delay;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                if let Err(e) = sender.send(&typing).await {
                    warn!("typing indicator stopped: {e}");
                    break;
                }
                debug!(conversation_id = ?typing.conversation_id(), "sent typing indicator");
                wait = period;
            }
        });

        Self { stop, task }
    }

    /// Stop the indicator and wait for its task to finish.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            warn!("typing indicator task failed: {e}");
        }
    }
}
