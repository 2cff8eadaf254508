//! In-process [`ActivitySender`] that records instead of posting.
//!
//! Used by unit and integration tests to observe what the bot sends.

use std::sync::Mutex;

use super::activity::{Activity, ResourceResponse};
use super::connector::{ActivitySender, SendFuture};
use crate::error::AppError;

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Activity>>,
    fail: bool,
}

impl RecordingSender {
    /// A sender whose every send fails with a connector error.
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ActivitySender for RecordingSender {
    fn send<'a>(&'a self, activity: &'a Activity) -> SendFuture<'a> {
        Box::pin(async move {
            if self.fail {
                return Err(AppError::Connector("recording sender set to fail".into()));
            }
            let mut sent = self
                .sent
                .lock()
                .map_err(|_| AppError::Connector("recording sender lock poisoned".into()))?;
            sent.push(activity.clone());
            Ok(ResourceResponse { id: format!("sent-{}", sent.len()) })
        })
    }
}
