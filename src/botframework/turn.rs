//! Per-turn context handed to the bot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::debug;

use crate::error::AppError;

use super::activity::{Activity, ActivityType, InvokeResponse, ResourceResponse};
use super::auth::ClaimsIdentity;
use super::connector::ActivitySender;

/// Channel id of the local bot emulator, the only channel that renders
/// trace activities.
pub const EMULATOR_CHANNEL_ID: &str = "emulator";

/// The inbound activity plus everything needed to answer it.
pub struct TurnContext {
    activity: Activity,
    identity: ClaimsIdentity,
    sender: Arc<dyn ActivitySender>,
    responded: AtomicBool,
    invoke_response: Option<InvokeResponse>,
}

impl TurnContext {
    pub fn new(activity: Activity, identity: ClaimsIdentity, sender: Arc<dyn ActivitySender>) -> Self {
        Self {
            activity,
            identity,
            sender,
            responded: AtomicBool::new(false),
            invoke_response: None,
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn identity(&self) -> &ClaimsIdentity {
        &self.identity
    }

    /// `true` once a non-trace activity has been sent this turn.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::Relaxed)
    }

    /// Address `activity` as a reply to the inbound one and send it.
    pub async fn send_activity(&self, mut activity: Activity) -> Result<ResourceResponse, AppError> {
        activity.apply_conversation_reference(&self.activity);

        if activity.activity_type == ActivityType::Trace
            && self.activity.channel_id.as_deref() != Some(EMULATOR_CHANNEL_ID)
        {
            debug!(name = ?activity.name, "dropping trace activity outside the emulator");
            return Ok(ResourceResponse::default());
        }

        let response = self.sender.send(&activity).await?;
        if activity.activity_type != ActivityType::Trace {
            self.responded.store(true, Ordering::Relaxed);
        }
        Ok(response)
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<ResourceResponse, AppError> {
        self.send_activity(Activity::message(text)).await
    }

    pub async fn send_trace_activity(
        &self,
        name: &str,
        value: Value,
        value_type: &str,
        label: &str,
    ) -> Result<ResourceResponse, AppError> {
        self.send_activity(Activity::trace(name, value, value_type, label)).await
    }

    /// Response returned in the HTTP body of an `invoke` activity.
    pub fn set_invoke_response(&mut self, response: InvokeResponse) {
        self.invoke_response = Some(response);
    }

    pub fn take_invoke_response(&mut self) -> Option<InvokeResponse> {
        self.invoke_response.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::botframework::activity::{ChannelAccount, ConversationAccount};
    use crate::botframework::testing::RecordingSender;
    use serde_json::json;

    fn inbound(channel_id: &str) -> Activity {
        Activity {
            activity_type: ActivityType::Message,
            id: Some("in-1".into()),
            service_url: Some("https://service.example/".into()),
            channel_id: Some(channel_id.into()),
            from: Some(ChannelAccount { id: "user".into(), ..Default::default() }),
            recipient: Some(ChannelAccount { id: "bot".into(), ..Default::default() }),
            conversation: Some(ConversationAccount { id: "conv".into(), ..Default::default() }),
            text: Some("hi".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn send_text_addresses_reply() {
        let sender = Arc::new(RecordingSender::default());
        let ctx = TurnContext::new(inbound("msteams"), ClaimsIdentity::anonymous(), sender.clone());

        assert!(!ctx.responded());
        ctx.send_text("hello back").await.unwrap();
        assert!(ctx.responded());

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text.as_deref(), Some("hello back"));
        assert_eq!(sent[0].reply_to_id.as_deref(), Some("in-1"));
        assert_eq!(sent[0].recipient.as_ref().unwrap().id, "user");
    }

    #[tokio::test]
    async fn trace_only_delivered_to_emulator() {
        let sender = Arc::new(RecordingSender::default());
        let ctx = TurnContext::new(inbound("msteams"), ClaimsIdentity::anonymous(), sender.clone());
        ctx.send_trace_activity("T", json!("v"), "vt", "L").await.unwrap();
        assert!(sender.sent().is_empty());
        assert!(!ctx.responded());

        let sender = Arc::new(RecordingSender::default());
        let ctx = TurnContext::new(inbound(EMULATOR_CHANNEL_ID), ClaimsIdentity::anonymous(), sender.clone());
        ctx.send_trace_activity("T", json!("v"), "vt", "L").await.unwrap();
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].activity_type, ActivityType::Trace);
        assert_eq!(sent[0].label.as_deref(), Some("L"));
        assert!(!ctx.responded());
    }

    #[tokio::test]
    async fn send_failure_propagates() {
        let sender = Arc::new(RecordingSender::failing());
        let ctx = TurnContext::new(inbound("msteams"), ClaimsIdentity::anonymous(), sender);
        assert!(matches!(ctx.send_text("x").await, Err(AppError::Connector(_))));
        assert!(!ctx.responded());
    }

    #[test]
    fn invoke_response_is_taken_once() {
        let mut ctx = TurnContext::new(
            inbound("msteams"),
            ClaimsIdentity::anonymous(),
            Arc::new(RecordingSender::default()),
        );
        ctx.set_invoke_response(InvokeResponse::ok());
        assert_eq!(ctx.take_invoke_response(), Some(InvokeResponse::ok()));
        assert_eq!(ctx.take_invoke_response(), None);
    }
}
