//! The slice of the bot-service activity schema this bot reads and writes.
//!
//! Field names follow the wire format (camelCase). Anything not modelled here
//! is ignored on input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of the platform-native OAuth card.
pub const OAUTH_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.oauth";
/// Content type of an adaptive card attachment.
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    InstallationUpdate,
    Invoke,
    Typing,
    Trace,
    Event,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default)]
    pub content: Value,
}

/// Returned by the connector for every posted activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    #[serde(default)]
    pub id: String,
}

/// HTTP status and body the bot answers an `invoke` activity with.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl InvokeResponse {
    pub fn ok() -> Self {
        Self { status: 200, body: None }
    }

    pub fn with_body(status: u16, body: Value) -> Self {
        Self { status, body: Some(body) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Activity {
    /// Plain-text message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::Message,
            text: Some(text.into()),
            text_format: Some("plain".into()),
            ..Default::default()
        }
    }

    /// Message carrying a single attachment.
    pub fn attachment(attachment: Attachment) -> Self {
        Self {
            activity_type: ActivityType::Message,
            attachments: vec![attachment],
            ..Default::default()
        }
    }

    pub fn typing() -> Self {
        Self { activity_type: ActivityType::Typing, ..Default::default() }
    }

    pub fn trace(
        name: impl Into<String>,
        value: Value,
        value_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: ActivityType::Trace,
            name: Some(name.into()),
            value: Some(value),
            value_type: Some(value_type.into()),
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Address `self` as a reply to `inbound`: the bot speaks from the
    /// inbound recipient back to the inbound sender, in the same
    /// conversation.
    pub fn apply_conversation_reference(&mut self, inbound: &Activity) {
        self.from = inbound.recipient.clone();
        self.recipient = inbound.from.clone();
        self.conversation = inbound.conversation.clone();
        self.service_url = inbound.service_url.clone();
        self.channel_id = inbound.channel_id.clone();
        if self.locale.is_none() {
            self.locale = inbound.locale.clone();
        }
        if self.reply_to_id.is_none() {
            self.reply_to_id = inbound.id.clone();
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Tenant from the conversation, falling back to `channelData.tenant.id`
    /// which the platform also populates.
    pub fn tenant_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .and_then(|c| c.tenant_id.as_deref())
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.channel_data
                    .as_ref()
                    .and_then(|d| d.get("tenant"))
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
            })
    }

    pub fn from_aad_object_id(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|f| f.aad_object_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Message text with `<at>…</at>` mention markup removed. The platform
    /// injects it when the bot is @-mentioned in a channel or group chat.
    pub fn text_without_recipient_mention(&self) -> String {
        let text = self.text.as_deref().unwrap_or_default();
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("<at>") {
            out.push_str(&rest[..start]);
            match rest[start..].find("</at>") {
                Some(end) => rest = &rest[start + end + "</at>".len()..],
                None => {
                    rest = &rest[start..];
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbound() -> Activity {
        serde_json::from_value(json!({
            "type": "message",
            "id": "1614",
            "serviceUrl": "https://smba.trafficmanager.net/emea/",
            "channelId": "msteams",
            "from": { "id": "29:user", "name": "Ada", "aadObjectId": "oid-1" },
            "recipient": { "id": "28:bot", "name": "SSO Bot" },
            "conversation": { "id": "a:conv", "tenantId": "tid-1", "conversationType": "personal" },
            "text": "sign in",
            "locale": "en-GB",
            "entities": [{ "type": "clientInfo" }]
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_wire_format_and_ignores_unknown_fields() {
        let a = inbound();
        assert_eq!(a.activity_type, ActivityType::Message);
        assert_eq!(a.service_url.as_deref(), Some("https://smba.trafficmanager.net/emea/"));
        assert_eq!(a.conversation_id(), Some("a:conv"));
        assert_eq!(a.from_aad_object_id(), Some("oid-1"));
    }

    #[test]
    fn unknown_activity_type_maps_to_unknown() {
        let a: Activity = serde_json::from_value(json!({ "type": "messageReaction" })).unwrap();
        assert_eq!(a.activity_type, ActivityType::Unknown);
    }

    #[test]
    fn missing_type_is_unknown() {
        let a: Activity = serde_json::from_value(json!({ "text": "hi" })).unwrap();
        assert_eq!(a.activity_type, ActivityType::Unknown);
        assert_eq!(Activity::default().activity_type, ActivityType::Unknown);
    }

    #[test]
    fn installation_update_type_parses() {
        let a: Activity =
            serde_json::from_value(json!({ "type": "installationUpdate", "action": "add" })).unwrap();
        assert_eq!(a.activity_type, ActivityType::InstallationUpdate);
        assert_eq!(a.action.as_deref(), Some("add"));
    }

    #[test]
    fn reply_swaps_accounts_and_keeps_conversation() {
        let inbound = inbound();
        let mut reply = Activity::message("hi");
        reply.apply_conversation_reference(&inbound);

        assert_eq!(reply.from.as_ref().unwrap().id, "28:bot");
        assert_eq!(reply.recipient.as_ref().unwrap().id, "29:user");
        assert_eq!(reply.conversation_id(), Some("a:conv"));
        assert_eq!(reply.reply_to_id.as_deref(), Some("1614"));
        assert_eq!(reply.channel_id.as_deref(), Some("msteams"));
        assert_eq!(reply.locale.as_deref(), Some("en-GB"));
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_fields() {
        let v = serde_json::to_value(Activity::typing()).unwrap();
        assert_eq!(v, json!({ "type": "typing" }));

        let mut reply = Activity::message("hello");
        reply.apply_conversation_reference(&inbound());
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["replyToId"], "1614");
        assert_eq!(v["serviceUrl"], "https://smba.trafficmanager.net/emea/");
        assert_eq!(v["textFormat"], "plain");
        assert!(v.get("attachments").is_none());
    }

    #[test]
    fn tenant_falls_back_to_channel_data() {
        let a: Activity = serde_json::from_value(json!({
            "type": "installationUpdate",
            "conversation": { "id": "c" },
            "channelData": { "tenant": { "id": "tid-from-channel-data" } }
        }))
        .unwrap();
        assert_eq!(a.tenant_id(), Some("tid-from-channel-data"));

        assert_eq!(inbound().tenant_id(), Some("tid-1"));
        assert_eq!(Activity::default().tenant_id(), None);
    }

    #[test]
    fn mention_markup_is_stripped() {
        let mut a = Activity::message("<at>SSO Bot</at> sign in");
        assert_eq!(a.text_without_recipient_mention(), " sign in");

        a.text = Some("sign <at>Bot</at>in".into());
        assert_eq!(a.text_without_recipient_mention(), "sign in");

        a.text = Some("unterminated <at>Bot".into());
        assert_eq!(a.text_without_recipient_mention(), "unterminated <at>Bot");

        a.text = None;
        assert_eq!(a.text_without_recipient_mention(), "");
    }
}
