//! Card attachments sent by the bot.

use serde_json::{Value, json};

use crate::botframework::activity::{ADAPTIVE_CARD_CONTENT_TYPE, Attachment, OAUTH_CARD_CONTENT_TYPE};

pub const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
pub const ADAPTIVE_CARD_VERSION: &str = "1.4";
pub const NOT_AVAILABLE: &str = "not available";

pub const WELCOME_TEXT: &str = "Welcome message! At this point, no SSO has taken place - \
the information below is taken from the conversation context";
pub const POST_SIGN_IN_TEXT: &str =
    "Post sign-in message! The information below is taken from the AAD token";

/// OAuth card asking the client to perform a silent token exchange for
/// `exchange_id`. Clients that cannot exchange fall back to the sign-in
/// button bound to `connection_name`.
pub fn oauth_card(connection_name: Option<&str>, exchange_id: &str) -> Attachment {
    let mut content = json!({
        "tokenExchangeResource": { "id": exchange_id },
    });
    if let Some(name) = connection_name {
        content["connectionName"] = Value::String(name.to_string());
    }
    Attachment { content_type: OAUTH_CARD_CONTENT_TYPE.to_string(), content }
}

pub fn welcome_card(tenant_id: Option<&str>, aad_object_id: Option<&str>) -> Attachment {
    identity_card(WELCOME_TEXT, tenant_id, aad_object_id)
}

pub fn post_sign_in_card(tenant_id: Option<&str>, aad_object_id: Option<&str>) -> Attachment {
    identity_card(POST_SIGN_IN_TEXT, tenant_id, aad_object_id)
}

fn identity_card(text: &str, tenant_id: Option<&str>, aad_object_id: Option<&str>) -> Attachment {
    let content = json!({
        "$schema": ADAPTIVE_CARD_SCHEMA,
        "type": "AdaptiveCard",
        "version": ADAPTIVE_CARD_VERSION,
        "body": [
            { "type": "TextBlock", "text": text, "wrap": true },
            {
                "type": "FactSet",
                "facts": [
                    { "title": "Tenant Id", "value": tenant_id.unwrap_or(NOT_AVAILABLE) },
                    { "title": "AAD Object ID", "value": aad_object_id.unwrap_or(NOT_AVAILABLE) },
                ],
            },
        ],
    });
    Attachment { content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(), content }
}
