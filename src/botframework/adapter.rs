//! Turn pipeline: authenticate, build the turn context, run the bot, and
//! turn failures into the generic error reply.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::config::TypingConfig;
use crate::error::AppError;

use super::activity::{Activity, ActivityType, InvokeResponse};
use super::auth::RequestAuthenticator;
use super::connector::ActivitySender;
use super::turn::TurnContext;
use super::typing::TypingIndicator;

pub const TURN_ERROR_TRACE_NAME: &str = "OnTurnError Trace";
pub const TURN_ERROR_VALUE_TYPE: &str = "https://www.botframework.com/schemas/error";
pub const TURN_ERROR_LABEL: &str = "TurnError";
pub const TURN_ERROR_MESSAGE: &str = "The bot encountered an error or bug.";
pub const TURN_ERROR_FOLLOW_UP: &str = "To continue to run this bot, please fix the bot source code.";

/// A boxed future returned by [`Bot::on_turn`].
pub type TurnFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

/// Application logic invoked once per inbound activity.
pub trait Bot: Send + Sync {
    fn on_turn<'a>(&'a self, ctx: &'a mut TurnContext) -> TurnFuture<'a>;
}

/// What the HTTP layer should answer with.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Non-invoke activity processed; replies went out through the connector.
    Accepted,
    /// Invoke activity; the response travels in the HTTP body.
    Invoke(InvokeResponse),
}

pub struct BotAdapter {
    authenticator: Arc<dyn RequestAuthenticator>,
    sender: Arc<dyn ActivitySender>,
    typing: TypingConfig,
}

impl BotAdapter {
    pub fn new(
        authenticator: Arc<dyn RequestAuthenticator>,
        sender: Arc<dyn ActivitySender>,
        typing: TypingConfig,
    ) -> Self {
        Self { authenticator, sender, typing }
    }

    /// Run one turn for `activity`.
    ///
    /// Errors returned here are request-level (bad activity, failed
    /// authentication). Errors raised by the bot are handled by
    /// [`on_turn_error`] and never escape.
    pub async fn process(
        &self,
        auth_header: Option<&str>,
        activity: Activity,
        bot: &dyn Bot,
    ) -> Result<TurnOutcome, AppError> {
        let service_url = activity
            .service_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("activity has no serviceUrl".into()))?;

        let identity = self.authenticator.authenticate(auth_header, service_url).await?;

        if activity.conversation_id().is_none() {
            return Err(AppError::BadRequest("activity has no conversation".into()));
        }

        debug!(
            activity_type = ?activity.activity_type,
            channel_id = ?activity.channel_id,
            conversation_id = ?activity.conversation_id(),
            name = ?activity.name,
            "processing activity"
        );

        let is_invoke = activity.activity_type == ActivityType::Invoke;
        let typing = (self.typing.enabled && activity.activity_type == ActivityType::Message)
            .then(|| TypingIndicator::start(self.sender.clone(), &activity, &self.typing));

        let mut ctx = TurnContext::new(activity, identity, self.sender.clone());
        let result = bot.on_turn(&mut ctx).await;

        if let Some(typing) = typing {
            typing.stop().await;
        }

        let identity = ctx.identity();
        debug!(
            authenticated = identity.authenticated,
            audience = ?identity.audience,
            service_url = ?identity.service_url,
            responded = ctx.responded(),
            ok = result.is_ok(),
            "turn finished"
        );

        if let Err(e) = &result {
            on_turn_error(&ctx, e).await;
        }

        if !is_invoke {
            return Ok(TurnOutcome::Accepted);
        }

        let response = match result {
            Err(_) => InvokeResponse { status: 500, body: None },
            Ok(()) => ctx
                .take_invoke_response()
                .unwrap_or(InvokeResponse { status: 501, body: None }),
        };
        Ok(TurnOutcome::Invoke(response))
    }
}

/// Catch-all for errors escaping the bot: log, emit a trace for the
/// emulator, and tell the user something went wrong.
pub async fn on_turn_error(ctx: &TurnContext, err: &AppError) {
    error!(
        conversation_id = ?ctx.activity().conversation_id(),
        "[onTurnError] unhandled error: {err}"
    );

    if let Err(e) = ctx
        .send_trace_activity(
            TURN_ERROR_TRACE_NAME,
            Value::String(err.to_string()),
            TURN_ERROR_VALUE_TYPE,
            TURN_ERROR_LABEL,
        )
        .await
    {
        error!("failed to send turn error trace: {e}");
    }

    for text in [TURN_ERROR_MESSAGE, TURN_ERROR_FOLLOW_UP] {
        if let Err(e) = ctx.send_text(text).await {
            error!("failed to send turn error message: {e}");
            break;
        }
    }
}
