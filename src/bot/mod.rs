//! The tenant SSO bot: offers sign-in on demand, welcomes users on install
//! and shows the identity carried by the exchanged token.

pub mod cards;
pub mod command;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::botframework::activity::{Activity, ActivityType, InvokeResponse};
use crate::botframework::adapter::{Bot, TurnFuture};
use crate::botframework::token::decode_identity_token;
use crate::botframework::turn::TurnContext;
use crate::error::AppError;
use crate::subsystems::memory::{UserProfile, UserState};

use command::Command;

pub const SIGN_IN_TOKEN_EXCHANGE: &str = "signin/tokenExchange";
pub const UNKNOWN_COMMAND_REPLY: &str = "Sorry, I didn't recognise that command. Type 'sign in'";
pub const TOKEN_EXCHANGE_FAILURE_DETAIL: &str =
    "The bot is unable to exchange token. Proceed with regular login.";

/// Value of a `signin/tokenExchange` invoke.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenExchangeRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    connection_name: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// What to do with the stored profile once the turn has succeeded.
enum ProfileUpdate {
    Keep,
    Clear,
}

pub struct TenantSsoBot {
    user_state: UserState,
    connection_name: Option<String>,
}

impl TenantSsoBot {
    pub fn new(user_state: UserState, connection_name: Option<String>) -> Self {
        Self { user_state, connection_name }
    }

    async fn handle(&self, ctx: &mut TurnContext) -> Result<(), AppError> {
        let mut profile = self.user_state.load(ctx.activity())?;
        let loaded = profile.clone();

        let activity_type = ctx.activity().activity_type;
        let update = match activity_type {
            ActivityType::Message => {
                self.on_message(ctx).await?;
                ProfileUpdate::Keep
            }
            ActivityType::InstallationUpdate => self.on_installation_update(ctx, &mut profile).await?,
            ActivityType::Invoke => {
                self.on_invoke(ctx, &mut profile).await?;
                ProfileUpdate::Keep
            }
            other => {
                debug!(activity_type = ?other, "ignoring activity");
                ProfileUpdate::Keep
            }
        };

        match update {
            ProfileUpdate::Clear => self.user_state.clear(ctx.activity()),
            ProfileUpdate::Keep if profile != loaded => self.user_state.save(ctx.activity(), &profile),
            ProfileUpdate::Keep => Ok(()),
        }
    }

    async fn on_message(&self, ctx: &mut TurnContext) -> Result<(), AppError> {
        let text = ctx.activity().text_without_recipient_mention();
        match Command::parse(&text) {
            Command::SignIn => {
                let exchange_id = Uuid::new_v4().to_string();
                debug!(%exchange_id, "sending oauth card");
                let card = cards::oauth_card(self.connection_name.as_deref(), &exchange_id);
                ctx.send_activity(Activity::attachment(card)).await?;
            }
            Command::Unknown => {
                ctx.send_text(UNKNOWN_COMMAND_REPLY).await?;
            }
        }
        Ok(())
    }

    async fn on_installation_update(
        &self,
        ctx: &mut TurnContext,
        profile: &mut UserProfile,
    ) -> Result<ProfileUpdate, AppError> {
        let action = ctx.activity().action.clone().unwrap_or_default();
        match action.as_str() {
            "add" => {
                let card = cards::welcome_card(
                    ctx.activity().tenant_id(),
                    ctx.activity().from_aad_object_id(),
                );
                ctx.send_activity(Activity::attachment(card)).await?;
                profile.welcomed = true;
                Ok(ProfileUpdate::Keep)
            }
            "remove" | "remove-upgrade" => {
                info!(conversation_id = ?ctx.activity().conversation_id(), "bot uninstalled");
                Ok(ProfileUpdate::Clear)
            }
            other => {
                debug!(action = other, "ignoring installation update");
                Ok(ProfileUpdate::Keep)
            }
        }
    }

    async fn on_invoke(&self, ctx: &mut TurnContext, profile: &mut UserProfile) -> Result<(), AppError> {
        let name = ctx.activity().name.clone();
        match name.as_deref() {
            Some(SIGN_IN_TOKEN_EXCHANGE) => self.on_token_exchange(ctx, profile).await,
            name => {
                debug!(?name, "no handler for invoke");
                Ok(())
            }
        }
    }

    async fn on_token_exchange(&self, ctx: &mut TurnContext, profile: &mut UserProfile) -> Result<(), AppError> {
        let request: TokenExchangeRequest = match &ctx.activity().value {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AppError::Token(format!("invalid token exchange request: {e}")))?,
            None => TokenExchangeRequest::default(),
        };
        let connection_name = request.connection_name.clone().or_else(|| self.connection_name.clone());

        let Some(token) = request.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            debug!(id = ?request.id, "token exchange without a token");
            ctx.set_invoke_response(InvokeResponse::with_body(
                412,
                json!({
                    "id": request.id,
                    "connectionName": connection_name,
                    "failureDetail": TOKEN_EXCHANGE_FAILURE_DETAIL,
                }),
            ));
            return Ok(());
        };

        // Several clients may deliver the same exchange at once; only the
        // first to claim its id answers with the card.
        if let Some(id) = request.id.as_deref() {
            if !self.user_state.claim_token_exchange(ctx.activity(), id)? {
                debug!(id, "token exchange already claimed");
                ctx.set_invoke_response(InvokeResponse::ok());
                return Ok(());
            }
        }

        let result = self.complete_token_exchange(ctx, profile, token).await;
        if let (Err(_), Some(id)) = (&result, request.id.as_deref()) {
            if let Err(e) = self.user_state.release_token_exchange(ctx.activity(), id) {
                warn!(id, "failed to release token exchange claim: {e}");
            }
        }
        if result.is_ok() {
            profile.last_token_exchange_id = request.id;
        }
        result
    }

    async fn complete_token_exchange(
        &self,
        ctx: &mut TurnContext,
        profile: &mut UserProfile,
        token: &str,
    ) -> Result<(), AppError> {
        let claims = decode_identity_token(token)?;
        info!(tenant_id = ?claims.tid, "token exchange completed");

        let card = cards::post_sign_in_card(claims.tid.as_deref(), claims.oid.as_deref());
        ctx.send_activity(Activity::attachment(card)).await?;

        profile.tenant_id = claims.tid;
        profile.object_id = claims.oid;
        ctx.set_invoke_response(InvokeResponse::ok());
        Ok(())
    }
}

impl Bot for TenantSsoBot {
    fn on_turn<'a>(&'a self, ctx: &'a mut TurnContext) -> TurnFuture<'a> {
        Box::pin(self.handle(ctx))
    }
}
