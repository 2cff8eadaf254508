//! Slice of the Bot Framework messaging protocol the bot needs: the activity
//! schema, inbound request authentication, the outbound connector client and
//! the per-turn pipeline.

pub mod activity;
pub mod adapter;
pub mod auth;
pub mod connector;
pub mod token;
pub mod turn;
pub mod typing;

#[doc(hidden)]
pub mod testing;

pub use activity::{Activity, ActivityType, Attachment, InvokeResponse};
pub use adapter::{Bot, BotAdapter, TurnFuture, TurnOutcome};
pub use turn::TurnContext;
