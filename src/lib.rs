//! Tenant SSO bot: a Teams bot that signs users in through single sign-on
//! and shows the tenant and object ids carried by their identity token.

pub mod bot;
pub mod botframework;
pub mod config;
pub mod error;
pub mod logger;
pub mod subsystems;
