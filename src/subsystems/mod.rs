//! Long-running parts of the bot and the state they share.

pub mod comms;
pub mod memory;
pub mod runtime;
