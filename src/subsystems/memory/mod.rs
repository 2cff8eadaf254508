//! Memory subsystem — turn-spanning state.
//!
//! A [`Storage`] backend holds JSON documents by key; [`UserState`] scopes
//! them to the user who sent an activity. The bot loads the user's profile
//! at the start of a turn and writes it back at the end when it changed.

pub mod store;
pub mod user_state;

pub use store::{MemoryStorage, Storage};
pub use user_state::{UserProfile, UserState};
