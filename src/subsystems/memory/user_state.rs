//! Per-user state persisted across turns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::botframework::activity::Activity;
use crate::error::AppError;

use super::store::Storage;

/// What the bot remembers about a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Welcome card already shown for the current installation.
    #[serde(default)]
    pub welcomed: bool,
    /// Id of the last token-exchange invoke that was processed.
    #[serde(default)]
    pub last_token_exchange_id: Option<String>,
    /// `tid` from the last decoded identity token.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// `oid` from the last decoded identity token.
    #[serde(default)]
    pub object_id: Option<String>,
}

/// User-scoped view over a [`Storage`] backend.
#[derive(Clone)]
pub struct UserState {
    storage: Arc<dyn Storage>,
}

impl UserState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Storage key for the sender of `activity`: `{channelId}/users/{userId}`.
    pub fn storage_key(activity: &Activity) -> Result<String, AppError> {
        let channel_id = activity
            .channel_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::State("activity is missing channelId".into()))?;
        let user_id = activity
            .from
            .as_ref()
            .map(|f| f.id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::State("activity is missing from.id".into()))?;
        Ok(format!("{channel_id}/users/{user_id}"))
    }

    /// Stored profile for the sender, or a default one.
    pub fn load(&self, activity: &Activity) -> Result<UserProfile, AppError> {
        let key = Self::storage_key(activity)?;
        match self.storage.read(&key)? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| AppError::State(format!("corrupt user state at {key}: {e}"))),
            None => Ok(UserProfile::default()),
        }
    }

    pub fn save(&self, activity: &Activity, profile: &UserProfile) -> Result<(), AppError> {
        let key = Self::storage_key(activity)?;
        let value = serde_json::to_value(profile)
            .map_err(|e| AppError::State(format!("cannot serialise user state: {e}")))?;
        debug!(%key, storage = self.storage.storage_type(), "saving user state");
        self.storage.write(&key, value)
    }

    /// Take ownership of token exchange `exchange_id` for the sender.
    /// Returns `false` if another turn already holds it.
    pub fn claim_token_exchange(&self, activity: &Activity, exchange_id: &str) -> Result<bool, AppError> {
        let key = Self::exchange_key(activity, exchange_id)?;
        let claimed = self.storage.insert_if_absent(&key, Value::Bool(true))?;
        debug!(%key, claimed, "token exchange claim");
        Ok(claimed)
    }

    /// Give up a claim so a redelivery of the same exchange can retry.
    pub fn release_token_exchange(&self, activity: &Activity, exchange_id: &str) -> Result<(), AppError> {
        let key = Self::exchange_key(activity, exchange_id)?;
        self.storage.delete(&key)?;
        Ok(())
    }

    fn exchange_key(activity: &Activity, exchange_id: &str) -> Result<String, AppError> {
        Ok(format!("{}/exchanges/{exchange_id}", Self::storage_key(activity)?))
    }

    pub fn clear(&self, activity: &Activity) -> Result<(), AppError> {
        let key = Self::storage_key(activity)?;
        let existed = self.storage.delete(&key)?;
        debug!(%key, existed, "cleared user state");
        Ok(())
    }
}
