use crate::core::errors::NakamaError;
use crate::nakama::session::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait Authenticator {
    /// Authenticate with a device identifier, optionally creating the account
    async fn authenticate_device(
        &self,
        device_id: &str,
        create: Option<bool>,
        username: Option<&str>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Session, NakamaError>;

    /// Authenticate with a custom identifier from an external identity system
    async fn authenticate_custom(
        &self,
        custom_id: &str,
        create: Option<bool>,
        username: Option<&str>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Session, NakamaError>;
}

/// Calls that need a session
///
/// Implementations refresh the session before the call when it is about to
/// expire, which is why they take it mutably.
#[async_trait]
pub trait AccountApi {
    /// Invalidate the session's tokens on the server
    async fn session_logout(&self, session: &mut Session) -> Result<(), NakamaError>;

    async fn get_account(&self, session: &mut Session) -> Result<Value, NakamaError>;

    async fn delete_account(&self, session: &mut Session) -> Result<(), NakamaError>;

    /// Add friends by user id and/or username
    async fn add_friends(
        &self,
        session: &mut Session,
        ids: &[String],
        usernames: &[String],
    ) -> Result<(), NakamaError>;

    async fn add_group_users(
        &self,
        session: &mut Session,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<(), NakamaError>;
}

// Composite trait for callers that want the whole surface
#[async_trait]
pub trait NakamaApi: Authenticator + AccountApi {}

impl<T: Authenticator + AccountApi> NakamaApi for T {}
