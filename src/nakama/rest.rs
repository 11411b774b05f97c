use crate::core::errors::NakamaError;
use crate::core::kernel::rest::{Credentials, RestClient};
use crate::nakama::types::{
    AccountId, ApiSession, SessionLogoutRequest, SessionRefreshRequest,
};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

pub const AUTHENTICATE_DEVICE: &str = "/v2/account/authenticate/device";
pub const AUTHENTICATE_CUSTOM: &str = "/v2/account/authenticate/custom";
pub const SESSION_REFRESH: &str = "/v2/account/session/refresh";
pub const SESSION_LOGOUT: &str = "/v2/session/logout";
pub const ACCOUNT: &str = "/v2/account";
pub const FRIEND: &str = "/v2/friend";

/// The endpoints the session-aware client relies on
///
/// Thin typed wrappers over a [`RestClient`]; no session logic lives here.
#[derive(Debug, Clone)]
pub struct NakamaRest<R: RestClient> {
    client: R,
}

impl<R: RestClient> NakamaRest<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &R {
        &self.client
    }

    #[instrument(skip(self, request), fields(endpoint = AUTHENTICATE_DEVICE))]
    pub async fn authenticate_device(
        &self,
        request: &AccountId,
        create: Option<bool>,
        username: Option<&str>,
    ) -> Result<ApiSession, NakamaError> {
        self.authenticate(AUTHENTICATE_DEVICE, request, create, username)
            .await
    }

    #[instrument(skip(self, request), fields(endpoint = AUTHENTICATE_CUSTOM))]
    pub async fn authenticate_custom(
        &self,
        request: &AccountId,
        create: Option<bool>,
        username: Option<&str>,
    ) -> Result<ApiSession, NakamaError> {
        self.authenticate(AUTHENTICATE_CUSTOM, request, create, username)
            .await
    }

    async fn authenticate(
        &self,
        endpoint: &str,
        request: &AccountId,
        create: Option<bool>,
        username: Option<&str>,
    ) -> Result<ApiSession, NakamaError> {
        let create = create.map(|c| if c { "true" } else { "false" });
        let mut query = Vec::with_capacity(2);
        if let Some(create) = create {
            query.push(("create", create));
        }
        if let Some(username) = username {
            query.push(("username", username));
        }

        self.client
            .post_json(endpoint, &query, &to_body(request)?, Credentials::ServerKey)
            .await
    }

    /// Exchange a refresh token for a new token pair
    #[instrument(skip(self, request), fields(endpoint = SESSION_REFRESH))]
    pub async fn session_refresh(
        &self,
        request: &SessionRefreshRequest,
    ) -> Result<ApiSession, NakamaError> {
        self.client
            .post_json(SESSION_REFRESH, &[], &to_body(request)?, Credentials::ServerKey)
            .await
    }

    #[instrument(skip(self, bearer, request), fields(endpoint = SESSION_LOGOUT))]
    pub async fn session_logout(
        &self,
        bearer: &str,
        request: &SessionLogoutRequest,
    ) -> Result<(), NakamaError> {
        self.client
            .post(SESSION_LOGOUT, &[], &to_body(request)?, Credentials::Bearer(bearer))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, bearer), fields(endpoint = ACCOUNT))]
    pub async fn get_account(&self, bearer: &str) -> Result<Value, NakamaError> {
        self.client
            .get(ACCOUNT, &[], Credentials::Bearer(bearer))
            .await
    }

    #[instrument(skip(self, bearer), fields(endpoint = ACCOUNT))]
    pub async fn delete_account(&self, bearer: &str) -> Result<(), NakamaError> {
        self.client
            .delete(ACCOUNT, &[], Credentials::Bearer(bearer))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, bearer, ids, usernames), fields(endpoint = FRIEND, count = ids.len() + usernames.len()))]
    pub async fn add_friends(
        &self,
        bearer: &str,
        ids: &[String],
        usernames: &[String],
    ) -> Result<(), NakamaError> {
        let query: Vec<(&str, &str)> = ids
            .iter()
            .map(|id| ("ids", id.as_str()))
            .chain(usernames.iter().map(|name| ("usernames", name.as_str())))
            .collect();

        self.client
            .post(FRIEND, &query, &Value::Null, Credentials::Bearer(bearer))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, bearer, user_ids), fields(group_id = %group_id, count = user_ids.len()))]
    pub async fn add_group_users(
        &self,
        bearer: &str,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<(), NakamaError> {
        if group_id.is_empty() {
            return Err(NakamaError::InvalidArgument(
                "group id must not be empty".to_string(),
            ));
        }
        let endpoint = format!("/v2/group/{}/add", group_id);
        let query: Vec<(&str, &str)> = user_ids.iter().map(|id| ("user_ids", id.as_str())).collect();

        self.client
            .post(&endpoint, &query, &Value::Null, Credentials::Bearer(bearer))
            .await
            .map(|_| ())
    }
}

fn to_body<T: Serialize>(request: &T) -> Result<Value, NakamaError> {
    Ok(serde_json::to_value(request)?)
}
