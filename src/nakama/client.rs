use crate::core::config::ClientConfig;
use crate::core::errors::NakamaError;
use crate::core::kernel::{ReqwestRest, RestClient, SocketAdapter};
use crate::core::traits::{AccountApi, Authenticator};
use crate::nakama::codec::EnvelopeCodec;
use crate::nakama::rest::NakamaRest;
use crate::nakama::session::Session;
use crate::nakama::types::{AccountId, ApiSession, SessionLogoutRequest, SessionRefreshRequest};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Below this access-token lifetime (seconds) the server config is probably wrong
const MIN_TOKEN_LIFETIME_SECS: i64 = 70;
/// Below this refresh-token lifetime (seconds) the server config is probably wrong
const MIN_REFRESH_TOKEN_LIFETIME_SECS: i64 = 3700;

/// Session-aware client
///
/// Every operation that needs a session runs [`Client::ensure_session`]
/// first, so an access token about to expire is refreshed before use.
/// The caller owns the [`Session`]; do not refresh the same session from
/// two tasks at once.
pub struct Client<R: RestClient = ReqwestRest> {
    rest: NakamaRest<R>,
    config: ClientConfig,
}

impl<R: RestClient> Client<R> {
    pub fn new(rest: R, config: ClientConfig) -> Self {
        Self {
            rest: NakamaRest::new(rest),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rest(&self) -> &NakamaRest<R> {
        &self.rest
    }

    /// Exchange the session's refresh token for a new token pair
    ///
    /// On success the session is updated in place. On failure the error is
    /// returned as [`NakamaError::SessionRefresh`] and the session is left as it was.
    #[instrument(skip(self, session, vars), fields(user_id = session.user_id()))]
    pub async fn refresh_session<'s>(
        &self,
        session: &'s mut Session,
        vars: Option<HashMap<String, String>>,
    ) -> Result<&'s Session, NakamaError> {
        let refresh_token = match session.refresh_token() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return Err(NakamaError::InvalidArgument(
                    "session has no refresh token".to_string(),
                ))
            }
        };

        if let Some(lifetime) = session.token_lifetime() {
            if lifetime < MIN_TOKEN_LIFETIME_SECS {
                warn!(
                    lifetime_secs = lifetime,
                    "session token lifetime is very short, check the server's session token_expiry_sec"
                );
            }
        }
        if let Some(lifetime) = session.refresh_token_lifetime() {
            if lifetime < MIN_REFRESH_TOKEN_LIFETIME_SECS {
                warn!(
                    lifetime_secs = lifetime,
                    "refresh token lifetime is very short, check the server's session refresh_token_expiry_sec"
                );
            }
        }

        let request = SessionRefreshRequest {
            token: refresh_token,
            vars: vars.unwrap_or_default(),
        };
        let ApiSession {
            token,
            refresh_token,
            ..
        } = self
            .rest
            .session_refresh(&request)
            .await
            .map_err(|e| NakamaError::SessionRefresh(Box::new(e)))?;

        session
            .update(token, Some(refresh_token))
            .map_err(|e| NakamaError::SessionRefresh(Box::new(e)))?;
        debug!(expires_at = session.expires_at(), "session refreshed");

        Ok(session)
    }

    /// Refresh the session if its access token expires within the lookahead window
    ///
    /// Does nothing when auto-refresh is off or the session has no refresh token.
    pub async fn ensure_session(&self, session: &mut Session) -> Result<(), NakamaError> {
        if !self.needs_refresh(session) {
            return Ok(());
        }
        debug!("access token inside the expiry window, refreshing");
        self.refresh_session(session, None).await.map(|_| ())
    }

    fn needs_refresh(&self, session: &Session) -> bool {
        if !self.config.auto_refresh_session || !session.has_refresh_token() {
            return false;
        }
        let lookahead_ms = i64::try_from(self.config.expired_timespan_ms).unwrap_or(i64::MAX);
        let horizon_ms = Utc::now().timestamp_millis().saturating_add(lookahead_ms);
        session.is_expired(horizon_ms / 1000)
    }

    /// A socket adapter configured from this client's socket options
    pub fn create_socket(&self) -> SocketAdapter<EnvelopeCodec> {
        SocketAdapter::with_config(EnvelopeCodec, self.config.socket.clone())
    }

    /// Refresh the session if needed, then connect the socket with its token
    #[instrument(skip(self, socket, session))]
    pub async fn connect_socket(
        &self,
        socket: &SocketAdapter<EnvelopeCodec>,
        session: &mut Session,
        create_status: bool,
    ) -> Result<(), NakamaError> {
        self.ensure_session(session).await?;
        socket
            .connect(
                self.config.ws_scheme(),
                &self.config.host,
                self.config.port,
                create_status,
                session.token(),
            )
            .await
    }

    fn account_id(id: &str, vars: Option<HashMap<String, String>>) -> Result<AccountId, NakamaError> {
        if id.is_empty() {
            return Err(NakamaError::InvalidArgument(
                "account id must not be empty".to_string(),
            ));
        }
        Ok(AccountId {
            id: id.to_string(),
            vars: vars.unwrap_or_default(),
        })
    }
}

fn into_session(api: ApiSession) -> Result<Session, NakamaError> {
    Session::new(api.token, Some(api.refresh_token), api.created)
}

#[async_trait]
impl<R: RestClient> Authenticator for Client<R> {
    async fn authenticate_device(
        &self,
        device_id: &str,
        create: Option<bool>,
        username: Option<&str>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Session, NakamaError> {
        let request = Self::account_id(device_id, vars)?;
        let api = self
            .rest
            .authenticate_device(&request, create, username)
            .await?;
        into_session(api)
    }

    async fn authenticate_custom(
        &self,
        custom_id: &str,
        create: Option<bool>,
        username: Option<&str>,
        vars: Option<HashMap<String, String>>,
    ) -> Result<Session, NakamaError> {
        let request = Self::account_id(custom_id, vars)?;
        let api = self
            .rest
            .authenticate_custom(&request, create, username)
            .await?;
        into_session(api)
    }
}

#[async_trait]
impl<R: RestClient> AccountApi for Client<R> {
    async fn session_logout(&self, session: &mut Session) -> Result<(), NakamaError> {
        self.ensure_session(session).await?;
        let request = SessionLogoutRequest {
            token: session.token().to_string(),
            refresh_token: session.refresh_token().unwrap_or_default().to_string(),
        };
        self.rest.session_logout(session.token(), &request).await
    }

    async fn get_account(&self, session: &mut Session) -> Result<Value, NakamaError> {
        self.ensure_session(session).await?;
        self.rest.get_account(session.token()).await
    }

    async fn delete_account(&self, session: &mut Session) -> Result<(), NakamaError> {
        self.ensure_session(session).await?;
        self.rest.delete_account(session.token()).await
    }

    async fn add_friends(
        &self,
        session: &mut Session,
        ids: &[String],
        usernames: &[String],
    ) -> Result<(), NakamaError> {
        self.ensure_session(session).await?;
        self.rest
            .add_friends(session.token(), ids, usernames)
            .await
    }

    async fn add_group_users(
        &self,
        session: &mut Session,
        group_id: &str,
        user_ids: &[String],
    ) -> Result<(), NakamaError> {
        self.ensure_session(session).await?;
        self.rest
            .add_group_users(session.token(), group_id, user_ids)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::rest::Credentials;
    use crate::nakama::session::test_tokens::token;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call and answers refreshes with a fixed pair
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Method, String, Option<Value>)>>,
        refreshed_token: String,
    }

    #[async_trait]
    impl RestClient for Recorder {
        async fn request(
            &self,
            method: Method,
            endpoint: &str,
            _query_params: &[(&str, &str)],
            body: Option<&Value>,
            _credentials: Credentials<'_>,
        ) -> Result<Value, NakamaError> {
            self.calls
                .lock()
                .unwrap()
                .push((method, endpoint.to_string(), body.cloned()));
            if endpoint == crate::nakama::rest::SESSION_REFRESH {
                return Ok(json!({"token": self.refreshed_token, "refresh_token": ""}));
            }
            Ok(json!({"token": "t", "refresh_token": "r", "created": true}))
        }
    }

    fn client(refreshed_token: String) -> Client<Recorder> {
        Client::new(
            Recorder {
                refreshed_token,
                ..Recorder::default()
            },
            ClientConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_authenticate_device_builds_session() {
        let client = client(String::new());
        let session = client
            .authenticate_device("device-1", Some(true), None, None)
            .await
            .unwrap();
        assert!(session.created());
        assert_eq!(session.token(), "t");
        assert_eq!(session.refresh_token(), Some("r"));

        let calls = client.rest().inner().calls.lock().unwrap();
        assert_eq!(calls[0].1, crate::nakama::rest::AUTHENTICATE_DEVICE);
        assert_eq!(calls[0].2, Some(json!({"id": "device-1"})));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_id() {
        let client = client(String::new());
        let err = client
            .authenticate_custom("", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, NakamaError::InvalidArgument(_)));
        assert!(client.rest().inner().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_server_omits_it() {
        let now = Utc::now().timestamp();
        let fresh = token(now + 3600, "u", "n");
        let client = client(fresh.clone());
        let mut session =
            Session::new(token(now - 1, "u", "n"), Some("refresh".to_string()), false).unwrap();

        client
            .refresh_session(&mut session, Some(HashMap::from([("k".to_string(), "v".to_string())])))
            .await
            .unwrap();

        assert_eq!(session.token(), fresh);
        assert_eq!(session.refresh_token(), Some("refresh"));
        let calls = client.rest().inner().calls.lock().unwrap();
        assert_eq!(calls[0].2, Some(json!({"token": "refresh", "vars": {"k": "v"}})));
    }

    #[tokio::test]
    async fn test_fresh_session_is_not_refreshed() {
        let now = Utc::now().timestamp();
        let client = client(String::new());
        let mut session =
            Session::new(token(now + 3600, "u", "n"), Some("refresh".to_string()), false).unwrap();

        client.get_account(&mut session).await.unwrap();

        let calls = client.rest().inner().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Method::GET);
    }

    #[tokio::test]
    async fn test_lookahead_window_triggers_refresh() {
        let now = Utc::now().timestamp();
        let client = client(token(now + 3600, "u", "n"));
        // Still valid for a minute, inside the default five minute window.
        let mut session =
            Session::new(token(now + 60, "u", "n"), Some("refresh".to_string()), false).unwrap();

        client.delete_account(&mut session).await.unwrap();

        let calls = client.rest().inner().calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, crate::nakama::rest::SESSION_REFRESH);
        assert_eq!(calls[1].0, Method::DELETE);
    }

    #[tokio::test]
    async fn test_logout_sends_both_tokens() {
        let client = client(String::new());
        let mut session = Session::new("opaque", Some("refresh".to_string()), false).unwrap();

        client.session_logout(&mut session).await.unwrap();

        let calls = client.rest().inner().calls.lock().unwrap();
        assert_eq!(calls[0].1, crate::nakama::rest::SESSION_LOGOUT);
        assert_eq!(
            calls[0].2,
            Some(json!({"token": "opaque", "refresh_token": "refresh"}))
        );
    }
}
