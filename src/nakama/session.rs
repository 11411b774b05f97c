use crate::core::errors::NakamaError;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Claims the server embeds in session tokens
#[derive(Debug, Default, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
    uid: Option<String>,
    usn: Option<String>,
    #[serde(default)]
    vrs: HashMap<String, String>,
}

/// Decode a token's claims without verifying its signature
///
/// Only the server can verify; the client reads expiry and identity hints.
/// Opaque (non-JWT) tokens yield `None`.
fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("token claims unavailable: {}", e);
            None
        }
    }
}

/// An authenticated user's credentials plus the expiry metadata derived from them
///
/// Created by an authenticate call and changed afterwards only by
/// [`Session::update`], which the client invokes on a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    refresh_token: Option<String>,
    created: bool,
    created_at: i64,
    expires_at: Option<i64>,
    refresh_expires_at: Option<i64>,
    user_id: Option<String>,
    username: Option<String>,
    vars: HashMap<String, String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("has_refresh_token", &self.has_refresh_token())
            .field("created", &self.created)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from a token pair returned by the server
    ///
    /// `created` is the server's "account was just created" flag.
    pub fn new(
        token: impl Into<String>,
        refresh_token: Option<String>,
        created: bool,
    ) -> Result<Self, NakamaError> {
        let mut session = Self {
            token: String::new(),
            refresh_token: None,
            created,
            created_at: Utc::now().timestamp(),
            expires_at: None,
            refresh_expires_at: None,
            user_id: None,
            username: None,
            vars: HashMap::new(),
        };
        session.update(token, refresh_token)?;
        Ok(session)
    }

    /// Restore a session, e.g. from storage, keeping its original creation time
    pub fn restore(
        token: impl Into<String>,
        refresh_token: Option<String>,
        created_at: i64,
    ) -> Result<Self, NakamaError> {
        let mut session = Self::new(token, refresh_token, false)?;
        session.created_at = created_at;
        Ok(session)
    }

    /// Replace the token pair in place and re-derive the expiry metadata
    ///
    /// An empty access token is rejected without touching the session. An
    /// absent or empty refresh token keeps the current one.
    pub fn update(
        &mut self,
        token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<(), NakamaError> {
        let token = token.into();
        if token.is_empty() {
            return Err(NakamaError::InvalidArgument(
                "session token must not be empty".to_string(),
            ));
        }

        let claims = decode_claims(&token).unwrap_or_default();
        self.expires_at = claims.exp;
        self.user_id = claims.uid;
        self.username = claims.usn;
        self.vars = claims.vrs;
        self.token = token;

        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_expires_at = decode_claims(&refresh_token).and_then(|c| c.exp);
            self.refresh_token = Some(refresh_token);
        }

        Ok(())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True if the authenticate call created the account
    pub fn created(&self) -> bool {
        self.created
    }

    /// Unix seconds when this session object was created on the client
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn refresh_expires_at(&self) -> Option<i64> {
        self.refresh_expires_at
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Whether the access token has expired at unix time `at` (seconds)
    ///
    /// Tokens without an expiry claim never expire from the client's view.
    pub fn is_expired(&self, at: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp < at)
    }

    pub fn is_refresh_expired(&self, at: i64) -> bool {
        self.refresh_expires_at.is_some_and(|exp| exp < at)
    }

    /// Seconds between client-side creation and access token expiry
    pub fn token_lifetime(&self) -> Option<i64> {
        self.expires_at.map(|exp| exp - self.created_at)
    }

    pub fn refresh_token_lifetime(&self) -> Option<i64> {
        self.refresh_expires_at.map(|exp| exp - self.created_at)
    }
}
