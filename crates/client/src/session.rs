//! Authentication state carried by every request.
//!
//! A [`Session`] holds exactly one [`Credential`]:
//!
//! - [`Credential::SessionCookie`]: obtained by [`Session::login`] from the
//!   login response's `Set-Cookie` header and replayed verbatim as `Cookie`.
//! - [`Credential::ApiKey`]: fixed at construction and sent as `X-Api-Key`.
//!   Login and logout do not apply in this mode.
//! - [`Credential::None`]: before login or after logout.
//!
//! The session never expires on its own; [`Session::is_active`] asks the
//! service whether the stored cookie is still honoured.
//!
//! ## Concurrency
//!
//! The credential sits behind a read/write lock. [`Session::attach`] takes the
//! read side; login and logout take the write side only to store or clear the
//! credential, never across a network round trip.

use parking_lot::RwLock;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use protocol::decode_envelope;

use crate::config::Endpoint;
use crate::error::ClientError;
use crate::transport::{HttpRequest, HttpTransport};

/// Login endpoint.
pub const LOGIN_PATH: &str = "/api/v1/login";
/// Logout endpoint.
pub const LOGOUT_PATH: &str = "/api/v1/logout";
/// Activity-check endpoint.
pub const ACTIVE_PATH: &str = "/api/v1/active";

/// Header carrying the session cookie.
pub const COOKIE_HEADER: &str = "Cookie";
/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// The credential a session attaches to outgoing requests.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// No credential; requests go out unauthenticated.
    #[default]
    None,
    /// Opaque `Set-Cookie` value captured at login.
    SessionCookie(String),
    /// Static API key supplied at construction.
    ApiKey(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::SessionCookie(_) => f.write_str("SessionCookie(<redacted>)"),
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Authentication state for one service endpoint.
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    credential: RwLock<Credential>,
}

impl Session {
    /// Creates an unauthenticated session that logs in with a cookie.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            credential: RwLock::new(Credential::None),
        }
    }

    /// Creates a session that authenticates every request with `key`.
    pub fn with_api_key(endpoint: Endpoint, key: impl Into<String>) -> Self {
        Self {
            endpoint,
            credential: RwLock::new(Credential::ApiKey(key.into())),
        }
    }

    /// Returns the endpoint this session authenticates against.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns a snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.credential.read().clone()
    }

    /// Returns `true` if a credential is held.
    pub fn is_authenticated(&self) -> bool {
        *self.credential.read() != Credential::None
    }

    /// Returns `true` if this session uses a static API key.
    pub fn uses_api_key(&self) -> bool {
        matches!(*self.credential.read(), Credential::ApiKey(_))
    }

    /// Attaches the current credential to `request`.
    ///
    /// Any `Cookie` or `X-Api-Key` header already present is replaced.
    pub fn attach(&self, mut request: HttpRequest) -> HttpRequest {
        request.remove_header(COOKIE_HEADER);
        request.remove_header(API_KEY_HEADER);
        match &*self.credential.read() {
            Credential::None => {}
            Credential::SessionCookie(cookie) => request.set_header(COOKIE_HEADER, cookie.as_str()),
            Credential::ApiKey(key) => request.set_header(API_KEY_HEADER, key.as_str()),
        }
        request
    }

    /// Logs in with `username` and `password`, storing the session cookie.
    ///
    /// A later login replaces the cookie from an earlier one.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Configuration`] in API-key mode.
    /// - [`ClientError::Transport`] if the service cannot be reached.
    /// - [`ClientError::Auth`] if the envelope reports failure, the body does
    ///   not decode as a success envelope, or no cookie was issued.
    pub async fn login(
        &self,
        transport: &dyn HttpTransport,
        username: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        if self.uses_api_key() {
            return Err(ClientError::configuration(
                "session uses a static API key; login does not apply",
            ));
        }

        let request = HttpRequest::post(LOGIN_PATH).with_json(&LoginBody {
            user: username,
            passwd: password,
        })?;
        info!(user = username, endpoint = %self.endpoint, "logging in");

        let response = transport.send(request).await?;
        let set_cookie = response.set_cookie.clone();
        let body = response.bytes().await?;

        decode_envelope::<IgnoredAny>(&body).map_err(|err| {
            warn!(user = username, error = %err, "login rejected");
            ClientError::auth(err.message())
        })?;
        let cookie = set_cookie
            .ok_or_else(|| ClientError::auth("login succeeded but no session cookie was issued"))?;

        *self.credential.write() = Credential::SessionCookie(cookie);
        info!(user = username, "login succeeded");
        Ok(())
    }

    /// Logs out and clears the stored cookie.
    ///
    /// The cookie is cleared once the service has answered, whatever the
    /// answer, so no request is built with a cookie the service may have
    /// revoked. It is kept if the service could not be reached. Logging out
    /// without a cookie is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Configuration`] in API-key mode.
    /// - [`ClientError::Transport`] if the service cannot be reached.
    /// - [`ClientError::Service`] / [`ClientError::Malformed`] for a failure
    ///   or undecodable envelope.
    pub async fn logout(&self, transport: &dyn HttpTransport) -> Result<(), ClientError> {
        let cookie = match self.credential() {
            Credential::SessionCookie(cookie) => cookie,
            Credential::ApiKey(_) => {
                return Err(ClientError::configuration(
                    "session uses a static API key; logout does not apply",
                ))
            }
            Credential::None => {
                debug!("logout without a session cookie; nothing to do");
                return Ok(());
            }
        };

        let mut request = HttpRequest::get(LOGOUT_PATH);
        request.set_header(COOKIE_HEADER, cookie.as_str());
        let response = transport.send(request).await?;

        {
            // A concurrent login may already have replaced the cookie.
            let mut credential = self.credential.write();
            if *credential == Credential::SessionCookie(cookie) {
                *credential = Credential::None;
            }
        }
        info!(endpoint = %self.endpoint, "logged out");

        let body = response.bytes().await?;
        decode_envelope::<IgnoredAny>(&body)?;
        Ok(())
    }

    /// Asks the service whether the current credential is still honoured.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`], [`ClientError::Service`] or
    /// [`ClientError::Malformed`] if the check itself fails.
    pub async fn is_active(&self, transport: &dyn HttpTransport) -> Result<bool, ClientError> {
        let request = self.attach(HttpRequest::get(ACTIVE_PATH));
        let body = transport.send(request).await?.bytes().await?;
        let ActiveResult { active } = decode_envelope(&body)?;
        debug!(active, "activity check");
        Ok(active)
    }

    /// Like [`Session::is_active`], but an inactive session is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if the service reports the session
    /// inactive, or any error from [`Session::is_active`].
    pub async fn require_active(&self, transport: &dyn HttpTransport) -> Result<(), ClientError> {
        if self.is_active(transport).await? {
            Ok(())
        } else {
            Err(ClientError::auth("session is not active"))
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    user: &'a str,
    passwd: &'a str,
}

#[derive(Deserialize)]
struct ActiveResult {
    active: bool,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
