use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};

use crate::config::ConfigError;

/// User name Charge expects when authenticating with its API token.
pub const API_TOKEN_USER: &str = "api-token";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read credential file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Credential presented to the Charge server with every request and
/// websocket handshake.
///
/// The variant is chosen once when the client is built and never changes.
pub enum ChargeAuthentication {
    /// Static `username:password` pair.
    UserPassword {
        username: String,
        password: SecretString,
    },
    /// Credential file whose contents are re-read for every token, so a
    /// rotated cookie is picked up without rebuilding the client.
    CookieFile { path: PathBuf },
}

impl ChargeAuthentication {
    #[must_use]
    pub fn user_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UserPassword {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    #[must_use]
    pub fn api_token(token: impl Into<String>) -> Self {
        Self::user_password(API_TOKEN_USER, token)
    }

    #[must_use]
    pub fn cookie_file(path: impl Into<PathBuf>) -> Self {
        Self::CookieFile { path: path.into() }
    }

    /// Build a user/password credential from the `user:pass` segment of the
    /// server uri.
    ///
    /// # Errors
    /// [`ConfigError::MissingUserInfo`] when there is no user-info segment and
    /// [`ConfigError::MalformedUserInfo`] when it is not exactly two
    /// colon-separated parts.
    pub fn from_user_info(user_info: Option<&str>) -> Result<Self, ConfigError> {
        let user_info = user_info.ok_or(ConfigError::MissingUserInfo)?;
        let mut parts = user_info.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(username), Some(password), None) => Ok(Self::user_password(username, password)),
            _ => Err(ConfigError::MalformedUserInfo),
        }
    }

    /// Base64 token for the `Authorization: Basic` header.
    ///
    /// # Errors
    /// Returns [`CredentialError::Read`] when the cookie file cannot be read.
    pub async fn token(&self) -> Result<String, CredentialError> {
        match self {
            Self::UserPassword { username, password } => Ok(STANDARD.encode(format!(
                "{username}:{}",
                password.expose_secret()
            ))),
            Self::CookieFile { path } => read_cookie(path).await,
        }
    }

    /// Full `Authorization` header value.
    ///
    /// # Errors
    /// See [`ChargeAuthentication::token`].
    pub async fn header_value(&self) -> Result<String, CredentialError> {
        Ok(format!("Basic {}", self.token().await?))
    }
}

async fn read_cookie(path: &Path) -> Result<String, CredentialError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(STANDARD.encode(strip_line_ending(&raw)))
}

/// Drop a single trailing `\n` or `\r\n`; any other whitespace belongs to the
/// credential.
fn strip_line_ending(raw: &[u8]) -> &[u8] {
    match raw.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => raw,
    }
}

impl std::fmt::Debug for ChargeAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::CookieFile { path } => f.debug_struct("CookieFile").field("path", path).finish(),
        }
    }
}
