//! Base address of a Charge instance.

use http::Uri;

use crate::config::ConfigError;

/// Server base address with any inline credentials split off.
///
/// The base is absolute, credential-free and always ends with `/`, so relative
/// paths such as `invoice/abc` append deterministically and any path prefix
/// (a Charge mounted under `/charge/`) is kept.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    secure: bool,
    authority: String,
    path: String,
    user_info: Option<String>,
}

impl ServerEndpoint {
    /// Parse an `http`/`https` uri, extracting `user:pass@` if present.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the uri does not parse, is not absolute or
    /// uses another scheme.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            uri: redact_user_info(raw),
            reason: reason.to_string(),
        };
        let uri: Uri = raw
            .trim()
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        let secure = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => true,
            Some(s) if s.eq_ignore_ascii_case("http") => false,
            Some(other) => return Err(ConfigError::UnsupportedScheme(other.to_string())),
            None => return Err(invalid("missing scheme")),
        };
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let (user_info, host_port) = match authority.as_str().rsplit_once('@') {
            Some((user_info, host_port)) => (Some(user_info.to_string()), host_port),
            None => (None, authority.as_str()),
        };
        if host_port.is_empty() {
            return Err(invalid("missing host"));
        }
        let mut path = uri.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        Ok(Self {
            secure,
            authority: host_port.to_string(),
            path,
            user_info,
        })
    }

    /// The `user:pass` segment that was embedded in the uri, if any.
    #[must_use]
    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    /// Credential-free base, e.g. `https://charge:9112/`.
    #[must_use]
    pub fn base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}{}", self.authority, self.path)
    }

    /// Absolute uri for a path relative to the base.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEndpoint`] when the joined path is not a
    /// valid uri (e.g. contains spaces).
    pub fn join(&self, relative: &str) -> Result<Uri, ConfigError> {
        let joined = format!("{}{}", self.base(), relative.trim_start_matches('/'));
        joined
            .parse()
            .map_err(|e: http::uri::InvalidUri| ConfigError::InvalidEndpoint {
                uri: joined.clone(),
                reason: e.to_string(),
            })
    }

    /// Address of the invoice update socket: `ws(s)://host[:port]/<path>ws`.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{}ws", self.authority, self.path)
    }
}

impl std::fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("base", &self.base())
            .field("has_user_info", &self.user_info.is_some())
            .finish()
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base())
    }
}

/// Replace a `user:pass@` segment with `***@` for logs and error messages.
pub(crate) fn redact_user_info(raw: &str) -> String {
    match raw.rfind('@') {
        Some(at) => match raw.find("://") {
            Some(scheme_end) if scheme_end < at => {
                format!("{}***{}", &raw[..scheme_end + 3], &raw[at..])
            }
            _ => format!("***{}", &raw[at..]),
        },
        None => raw.to_string(),
    }
}
