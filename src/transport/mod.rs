use std::{borrow::Cow, error::Error};

use http::StatusCode;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Non-success HTTP status other than a documented "not found".
    #[error("server responded with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("{context}")]
    Connection {
        context: Cow<'static, str>,
        #[source]
        source: BoxError,
    },
    /// The caller's cancellation token fired before the exchange completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Build a connection error with context and an underlying source.
    pub fn connection<S, E>(context: S, source: E) -> Self
    where
        S: Into<Cow<'static, str>>,
        E: Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// HTTP status carried by a [`TransportError::Status`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// rustls needs a process-wide crypto provider before the first TLS client
/// config is built; install aws-lc-rs unless the application chose one.
pub(crate) fn ensure_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

pub mod rest;
pub mod ws;
