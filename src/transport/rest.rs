//! Authenticated HTTP requests against the Charge REST API.

use std::sync::Arc;

use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ensure_crypto_provider, TransportError};
use crate::{
    client::Result,
    credentials::ChargeAuthentication,
    endpoint::ServerEndpoint,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Longest error body kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Builds absolute, authenticated requests rooted at the server base and
/// unwraps success or failure.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct HttpGateway {
    endpoint: Arc<ServerEndpoint>,
    auth: Arc<ChargeAuthentication>,
    client: HttpsClient,
}

impl HttpGateway {
    #[must_use]
    pub fn new(endpoint: Arc<ServerEndpoint>, auth: Arc<ChargeAuthentication>) -> Self {
        ensure_crypto_provider();
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        Self {
            endpoint,
            auth,
            client: Client::builder(TokioExecutor::new()).build(https),
        }
    }

    /// Send a request and return the body of a 2xx response.
    ///
    /// # Errors
    /// [`TransportError::Status`] for any non-success status,
    /// [`TransportError::Connection`] when the exchange fails,
    /// [`TransportError::Cancelled`] when `cancel` fires first, and a
    /// credential error when the token cannot be produced.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        form: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let (status, body) = self.dispatch(method, path, form, cancel).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(status_error(status, &body).into())
        }
    }

    /// `GET` a resource that may legitimately be absent: HTTP 404 is `None`.
    ///
    /// # Errors
    /// Same as [`HttpGateway::send`] for every other outcome.
    pub async fn fetch_optional(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Bytes>> {
        let (status, body) = self.dispatch(Method::GET, path, None, cancel).await?;
        match status {
            StatusCode::NOT_FOUND => {
                debug!(target: "charge_rs::http", path, "resource not found");
                Ok(None)
            }
            s if s.is_success() => Ok(Some(body)),
            s => Err(status_error(s, &body).into()),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        form: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<(StatusCode, Bytes)> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled.into());
        }
        let uri = self
            .endpoint
            .join(path)
            .map_err(|e| TransportError::connection("invalid request uri", e))?;
        let authorization = self.auth.header_value().await?;

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri)
            .header(header::AUTHORIZATION, authorization);
        let body = match form {
            Some(form) => {
                builder = builder.header(header::CONTENT_TYPE, FORM_CONTENT_TYPE);
                Full::new(Bytes::from(form))
            }
            None => Full::new(Bytes::new()),
        };
        let request = builder
            .body(body)
            .map_err(|e| TransportError::connection("failed to build request", e))?;

        debug!(target: "charge_rs::http", %method, path, "sending request");
        let exchange = async {
            let response: Response<Incoming> = self
                .client
                .request(request)
                .await
                .map_err(|e| TransportError::connection(format!("{method} {path} failed"), e))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::connection("failed to read response body", e))?
                .to_bytes();
            Ok::<_, TransportError>((status, body))
        };

        // Dropping the exchange future on cancellation closes its connection.
        let (status, body) = tokio::select! {
            res = exchange => res?,
            () = cancel.cancelled() => {
                debug!(target: "charge_rs::http", %method, path, "request cancelled");
                return Err(TransportError::Cancelled.into());
            }
        };
        trace!(target: "charge_rs::http", %status, bytes = body.len(), "response received");
        Ok((status, body))
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> TransportError {
    let mut body = String::from_utf8_lossy(body).into_owned();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    TransportError::Status { status, body }
}
