//! Invoice update session over Charge's `/ws` endpoint.

use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use http::{header, HeaderValue};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ensure_crypto_provider, TransportError};
use crate::{
    client::{ChargeError, Result},
    credentials::ChargeAuthentication,
    endpoint::ServerEndpoint,
    invoice::ChargeInvoice,
    lightning::{InvoiceListener, LightningInvoice},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the closing handshake once reading has stopped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Live stream of invoice updates pushed by the server.
///
/// A background task reads frames and hands decoded [`ChargeInvoice`] records
/// to a bounded channel. The sequence is unbounded but not restartable: it
/// ends when the caller's token is cancelled, the session is closed or
/// dropped, or the server goes away. Nothing is replayed or reconnected.
pub struct ChargeSession {
    events: mpsc::Receiver<Result<ChargeInvoice>>,
    shutdown: CancellationToken,
    reader: JoinHandle<()>,
}

impl ChargeSession {
    /// Dial the update socket and start reading.
    ///
    /// Credentials never appear in the dialed address; they travel in the
    /// `Authorization` header of the handshake.
    ///
    /// # Errors
    /// [`TransportError::Connection`] when the handshake fails,
    /// [`TransportError::Cancelled`] when `cancel` fires during the handshake,
    /// or a credential error when the token cannot be produced.
    pub async fn open(
        endpoint: &ServerEndpoint,
        auth: &ChargeAuthentication,
        buffer: usize,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled.into());
        }
        ensure_crypto_provider();
        let url = endpoint.websocket_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::connection("invalid websocket address", e))?;
        let authorization = HeaderValue::from_str(&auth.header_value().await?)
            .map_err(|e| TransportError::connection("invalid authorization header", e))?;
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, authorization);

        debug!(target: "charge_rs::ws", %url, "connecting");
        let (socket, _) = tokio::select! {
            res = connect_async(request) => res
                .map_err(|e| TransportError::connection("websocket handshake failed", e))?,
            () = cancel.cancelled() => {
                debug!(target: "charge_rs::ws", "handshake cancelled");
                return Err(TransportError::Cancelled.into());
            }
        };
        debug!(target: "charge_rs::ws", "connected");

        let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
        let shutdown = cancel.child_token();
        let reader = tokio::spawn(read_loop(socket, events_tx, shutdown.clone()));
        Ok(Self {
            events: events_rx,
            shutdown,
            reader,
        })
    }

    /// Next invoice update, or `None` once the session has ended.
    ///
    /// A frame that does not decode as an invoice is yielded as an error and
    /// the session keeps going; a socket failure is yielded once and then the
    /// session ends.
    pub async fn next_invoice(&mut self) -> Option<Result<ChargeInvoice>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// `true` once the session was cancelled or closed locally.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop reading and close the socket.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.reader).await;
    }
}

impl Drop for ChargeSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Stream for ChargeSession {
    type Item = Result<ChargeInvoice>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.shutdown.is_cancelled() {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }
}

#[async_trait]
impl InvoiceListener for ChargeSession {
    type Error = ChargeError;

    async fn wait_invoice(&mut self) -> Result<Option<LightningInvoice>> {
        match self.next_invoice().await {
            Some(Ok(invoice)) => invoice.to_lightning_invoice().map(Some),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

async fn read_loop(
    mut socket: Socket,
    events: mpsc::Sender<Result<ChargeInvoice>>,
    shutdown: CancellationToken,
) {
    trace!(target: "charge_rs::ws", "read loop start");
    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => {
                debug!(target: "charge_rs::ws", "session cancelled");
                break;
            }
            frame = socket.next() => frame,
        };
        let event = match frame {
            Some(Ok(Message::Text(text))) => decode_update(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => decode_update(&data),
            Some(Ok(Message::Close(reason))) => {
                debug!(target: "charge_rs::ws", ?reason, "server closed session");
                break;
            }
            None => {
                debug!(target: "charge_rs::ws", "socket ended");
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                debug!(target: "charge_rs::ws", error = %err, "socket error");
                let failure = TransportError::connection("websocket read failed", err);
                forward(&events, Err(failure.into()), &shutdown).await;
                break;
            }
        };
        if !forward(&events, event, &shutdown).await {
            break;
        }
    }
    if timeout(CLOSE_TIMEOUT, socket.close(None)).await.is_err() {
        debug!(target: "charge_rs::ws", "close handshake timed out");
    }
    trace!(target: "charge_rs::ws", "read loop exited");
}

/// Returns `false` when the consumer is gone or the session was cancelled.
async fn forward(
    events: &mpsc::Sender<Result<ChargeInvoice>>,
    event: Result<ChargeInvoice>,
    shutdown: &CancellationToken,
) -> bool {
    tokio::select! {
        res = events.send(event) => res.is_ok(),
        () = shutdown.cancelled() => false,
    }
}

fn decode_update(payload: &[u8]) -> Result<ChargeInvoice> {
    trace!(target: "charge_rs::ws", bytes = payload.len(), "invoice update");
    serde_json::from_slice(payload).map_err(|source| ChargeError::Decode {
        context: "invoice update",
        source,
    })
}
