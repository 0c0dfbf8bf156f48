//! Backend-neutral Lightning client contract.
//!
//! Every node backend (Charge, c-lightning RPC, LND, ...) implements
//! [`LightningClient`] and converges on the invoice model defined here. A
//! backend that cannot perform an operation returns its own "unsupported"
//! error for it instead of approximating the behavior.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

/// Amount expressed in millisatoshi.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LightMoney(u64);

impl LightMoney {
    #[must_use]
    pub const fn from_msat(msat: u64) -> Self {
        Self(msat)
    }

    /// Saturates at `u64::MAX` millisatoshi.
    #[must_use]
    pub const fn from_sat(sat: u64) -> Self {
        Self(sat.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn msat(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LightMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} msat", self.0)
    }
}

// Servers disagree on whether large integers travel as JSON numbers or strings.
impl<'de> Deserialize<'de> for LightMoney {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MsatVisitor;

        impl de::Visitor<'_> for MsatVisitor {
            type Value = LightMoney;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a millisatoshi amount as an integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(LightMoney(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(LightMoney)
                    .map_err(|_| E::custom("negative millisatoshi amount"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.trim()
                    .parse::<u64>()
                    .map(LightMoney)
                    .map_err(|_| E::custom(format!("invalid millisatoshi amount `{v}`")))
            }
        }

        deserializer.deserialize_any(MsatVisitor)
    }
}

/// Invoice state shared by every backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightningInvoiceStatus {
    Unpaid,
    Paid,
    Expired,
}

impl LightningInvoiceStatus {
    /// Normalize a backend status token.
    ///
    /// This is the single table all adapters go through so that "paid",
    /// "expired" and "unpaid/pending" spellings from any backend land on the
    /// same three states. Matching is case-insensitive; unknown tokens yield
    /// `None`.
    #[must_use]
    pub fn from_backend_status(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "paid" | "complete" | "settled" => Some(Self::Paid),
            "unpaid" | "pending" | "open" => Some(Self::Unpaid),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for LightningInvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightningInvoiceStatus::Unpaid => write!(f, "unpaid"),
            LightningInvoiceStatus::Paid => write!(f, "paid"),
            LightningInvoiceStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Backend-neutral invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightningInvoice {
    pub id: String,
    /// `None` for amount-less invoices.
    pub amount: Option<LightMoney>,
    /// BOLT11 payment request.
    pub bolt11: Option<String>,
    pub status: LightningInvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A reachable address of a Lightning node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Compressed public key, hex encoded.
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.node_id, self.host, self.port)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInformation {
    pub node_info_list: Vec<NodeInfo>,
    pub block_height: u32,
    pub version: Option<String>,
    pub alias: Option<String>,
    pub network: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayResult {
    Ok,
    CouldNotFindRoute,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayResponse {
    pub result: PayResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannelRequest {
    pub node_info: NodeInfo,
    /// Channel capacity in satoshi.
    pub channel_amount: u64,
    /// Funding fee rate in sat/vbyte; backend default when `None`.
    pub fee_rate: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenChannelResult {
    Ok,
    AlreadyExists,
    CannotAffordFunding,
    NeedMoreConf,
    PeerNotConnected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannelResponse {
    pub result: OpenChannelResult,
}

/// Optional operations of the contract a backend may refuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Pay,
    OpenChannel,
    DepositAddress,
    ConnectPeer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Pay => write!(f, "payment sending"),
            Capability::OpenChannel => write!(f, "channel opening"),
            Capability::DepositAddress => write!(f, "deposit address retrieval"),
            Capability::ConnectPeer => write!(f, "peer connection"),
        }
    }
}

/// Lazy stream of invoice updates produced by [`LightningClient::listen`].
#[async_trait]
pub trait InvoiceListener: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Wait for the next invoice state change.
    ///
    /// Returns `Ok(None)` once the listener has ended (connection closed or
    /// cancelled); the listener cannot be restarted afterwards.
    async fn wait_invoice(&mut self) -> Result<Option<LightningInvoice>, Self::Error>;
}

/// Operations every Lightning backend adapter exposes.
///
/// Every entry point takes the caller's cancellation token; adapters impose no
/// timeouts of their own.
#[async_trait]
pub trait LightningClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Listener: InvoiceListener<Error = Self::Error>;

    async fn get_info(&self, cancel: &CancellationToken) -> Result<NodeInformation, Self::Error>;

    async fn create_invoice(
        &self,
        amount: LightMoney,
        description: Option<&str>,
        expiry: Duration,
        cancel: &CancellationToken,
    ) -> Result<LightningInvoice, Self::Error>;

    /// `Ok(None)` when the backend does not know the invoice.
    async fn get_invoice(
        &self,
        invoice_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<LightningInvoice>, Self::Error>;

    async fn listen(&self, cancel: &CancellationToken) -> Result<Self::Listener, Self::Error>;

    async fn pay(&self, bolt11: &str, cancel: &CancellationToken)
        -> Result<PayResponse, Self::Error>;

    async fn open_channel(
        &self,
        request: OpenChannelRequest,
        cancel: &CancellationToken,
    ) -> Result<OpenChannelResponse, Self::Error>;

    /// On-chain address for funding the node's wallet.
    async fn get_deposit_address(&self, cancel: &CancellationToken) -> Result<String, Self::Error>;

    async fn connect_to(&self, node: &NodeInfo, cancel: &CancellationToken)
        -> Result<(), Self::Error>;
}
