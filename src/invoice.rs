//! Charge invoice records and their mapping to [`LightningInvoice`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    client::{ChargeError, Result},
    lightning::{LightMoney, LightningInvoice, LightningInvoiceStatus},
};

/// Invoice as stored and reported by Charge.
///
/// Depending on the server version and the path that created the invoice,
/// only one of `id` / `label` may be populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeInvoice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub msatoshi: Option<LightMoney>,
    #[serde(default)]
    pub msatoshi_received: Option<LightMoney>,
    #[serde(default, rename = "payreq")]
    pub payment_request: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub pay_index: Option<u64>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ChargeInvoice {
    /// Identifier to report: `id`, falling back to `label`.
    #[must_use]
    pub fn invoice_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.label.as_deref())
    }

    /// Map to the backend-neutral representation.
    ///
    /// # Errors
    /// [`ChargeError::InvalidResponse`] when the record has neither `id` nor
    /// `label`, [`ChargeError::UnknownStatus`] when the status token is not in
    /// the shared status table.
    pub fn to_lightning_invoice(&self) -> Result<LightningInvoice> {
        let id = self
            .invoice_id()
            .ok_or(ChargeError::InvalidResponse("invoice has neither id nor label"))?;
        let status = LightningInvoiceStatus::from_backend_status(&self.status)
            .ok_or_else(|| ChargeError::UnknownStatus(self.status.clone()))?;
        Ok(LightningInvoice {
            id: id.to_string(),
            amount: self.msatoshi,
            bolt11: self.payment_request.clone(),
            status,
            paid_at: self.paid_at,
            expires_at: self.expires_at,
        })
    }
}

/// Parameters for `POST invoice`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateInvoiceRequest {
    pub amount: LightMoney,
    pub expiry: Duration,
    pub description: Option<String>,
}

impl CreateInvoiceRequest {
    #[must_use]
    pub fn new(amount: LightMoney, expiry: Duration) -> Self {
        Self {
            amount,
            expiry,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Form fields in the units Charge expects: millisatoshi and whole seconds.
    /// `description` is left out entirely when unset.
    #[must_use]
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("msatoshi", self.amount.msat().to_string()),
            ("expiry", self.expiry.as_secs().to_string()),
        ];
        if let Some(description) = &self.description {
            fields.push(("description", description.clone()));
        }
        fields
    }

    /// `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    /// Returns [`ChargeError::Encode`] if the form cannot be serialized.
    pub fn to_form_body(&self) -> Result<String> {
        Ok(serde_urlencoded::to_string(self.to_form())?)
    }

    /// Invoice reported to generic callers right after creation.
    ///
    /// Charge's creation response does not carry an authoritative state, so the
    /// result is always `Unpaid` and expires `expiry` from now.
    pub(crate) fn created_invoice(&self, created: &ChargeInvoice) -> Result<LightningInvoice> {
        let id = created
            .invoice_id()
            .ok_or(ChargeError::InvalidResponse("created invoice has no id"))?;
        let expires_at = chrono::Duration::from_std(self.expiry)
            .ok()
            .and_then(|expiry| Utc::now().checked_add_signed(expiry));
        Ok(LightningInvoice {
            id: id.to_string(),
            amount: Some(self.amount),
            bolt11: created.payment_request.clone(),
            status: LightningInvoiceStatus::Unpaid,
            paid_at: None,
            expires_at,
        })
    }
}
