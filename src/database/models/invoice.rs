use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Unpaid,
    Paid,
    Refunded,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Unpaid,
        InvoiceStatus::Paid,
        InvoiceStatus::Refunded,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Refunded => "refunded",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Paid invoices may only be refunded; refunded and cancelled are final.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Unpaid) | (Draft, Cancelled) | (Unpaid, Paid) | (Unpaid, Cancelled) | (Paid, Refunded)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("invoice status", s))
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: u32,
    /// Minor currency units.
    pub unit_amount: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    #[sqlx(json)]
    pub items: Vec<InvoiceItem>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub currency: String,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewInvoice {
    pub fn amount(&self) -> i64 {
        self.items.iter().map(|item| item.unit_amount * item.quantity as i64).sum()
    }
}

/// `INV-YYYYMMDD-XXXXXXXX` with an upper-case hex suffix.
pub fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("INV-{}-{:08X}", now.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub offset: u64,
    pub limit: u64,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.user_id.map_or(true, |id| invoice.user_id == id)
            && self.status.map_or(true, |status| invoice.status == status)
    }
}
