//! Canonical account model
//!
//! Everything downstream of the normalizer speaks these types. Upstream
//! payload quirks never leak past `normalize`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unit used for energy readings
pub const ENERGY_UNIT: &str = "kWh";

/// Unit used for monetary balances
pub const CURRENCY_UNIT: &str = "EUR";

/// User credentials, supplied once by the setup flow
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated session issued by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque user identifier
    pub uid: String,
    /// Signature over the uid issued by the identity provider
    pub uid_signature: String,
    /// Timestamp the signature was computed against
    pub signature_timestamp: String,
    /// Local time the session was issued
    pub issued_at: DateTime<Utc>,
    /// How long the session is trusted before a fresh login
    pub validity: Duration,
}

impl Session {
    /// Whether the session is still inside its validity window at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.validity) {
            Ok(validity) => now < self.issued_at + validity,
            Err(_) => true,
        }
    }
}

/// Contract product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    Electric,
    Gas,
}

impl ContractKind {
    /// Map the provider's product label, `None` for unsupported products
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ELECTRICITY" | "ELECTRICIDAD" | "LUZ" => Some(Self::Electric),
            "GAS" => Some(Self::Gas),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Electric => "ELECTRICITY",
            Self::Gas => "GAS",
        }
    }

    pub const fn has_virtual_battery(&self) -> bool {
        matches!(self, Self::Electric)
    }
}

/// A supply contract on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Utility connection point code, the stable identifier
    pub cups: String,
    pub kind: ContractKind,
    /// Provider contract code used to address its resources
    pub code: String,
    /// House the contract belongs to
    pub house_id: String,
    pub active: bool,
    /// Provider metadata as listed
    pub raw: serde_json::Value,
}

/// Cost breakdown for the current billing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: f64,
    pub variable: Option<f64>,
    pub fixed: Option<f64>,
    pub average_daily: Option<f64>,
}

/// Consumption for the current billing period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSnapshot {
    pub cups: String,
    /// Days elapsed in the period
    pub period_days: u32,
    pub amount: f64,
    pub unit: String,
    pub cost: CostBreakdown,
    pub retrieved_at: DateTime<Utc>,
}

/// Invoice payment state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Other(String),
}

impl InvoiceStatus {
    pub fn from_label(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PAID" | "PAGADA" => Self::Paid,
            "PENDING" | "PENDIENTE" | "UNPAID" => Self::Pending,
            _ => Self::Other(s.to_string()),
        }
    }

    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub cups: String,
    pub issue_date: NaiveDate,
    pub amount: f64,
    pub status: InvoiceStatus,
}

/// Provider estimate for the upcoming invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextInvoice {
    pub amount: f64,
    pub variable: Option<f64>,
    pub fixed: Option<f64>,
}

/// Tariff figures taken from the house details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub status: Option<String>,
    pub power_kw: Option<f64>,
    pub fee: Option<String>,
    pub power_price_punta: Option<f64>,
    pub power_price_valle: Option<f64>,
    pub energy_price: Option<f64>,
    pub gas_fixed_term: Option<f64>,
    pub gas_variable_term: Option<f64>,
}

/// Value-added service attached to a house
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueAddedService {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseDetails {
    pub house_id: String,
    /// Tariff of the contract this bundle belongs to, when listed
    pub tariff: Option<Tariff>,
    pub services: Vec<ValueAddedService>,
}

/// A virtual battery redemption applied to an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub billing_date: String,
    pub amount: Option<f64>,
    pub kwh: Option<f64>,
}

/// Virtual battery balance of an electric contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualBatteryBalance {
    pub cups: String,
    /// Credit pending redemption
    pub stored_amount: f64,
    pub unit: String,
    pub kwh_available: Option<f64>,
    pub applied_amount: Option<f64>,
    pub kwh_redeemed: Option<f64>,
    pub total_kwh_charged: Option<f64>,
    /// Price per kWh used to convert surplus energy into credit
    pub excedents_price: Option<f64>,
    pub last_redemption: Option<Redemption>,
}

/// Everything known about one contract after a refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractBundle {
    pub contract: Contract,
    pub consumption: ConsumptionSnapshot,
    pub invoices: Vec<Invoice>,
    pub next_invoice: Option<NextInvoice>,
    pub house: HouseDetails,
    /// `None` means not applicable (gas), never a zero reading
    pub battery: Option<VirtualBatteryBalance>,
    pub refreshed_at: DateTime<Utc>,
}

impl ContractBundle {
    /// Most recent invoice as listed upstream
    pub fn last_invoice(&self) -> Option<&Invoice> {
        self.invoices.first()
    }
}
