//! Error classification
//!
//! Folds every internal failure into one of the four outward kinds the
//! setup flow and the sensor layer understand.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream operation that observed a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Login,
    ListContracts,
    GetHouse,
    GetConsumption,
    GetInvoices,
    GetNextInvoice,
    GetBattery,
    /// Coordinator-level work not tied to a single upstream call
    Refresh,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::ListContracts => "list_contracts",
            Self::GetHouse => "get_house",
            Self::GetConsumption => "get_consumption",
            Self::GetInvoices => "get_invoices",
            Self::GetNextInvoice => "get_next_invoice",
            Self::GetBattery => "get_battery",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outward error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected by upstream
    InvalidAuth,
    /// Transport or timeout failure reaching upstream
    CannotConnect,
    /// Authenticated, but the account has zero contracts
    NoContracts,
    /// Anything else, including schema violations
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAuth => "invalid_auth",
            Self::CannotConnect => "cannot_connect",
            Self::NoContracts => "no_contracts",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure observed by `operation`
pub fn classify(operation: Operation, failure: &SyncError) -> ErrorKind {
    match failure {
        SyncError::Timeout { .. } | SyncError::Network { .. } => ErrorKind::CannotConnect,
        SyncError::Http { status, .. } => classify_status(operation, *status),
        SyncError::Rejected { .. } => ErrorKind::InvalidAuth,
        SyncError::NoContracts => ErrorKind::NoContracts,
        SyncError::Schema { .. }
        | SyncError::Cancelled { .. }
        | SyncError::Config { .. }
        | SyncError::Validation { .. }
        | SyncError::Io { .. }
        | SyncError::Serialization { .. } => ErrorKind::Unknown,
    }
}

fn classify_status(operation: Operation, status: u16) -> ErrorKind {
    match (operation, status) {
        (_, 401 | 403) => ErrorKind::InvalidAuth,
        // The login endpoint answers malformed credential forms with 400
        (Operation::Login, 400) => ErrorKind::InvalidAuth,
        (_, 500..=599) => ErrorKind::CannotConnect,
        _ => ErrorKind::Unknown,
    }
}
