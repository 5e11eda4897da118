//! Provider API access
//!
//! [`AccountApi`] is the raw upstream seam: one bounded attempt per call,
//! explicit session in, raw payload out. [`HttpAccountApi`] implements it
//! over HTTP and [`ApiClient`] layers session handling on top.

pub mod client;
pub mod http;
pub mod types;

pub use client::ApiClient;
pub use http::HttpAccountApi;
pub use types::OneOrMany;

use crate::error::Result;
use crate::model::{Contract, Credentials, Session};
use types::{RawCosts, RawHouse, RawHouseDetails, RawInvoice, RawNextInvoice, RawVirtualBattery};

/// Upstream resource operations
#[async_trait::async_trait]
pub trait AccountApi: Send + Sync {
    /// Exchange credentials for a session
    async fn login(&self, credentials: &Credentials) -> Result<Session>;

    /// Houses with their contracts
    async fn list_contracts(&self, session: &Session) -> Result<Vec<RawHouse>>;

    async fn get_house(&self, session: &Session, house_id: &str) -> Result<RawHouseDetails>;

    async fn get_consumption(&self, session: &Session, contract: &Contract) -> Result<RawCosts>;

    async fn get_invoices(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<OneOrMany<RawInvoice>>;

    /// `None` when the provider has no estimate yet
    async fn get_next_invoice(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<Option<RawNextInvoice>>;

    async fn get_battery(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<RawVirtualBattery>;
}
