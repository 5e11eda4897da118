//! Authenticated API facade
//!
//! Every call obtains a valid session first and reports upstream rejections
//! back to the [`AuthSession`] so the next call logs in again.

use super::AccountApi;
use super::types::{
    OneOrMany, RawCosts, RawHouse, RawHouseDetails, RawInvoice, RawNextInvoice,
    RawVirtualBattery,
};
use crate::auth::AuthSession;
use crate::error::Result;
use crate::model::{Contract, Session};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiClient {
    api: Arc<dyn AccountApi>,
    auth: Arc<AuthSession>,
}

impl ApiClient {
    pub const fn new(api: Arc<dyn AccountApi>, auth: Arc<AuthSession>) -> Self {
        Self { api, auth }
    }

    pub const fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub async fn list_contracts(&self) -> Result<Vec<RawHouse>> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.list_contracts(&session).await;
        self.observe(&session, result).await
    }

    pub async fn get_house(&self, house_id: &str) -> Result<RawHouseDetails> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.get_house(&session, house_id).await;
        self.observe(&session, result).await
    }

    pub async fn get_consumption(&self, contract: &Contract) -> Result<RawCosts> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.get_consumption(&session, contract).await;
        self.observe(&session, result).await
    }

    pub async fn get_invoices(&self, contract: &Contract) -> Result<OneOrMany<RawInvoice>> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.get_invoices(&session, contract).await;
        self.observe(&session, result).await
    }

    pub async fn get_next_invoice(&self, contract: &Contract) -> Result<Option<RawNextInvoice>> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.get_next_invoice(&session, contract).await;
        self.observe(&session, result).await
    }

    pub async fn get_battery(&self, contract: &Contract) -> Result<RawVirtualBattery> {
        let session = self.auth.ensure_valid().await?;
        let result = self.api.get_battery(&session, contract).await;
        self.observe(&session, result).await
    }

    async fn observe<T>(&self, session: &Arc<Session>, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_auth_rejection()
        {
            self.auth.invalidate_session(session).await;
        }
        result
    }
}
