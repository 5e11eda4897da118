#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use repsol_sync::api::AccountApi;
use repsol_sync::api::types::{
    OneOrMany, RawCosts, RawHouse, RawHouseDetails, RawInvoice, RawNextInvoice, RawVirtualBattery,
};
use repsol_sync::classify::Operation;
use repsol_sync::error::{Result, SyncError};
use repsol_sync::model::{Contract, Credentials, Session};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub const ELECTRIC_CUPS: &str = "ES0031000000000001AA";
pub const GAS_CUPS: &str = "ES0217000000000002BB";

/// In-memory upstream with call counters and switchable failures
pub struct FakeApi {
    houses: Mutex<Value>,
    pub logins: AtomicUsize,
    pub listings: AtomicUsize,
    pub house_calls: AtomicUsize,
    pub consumption_calls: AtomicUsize,
    pub battery_calls: AtomicUsize,
    pub reject_login: AtomicBool,
    pub reject_next_consumption: AtomicBool,
    pub fail_consumption: AtomicBool,
    pub consumption_delay_ms: AtomicU64,
    pub consumption_amount: Mutex<f64>,
    pub session_validity_ms: AtomicU64,
}

impl FakeApi {
    pub fn new(houses: Value) -> Self {
        Self {
            houses: Mutex::new(houses),
            logins: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            house_calls: AtomicUsize::new(0),
            consumption_calls: AtomicUsize::new(0),
            battery_calls: AtomicUsize::new(0),
            reject_login: AtomicBool::new(false),
            reject_next_consumption: AtomicBool::new(false),
            fail_consumption: AtomicBool::new(false),
            consumption_delay_ms: AtomicU64::new(0),
            consumption_amount: Mutex::new(120.0),
            session_validity_ms: AtomicU64::new(600_000),
        }
    }

    /// One house with an electric and a gas contract
    pub fn with_two_contracts() -> Self {
        Self::new(json!([{
            "code": "H1",
            "contracts": [
                {"code": "C1", "contractType": "ELECTRICITY", "cups": ELECTRIC_CUPS, "status": "ACTIVE"},
                {"code": "C2", "contractType": "GAS", "cups": GAS_CUPS, "status": "ACTIVE"}
            ]
        }]))
    }

    pub fn set_houses(&self, houses: Value) {
        *self.houses.lock().unwrap() = houses;
    }

    pub fn set_consumption_amount(&self, amount: f64) {
        *self.consumption_amount.lock().unwrap() = amount;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.consumption_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_session_validity(&self, validity: Duration) {
        self.session_validity_ms
            .store(validity.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("user@example.com", "secret")
}

fn parse<T: serde::de::DeserializeOwned>(operation: Operation, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SyncError::schema(operation, e.to_string()))
}

#[async_trait]
impl AccountApi for FakeApi {
    async fn login(&self, _credentials: &Credentials) -> Result<Session> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(SyncError::rejected(Operation::Login, "invalid loginID or password"));
        }
        Ok(Session {
            uid: format!("uid-{}", n),
            uid_signature: format!("sig-{}", n),
            signature_timestamp: "1700000000".to_string(),
            issued_at: Utc::now(),
            validity: Duration::from_millis(self.session_validity_ms.load(Ordering::SeqCst)),
        })
    }

    async fn list_contracts(&self, _session: &Session) -> Result<Vec<RawHouse>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let houses = self.houses.lock().unwrap().clone();
        parse(Operation::ListContracts, houses)
    }

    async fn get_house(&self, _session: &Session, house_id: &str) -> Result<RawHouseDetails> {
        self.house_calls.fetch_add(1, Ordering::SeqCst);
        parse(
            Operation::GetHouse,
            json!({
                "code": house_id,
                "contracts": [
                    {"code": "C1", "power": "4,6", "fee": "2.0TD",
                     "prices": {"power": ["Punta: 0,0911 €", "Valle: 0,0031 €"], "energy": ["Energía: 0,1500 €/kWh"]}},
                    {"code": "C2",
                     "prices": {"energy": ["Término Fijo: 0,2100 €/día", "Término Variable: 0,0650 €/kWh"]}}
                ]
            }),
        )
    }

    async fn get_consumption(&self, _session: &Session, _contract: &Contract) -> Result<RawCosts> {
        self.consumption_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.consumption_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.reject_next_consumption.swap(false, Ordering::SeqCst) {
            return Err(SyncError::http(Operation::GetConsumption, 401, "session expired"));
        }
        if self.fail_consumption.load(Ordering::SeqCst) {
            return Err(SyncError::http(Operation::GetConsumption, 500, "upstream down"));
        }
        let amount = *self.consumption_amount.lock().unwrap();
        parse(
            Operation::GetConsumption,
            json!({"totalDays": 14, "consumption": amount, "amount": 31.2, "amountVariable": 21.2, "amountFixed": 10.0}),
        )
    }

    async fn get_invoices(
        &self,
        _session: &Session,
        _contract: &Contract,
    ) -> Result<OneOrMany<RawInvoice>> {
        parse(
            Operation::GetInvoices,
            json!([
                {"issueDate": "2025-03-01", "amount": 40.1, "status": "PENDING"},
                {"issueDate": "2025-02-01", "amount": 38.7, "status": "PAID"}
            ]),
        )
    }

    async fn get_next_invoice(
        &self,
        _session: &Session,
        _contract: &Contract,
    ) -> Result<Option<RawNextInvoice>> {
        parse(Operation::GetNextInvoice, json!({"amount": 35.0})).map(Some)
    }

    async fn get_battery(
        &self,
        _session: &Session,
        contract: &Contract,
    ) -> Result<RawVirtualBattery> {
        self.battery_calls.fetch_add(1, Ordering::SeqCst);
        parse(
            Operation::GetBattery,
            json!({
                "discounts": {
                    "contracts": [{"productCode": contract.code, "pendingAmount": 12.5}],
                    "data": [{"billingDate": "2025-02-01", "amount": 2.0, "kWh": 20}]
                },
                "excedents": {"appliedAmount": 5.0, "totalkWh": 180.0, "data": [{"conversionPrice": 0.1}]}
            }),
        )
    }
}
