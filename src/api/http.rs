//! HTTP implementation of [`AccountApi`]
//!
//! One request per call, bounded by the configured timeout. Status and
//! body shape are checked here; field-level checks are left to `normalize`.

use super::AccountApi;
use super::types::{
    OneOrMany, RawCosts, RawHouse, RawHouseDetails, RawInvoice, RawLoginResponse, RawNextInvoice,
    RawVirtualBattery,
};
use crate::auth::sign;
use crate::classify::Operation;
use crate::config::ApiConfig;
use crate::error::{Result, SyncError};
use crate::logging::{StructuredLogger, get_logger};
use crate::model::{Contract, Credentials, Session};
use crate::normalize;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

const BODY_SNIPPET_CHARS: usize = 200;

pub struct HttpAccountApi {
    http: reqwest::Client,
    config: ApiConfig,
    logger: StructuredLogger,
}

impl HttpAccountApi {
    /// Build a client whose every request is bounded by `request_timeout_secs`
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            logger: get_logger("api"),
        })
    }

    fn resource_url(&self, template: &str, house_id: &str, contract_code: Option<&str>) -> String {
        let mut path = template.replace("{house_id}", house_id);
        if let Some(code) = contract_code {
            path = path.replace("{contract_id}", code);
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn contract_url(&self, template: &str, contract: &Contract) -> String {
        self.resource_url(template, &contract.house_id, Some(&contract.code))
    }

    async fn fetch(
        &self,
        operation: Operation,
        url: &str,
        session: &Session,
    ) -> Result<(StatusCode, String)> {
        let signature = sign(session, Utc::now());
        let mut request = self.http.get(url).header(ACCEPT, "application/json");
        for (name, value) in signature.headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        self.logger
            .debug(&format!("{} GET {} -> {}", operation, url, status));
        Ok((status, body))
    }

    async fn fetch_success(
        &self,
        operation: Operation,
        url: &str,
        session: &Session,
    ) -> Result<String> {
        let (status, body) = self.fetch(operation, url, session).await?;
        check_status(operation, status, &body)?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl AccountApi for HttpAccountApi {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let operation = Operation::Login;
        let mut form: Vec<(&str, &str)> = self
            .config
            .login_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !self.config.api_key.is_empty() {
            form.push(("apiKey", self.config.api_key.as_str()));
        }
        form.push(("loginID", credentials.username.as_str()));
        form.push(("password", credentials.password.as_str()));

        let response = self
            .http
            .post(&self.config.login_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        self.logger.debug(&format!("login -> {}", status));
        check_status(operation, status, &body)?;

        let payload: RawLoginResponse = decode_object(operation, &body)?;
        normalize::session(payload, self.config.session_validity(), Utc::now())
    }

    async fn list_contracts(&self, session: &Session) -> Result<Vec<RawHouse>> {
        let operation = Operation::ListContracts;
        let url = self.resource_url(&self.config.contracts_path, "", None);
        let body = self.fetch_success(operation, &url, session).await?;
        if is_empty_body(&body) {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = decode(operation, &body)?;
        if !value.is_array() {
            return Err(SyncError::schema(
                operation,
                format!("expected a list of houses, got: {}", snippet(&body)),
            ));
        }
        serde_json::from_value(value).map_err(|e| SyncError::schema(operation, e.to_string()))
    }

    async fn get_house(&self, session: &Session, house_id: &str) -> Result<RawHouseDetails> {
        let operation = Operation::GetHouse;
        let url = self.resource_url(&self.config.house_path, house_id, None);
        let body = self.fetch_success(operation, &url, session).await?;
        decode_object(operation, &body)
    }

    async fn get_consumption(&self, session: &Session, contract: &Contract) -> Result<RawCosts> {
        let operation = Operation::GetConsumption;
        let url = self.contract_url(&self.config.consumption_path, contract);
        let body = self.fetch_success(operation, &url, session).await?;
        decode_object(operation, &body)
    }

    async fn get_invoices(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<OneOrMany<RawInvoice>> {
        let operation = Operation::GetInvoices;
        let url = self.contract_url(&self.config.invoices_path, contract);
        let body = self.fetch_success(operation, &url, session).await?;
        if is_empty_body(&body) {
            return Ok(OneOrMany::default());
        }
        decode(operation, &body)
    }

    async fn get_next_invoice(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<Option<RawNextInvoice>> {
        let operation = Operation::GetNextInvoice;
        let url = self.contract_url(&self.config.next_invoice_path, contract);
        let (status, body) = self.fetch(operation, &url, session).await?;
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(operation, status, &body)?;
        if is_empty_body(&body) {
            return Ok(None);
        }
        decode_object(operation, &body).map(Some)
    }

    async fn get_battery(
        &self,
        session: &Session,
        contract: &Contract,
    ) -> Result<RawVirtualBattery> {
        let operation = Operation::GetBattery;
        let url = self.contract_url(&self.config.battery_path, contract);
        let body = self.fetch_success(operation, &url, session).await?;
        decode_object(operation, &body)
    }
}

fn transport_error(operation: Operation, err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::timeout(operation, err.to_string())
    } else if err.is_decode() {
        SyncError::schema(operation, err.to_string())
    } else {
        SyncError::network(operation, err.to_string())
    }
}

fn check_status(operation: Operation, status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(SyncError::http(operation, status.as_u16(), snippet(body)))
}

fn decode<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| SyncError::schema(operation, format!("{}: {}", e, snippet(body))))
}

fn decode_object<T: DeserializeOwned>(operation: Operation, body: &str) -> Result<T> {
    let value: serde_json::Value = decode(operation, body)?;
    if !value.is_object() {
        return Err(SyncError::schema(
            operation,
            format!("expected a JSON object, got: {}", snippet(body)),
        ));
    }
    serde_json::from_value(value).map_err(|e| SyncError::schema(operation, e.to_string()))
}

fn is_empty_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == "null"
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
