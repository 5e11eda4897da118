//! Raw upstream payloads
//!
//! Fields are optional at this layer; `normalize` decides which ones are
//! required. Numbers arrive as JSON numbers or as strings with a decimal
//! comma, depending on the endpoint.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A resource the API returns either as a bare object or as a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Collapse into an ordered sequence, a bare object becoming a singleton
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Parse a number that may be sent as `12.5`, `"12.5"` or `"12,5"`
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().replace(',', ".");
            s.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Parse a value that may be sent as a string or a number into a string
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Login response of the identity provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLoginResponse {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub user_info: Option<RawUserInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUserInfo {
    #[serde(rename = "UID", default, deserialize_with = "lenient_string")]
    pub uid: Option<String>,
    #[serde(rename = "UIDSignature", default, deserialize_with = "lenient_string")]
    pub uid_signature: Option<String>,
    #[serde(rename = "signatureTimestamp", default, deserialize_with = "lenient_string")]
    pub signature_timestamp: Option<String>,
}

/// One house in the contract listing
#[derive(Debug, Clone, Deserialize)]
pub struct RawHouse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    /// Kept as raw JSON so the normalizer can retain the provider metadata
    #[serde(default)]
    pub contracts: Vec<Value>,
}

/// Contract entry inside a house listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContract {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub cups: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Cost and consumption of the current billing period
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCosts {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_days: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub consumption: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_variable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_fixed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInvoice {
    #[serde(default, alias = "invoiceDate", alias = "date", alias = "billingDate")]
    pub issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNextInvoice {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_variable: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount_fixed: Option<f64>,
}

/// House details, including per-contract tariff data and services
#[derive(Debug, Clone, Deserialize)]
pub struct RawHouseDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub contracts: Vec<RawHouseContract>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHouseContract {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee: Option<String>,
    #[serde(default)]
    pub prices: Option<RawPrices>,
    #[serde(default)]
    pub sva: Vec<RawService>,
}

/// Human-readable price lines such as `"Punta: 0,1234 €/kWh"`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrices {
    #[serde(default)]
    pub power: Vec<String>,
    #[serde(default)]
    pub energy: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawService {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Virtual battery history of an electric contract
#[derive(Debug, Clone, Deserialize)]
pub struct RawVirtualBattery {
    #[serde(default)]
    pub discounts: Option<RawDiscounts>,
    #[serde(default)]
    pub excedents: Option<RawExcedents>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDiscounts {
    #[serde(default)]
    pub contracts: Vec<RawDiscountContract>,
    #[serde(default)]
    pub data: Vec<RawRedemption>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiscountContract {
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pending_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRedemption {
    #[serde(default)]
    pub billing_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(rename = "kWh", default, deserialize_with = "lenient_f64")]
    pub kwh: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExcedents {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub applied_amount: Option<f64>,
    #[serde(rename = "totalkWh", default, deserialize_with = "lenient_f64")]
    pub total_kwh: Option<f64>,
    #[serde(default)]
    pub data: Vec<RawExcedent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExcedent {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub conversion_price: Option<f64>,
}
