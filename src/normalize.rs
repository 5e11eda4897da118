//! Data normalizer
//!
//! Pure conversions from raw upstream payloads into the canonical model.
//! A field the canonical shape requires is never defaulted: its absence
//! fails the whole resource with a schema error.

use crate::api::types::{
    OneOrMany, RawCosts, RawHouse, RawHouseContract, RawHouseDetails, RawInvoice,
    RawLoginResponse, RawNextInvoice, RawPrices, RawVirtualBattery, value_as_f64,
};
use crate::classify::Operation;
use crate::error::{Result, SyncError};
use crate::logging::get_logger;
use crate::model::{
    ConsumptionSnapshot, Contract, ContractKind, CostBreakdown, CURRENCY_UNIT, ENERGY_UNIT,
    HouseDetails, Invoice, InvoiceStatus, NextInvoice, Redemption, Session, Tariff,
    ValueAddedService, VirtualBatteryBalance,
};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

fn required<T>(operation: Operation, field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| SyncError::schema(operation, format!("missing required field '{}'", field)))
}

fn required_str(operation: Operation, field: &str, value: Option<&String>) -> Result<String> {
    match value.map(|s| s.trim()) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(SyncError::schema(
            operation,
            format!("missing required field '{}'", field),
        )),
    }
}

/// Session from a login response
pub fn session(raw: RawLoginResponse, validity: Duration, now: DateTime<Utc>) -> Result<Session> {
    let operation = Operation::Login;
    let error_code = raw.error_code.unwrap_or(0);
    if error_code != 0 {
        let message = raw
            .error_details
            .or(raw.error_message)
            .unwrap_or_else(|| format!("error code {}", error_code));
        return Err(SyncError::rejected(operation, message));
    }

    let info = required(operation, "userInfo", raw.user_info)?;
    Ok(Session {
        uid: required_str(operation, "userInfo.UID", info.uid.as_ref())?,
        uid_signature: required_str(operation, "userInfo.UIDSignature", info.uid_signature.as_ref())?,
        signature_timestamp: required_str(
            operation,
            "userInfo.signatureTimestamp",
            info.signature_timestamp.as_ref(),
        )?,
        issued_at: now,
        validity,
    })
}

/// Flatten the house listing into contracts
///
/// Products other than electricity and gas are skipped. Two entries with the
/// same CUPS would collapse into one cache slot and fail the listing.
pub fn contracts(houses: &[RawHouse]) -> Result<Vec<Contract>> {
    let operation = Operation::ListContracts;
    let logger = get_logger("normalize");
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for house in houses {
        let house_id = required_str(operation, "house.code", house.code.as_ref())?;
        for value in &house.contracts {
            let raw: crate::api::types::RawContract = serde_json::from_value(value.clone())
                .map_err(|e| SyncError::schema(operation, e.to_string()))?;
            let code = required_str(operation, "contract.code", raw.code.as_ref())?;
            let label = required_str(operation, "contract.contractType", raw.contract_type.as_ref())?;
            let Some(kind) = ContractKind::from_label(&label) else {
                logger.warn(&format!(
                    "Skipping contract {} with unsupported type {}",
                    code, label
                ));
                continue;
            };
            let cups = required_str(operation, "contract.cups", raw.cups.as_ref())?;
            if !seen.insert(cups.clone()) {
                return Err(SyncError::schema(
                    operation,
                    format!("duplicate CUPS {} in contract listing", cups),
                ));
            }
            out.push(Contract {
                cups,
                kind,
                code,
                house_id: house_id.clone(),
                active: raw
                    .status
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case("ACTIVE")),
                raw: value.clone(),
            });
        }
    }
    Ok(out)
}

pub fn consumption(
    contract: &Contract,
    raw: &RawCosts,
    now: DateTime<Utc>,
) -> Result<ConsumptionSnapshot> {
    let operation = Operation::GetConsumption;
    let days = required(operation, "totalDays", raw.total_days)?;
    if days < 0.0 {
        return Err(SyncError::schema(operation, "negative totalDays"));
    }
    Ok(ConsumptionSnapshot {
        cups: contract.cups.clone(),
        period_days: days.round() as u32,
        amount: required(operation, "consumption", raw.consumption)?,
        unit: ENERGY_UNIT.to_string(),
        cost: CostBreakdown {
            total: required(operation, "amount", raw.amount)?,
            variable: raw.amount_variable,
            fixed: raw.amount_fixed,
            average_daily: raw.average_amount,
        },
        retrieved_at: now,
    })
}

/// Invoice sequence, upstream order and duplicates preserved
pub fn invoices(contract: &Contract, raw: OneOrMany<RawInvoice>) -> Result<Vec<Invoice>> {
    raw.into_vec()
        .into_iter()
        .map(|inv| invoice(contract, inv))
        .collect()
}

fn invoice(contract: &Contract, raw: RawInvoice) -> Result<Invoice> {
    let operation = Operation::GetInvoices;
    let date = required_str(operation, "invoice.issueDate", raw.issue_date.as_ref())?;
    let issue_date = parse_date(&date).ok_or_else(|| {
        SyncError::schema(operation, format!("unparseable invoice date '{}'", date))
    })?;
    let amount = required(operation, "invoice.amount", raw.amount.or(raw.total_amount))?;
    let status = required_str(operation, "invoice.status", raw.status.as_ref())?;
    Ok(Invoice {
        cups: contract.cups.clone(),
        issue_date,
        amount,
        status: InvoiceStatus::from_label(&status),
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            // "2025-01-31T00:00:00" without an offset
            s.get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        })
}

pub fn next_invoice(raw: &RawNextInvoice) -> Result<NextInvoice> {
    Ok(NextInvoice {
        amount: required(Operation::GetNextInvoice, "amount", raw.amount)?,
        variable: raw.amount_variable,
        fixed: raw.amount_fixed,
    })
}

/// House details scoped to one contract
pub fn house_details(contract: &Contract, raw: &RawHouseDetails) -> Result<HouseDetails> {
    let operation = Operation::GetHouse;
    if let Some(code) = raw.code.as_deref()
        && code != contract.house_id
    {
        return Err(SyncError::schema(
            operation,
            format!("house {} returned for {}", code, contract.house_id),
        ));
    }

    let entry = raw
        .contracts
        .iter()
        .find(|c| c.code.as_deref() == Some(contract.code.as_str()));

    let services = match entry {
        Some(e) => e
            .sva
            .iter()
            .map(|s| {
                Ok(ValueAddedService {
                    code: required_str(operation, "sva.code", s.code.as_ref())?,
                    name: s.name.clone().unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(HouseDetails {
        house_id: contract.house_id.clone(),
        tariff: entry.map(|e| tariff(contract, e)),
        services,
    })
}

fn tariff(contract: &Contract, entry: &RawHouseContract) -> Tariff {
    let prices = entry.prices.clone().unwrap_or_default();
    let status = entry.status.clone().or_else(|| {
        contract
            .raw
            .get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });

    match contract.kind {
        ContractKind::Electric => Tariff {
            status,
            power_kw: entry.power.as_ref().and_then(|v| {
                value_as_f64(v).or_else(|| v.as_str().and_then(first_decimal))
            }),
            fee: entry.fee.clone(),
            power_price_punta: parse_price_list(&prices.power, 0),
            power_price_valle: parse_price_list(&prices.power, 1),
            energy_price: parse_price_list(&prices.energy, 0),
            ..Tariff::default()
        },
        ContractKind::Gas => Tariff {
            status,
            gas_fixed_term: extract_gas_price(&prices, true),
            gas_variable_term: extract_gas_price(&prices, false),
            ..Tariff::default()
        },
    }
}

static DECIMAL_COMMA: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+),(\d+)").ok());

/// First `<digits>,<digits>` number in a human-readable price line
pub fn first_decimal(line: &str) -> Option<f64> {
    let caps = DECIMAL_COMMA.as_ref()?.captures(line)?;
    format!("{}.{}", &caps[1], &caps[2]).parse().ok()
}

/// The `index`-th decimal price in a list of price lines
pub fn parse_price_list(prices: &[String], index: usize) -> Option<f64> {
    prices
        .iter()
        .filter_map(|p| first_decimal(p))
        .nth(index)
}

/// Gas fixed or variable term price
pub fn extract_gas_price(prices: &RawPrices, fixed: bool) -> Option<f64> {
    let key = if fixed { "Término Fijo" } else { "Término Variable" };
    prices
        .energy
        .iter()
        .filter(|p| p.contains(key))
        .find_map(|p| first_decimal(p))
}

/// Virtual battery figures for an electric contract
pub fn battery(contract: &Contract, raw: &RawVirtualBattery) -> Result<VirtualBatteryBalance> {
    let operation = Operation::GetBattery;
    if contract.kind != ContractKind::Electric {
        return Err(SyncError::schema(
            operation,
            format!("virtual battery requested for {} contract", contract.kind.as_str()),
        ));
    }
    let discounts = required(operation, "discounts", raw.discounts.as_ref())?;
    let excedents = required(operation, "excedents", raw.excedents.as_ref())?;

    let pending = discounts
        .contracts
        .iter()
        .find(|c| c.product_code.as_deref() == Some(contract.code.as_str()))
        .and_then(|c| c.pending_amount);
    let stored_amount = required(operation, "discounts.contracts[].pendingAmount", pending)?;

    let conversion = excedents
        .data
        .iter()
        .find_map(|d| d.conversion_price)
        .filter(|p| *p != 0.0);
    let per_kwh = |amount: f64| conversion.map(|price| round2(amount / price));

    let last_redemption = discounts
        .data
        .iter()
        .filter_map(|r| {
            r.billing_date.as_ref().map(|date| Redemption {
                billing_date: date.clone(),
                amount: r.amount,
                kwh: r.kwh,
            })
        })
        .max_by(|a, b| a.billing_date.cmp(&b.billing_date));

    Ok(VirtualBatteryBalance {
        cups: contract.cups.clone(),
        stored_amount,
        unit: CURRENCY_UNIT.to_string(),
        kwh_available: per_kwh(stored_amount),
        applied_amount: excedents.applied_amount,
        kwh_redeemed: excedents.applied_amount.and_then(per_kwh),
        total_kwh_charged: excedents.total_kwh.map(round2),
        excedents_price: conversion,
        last_redemption,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn electric() -> Contract {
        Contract {
            cups: "ES0031000000000001AA".into(),
            kind: ContractKind::Electric,
            code: "C1".into(),
            house_id: "H1".into(),
            active: true,
            raw: json!({"status": "ACTIVE"}),
        }
    }

    fn gas() -> Contract {
        Contract {
            cups: "ES0217000000000002BB".into(),
            kind: ContractKind::Gas,
            code: "C2".into(),
            house_id: "H1".into(),
            active: true,
            raw: json!({}),
        }
    }

    fn houses(value: serde_json::Value) -> Vec<RawHouse> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn login_tokens_become_session() {
        let raw: RawLoginResponse = serde_json::from_value(json!({
            "errorCode": 0,
            "userInfo": {"UID": "u1", "UIDSignature": "sig", "signatureTimestamp": "1700000000"}
        }))
        .unwrap();
        let now = Utc::now();
        let s = session(raw, Duration::from_secs(60), now).unwrap();
        assert_eq!(s.uid, "u1");
        assert_eq!(s.issued_at, now);
    }

    #[test]
    fn login_error_code_is_rejection() {
        let raw: RawLoginResponse = serde_json::from_value(json!({
            "errorCode": 403042,
            "errorDetails": "invalid loginID or password"
        }))
        .unwrap();
        let err = session(raw, Duration::from_secs(60), Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));
    }

    #[test]
    fn login_missing_tokens_is_schema() {
        let raw: RawLoginResponse =
            serde_json::from_value(json!({"userInfo": {"UID": "u1"}})).unwrap();
        let err = session(raw, Duration::from_secs(60), Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::Schema { .. }));
    }

    #[test]
    fn contracts_are_flattened_per_house() {
        let list = houses(json!([
            {"code": "H1", "contracts": [
                {"code": "C1", "contractType": "ELECTRICITY", "cups": "ES01", "status": "ACTIVE"},
                {"code": "C2", "contractType": "GAS", "cups": "ES02", "status": "INACTIVE"}
            ]},
            {"code": "H2", "contracts": [
                {"code": "C3", "contractType": "SOLAR_SERVICE", "cups": "ES03"}
            ]}
        ]));
        let out = contracts(&list).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, ContractKind::Electric);
        assert!(out[0].active);
        assert_eq!(out[1].house_id, "H1");
        assert!(!out[1].active);
        assert_eq!(out[1].raw["code"], "C2");
    }

    #[test]
    fn contract_without_cups_fails() {
        let list = houses(json!([{"code": "H1", "contracts": [
            {"code": "C1", "contractType": "GAS"}
        ]}]));
        assert!(matches!(contracts(&list), Err(SyncError::Schema { .. })));
    }

    #[test]
    fn duplicate_cups_fails() {
        let list = houses(json!([
            {"code": "H1", "contracts": [{"code": "C1", "contractType": "GAS", "cups": "ES01"}]},
            {"code": "H2", "contracts": [{"code": "C9", "contractType": "GAS", "cups": "ES01"}]}
        ]));
        assert!(matches!(contracts(&list), Err(SyncError::Schema { .. })));
    }

    #[test]
    fn consumption_requires_amounts() {
        let now = Utc::now();
        let raw: RawCosts = serde_json::from_value(json!({
            "totalDays": 14, "consumption": 120.5, "amount": 33.1, "amountFixed": 10.0
        }))
        .unwrap();
        let snap = consumption(&electric(), &raw, now).unwrap();
        assert_eq!(snap.period_days, 14);
        assert_eq!(snap.unit, "kWh");
        assert_eq!(snap.cost.fixed, Some(10.0));
        assert_eq!(snap.cost.variable, None);

        let raw: RawCosts =
            serde_json::from_value(json!({"totalDays": 14, "amount": 33.1})).unwrap();
        let err = consumption(&electric(), &raw, now).unwrap_err();
        assert!(err.to_string().contains("consumption"));
    }

    #[test]
    fn single_invoice_equals_singleton_list() {
        let body = json!({"issueDate": "2025-02-01", "amount": 51.2, "status": "PAID"});
        let one: OneOrMany<RawInvoice> = serde_json::from_value(body.clone()).unwrap();
        let many: OneOrMany<RawInvoice> = serde_json::from_value(json!([body])).unwrap();
        assert_eq!(
            invoices(&electric(), one).unwrap(),
            invoices(&electric(), many).unwrap()
        );
    }

    #[test]
    fn invoices_keep_order_and_duplicates() {
        let raw: OneOrMany<RawInvoice> = serde_json::from_value(json!([
            {"issueDate": "2025-03-01", "amount": 10, "status": "PENDING"},
            {"issueDate": "2025-03-01", "amount": 10, "status": "PENDING"},
            {"invoiceDate": "01/02/2025", "totalAmount": "9,5", "status": "PAID"}
        ]))
        .unwrap();
        let out = invoices(&electric(), raw).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[1]);
        assert_eq!(out[2].issue_date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(out[2].amount, 9.5);
        assert!(out[2].status.is_paid());
    }

    #[test]
    fn invoice_missing_status_fails() {
        let raw: OneOrMany<RawInvoice> =
            serde_json::from_value(json!({"issueDate": "2025-02-01", "amount": 1})).unwrap();
        assert!(invoices(&electric(), raw).is_err());
    }

    #[test]
    fn price_lines() {
        assert_eq!(first_decimal("Punta: 0,1234 €/kWh"), Some(0.1234));
        assert_eq!(first_decimal("P1 2.0TD Punta: 0,0911 €/kW día"), Some(0.0911));
        assert_eq!(first_decimal("P1 2.5 kW"), None);
        assert_eq!(first_decimal("sin precio"), None);
        let power = vec![
            "Punta: 0,0911 €/kW día".to_string(),
            "Valle: 0,0031 €/kW día".to_string(),
        ];
        assert_eq!(parse_price_list(&power, 0), Some(0.0911));
        assert_eq!(parse_price_list(&power, 1), Some(0.0031));
        assert_eq!(parse_price_list(&power, 2), None);

        let prices = RawPrices {
            power: vec![],
            energy: vec![
                "Término Fijo: 0,2100 €/día".to_string(),
                "Término Variable: 0,0650 €/kWh".to_string(),
            ],
        };
        assert_eq!(extract_gas_price(&prices, true), Some(0.21));
        assert_eq!(extract_gas_price(&prices, false), Some(0.065));
    }

    #[test]
    fn house_details_pick_contract_entry() {
        let raw: RawHouseDetails = serde_json::from_value(json!({
            "code": "H1",
            "contracts": [{
                "code": "C1", "status": "ACTIVE", "power": "4,6", "fee": "2.0TD",
                "prices": {"power": ["Punta: 0,09 €", "Valle: 0,01 €"], "energy": ["Energía: 0,15 €/kWh"]},
                "sva": [{"code": "S1", "name": "Mantenimiento"}]
            }]
        }))
        .unwrap();
        let house = house_details(&electric(), &raw).unwrap();
        let tariff = house.tariff.unwrap();
        assert_eq!(tariff.power_kw, Some(4.6));
        assert_eq!(tariff.fee.as_deref(), Some("2.0TD"));
        assert_eq!(tariff.power_price_valle, Some(0.01));
        assert_eq!(tariff.energy_price, Some(0.15));
        assert_eq!(house.services.len(), 1);

        let house = house_details(&gas(), &raw).unwrap();
        assert!(house.tariff.is_none());
        assert!(house.services.is_empty());
    }

    #[test]
    fn battery_figures() {
        let raw: RawVirtualBattery = serde_json::from_value(json!({
            "discounts": {
                "contracts": [{"productCode": "C1", "pendingAmount": 12.5}],
                "data": [
                    {"billingDate": "2025-01-10", "amount": 3.0, "kWh": 30},
                    {"billingDate": "2025-03-10", "amount": 4.0, "kWh": 40}
                ]
            },
            "excedents": {"appliedAmount": 7.0, "totalkWh": 123.456, "data": [{"conversionPrice": 0.1}]}
        }))
        .unwrap();
        let vb = battery(&electric(), &raw).unwrap();
        assert_eq!(vb.stored_amount, 12.5);
        assert_eq!(vb.unit, "EUR");
        assert_eq!(vb.kwh_available, Some(125.0));
        assert_eq!(vb.kwh_redeemed, Some(70.0));
        assert_eq!(vb.total_kwh_charged, Some(123.46));
        assert_eq!(vb.last_redemption.unwrap().billing_date, "2025-03-10");
    }

    #[test]
    fn battery_zero_conversion_price_has_no_kwh() {
        let raw: RawVirtualBattery = serde_json::from_value(json!({
            "discounts": {"contracts": [{"productCode": "C1", "pendingAmount": 0}]},
            "excedents": {"data": [{"conversionPrice": 0}]}
        }))
        .unwrap();
        let vb = battery(&electric(), &raw).unwrap();
        assert_eq!(vb.stored_amount, 0.0);
        assert_eq!(vb.kwh_available, None);
        assert_eq!(vb.excedents_price, None);
    }

    #[test]
    fn battery_missing_pending_amount_fails() {
        let raw: RawVirtualBattery = serde_json::from_value(json!({
            "discounts": {"contracts": [{"productCode": "OTHER", "pendingAmount": 1}]},
            "excedents": {}
        }))
        .unwrap();
        assert!(matches!(battery(&electric(), &raw), Err(SyncError::Schema { .. })));
    }

    #[test]
    fn battery_for_gas_is_rejected() {
        let raw: RawVirtualBattery = serde_json::from_value(json!({})).unwrap();
        assert!(battery(&gas(), &raw).is_err());
    }
}
