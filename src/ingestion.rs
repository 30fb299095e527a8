//! Canonicalization of backend statement payloads.
//!
//! The calculation backend has shipped statements in three shapes over time:
//!
//! - **Canonical**: `{ "years": [...], "line_items": [{ "label", "values" }] }`
//! - **Record list**: one object per period, `[{ "year": 2024, "revenue": ..., "assets": {...} }]`
//! - **Legacy single period**: one object keyed by field name, `{ "revenue": ..., "net_income": ... }`
//!
//! All of them are lifted into a [`LineItemStatement`]. A statement that matches no
//! shape is reported as absent, never as an error.

use crate::schema::{CashFlowPeriod, LineItemStatement};
use crate::utils::{first_number_field, humanize_key, optional_f64, period_label, value_as_f64};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const LEGACY_PERIOD_LABEL: &str = "Year 1";
const NET_CHANGE_KEYS: [&str; 3] = ["net_change_in_cash", "net_cash_flow", "net_cash_change"];
const NET_CHANGE_LABELS: [&str; 3] = ["Net Change In Cash", "Net Cash Flow", "Net Cash Change"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementShape {
    Canonical,
    RecordList,
    LegacySinglePeriod,
}

/// Every statement of a calculation result in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStatements {
    pub income_statement: Option<LineItemStatement>,
    pub balance_sheet: Option<LineItemStatement>,
    /// Cash flow kept as period records; payback and FCF fallbacks read these.
    pub cash_flow: Vec<CashFlowPeriod>,
    pub cash_flow_statement: Option<LineItemStatement>,
}

impl NormalizedStatements {
    /// Income statement, or an empty statement whose lookups all return 0.
    pub fn income(&self) -> LineItemStatement {
        self.income_statement.clone().unwrap_or_default()
    }

    pub fn balance(&self) -> LineItemStatement {
        self.balance_sheet.clone().unwrap_or_default()
    }
}

pub struct StatementNormalizer;

impl StatementNormalizer {
    pub fn normalize_result(result: &Value) -> NormalizedStatements {
        let income_statement = result.get("income_statement").and_then(normalize_statement);
        let balance_sheet = result.get("balance_sheet").and_then(normalize_statement);
        let cash_flow_raw = result.get("cash_flow");
        let cash_flow = cash_flow_raw.map(normalize_cash_flow).unwrap_or_default();
        let cash_flow_statement = cash_flow_raw.and_then(normalize_statement);

        debug!(
            "Normalized result: income_statement={}, balance_sheet={}, cash_flow_periods={}",
            income_statement.is_some(),
            balance_sheet.is_some(),
            cash_flow.len()
        );

        NormalizedStatements {
            income_statement,
            balance_sheet,
            cash_flow,
            cash_flow_statement,
        }
    }
}

pub fn normalize_result(result: &Value) -> NormalizedStatements {
    StatementNormalizer::normalize_result(result)
}

pub fn detect_shape(raw: &Value) -> Option<StatementShape> {
    match raw {
        Value::Object(map) if map.contains_key("line_items") || map.contains_key("years") => {
            Some(StatementShape::Canonical)
        }
        Value::Array(records) if !records.is_empty() && records.iter().all(Value::is_object) => {
            Some(StatementShape::RecordList)
        }
        Value::Object(map) if has_scalar_fields(map) => Some(StatementShape::LegacySinglePeriod),
        _ => None,
    }
}

pub fn normalize_statement(raw: &Value) -> Option<LineItemStatement> {
    let shape = detect_shape(raw)?;
    debug!("Detected statement shape {:?}", shape);

    match shape {
        StatementShape::Canonical => Some(lift_canonical(raw)),
        StatementShape::RecordList => raw.as_array().map(|records| lift_record_list(records)),
        StatementShape::LegacySinglePeriod => raw.as_object().map(lift_legacy),
    }
}

/// Extracts per-period cash-flow records from any supported shape.
pub fn normalize_cash_flow(raw: &Value) -> Vec<CashFlowPeriod> {
    match detect_shape(raw) {
        Some(StatementShape::RecordList) => raw
            .as_array()
            .map(|records| records.iter().map(cash_flow_record).collect())
            .unwrap_or_default(),
        Some(StatementShape::LegacySinglePeriod) => vec![cash_flow_record(raw)],
        Some(StatementShape::Canonical) => {
            let statement = lift_canonical(raw);
            let net = statement.first_series(&NET_CHANGE_LABELS).map(<[f64]>::to_vec);
            let operating = statement
                .first_series(&["Net Cash From Operating Activities", "Operating Cash Flow"])
                .map(<[f64]>::to_vec);
            let investing = statement
                .first_series(&["Net Cash From Investing Activities", "Investing Cash Flow"])
                .map(<[f64]>::to_vec);
            let financing = statement
                .first_series(&["Net Cash From Financing Activities", "Financing Cash Flow"])
                .map(<[f64]>::to_vec);

            let at = |series: &Option<Vec<f64>>, idx: usize| {
                series.as_ref().and_then(|s| s.get(idx).copied()).unwrap_or(0.0)
            };

            statement
                .years
                .iter()
                .enumerate()
                .map(|(idx, year)| CashFlowPeriod {
                    year: Some(year.clone()),
                    net_change_in_cash: at(&net, idx),
                    net_cash_from_operating_activities: at(&operating, idx),
                    net_cash_from_investing_activities: at(&investing, idx),
                    net_cash_from_financing_activities: at(&financing, idx),
                })
                .collect()
        }
        None => Vec::new(),
    }
}

fn cash_flow_record(record: &Value) -> CashFlowPeriod {
    let number = |keys: &[&str]| first_number_field(record, keys).unwrap_or(0.0);
    CashFlowPeriod {
        year: record.get("year").and_then(period_label),
        net_change_in_cash: number(&NET_CHANGE_KEYS),
        net_cash_from_operating_activities: number(&[
            "net_cash_from_operating_activities",
            "operating_cash_flow",
        ]),
        net_cash_from_investing_activities: number(&[
            "net_cash_from_investing_activities",
            "investing_cash_flow",
        ]),
        net_cash_from_financing_activities: number(&[
            "net_cash_from_financing_activities",
            "financing_cash_flow",
        ]),
    }
}

fn has_scalar_fields(map: &Map<String, Value>) -> bool {
    map.iter().any(|(key, value)| {
        key != "year"
            && (optional_f64(value).is_some()
                || value
                    .as_object()
                    .map(|nested| nested.values().any(|v| optional_f64(v).is_some()))
                    .unwrap_or(false))
    })
}

fn lift_canonical(raw: &Value) -> LineItemStatement {
    let years: Vec<String> = raw
        .get("years")
        .and_then(Value::as_array)
        .map(|years| {
            years
                .iter()
                .enumerate()
                .map(|(idx, y)| period_label(y).unwrap_or_else(|| format!("Year {}", idx + 1)))
                .collect()
        })
        .unwrap_or_default();

    let mut statement = LineItemStatement::new(years);

    let items = raw
        .get("line_items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for item in &items {
        let Some(label) = item.get("label").and_then(Value::as_str) else {
            warn!("Skipping line item without a label: {}", item);
            continue;
        };
        let values: Vec<f64> = item
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(value_as_f64).collect())
            .unwrap_or_default();

        if values.len() != statement.period_count() {
            warn!(
                "Line item '{}' has {} values for {} periods; aligning",
                label,
                values.len(),
                statement.period_count()
            );
        }
        statement.push(label, values);
    }

    statement
}

fn lift_record_list(records: &[Value]) -> LineItemStatement {
    let years: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            record
                .get("year")
                .and_then(period_label)
                .unwrap_or_else(|| format!("Year {}", idx + 1))
        })
        .collect();

    let mut statement = LineItemStatement::new(years);
    let Some(first) = records.first().and_then(Value::as_object) else {
        return statement;
    };

    for key in ordered_keys(first) {
        match first.get(&key) {
            Some(Value::Object(nested)) => {
                for subkey in nested.keys() {
                    let values = records
                        .iter()
                        .map(|record| {
                            record
                                .get(&key)
                                .and_then(|n| n.get(subkey))
                                .map(value_as_f64)
                                .unwrap_or(0.0)
                        })
                        .collect();
                    statement.push(humanize_key(subkey), values);
                }
            }
            Some(Value::Array(_)) => {
                debug!("Skipping list-valued field '{}' in record list", key);
            }
            Some(_) => {
                let values = records
                    .iter()
                    .map(|record| record.get(&key).map(value_as_f64).unwrap_or(0.0))
                    .collect();
                statement.push(humanize_key(&key), values);
            }
            None => {}
        }
    }

    statement
}

fn lift_legacy(map: &Map<String, Value>) -> LineItemStatement {
    let year = map
        .get("year")
        .and_then(period_label)
        .unwrap_or_else(|| LEGACY_PERIOD_LABEL.to_string());
    let mut statement = LineItemStatement::new(vec![year]);

    for key in ordered_keys(map) {
        match map.get(&key) {
            Some(Value::Object(nested)) => {
                for (subkey, value) in nested {
                    if let Some(v) = optional_f64(value) {
                        statement.push(humanize_key(subkey), vec![v]);
                    }
                }
            }
            Some(value) => {
                if let Some(v) = optional_f64(value) {
                    statement.push(humanize_key(&key), vec![v]);
                }
            }
            None => {}
        }
    }

    statement
}

/// Payload keys in source order, minus `year`, with `investment_income`
/// placed directly after `other_income` (or last when there is none).
fn ordered_keys(map: &Map<String, Value>) -> Vec<String> {
    let has_investment_income = map.contains_key("investment_income");
    let has_other_income = map.contains_key("other_income");

    let mut keys = Vec::with_capacity(map.len());
    for key in map.keys() {
        if key == "year" || key == "investment_income" {
            continue;
        }
        keys.push(key.clone());
        if key == "other_income" && has_investment_income {
            keys.push("investment_income".to_string());
        }
    }
    if has_investment_income && !has_other_income {
        keys.push("investment_income".to_string());
    }
    keys
}
