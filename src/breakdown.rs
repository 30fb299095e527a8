//! Revenue and expense breakdown resolution.
//!
//! Sources are tried in a fixed priority order and the first non-empty one wins;
//! later sources are never consulted or merged in.

use crate::config::ColorConfig;
use crate::schema::BreakdownEntry;
use crate::utils::{first_number_field, first_string_field, value_as_f64};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const HUE_MULTIPLIER: u32 = 13;
const UNNAMED_CATEGORY: &str = "Other";
const NAME_KEYS: [&str; 3] = ["category", "name", "type"];
const AMOUNT_KEYS: [&str; 2] = ["amount", "value"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownKind {
    Revenue,
    Expense,
}

impl BreakdownKind {
    fn field(self) -> &'static str {
        match self {
            Self::Revenue => "revenue_breakdown",
            Self::Expense => "expense_breakdown",
        }
    }
}

/// A category/amount pair as found in the payload, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBreakdownItem {
    pub category: String,
    pub amount: f64,
    pub color: Option<String>,
}

type Extractor = fn(&Value, BreakdownKind) -> Option<Vec<RawBreakdownItem>>;

/// Priority-ordered sources; see [`BreakdownResolver::resolve`].
const SOURCES: [(&str, Extractor); 4] = [
    ("explicit breakdown field", explicit_field),
    ("income statement breakdown", statement_embedded),
    ("operating_expenses collection", operating_expenses),
    ("expenses list", generic_expenses),
];

pub struct BreakdownResolver<'a> {
    colors: &'a ColorConfig,
}

impl<'a> BreakdownResolver<'a> {
    pub fn new(colors: &'a ColorConfig) -> Self {
        Self { colors }
    }

    /// Resolves the breakdown of `kind` from a raw calculation result.
    /// Returns an empty list when no source carries data.
    pub fn resolve(&self, result: &Value, kind: BreakdownKind) -> Vec<BreakdownEntry> {
        let found = SOURCES.iter().find_map(|(name, extract)| {
            extract(result, kind)
                .filter(|items| !items.is_empty())
                .map(|items| (*name, items))
        });

        match found {
            Some((source, items)) => {
                debug!(
                    "Resolved {:?} breakdown from {} ({} entries)",
                    kind,
                    source,
                    items.len()
                );
                self.normalize(items)
            }
            None => {
                debug!("No {:?} breakdown source present", kind);
                Vec::new()
            }
        }
    }

    /// Maps raw items to entries with absolute amounts, shares of the total,
    /// colours, sorted by amount descending.
    pub fn normalize(&self, items: Vec<RawBreakdownItem>) -> Vec<BreakdownEntry> {
        let total: f64 = items.iter().map(|i| i.amount.abs()).sum();
        let divisor = if total > 0.0 { total } else { 1.0 };

        let mut entries: Vec<BreakdownEntry> = items
            .into_iter()
            .map(|item| {
                let amount = item.amount.abs();
                let color = item
                    .color
                    .unwrap_or_else(|| category_color(&item.category, self.colors));
                BreakdownEntry {
                    name: item.category.clone(),
                    category: item.category,
                    amount,
                    percent: amount / divisor,
                    color,
                    value: amount,
                }
            })
            .collect();

        entries.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        entries
    }
}

pub fn resolve_breakdown(
    result: &Value,
    kind: BreakdownKind,
    colors: &ColorConfig,
) -> Vec<BreakdownEntry> {
    BreakdownResolver::new(colors).resolve(result, kind)
}

/// Deterministic HSL colour: hue is the UTF-16 code unit sum times 13, mod 360.
pub fn category_color(category: &str, colors: &ColorConfig) -> String {
    let code_sum: u64 = category.encode_utf16().map(u64::from).sum();
    let hue = (code_sum * u64::from(HUE_MULTIPLIER)) % 360;
    format!("hsl({}, {}%, {}%)", hue, colors.saturation, colors.lightness)
}

fn explicit_field(result: &Value, kind: BreakdownKind) -> Option<Vec<RawBreakdownItem>> {
    result.get(kind.field()).and_then(collection_items)
}

fn statement_embedded(result: &Value, kind: BreakdownKind) -> Option<Vec<RawBreakdownItem>> {
    result
        .get("income_statement")
        .and_then(|statement| statement.get(kind.field()))
        .and_then(collection_items)
}

fn operating_expenses(result: &Value, kind: BreakdownKind) -> Option<Vec<RawBreakdownItem>> {
    if kind != BreakdownKind::Expense {
        return None;
    }
    result.get("operating_expenses").and_then(collection_items)
}

fn generic_expenses(result: &Value, kind: BreakdownKind) -> Option<Vec<RawBreakdownItem>> {
    if kind != BreakdownKind::Expense {
        return None;
    }
    result
        .get("expenses")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(array_item).collect())
}

/// Accepts either an array of `{name|category|type, amount|value}` objects or a
/// `{category: amount}` map. Scalars (e.g. a legacy `operating_expenses` total)
/// are not collections.
fn collection_items(value: &Value) -> Option<Vec<RawBreakdownItem>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(array_item).collect()),
        Value::Object(map) => Some(
            map.iter()
                .map(|(category, amount)| RawBreakdownItem {
                    category: category.clone(),
                    amount: value_as_f64(amount),
                    color: None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn array_item(item: &Value) -> Option<RawBreakdownItem> {
    if !item.is_object() {
        return None;
    }
    Some(RawBreakdownItem {
        category: first_string_field(item, &NAME_KEYS)
            .unwrap_or_else(|| UNNAMED_CATEGORY.to_string()),
        amount: first_number_field(item, &AMOUNT_KEYS).unwrap_or(0.0),
        color: item
            .get("color")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver_colors() -> ColorConfig {
        ColorConfig::default()
    }

    #[test]
    fn test_operating_expenses_map() {
        let colors = resolver_colors();
        let result = json!({"operating_expenses": {"Rent": 1000, "Payroll": 3000}});
        let entries = resolve_breakdown(&result, BreakdownKind::Expense, &colors);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, "Payroll");
        assert_eq!(entries[1].category, "Rent");
        assert!((entries[0].percent - 0.75).abs() < 1e-9);
        assert!((entries[1].percent - 0.25).abs() < 1e-9);
        assert_eq!(entries[0].name, "Payroll");
        assert_eq!(entries[0].value, 3000.0);

        let again = resolve_breakdown(&result, BreakdownKind::Expense, &colors);
        assert_eq!(entries[0].color, again[0].color);
        assert_eq!(entries[1].color, again[1].color);
    }

    #[test]
    fn test_priority_order_first_non_empty_wins() {
        let colors = resolver_colors();
        let result = json!({
            "expense_breakdown": [],
            "income_statement": {"expense_breakdown": [{"name": "Marketing", "value": 50}]},
            "operating_expenses": {"Rent": 1000},
            "expenses": [{"name": "Travel", "amount": 10}]
        });
        let entries = resolve_breakdown(&result, BreakdownKind::Expense, &colors);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, "Marketing");
        assert!((entries[0].percent - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scalar_operating_expenses_falls_through() {
        let colors = resolver_colors();
        let result = json!({
            "operating_expenses": 4200,
            "expenses": [{"type": "Utilities", "value": "300"}, {"category": "Insurance", "amount": 100}]
        });
        let entries = resolve_breakdown(&result, BreakdownKind::Expense, &colors);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, "Utilities");
        assert_eq!(entries[0].amount, 300.0);
    }

    #[test]
    fn test_negative_amounts_use_magnitude_and_source_color() {
        let colors = resolver_colors();
        let result = json!({"expense_breakdown": [
            {"category": "Refunds", "amount": -300, "color": "#ff0000"},
            {"category": "Fees", "amount": 100}
        ]});
        let entries = resolve_breakdown(&result, BreakdownKind::Expense, &colors);
        assert_eq!(entries[0].category, "Refunds");
        assert_eq!(entries[0].amount, 300.0);
        assert_eq!(entries[0].color, "#ff0000");
        let sum: f64 = entries.iter().map(|e| e.percent).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_amounts() {
        let colors = resolver_colors();
        let result = json!({"operating_expenses": {"A": 0, "B": 0, "C": "n/a"}});
        let entries = resolve_breakdown(&result, BreakdownKind::Expense, &colors);
        assert_eq!(entries.len(), 3);
        for entry in entries {
            assert_eq!(entry.percent, 0.0);
            assert!(entry.percent.is_finite());
        }
    }

    #[test]
    fn test_revenue_ignores_expense_sources() {
        let colors = resolver_colors();
        let result = json!({"operating_expenses": {"Rent": 1000}});
        assert!(resolve_breakdown(&result, BreakdownKind::Revenue, &colors).is_empty());

        let result = json!({"revenue_breakdown": [{"category": "Subscriptions", "value": 900}]});
        let entries = resolve_breakdown(&result, BreakdownKind::Revenue, &colors);
        assert_eq!(entries[0].category, "Subscriptions");
    }

    #[test]
    fn test_category_color_is_deterministic() {
        let colors = resolver_colors();
        // "Rent": 82 + 101 + 110 + 116 = 409; 409 * 13 = 5317; 5317 % 360 = 277
        assert_eq!(category_color("Rent", &colors), "hsl(277, 65%, 55%)");
        assert_eq!(category_color("Rent", &colors), category_color("Rent", &colors));
        assert_ne!(category_color("Rent", &colors), category_color("Payroll", &colors));
    }
}
