use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "Display label of the line item (e.g. 'Net Income'). Lookups are case-insensitive.")]
    pub label: String,

    #[schemars(description = "One value per period, aligned with the statement's `years`.")]
    pub values: Vec<f64>,
}

/// Canonical `{years, line_items}` statement every downstream calculation consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemStatement {
    #[schemars(description = "Chronological, unique period labels (e.g. '2024', 'Year 1').")]
    pub years: Vec<String>,

    #[schemars(description = "Ordered line items; every value sequence has the same length as `years`.")]
    pub line_items: Vec<LineItem>,
}

impl LineItemStatement {
    pub fn new(years: Vec<String>) -> Self {
        Self {
            years,
            line_items: Vec::new(),
        }
    }

    /// Appends a line item, padding or truncating its values to the period count.
    pub fn push(&mut self, label: impl Into<String>, mut values: Vec<f64>) {
        values.resize(self.years.len(), 0.0);
        self.line_items.push(LineItem {
            label: label.into(),
            values,
        });
    }

    pub fn period_count(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty() && self.line_items.is_empty()
    }

    /// Case-insensitive exact label match.
    pub fn find(&self, label: &str) -> Option<&LineItem> {
        let wanted = label.trim().to_lowercase();
        self.line_items
            .iter()
            .find(|item| item.label.trim().to_lowercase() == wanted)
    }

    pub fn series(&self, label: &str) -> Option<&[f64]> {
        self.find(label).map(|item| item.values.as_slice())
    }

    /// Base-period value of `label`, 0 when the line item is absent.
    pub fn find_value(&self, label: &str) -> f64 {
        self.value_at(label, 0)
    }

    /// Value of `label` in period `index`, 0 when either is absent.
    pub fn value_at(&self, label: &str, index: usize) -> f64 {
        self.find(label)
            .and_then(|item| item.values.get(index).copied())
            .unwrap_or(0.0)
    }

    /// Base-period value of the first label in `labels` that exists.
    pub fn first_present(&self, labels: &[&str]) -> Option<f64> {
        labels
            .iter()
            .find_map(|label| self.find(label))
            .map(|item| item.values.first().copied().unwrap_or(0.0))
    }

    /// Series of the first label in `labels` that exists.
    pub fn first_series(&self, labels: &[&str]) -> Option<&[f64]> {
        labels.iter().find_map(|label| self.series(label))
    }
}

/// One period of the cash-flow statement as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowPeriod {
    #[schemars(description = "Period label when the backend supplied one.")]
    pub year: Option<String>,

    #[schemars(description = "Net change in cash over the period; drives payback and FCF fallbacks.")]
    pub net_change_in_cash: f64,

    #[serde(default)]
    pub net_cash_from_operating_activities: f64,

    #[serde(default)]
    pub net_cash_from_investing_activities: f64,

    #[serde(default)]
    pub net_cash_from_financing_activities: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BreakdownEntry {
    #[schemars(description = "Category name shown in legends.")]
    pub category: String,

    #[schemars(description = "Absolute magnitude of the category; sign is a display concern.")]
    pub amount: f64,

    #[schemars(description = "Share of the breakdown total in [0, 1].")]
    pub percent: f64,

    #[schemars(description = "Source-supplied colour, or a deterministic HSL colour derived from the category name.")]
    pub color: String,

    #[schemars(description = "Alias of `category` for chart libraries keyed on `name`.")]
    pub name: String,

    #[schemars(description = "Alias of `amount` for chart libraries keyed on `value`.")]
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Historical,
    Current,
    Forecast,
}

impl Section {
    pub const ORDER: [Section; 3] = [Section::Historical, Section::Current, Section::Forecast];

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "historical" | "history" | "actual" | "actuals" => Some(Self::Historical),
            "current" => Some(Self::Current),
            "forecast" | "projected" | "projection" => Some(Self::Forecast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub date: String,
    pub revenue: f64,
    pub ebitda: f64,
    pub cash_flow: f64,
    pub section: Section,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement() -> LineItemStatement {
        let mut s = LineItemStatement::new(vec!["2024".to_string(), "2025".to_string()]);
        s.push("Revenue", vec![1000.0, 1200.0]);
        s.push("Net Income", vec![100.0, 150.0]);
        s
    }

    #[test]
    fn test_find_value_is_case_insensitive() {
        let s = statement();
        assert_eq!(s.find_value("net income"), 100.0);
        assert_eq!(s.find_value("NET INCOME"), 100.0);
        assert_eq!(s.value_at("revenue", 1), 1200.0);
    }

    #[test]
    fn test_absent_label_returns_zero() {
        let s = statement();
        assert_eq!(s.find_value("Inventory"), 0.0);
        assert_eq!(s.value_at("Revenue", 7), 0.0);
        assert!(s.find("Net").is_none());
    }

    #[test]
    fn test_push_aligns_lengths() {
        let mut s = statement();
        s.push("Short", vec![1.0]);
        s.push("Long", vec![1.0, 2.0, 3.0]);
        assert_eq!(s.series("short").unwrap(), &[1.0, 0.0]);
        assert_eq!(s.series("long").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_first_present() {
        let s = statement();
        assert_eq!(s.first_present(&["Sales", "Revenue"]), Some(1000.0));
        assert_eq!(s.first_present(&["Sales"]), None);
    }

    #[test]
    fn test_section_serialization() {
        let json = serde_json::to_string(&Section::Forecast).unwrap();
        assert_eq!(json, "\"forecast\"");
        assert_eq!(Section::parse("Actuals"), Some(Section::Historical));
    }
}
