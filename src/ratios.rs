//! DuPont decomposition and the extended ratio dashboard.
//!
//! Ratios are base-year snapshots: every input is read from the first period.
//! A zero or missing denominator yields a value of 0 and an `N/A` status,
//! never an error.

use crate::config::{RatioThreshold, RatioThresholds};
use crate::schema::LineItemStatement;
use crate::utils::safe_divide;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

const REVENUE: [&str; 3] = ["Revenue", "Total Revenue", "Sales"];
const NET_INCOME: [&str; 2] = ["Net Income", "Net Profit"];
const COGS: [&str; 3] = ["Cogs", "Cost Of Goods Sold", "Cost Of Sales"];
const GROSS_PROFIT: [&str; 1] = ["Gross Profit"];
const EBIT: [&str; 2] = ["Ebit", "Operating Income"];
const INTEREST: [&str; 1] = ["Interest Expense"];
const TOTAL_ASSETS: [&str; 1] = ["Total Assets"];
const TOTAL_EQUITY: [&str; 2] = ["Total Equity", "Shareholders Equity"];
const TOTAL_LIABILITIES: [&str; 1] = ["Total Liabilities"];
const CASH: [&str; 2] = ["Cash", "Cash And Cash Equivalents"];
const RECEIVABLES: [&str; 1] = ["Accounts Receivable"];
const INVENTORY: [&str; 1] = ["Inventory"];
const PAYABLES: [&str; 1] = ["Accounts Payable"];
const OTHER_CURRENT_ASSETS: [&str; 1] = ["Other Current Assets"];
const TOTAL_CURRENT_ASSETS: [&str; 1] = ["Total Current Assets"];
const TOTAL_CURRENT_LIABILITIES: [&str; 1] = ["Total Current Liabilities"];
const SHORT_TERM_DEBT: [&str; 1] = ["Short Term Debt"];
const ACCRUED_EXPENSES: [&str; 1] = ["Accrued Expenses"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuPontRatios {
    pub net_profit_margin: f64,
    pub asset_turnover: f64,
    pub equity_multiplier: f64,
    pub roe: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RatioKind {
    NetProfitMargin,
    OperatingMargin,
    GrossProfitRatio,
    ReturnOnEquity,
    ReturnOnAssets,
    Roce,
    CurrentRatio,
    QuickRatio,
    CashRatio,
    DebtToEquity,
    InterestCoverage,
    InventoryTurnover,
    ReceivablesTurnover,
    PayablesTurnover,
}

impl RatioKind {
    pub const ALL: [RatioKind; 14] = [
        RatioKind::NetProfitMargin,
        RatioKind::OperatingMargin,
        RatioKind::GrossProfitRatio,
        RatioKind::ReturnOnEquity,
        RatioKind::ReturnOnAssets,
        RatioKind::Roce,
        RatioKind::CurrentRatio,
        RatioKind::QuickRatio,
        RatioKind::CashRatio,
        RatioKind::DebtToEquity,
        RatioKind::InterestCoverage,
        RatioKind::InventoryTurnover,
        RatioKind::ReceivablesTurnover,
        RatioKind::PayablesTurnover,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::NetProfitMargin => "net_profit_margin",
            Self::OperatingMargin => "operating_margin",
            Self::GrossProfitRatio => "gross_profit_ratio",
            Self::ReturnOnEquity => "return_on_equity",
            Self::ReturnOnAssets => "return_on_assets",
            Self::Roce => "roce",
            Self::CurrentRatio => "current_ratio",
            Self::QuickRatio => "quick_ratio",
            Self::CashRatio => "cash_ratio",
            Self::DebtToEquity => "debt_to_equity",
            Self::InterestCoverage => "interest_coverage",
            Self::InventoryTurnover => "inventory_turnover",
            Self::ReceivablesTurnover => "receivables_turnover",
            Self::PayablesTurnover => "payables_turnover",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NetProfitMargin => "Net Profit Margin",
            Self::OperatingMargin => "Operating Margin",
            Self::GrossProfitRatio => "Gross Profit Ratio",
            Self::ReturnOnEquity => "Return on Equity",
            Self::ReturnOnAssets => "Return on Assets",
            Self::Roce => "Return on Capital Employed",
            Self::CurrentRatio => "Current Ratio",
            Self::QuickRatio => "Quick Ratio",
            Self::CashRatio => "Cash Ratio",
            Self::DebtToEquity => "Debt to Equity",
            Self::InterestCoverage => "Interest Coverage",
            Self::InventoryTurnover => "Inventory Turnover",
            Self::ReceivablesTurnover => "Receivables Turnover",
            Self::PayablesTurnover => "Payables Turnover",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RatioStatus {
    Good,
    Caution,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl fmt::Display for RatioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Good => "Good",
            Self::Caution => "Caution",
            Self::NeedsAttention => "Needs Attention",
            Self::NotAvailable => "N/A",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioReading {
    pub kind: RatioKind,
    pub label: String,
    pub value: f64,
    #[schemars(description = "False when the denominator was zero or missing; `value` is then 0.")]
    pub available: bool,
    pub status: RatioStatus,
}

/// Classifies `value` against a threshold pair.
pub fn classify(value: f64, available: bool, threshold: &RatioThreshold) -> RatioStatus {
    if !available || !value.is_finite() {
        return RatioStatus::NotAvailable;
    }
    let (good, caution) = if threshold.inverted {
        (value <= threshold.good, value <= threshold.caution)
    } else {
        (value >= threshold.good, value >= threshold.caution)
    };
    if good {
        RatioStatus::Good
    } else if caution {
        RatioStatus::Caution
    } else {
        RatioStatus::NeedsAttention
    }
}

/// Base-year figures both ratio families read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BaseYear {
    revenue: f64,
    net_income: f64,
    cogs: f64,
    gross_profit: f64,
    ebit: f64,
    interest: f64,
    total_assets: f64,
    total_equity: f64,
    total_liabilities: f64,
    cash: f64,
    receivables: f64,
    inventory: f64,
    payables: f64,
    current_assets: f64,
    current_liabilities: f64,
}

impl BaseYear {
    fn read(income: &LineItemStatement, balance: &LineItemStatement) -> Self {
        let first = |statement: &LineItemStatement, labels: &[&str]| {
            statement.first_present(labels).unwrap_or(0.0)
        };

        let revenue = first(income, &REVENUE);
        let cogs = first(income, &COGS);
        let cash = first(balance, &CASH);
        let receivables = first(balance, &RECEIVABLES);
        let inventory = first(balance, &INVENTORY);
        let payables = first(balance, &PAYABLES);

        let current_assets = balance
            .first_present(&TOTAL_CURRENT_ASSETS)
            .unwrap_or_else(|| cash + receivables + inventory + first(balance, &OTHER_CURRENT_ASSETS));
        let current_liabilities = balance
            .first_present(&TOTAL_CURRENT_LIABILITIES)
            .unwrap_or_else(|| {
                payables + first(balance, &SHORT_TERM_DEBT) + first(balance, &ACCRUED_EXPENSES)
            });

        Self {
            revenue,
            net_income: first(income, &NET_INCOME),
            cogs,
            gross_profit: income.first_present(&GROSS_PROFIT).unwrap_or(revenue - cogs),
            ebit: first(income, &EBIT),
            interest: first(income, &INTEREST),
            total_assets: first(balance, &TOTAL_ASSETS),
            total_equity: first(balance, &TOTAL_EQUITY),
            total_liabilities: first(balance, &TOTAL_LIABILITIES),
            cash,
            receivables,
            inventory,
            payables,
            current_assets,
            current_liabilities,
        }
    }
}

pub struct RatioEngine<'a> {
    thresholds: &'a RatioThresholds,
}

impl<'a> RatioEngine<'a> {
    pub fn new(thresholds: &'a RatioThresholds) -> Self {
        Self { thresholds }
    }

    pub fn extended(
        &self,
        income: &LineItemStatement,
        balance: &LineItemStatement,
    ) -> Vec<RatioReading> {
        let b = BaseYear::read(income, balance);
        let capital_employed = b.total_assets - b.current_liabilities;

        RatioKind::ALL
            .into_iter()
            .map(|kind| {
                let (numerator, denominator) = match kind {
                    RatioKind::NetProfitMargin => (b.net_income, b.revenue),
                    RatioKind::OperatingMargin => (b.ebit, b.revenue),
                    RatioKind::GrossProfitRatio => (b.gross_profit, b.revenue),
                    RatioKind::ReturnOnEquity => (b.net_income, b.total_equity),
                    RatioKind::ReturnOnAssets => (b.net_income, b.total_assets),
                    RatioKind::Roce => (b.ebit, capital_employed),
                    RatioKind::CurrentRatio => (b.current_assets, b.current_liabilities),
                    RatioKind::QuickRatio => (b.current_assets - b.inventory, b.current_liabilities),
                    RatioKind::CashRatio => (b.cash, b.current_liabilities),
                    RatioKind::DebtToEquity => (b.total_liabilities, b.total_equity),
                    RatioKind::InterestCoverage => (b.ebit, b.interest),
                    RatioKind::InventoryTurnover => (b.cogs, b.inventory),
                    RatioKind::ReceivablesTurnover => (b.revenue, b.receivables),
                    RatioKind::PayablesTurnover => (b.cogs, b.payables),
                };
                let available = denominator != 0.0 && denominator.is_finite();
                let value = safe_divide(numerator, denominator);
                RatioReading {
                    kind,
                    label: kind.label().to_string(),
                    value,
                    available,
                    status: classify(value, available, &self.thresholds.for_kind(kind)),
                }
            })
            .collect()
    }
}

/// Three-factor DuPont decomposition of the base year.
pub fn dupont(income: &LineItemStatement, balance: &LineItemStatement) -> DuPontRatios {
    let b = BaseYear::read(income, balance);
    let net_profit_margin = safe_divide(b.net_income, b.revenue);
    let asset_turnover = safe_divide(b.revenue, b.total_assets);
    let equity_multiplier = safe_divide(b.total_assets, b.total_equity);

    DuPontRatios {
        net_profit_margin,
        asset_turnover,
        equity_multiplier,
        roe: net_profit_margin * asset_turnover * equity_multiplier,
    }
}

pub fn extended_ratios(
    income: &LineItemStatement,
    balance: &LineItemStatement,
    thresholds: &RatioThresholds,
) -> Vec<RatioReading> {
    RatioEngine::new(thresholds).extended(income, balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn income() -> LineItemStatement {
        let mut s = LineItemStatement::new(vec!["2024".to_string(), "2025".to_string()]);
        s.push("Revenue", vec![1_000_000.0, 2_000_000.0]);
        s.push("Cogs", vec![400_000.0, 0.0]);
        s.push("Gross Profit", vec![600_000.0, 0.0]);
        s.push("Ebit", vec![200_000.0, 0.0]);
        s.push("Interest Expense", vec![20_000.0, 0.0]);
        s.push("Net Income", vec![135_000.0, 999.0]);
        s
    }

    fn balance() -> LineItemStatement {
        let mut s = LineItemStatement::new(vec!["2024".to_string(), "2025".to_string()]);
        s.push("Cash", vec![150_000.0, 0.0]);
        s.push("Accounts Receivable", vec![100_000.0, 0.0]);
        s.push("Inventory", vec![50_000.0, 0.0]);
        s.push("Ppe", vec![700_000.0, 0.0]);
        s.push("Total Assets", vec![1_000_000.0, 0.0]);
        s.push("Accounts Payable", vec![80_000.0, 0.0]);
        s.push("Short Term Debt", vec![20_000.0, 0.0]);
        s.push("Total Liabilities", vec![400_000.0, 0.0]);
        s.push("Total Equity", vec![600_000.0, 0.0]);
        s
    }

    fn reading(readings: &[RatioReading], kind: RatioKind) -> RatioReading {
        readings.iter().find(|r| r.kind == kind).cloned().unwrap()
    }

    #[test]
    fn test_dupont_identity() {
        let ratios = dupont(&income(), &balance());
        assert!((ratios.net_profit_margin - 0.135).abs() < 1e-12);
        assert!((ratios.asset_turnover - 1.0).abs() < 1e-12);
        assert!((ratios.equity_multiplier - 1_000_000.0 / 600_000.0).abs() < 1e-12);
        assert!((ratios.roe - 135_000.0 / 600_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_dupont_identity_various_inputs() {
        let cases = [
            (50.0, 1000.0, 400.0, 250.0),
            (-75.0, 300.0, 2000.0, 1500.0),
            (1.0e6, 3.3e7, 9.1e7, 1.2e7),
            (12.5, 80.0, 55.0, -20.0),
        ];
        for (net_income, revenue, assets, equity) in cases {
            let mut inc = LineItemStatement::new(vec!["Y".to_string()]);
            inc.push("Revenue", vec![revenue]);
            inc.push("Net Income", vec![net_income]);
            let mut bal = LineItemStatement::new(vec!["Y".to_string()]);
            bal.push("Total Assets", vec![assets]);
            bal.push("Total Equity", vec![equity]);

            let ratios = dupont(&inc, &bal);
            let expected = net_income / equity;
            assert!(
                (ratios.roe - expected).abs() <= 1e-9 * expected.abs().max(1.0),
                "roe {} != {}",
                ratios.roe,
                expected
            );
        }
    }

    #[test]
    fn test_dupont_zero_denominators() {
        let empty = LineItemStatement::default();
        let ratios = dupont(&empty, &empty);
        assert_eq!(ratios, DuPontRatios::default());

        let mut inc = LineItemStatement::new(vec!["Y".to_string()]);
        inc.push("Net Income", vec![10.0]);
        let ratios = dupont(&inc, &balance());
        assert_eq!(ratios.net_profit_margin, 0.0);
        assert_eq!(ratios.asset_turnover, 0.0);
        assert_eq!(ratios.roe, 0.0);
    }

    #[test]
    fn test_extended_ratios_values() {
        let thresholds = RatioThresholds::default();
        let readings = extended_ratios(&income(), &balance(), &thresholds);
        assert_eq!(readings.len(), RatioKind::ALL.len());

        // current assets = 150k + 100k + 50k, current liabilities = 80k + 20k
        let current = reading(&readings, RatioKind::CurrentRatio);
        assert!((current.value - 3.0).abs() < 1e-12);
        assert_eq!(current.status, RatioStatus::Good);

        let quick = reading(&readings, RatioKind::QuickRatio);
        assert!((quick.value - 2.5).abs() < 1e-12);

        let cash = reading(&readings, RatioKind::CashRatio);
        assert!((cash.value - 1.5).abs() < 1e-12);

        let coverage = reading(&readings, RatioKind::InterestCoverage);
        assert!((coverage.value - 10.0).abs() < 1e-12);

        let inventory = reading(&readings, RatioKind::InventoryTurnover);
        assert!((inventory.value - 8.0).abs() < 1e-12);

        let receivables = reading(&readings, RatioKind::ReceivablesTurnover);
        assert!((receivables.value - 10.0).abs() < 1e-12);

        let payables = reading(&readings, RatioKind::PayablesTurnover);
        assert!((payables.value - 5.0).abs() < 1e-12);
        assert_eq!(payables.status, RatioStatus::Caution);

        // capital employed = 1,000k - 100k
        let roce = reading(&readings, RatioKind::Roce);
        assert!((roce.value - 200_000.0 / 900_000.0).abs() < 1e-12);

        let gross = reading(&readings, RatioKind::GrossProfitRatio);
        assert!((gross.value - 0.6).abs() < 1e-12);

        let de = reading(&readings, RatioKind::DebtToEquity);
        assert!((de.value - 400_000.0 / 600_000.0).abs() < 1e-12);
        assert_eq!(de.status, RatioStatus::Good);
    }

    #[test]
    fn test_missing_denominators_are_not_available() {
        let thresholds = RatioThresholds::default();
        let readings = extended_ratios(&income(), &LineItemStatement::default(), &thresholds);

        for kind in [
            RatioKind::CurrentRatio,
            RatioKind::QuickRatio,
            RatioKind::InventoryTurnover,
            RatioKind::DebtToEquity,
        ] {
            let r = reading(&readings, kind);
            assert_eq!(r.value, 0.0, "{:?}", kind);
            assert!(!r.available);
            assert_eq!(r.status, RatioStatus::NotAvailable);
        }

        let margin = reading(&readings, RatioKind::NetProfitMargin);
        assert!(margin.available);
        assert_eq!(margin.status, RatioStatus::Good);
    }

    #[test]
    fn test_gross_profit_derived_from_cogs() {
        let thresholds = RatioThresholds::default();
        let mut inc = LineItemStatement::new(vec!["Y".to_string()]);
        inc.push("Revenue", vec![100.0]);
        inc.push("Cogs", vec![70.0]);
        let readings = extended_ratios(&inc, &LineItemStatement::default(), &thresholds);
        let gross = reading(&readings, RatioKind::GrossProfitRatio);
        assert!((gross.value - 0.3).abs() < 1e-12);
        assert_eq!(gross.status, RatioStatus::Caution);
    }

    #[test]
    fn test_classify_inverted() {
        let t = RatioThreshold::lower(1.0, 2.0);
        assert_eq!(classify(0.5, true, &t), RatioStatus::Good);
        assert_eq!(classify(1.5, true, &t), RatioStatus::Caution);
        assert_eq!(classify(3.0, true, &t), RatioStatus::NeedsAttention);
        assert_eq!(classify(0.0, false, &t), RatioStatus::NotAvailable);
        assert_eq!(RatioStatus::NeedsAttention.to_string(), "Needs Attention");
        assert_eq!(
            serde_json::to_string(&RatioStatus::NotAvailable).unwrap(),
            "\"N/A\""
        );
    }
}
