//! Business rule set and the frozen per-voucher snapshot

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Comparison used by a [`RiskRule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

/// Configurable risk rule: `field operator value` adds `score_impact`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRule {
    pub name: String,
    /// One of `eligible_amount`, `vat_amount`, `nationality`,
    /// `residence_country`, `item_count`, `traveler_age`
    pub field: String,
    pub operator: RiskOperator,
    pub value: serde_json::Value,
    pub score_impact: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Tunable parameters of a rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParams {
    /// Minimum invoice total
    pub min_purchase_amount: Decimal,
    pub min_age: u32,
    /// Validity window, counted as 30-day months
    pub exit_deadline_months: u32,
    /// Scan-time warning when the purchase is older than this
    pub purchase_window_days: u32,
    pub excluded_categories: Vec<String>,
    /// Empty means every residence not excluded is eligible
    pub eligible_residence_countries: Vec<String>,
    pub excluded_residence_countries: Vec<String>,
    /// Percent
    pub default_vat_rate: Decimal,
    /// Percent of VAT
    pub operator_fee_percentage: Decimal,
    pub operator_fee_fixed: Decimal,
    pub min_operator_fee: Decimal,
    /// Score at or above which physical control is mandatory
    pub risk_score_threshold: i32,
    /// Score at or above which the scan raises a warning
    pub medium_risk_threshold: i32,
    pub high_value_threshold: Decimal,
    pub risk_rules: Vec<RiskRule>,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            min_purchase_amount: Decimal::from(50_000),
            min_age: 16,
            exit_deadline_months: 3,
            purchase_window_days: 90,
            excluded_categories: Vec::new(),
            eligible_residence_countries: Vec::new(),
            excluded_residence_countries: Vec::new(),
            default_vat_rate: Decimal::from(16),
            operator_fee_percentage: Decimal::from(15),
            operator_fee_fixed: Decimal::ZERO,
            min_operator_fee: Decimal::ZERO,
            risk_score_threshold: 70,
            medium_risk_threshold: 40,
            high_value_threshold: Decimal::from(500_000),
            risk_rules: Vec::new(),
        }
    }
}

/// Versioned rule set; exactly one is active at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: i64,
    pub version: String,
    pub name: String,
    pub is_active: bool,
    pub params: RuleParams,
    pub created_at: i64,
}

/// Create rule set payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetCreate {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub params: RuleParams,
    /// Make this the active rule set
    #[serde(default)]
    pub activate: bool,
}

/// Rules in force when a voucher was created
///
/// Never recomputed from the live rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub rule_set_id: i64,
    pub version: String,
    pub min_purchase_amount: Decimal,
    pub min_age: u32,
    pub exit_deadline_months: u32,
    pub purchase_window_days: u32,
    pub excluded_categories: Vec<String>,
    pub default_vat_rate: Decimal,
    pub operator_fee_percentage: Decimal,
    pub operator_fee_fixed: Decimal,
    pub min_operator_fee: Decimal,
    pub risk_score_threshold: i32,
    pub medium_risk_threshold: i32,
    pub high_value_threshold: Decimal,
}

impl From<&RuleSet> for RuleSnapshot {
    fn from(rules: &RuleSet) -> Self {
        let p = &rules.params;
        Self {
            rule_set_id: rules.id,
            version: rules.version.clone(),
            min_purchase_amount: p.min_purchase_amount,
            min_age: p.min_age,
            exit_deadline_months: p.exit_deadline_months,
            purchase_window_days: p.purchase_window_days,
            excluded_categories: p.excluded_categories.clone(),
            default_vat_rate: p.default_vat_rate,
            operator_fee_percentage: p.operator_fee_percentage,
            operator_fee_fixed: p.operator_fee_fixed,
            min_operator_fee: p.min_operator_fee,
            risk_score_threshold: p.risk_score_threshold,
            medium_risk_threshold: p.medium_risk_threshold,
            high_value_threshold: p.high_value_threshold,
        }
    }
}
