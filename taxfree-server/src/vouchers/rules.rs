//! Creation-time calculations: amounts, risk score, identifiers
//!
//! Pure functions over the invoice, traveler and rule set.

use std::str::FromStr;

use rand::Rng;
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::{Digest, Sha256};
use shared::models::{Invoice, RiskOperator, RiskRule, RuleParams, RuleSnapshot};

/// Built-in risk flag: eligible amount at or above the high-value threshold
pub const FLAG_HIGH_VALUE: &str = "HIGH_VALUE";
/// Built-in risk flag: several vouchers in a short period
pub const FLAG_FREQUENT_TRAVELER: &str = "FREQUENT_TRAVELER";

const HIGH_VALUE_SCORE: i32 = 20;
const FREQUENT_TRAVELER_SCORE: i32 = 15;
/// Prior vouchers in the window that make a traveler frequent
pub const FREQUENT_TRAVELER_COUNT: i64 = 3;
pub const FREQUENT_TRAVELER_WINDOW_DAYS: i64 = 7;

const VOUCHER_SUFFIX_LEN: usize = 8;
const VOUCHER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Voucher amounts derived from the eligible lines of an invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amounts {
    pub eligible: Decimal,
    pub vat: Decimal,
    pub fee: Decimal,
    pub refund: Decimal,
    pub eligible_items: usize,
}

/// Sum eligible lines (outside excluded categories) and apply the fee schedule
pub fn compute_amounts(invoice: &Invoice, rules: &RuleSnapshot) -> Amounts {
    let eligible_lines: Vec<_> = invoice
        .items
        .iter()
        .filter(|item| {
            item.is_eligible
                && !rules
                    .excluded_categories
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&item.category))
        })
        .collect();

    let eligible: Decimal = eligible_lines.iter().map(|i| i.line_total).sum();
    let vat: Decimal = eligible_lines.iter().map(|i| i.vat_amount).sum();
    let fee = operator_fee(vat, rules);

    Amounts {
        eligible,
        vat,
        fee,
        refund: vat - fee,
        eligible_items: eligible_lines.len(),
    }
}

/// `vat × pct / 100 + fixed`, floored at the minimum fee, capped at the VAT
pub fn operator_fee(vat: Decimal, rules: &RuleSnapshot) -> Decimal {
    let fee = vat * rules.operator_fee_percentage / Decimal::ONE_HUNDRED + rules.operator_fee_fixed;
    fee.max(rules.min_operator_fee).min(vat).round_dp(2)
}

/// Inputs the risk rules can look at
#[derive(Debug, Clone)]
pub struct RiskContext<'a> {
    /// Whole invoice, excluded lines included
    pub invoice_total: Decimal,
    pub eligible_amount: Decimal,
    pub vat_amount: Decimal,
    pub nationality: &'a str,
    pub residence_country: &'a str,
    pub item_count: usize,
    pub traveler_age: Option<u32>,
    /// Vouchers the traveler received in the frequent-traveler window
    pub recent_vouchers: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    /// 0-100
    pub score: i32,
    pub flags: Vec<String>,
    pub requires_control: bool,
}

pub fn assess_risk(ctx: &RiskContext<'_>, params: &RuleParams) -> RiskAssessment {
    let mut score = 0;
    let mut flags = Vec::new();

    for rule in params.risk_rules.iter().filter(|r| r.is_active) {
        if rule_matches(rule, ctx) {
            score += rule.score_impact;
            flags.push(rule.name.clone());
        }
    }

    if ctx.invoice_total >= params.high_value_threshold {
        score += HIGH_VALUE_SCORE;
        flags.push(FLAG_HIGH_VALUE.to_string());
    }
    if ctx.recent_vouchers >= FREQUENT_TRAVELER_COUNT {
        score += FREQUENT_TRAVELER_SCORE;
        flags.push(FLAG_FREQUENT_TRAVELER.to_string());
    }

    let score = score.clamp(0, 100);
    RiskAssessment {
        score,
        requires_control: score >= params.risk_score_threshold
            || ctx.eligible_amount >= params.high_value_threshold,
        flags,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Number(Decimal),
    Text(String),
}

fn field_value(field: &str, ctx: &RiskContext<'_>) -> Option<FieldValue> {
    match field {
        "eligible_amount" => Some(FieldValue::Number(ctx.eligible_amount)),
        "vat_amount" => Some(FieldValue::Number(ctx.vat_amount)),
        "nationality" => Some(FieldValue::Text(ctx.nationality.to_string())),
        "residence_country" => Some(FieldValue::Text(ctx.residence_country.to_string())),
        "item_count" => Some(FieldValue::Number(Decimal::from(ctx.item_count as u64))),
        "traveler_age" => ctx.traveler_age.map(|age| FieldValue::Number(Decimal::from(age))),
        _ => None,
    }
}

fn rule_matches(rule: &RiskRule, ctx: &RiskContext<'_>) -> bool {
    let Some(actual) = field_value(&rule.field, ctx) else {
        return false;
    };

    match rule.operator {
        RiskOperator::Equals => equals(&actual, &rule.value),
        RiskOperator::NotEquals => !equals(&actual, &rule.value),
        RiskOperator::GreaterThan => compare(&actual, &rule.value).is_some_and(|o| o.is_gt()),
        RiskOperator::LessThan => compare(&actual, &rule.value).is_some_and(|o| o.is_lt()),
        RiskOperator::In => members(&rule.value).any(|v| equals(&actual, v)),
        RiskOperator::NotIn => !members(&rule.value).any(|v| equals(&actual, v)),
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn equals(actual: &FieldValue, expected: &Value) -> bool {
    match actual {
        FieldValue::Number(n) => as_decimal(expected).is_some_and(|e| e == *n),
        FieldValue::Text(s) => expected.as_str().is_some_and(|e| e.eq_ignore_ascii_case(s)),
    }
}

fn compare(actual: &FieldValue, expected: &Value) -> Option<std::cmp::Ordering> {
    match actual {
        FieldValue::Number(n) => as_decimal(expected).map(|e| n.cmp(&e)),
        FieldValue::Text(_) => None,
    }
}

fn members(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

/// `YYYYMM` + 8 random `[A-Z0-9]`
pub fn generate_voucher_number(now_millis: i64) -> String {
    let prefix = chrono::DateTime::from_timestamp_millis(now_millis)
        .unwrap_or_default()
        .format("%Y%m")
        .to_string();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..VOUCHER_SUFFIX_LEN)
        .map(|_| VOUCHER_CHARSET[rng.gen_range(0..VOUCHER_CHARSET.len())] as char)
        .collect();
    format!("{prefix}{suffix}")
}

/// Normalized passport number: trimmed, upper-case
pub fn normalize_passport(passport: &str) -> String {
    passport.trim().to_uppercase()
}

/// Hex SHA-256 of the normalized passport number
pub fn passport_hash(passport: &str) -> String {
    format!("{:x}", Sha256::digest(normalize_passport(passport).as_bytes()))
}

/// Last four characters of the normalized passport number
pub fn passport_last4(passport: &str) -> String {
    let normalized = normalize_passport(passport);
    let chars: Vec<char> = normalized.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use shared::models::{InvoiceItem, RuleSet};

    fn snapshot(params: RuleParams) -> RuleSnapshot {
        RuleSnapshot::from(&RuleSet {
            id: 1,
            version: "v1".into(),
            name: "Default".into(),
            is_active: true,
            params,
            created_at: 0,
        })
    }

    fn item(category: &str, total: i64, vat: i64, eligible: bool) -> InvoiceItem {
        InvoiceItem {
            id: 0,
            invoice_id: 1,
            description: category.to_lowercase(),
            category: category.into(),
            quantity: 1,
            line_total: Decimal::from(total),
            vat_amount: Decimal::from(vat),
            is_eligible: eligible,
        }
    }

    fn invoice(items: Vec<InvoiceItem>) -> Invoice {
        Invoice {
            id: 1,
            merchant_id: 1,
            invoice_number: "INV-1".into(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            currency: "CDF".into(),
            total_amount: items.iter().map(|i| i.line_total).sum(),
            total_vat: items.iter().map(|i| i.vat_amount).sum(),
            is_cancelled: false,
            items,
            created_at: 0,
        }
    }

    fn ctx(eligible: i64) -> RiskContext<'static> {
        RiskContext {
            invoice_total: Decimal::from(eligible),
            eligible_amount: Decimal::from(eligible),
            vat_amount: Decimal::from(eligible) * Decimal::new(16, 2),
            nationality: "BE",
            residence_country: "BE",
            item_count: 2,
            traveler_age: Some(30),
            recent_vouchers: 0,
        }
    }

    #[test]
    fn test_amounts_with_reference_fee() {
        let rules = snapshot(RuleParams {
            operator_fee_percentage: Decimal::new(125, 1),
            ..RuleParams::default()
        });
        let amounts = compute_amounts(&invoice(vec![item("ELECTRONICS", 100_000, 16_000, true)]), &rules);
        assert_eq!(amounts.eligible, Decimal::from(100_000));
        assert_eq!(amounts.vat, Decimal::from(16_000));
        assert_eq!(amounts.fee, Decimal::from(2_000));
        assert_eq!(amounts.refund, Decimal::from(14_000));
    }

    #[test]
    fn test_excluded_and_ineligible_lines_skipped() {
        let rules = snapshot(RuleParams {
            excluded_categories: vec!["food".into()],
            ..RuleParams::default()
        });
        let amounts = compute_amounts(
            &invoice(vec![
                item("CLOTHING", 60_000, 9_600, true),
                item("FOOD", 10_000, 1_600, true),
                item("SERVICES", 5_000, 800, false),
            ]),
            &rules,
        );
        assert_eq!(amounts.eligible, Decimal::from(60_000));
        assert_eq!(amounts.vat, Decimal::from(9_600));
        assert_eq!(amounts.eligible_items, 1);
    }

    #[test]
    fn test_fee_floor_and_cap() {
        let rules = snapshot(RuleParams {
            min_operator_fee: Decimal::from(500),
            ..RuleParams::default()
        });
        assert_eq!(operator_fee(Decimal::from(1_000), &rules), Decimal::from(500));
        assert_eq!(operator_fee(Decimal::from(300), &rules), Decimal::from(300));
    }

    #[test]
    fn test_low_value_traveler_scores_zero() {
        let risk = assess_risk(&ctx(100_000), &RuleParams::default());
        assert_eq!(risk.score, 0);
        assert!(risk.flags.is_empty());
        assert!(!risk.requires_control);
    }

    #[test]
    fn test_high_value_requires_control() {
        let risk = assess_risk(&ctx(600_000), &RuleParams::default());
        assert_eq!(risk.score, 20);
        assert_eq!(risk.flags, vec![FLAG_HIGH_VALUE.to_string()]);
        assert!(risk.requires_control);
    }

    #[test]
    fn test_high_value_flag_uses_invoice_total() {
        // 高额标记看发票总额，强制查验只看可退税金额
        let mut c = ctx(100_000);
        c.invoice_total = Decimal::from(550_000);
        let risk = assess_risk(&c, &RuleParams::default());
        assert_eq!(risk.score, 20);
        assert_eq!(risk.flags, vec![FLAG_HIGH_VALUE.to_string()]);
        assert!(!risk.requires_control);
    }

    #[test]
    fn test_frequent_traveler_flag() {
        let mut c = ctx(100_000);
        c.recent_vouchers = 3;
        let risk = assess_risk(&c, &RuleParams::default());
        assert_eq!(risk.score, 15);
        assert_eq!(risk.flags, vec![FLAG_FREQUENT_TRAVELER.to_string()]);
    }

    #[test]
    fn test_configured_rules_and_clamp() {
        let params = RuleParams {
            risk_rules: vec![
                RiskRule {
                    name: "WATCHLIST_NATIONALITY".into(),
                    field: "nationality".into(),
                    operator: RiskOperator::In,
                    value: json!(["be", "fr"]),
                    score_impact: 60,
                    is_active: true,
                },
                RiskRule {
                    name: "BULK".into(),
                    field: "item_count".into(),
                    operator: RiskOperator::GreaterThan,
                    value: json!(1),
                    score_impact: 50,
                    is_active: true,
                },
                RiskRule {
                    name: "DISABLED".into(),
                    field: "eligible_amount".into(),
                    operator: RiskOperator::GreaterThan,
                    value: json!("0"),
                    score_impact: 10,
                    is_active: false,
                },
            ],
            ..RuleParams::default()
        };
        let risk = assess_risk(&ctx(100_000), &params);
        assert_eq!(risk.score, 100);
        assert_eq!(risk.flags, vec!["WATCHLIST_NATIONALITY".to_string(), "BULK".to_string()]);
        assert!(risk.requires_control);
    }

    #[test]
    fn test_missing_age_never_matches() {
        let params = RuleParams {
            risk_rules: vec![RiskRule {
                name: "YOUNG".into(),
                field: "traveler_age".into(),
                operator: RiskOperator::LessThan,
                value: json!(21),
                score_impact: 10,
                is_active: true,
            }],
            ..RuleParams::default()
        };
        let mut c = ctx(100_000);
        c.traveler_age = None;
        assert_eq!(assess_risk(&c, &params).score, 0);
        c.traveler_age = Some(19);
        assert_eq!(assess_risk(&c, &params).score, 10);
    }

    #[test]
    fn test_voucher_number_format() {
        // 2026-01-01
        let number = generate_voucher_number(1_767_225_600_000);
        assert_eq!(number.len(), 14);
        assert!(number.starts_with("202601"));
        assert!(number[6..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_passport_hash_normalizes() {
        assert_eq!(passport_hash(" ab123456 "), passport_hash("AB123456"));
        assert_ne!(passport_hash("AB123456"), passport_hash("AB123457"));
        assert_eq!(passport_hash("x").len(), 64);
        assert_eq!(passport_last4("ab123456"), "3456");
        assert_eq!(passport_last4("P1"), "P1");
    }
}
