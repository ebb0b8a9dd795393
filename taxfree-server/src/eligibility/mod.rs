//! Scan-time eligibility engine
//!
//! Runs a fixed, ordered battery of checks over a voucher snapshot and
//! aggregates them into an [`EligibilityReport`]. Pure: reads nothing from
//! storage and writes nothing.

mod report;

pub use report::{ReportBuilder, aggregate};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use shared::models::{
    CheckCode, CheckStatus, EligibilityReport, Validation, Voucher, VoucherStatus,
};
use shared::util::{DAY_MILLIS, millis_to_date, millis_to_rfc3339};

/// Days before expiry at which the scan warns
pub const EXPIRY_WARNING_DAYS: i64 = 3;

/// Tolerated deviation of VAT from the expected rate, percent
pub const VAT_TOLERANCE_PERCENT: i64 = 20;

/// What the engine looks at
#[derive(Debug, Clone, Copy)]
pub struct EligibilityInput<'a> {
    pub voucher: &'a Voucher,
    pub validation: Option<&'a Validation>,
    pub invoice_date: NaiveDate,
}

/// Evaluate every check at `now` (Unix millis)
pub fn evaluate(input: &EligibilityInput<'_>, now: i64) -> EligibilityReport {
    let voucher = input.voucher;
    let mut report = ReportBuilder::new();

    check_processed(&mut report, input.validation);
    check_status(&mut report, voucher);
    check_expiry(&mut report, voucher, now);
    check_purchase_date(&mut report, voucher, input.invoice_date, now);
    check_amounts(&mut report, voucher);
    check_risk(&mut report, voucher);

    if voucher.requires_control {
        report.push(
            CheckCode::ControlRequired,
            CheckStatus::ControlRequired,
            "Goods must be inspected before validation",
            None,
        );
    }

    report.finish()
}

fn check_processed(report: &mut ReportBuilder, validation: Option<&Validation>) {
    match validation {
        Some(v) => {
            report.push(
                CheckCode::AlreadyProcessed,
                CheckStatus::Blocked,
                format!(
                    "Already {} on {} by {}",
                    v.decision,
                    millis_to_rfc3339(v.decided_at).unwrap_or_default(),
                    v.agent_name
                ),
                Some(json!({
                    "decision": v.decision,
                    "agent_id": v.agent_id,
                    "agent_name": v.agent_name,
                    "exit_point_id": v.exit_point_id,
                    "decided_at": v.decided_at,
                })),
            );
        }
        None => {
            report.push(
                CheckCode::NotProcessed,
                CheckStatus::Ok,
                "Not yet processed, awaiting decision",
                None,
            );
        }
    }
}

fn check_status(report: &mut ReportBuilder, voucher: &Voucher) {
    if voucher.status == VoucherStatus::Cancelled {
        report.push(
            CheckCode::Cancelled,
            CheckStatus::Blocked,
            "Voucher was cancelled",
            Some(json!({
                "cancelled_at": voucher.cancelled_at,
                "reason": voucher.cancellation_reason,
            })),
        );
    } else if voucher.status.is_scannable() {
        report.push(
            CheckCode::ValidStatus,
            CheckStatus::Ok,
            format!("Valid status: {}", voucher.status.label()),
            None,
        );
    } else {
        report.push(
            CheckCode::InvalidStatus,
            CheckStatus::Blocked,
            format!("Invalid status: {}", voucher.status.label()),
            Some(json!({ "status": voucher.status })),
        );
    }
}

fn check_expiry(report: &mut ReportBuilder, voucher: &Voucher, now: i64) {
    let expires = millis_to_rfc3339(voucher.expires_at).unwrap_or_default();
    let days_until = (voucher.expires_at - now) / DAY_MILLIS;

    if now >= voucher.expires_at {
        report.push(
            CheckCode::Expired,
            CheckStatus::Blocked,
            format!("Expired since {expires}"),
            Some(json!({
                "expires_at": voucher.expires_at,
                "days_expired": (now - voucher.expires_at) / DAY_MILLIS,
            })),
        );
    } else if days_until <= EXPIRY_WARNING_DAYS {
        report.push(
            CheckCode::ExpiringSoon,
            CheckStatus::Warning,
            format!("Expires in {days_until} day(s), on {expires}"),
            Some(json!({
                "expires_at": voucher.expires_at,
                "days_remaining": days_until,
            })),
        );
    } else {
        report.push(
            CheckCode::ValidDate,
            CheckStatus::Ok,
            format!("Valid until {expires} ({days_until} days)"),
            None,
        );
    }
}

fn check_purchase_date(
    report: &mut ReportBuilder,
    voucher: &Voucher,
    invoice_date: NaiveDate,
    now: i64,
) {
    let Some(today) = millis_to_date(now) else {
        return;
    };
    let days_since = (today - invoice_date).num_days();
    let max_days = i64::from(voucher.rule_snapshot.purchase_window_days);

    if days_since > max_days {
        report.push(
            CheckCode::PurchaseTooOld,
            CheckStatus::Warning,
            format!("Purchase made {days_since} days ago (limit {max_days} days)"),
            Some(json!({
                "purchase_date": invoice_date,
                "days_since": days_since,
            })),
        );
    } else {
        report.push(
            CheckCode::PurchaseDateOk,
            CheckStatus::Ok,
            format!("Purchase of {invoice_date} ({days_since} days)"),
            None,
        );
    }
}

fn check_amounts(report: &mut ReportBuilder, voucher: &Voucher) {
    let rate = voucher.rule_snapshot.default_vat_rate;
    let expected = (voucher.eligible_amount * rate / Decimal::ONE_HUNDRED).round_dp(2);
    let vat = voucher.vat_amount;

    let deviation = if expected > Decimal::ZERO {
        ((vat - expected).abs() / expected * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };

    if deviation > Decimal::from(VAT_TOLERANCE_PERCENT) {
        report.push(
            CheckCode::VatInconsistent,
            CheckStatus::Warning,
            format!(
                "Unusual VAT: {vat} {cur} (expected ~{expected} {cur})",
                cur = voucher.currency
            ),
            Some(json!({
                "vat_amount": vat,
                "expected_vat": expected,
                "diff_percent": deviation,
            })),
        );
    } else {
        report.push(
            CheckCode::AmountsOk,
            CheckStatus::Ok,
            format!("Amounts consistent, VAT {vat} {}", voucher.currency),
            None,
        );
    }
}

fn check_risk(report: &mut ReportBuilder, voucher: &Voucher) {
    let score = voucher.risk_score;
    let rules = &voucher.rule_snapshot;

    if score >= rules.risk_score_threshold {
        report.push(
            CheckCode::HighRisk,
            CheckStatus::ControlRequired,
            format!("High risk ({score}/100), physical control mandatory"),
            Some(json!({ "risk_score": score, "risk_flags": voucher.risk_flags })),
        );
    } else if score >= rules.medium_risk_threshold {
        report.push(
            CheckCode::MediumRisk,
            CheckStatus::Warning,
            format!("Medium risk ({score}/100), control recommended"),
            Some(json!({ "risk_score": score, "risk_flags": voucher.risk_flags })),
        );
    } else {
        report.push(
            CheckCode::LowRisk,
            CheckStatus::Ok,
            format!("Low risk ({score}/100)"),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{RuleParams, RuleSet, RuleSnapshot, ValidationDecision};

    const NOW: i64 = 1_767_225_600_000; // 2026-01-01T00:00:00Z

    fn voucher() -> Voucher {
        let rules = RuleSet {
            id: 1,
            version: "v1".into(),
            name: "Default".into(),
            is_active: true,
            params: RuleParams::default(),
            created_at: 0,
        };
        Voucher {
            id: 1,
            voucher_number: "202601ABCD1234".into(),
            invoice_id: 1,
            traveler_id: 1,
            merchant_id: 1,
            created_by: "m1".into(),
            currency: "CDF".into(),
            eligible_amount: Decimal::from(100_000),
            vat_amount: Decimal::from(16_000),
            operator_fee: Decimal::from(2_000),
            refund_amount: Decimal::from(14_000),
            status: VoucherStatus::Issued,
            issued_at: Some(NOW - DAY_MILLIS),
            expires_at: NOW + 30 * DAY_MILLIS,
            validated_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            risk_score: 10,
            risk_flags: vec![],
            requires_control: false,
            token_payload: None,
            token_signature: None,
            rule_snapshot: RuleSnapshot::from(&rules),
            created_at: NOW - DAY_MILLIS,
            updated_at: NOW - DAY_MILLIS,
        }
    }

    fn today() -> NaiveDate {
        millis_to_date(NOW).unwrap()
    }

    fn run(voucher: &Voucher, validation: Option<&Validation>) -> EligibilityReport {
        evaluate(
            &EligibilityInput {
                voucher,
                validation,
                invoice_date: today(),
            },
            NOW,
        )
    }

    fn codes(report: &EligibilityReport) -> Vec<CheckCode> {
        report.checks.iter().map(|c| c.code).collect()
    }

    #[test]
    fn test_clean_voucher_is_ok() {
        let report = run(&voucher(), None);
        assert_eq!(report.overall, CheckStatus::Ok);
        assert!(report.can_validate);
        assert_eq!(
            codes(&report),
            vec![
                CheckCode::NotProcessed,
                CheckCode::ValidStatus,
                CheckCode::ValidDate,
                CheckCode::PurchaseDateOk,
                CheckCode::AmountsOk,
                CheckCode::LowRisk,
            ]
        );
        assert_eq!(report.ok_count, 6);
    }

    #[test]
    fn test_already_processed_blocks_with_details() {
        let validation = Validation {
            id: 1,
            voucher_id: 1,
            decision: ValidationDecision::Validated,
            refusal_reason: None,
            refusal_details: None,
            physical_control_done: false,
            control_notes: None,
            agent_id: "a1".into(),
            agent_name: "Agent One".into(),
            exit_point_id: Some("FIH".into()),
            decided_at: NOW - 1000,
            is_offline: false,
            offline_batch_id: None,
            offline_timestamp: None,
            synced_at: None,
        };
        let report = run(&voucher(), Some(&validation));
        assert_eq!(report.overall, CheckStatus::Blocked);
        assert!(!report.can_validate);

        let first = &report.checks[0];
        assert_eq!(first.code, CheckCode::AlreadyProcessed);
        let details = first.details.as_ref().unwrap();
        assert_eq!(details["decision"], "VALIDATED");
        assert_eq!(details["agent_id"], "a1");
        assert_eq!(details["exit_point_id"], "FIH");
    }

    #[test]
    fn test_cancelled_is_blocked() {
        let mut v = voucher();
        v.status = VoucherStatus::Cancelled;
        v.cancellation_reason = Some("customer request".into());
        let report = run(&v, None);
        assert_eq!(report.checks[1].code, CheckCode::Cancelled);
        assert_eq!(report.overall, CheckStatus::Blocked);
    }

    #[test]
    fn test_created_status_is_invalid() {
        let mut v = voucher();
        v.status = VoucherStatus::Created;
        let report = run(&v, None);
        assert_eq!(report.checks[1].code, CheckCode::InvalidStatus);
        assert_eq!(report.checks[1].status, CheckStatus::Blocked);
    }

    #[test]
    fn test_expiry_boundaries() {
        let mut v = voucher();
        v.expires_at = NOW;
        assert_eq!(run(&v, None).checks[2].code, CheckCode::Expired);

        v.expires_at = NOW + 2 * DAY_MILLIS;
        let report = run(&v, None);
        assert_eq!(report.checks[2].code, CheckCode::ExpiringSoon);
        assert_eq!(report.checks[2].details.as_ref().unwrap()["days_remaining"], 2);
        assert_eq!(report.overall, CheckStatus::Warning);

        v.expires_at = NOW + 5 * DAY_MILLIS;
        assert_eq!(run(&v, None).checks[2].code, CheckCode::ValidDate);
    }

    #[test]
    fn test_old_purchase_warns() {
        let v = voucher();
        let report = evaluate(
            &EligibilityInput {
                voucher: &v,
                validation: None,
                invoice_date: today() - chrono::Days::new(91),
            },
            NOW,
        );
        assert_eq!(report.checks[3].code, CheckCode::PurchaseTooOld);
        assert_eq!(report.overall, CheckStatus::Warning);
    }

    #[test]
    fn test_vat_deviation_warns_never_blocks() {
        let mut v = voucher();
        v.vat_amount = Decimal::from(30_000);
        let report = run(&v, None);
        assert_eq!(report.checks[4].code, CheckCode::VatInconsistent);
        assert_eq!(report.checks[4].status, CheckStatus::Warning);
        assert!(report.can_validate);

        // 19% off stays within tolerance
        v.vat_amount = Decimal::from(19_040);
        assert_eq!(run(&v, None).checks[4].code, CheckCode::AmountsOk);
    }

    #[test]
    fn test_risk_thresholds_from_snapshot() {
        let mut v = voucher();
        v.risk_score = 40;
        assert_eq!(run(&v, None).checks[5].code, CheckCode::MediumRisk);

        v.risk_score = 70;
        let report = run(&v, None);
        assert_eq!(report.checks[5].code, CheckCode::HighRisk);
        assert_eq!(report.overall, CheckStatus::ControlRequired);

        v.rule_snapshot.risk_score_threshold = 90;
        assert_eq!(run(&v, None).checks[5].code, CheckCode::MediumRisk);
    }

    #[test]
    fn test_requires_control_flag_regardless_of_score() {
        let mut v = voucher();
        v.requires_control = true;
        let report = run(&v, None);
        assert_eq!(report.checks.last().unwrap().code, CheckCode::ControlRequired);
        assert_eq!(report.overall, CheckStatus::ControlRequired);
        assert!(report.can_validate);
    }

    #[test]
    fn test_blocked_and_control_required_is_blocked() {
        let mut v = voucher();
        v.requires_control = true;
        v.status = VoucherStatus::Validated;
        let report = run(&v, None);
        assert_eq!(report.overall, CheckStatus::Blocked);
    }
}
