//! Check aggregation

use shared::models::{CheckCode, CheckStatus, EligibilityCheck, EligibilityReport};

/// Collects checks in evaluation order
#[derive(Debug, Default)]
pub struct ReportBuilder {
    checks: Vec<EligibilityCheck>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        code: CheckCode,
        status: CheckStatus,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> &mut Self {
        self.checks.push(EligibilityCheck {
            code,
            status,
            message: message.into(),
            details,
        });
        self
    }

    pub fn finish(self) -> EligibilityReport {
        aggregate(self.checks)
    }
}

/// Highest-precedence status wins: BLOCKED > CONTROL_REQUIRED > WARNING > OK
pub fn aggregate(checks: Vec<EligibilityCheck>) -> EligibilityReport {
    let overall = checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(CheckStatus::Ok);

    let blocking_count = count(&checks, |s| s == CheckStatus::Blocked);
    // control-required counts as a warning for the agent
    let warning_count = count(&checks, |s| {
        matches!(s, CheckStatus::Warning | CheckStatus::ControlRequired)
    });
    let ok_count = count(&checks, |s| s == CheckStatus::Ok);

    let message = match overall {
        CheckStatus::Blocked => {
            format!("{blocking_count} blocking issue(s), validation impossible")
        }
        CheckStatus::ControlRequired => "Physical control required before validation".to_string(),
        CheckStatus::Warning => {
            format!("{warning_count} warning(s), validation possible with care")
        }
        CheckStatus::Ok => "All checks passed, OK to validate".to_string(),
    };

    EligibilityReport {
        checks,
        overall,
        can_validate: overall != CheckStatus::Blocked,
        blocking_count,
        warning_count,
        ok_count,
        message,
    }
}

fn count(checks: &[EligibilityCheck], pred: impl Fn(CheckStatus) -> bool) -> usize {
    checks.iter().filter(|c| pred(c.status)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: &[CheckStatus]) -> EligibilityReport {
        let mut builder = ReportBuilder::new();
        for status in statuses {
            builder.push(CheckCode::ValidStatus, *status, "x", None);
        }
        builder.finish()
    }

    #[test]
    fn test_blocked_beats_control_required() {
        let r = report(&[CheckStatus::Ok, CheckStatus::ControlRequired, CheckStatus::Blocked]);
        assert_eq!(r.overall, CheckStatus::Blocked);
        assert!(!r.can_validate);
        assert_eq!(r.blocking_count, 1);
        assert_eq!(r.warning_count, 1);
        assert_eq!(r.ok_count, 1);
    }

    #[test]
    fn test_control_required_beats_warning() {
        let r = report(&[CheckStatus::Warning, CheckStatus::ControlRequired]);
        assert_eq!(r.overall, CheckStatus::ControlRequired);
        assert!(r.can_validate);
        assert_eq!(r.warning_count, 2);
    }

    #[test]
    fn test_all_ok() {
        let r = report(&[CheckStatus::Ok, CheckStatus::Ok]);
        assert_eq!(r.overall, CheckStatus::Ok);
        assert!(r.can_validate);
        assert_eq!(r.message, "All checks passed, OK to validate");
    }

    #[test]
    fn test_empty_is_ok() {
        assert_eq!(report(&[]).overall, CheckStatus::Ok);
    }
}
