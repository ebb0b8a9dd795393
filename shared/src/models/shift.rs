//! Agent shift model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shift status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ShiftStatus {
    Active,
    Paused,
    Ended,
}

/// Customs agent work session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    /// Agent identity
    pub agent_id: String,
    /// Agent display name
    pub agent_name: String,
    /// Exit point the shift is worked at
    pub exit_point_id: String,
    pub status: ShiftStatus,
    pub started_at: i64,
    /// Null until the shift ends
    pub ended_at: Option<i64>,
    /// Start of the current pause, null when not paused
    pub last_pause_at: Option<i64>,
    /// Accumulated paused time (ms)
    pub total_pause_ms: i64,
    /// Statistics, computed when the shift ends
    pub validations_count: i64,
    pub validated_count: i64,
    pub refused_count: i64,
    pub control_count: i64,
    pub total_amount_validated: Decimal,
    pub notes: Option<String>,
}

impl Shift {
    /// Worked time (ms) at `now`, net of pauses
    pub fn net_duration_ms(&self, now: i64) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        let open_pause = match (self.status, self.last_pause_at) {
            (ShiftStatus::Paused, Some(paused_at)) => (end - paused_at).max(0),
            _ => 0,
        };
        (end - self.started_at - self.total_pause_ms - open_pause).max(0)
    }
}

/// Start shift payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftStart {
    pub notes: Option<String>,
}

/// End shift payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftEnd {
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shift(status: ShiftStatus) -> Shift {
        Shift {
            id: 1,
            agent_id: "agent-1".into(),
            agent_name: "Agent One".into(),
            exit_point_id: "FIH".into(),
            status,
            started_at: 1_000,
            ended_at: None,
            last_pause_at: None,
            total_pause_ms: 0,
            validations_count: 0,
            validated_count: 0,
            refused_count: 0,
            control_count: 0,
            total_amount_validated: Decimal::ZERO,
            notes: None,
        }
    }

    #[test]
    fn test_net_duration_active() {
        let mut s = shift(ShiftStatus::Active);
        s.total_pause_ms = 200;
        assert_eq!(s.net_duration_ms(2_000), 800);
    }

    #[test]
    fn test_net_duration_counts_open_pause() {
        let mut s = shift(ShiftStatus::Paused);
        s.total_pause_ms = 100;
        s.last_pause_at = Some(1_500);
        assert_eq!(s.net_duration_ms(2_000), 400);
    }

    #[test]
    fn test_net_duration_ended_ignores_now() {
        let mut s = shift(ShiftStatus::Ended);
        s.ended_at = Some(3_000);
        s.total_pause_ms = 500;
        assert_eq!(s.net_duration_ms(99_000), 1_500);
    }
}
