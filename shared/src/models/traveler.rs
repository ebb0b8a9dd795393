//! Traveler model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Traveler claiming a refund
///
/// The passport number is only matched through `passport_hash`; the full
/// number is kept solely when a print copy was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Traveler {
    pub id: i64,
    /// Hex SHA-256 of the normalized passport number
    pub passport_hash: String,
    /// Last four characters, for display
    pub passport_last4: String,
    /// Full passport number, print rendering only
    #[serde(skip_serializing)]
    pub passport_copy: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// ISO 3166 alpha-2
    pub nationality: String,
    /// ISO 3166 alpha-2
    pub residence_country: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub created_at: i64,
}

impl Traveler {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `today`
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| today.years_since(dob))
    }
}

/// Traveler data supplied at voucher creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelerInput {
    pub passport_number: String,
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    pub residence_country: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    /// Keep a full passport copy for print rendering
    #[serde(default)]
    pub keep_passport_copy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traveler(dob: Option<NaiveDate>) -> Traveler {
        Traveler {
            id: 1,
            passport_hash: "abc".into(),
            passport_last4: "1234".into(),
            passport_copy: Some("P001234".into()),
            first_name: "Ada".into(),
            last_name: "Kalala".into(),
            nationality: "BE".into(),
            residence_country: "BE".into(),
            date_of_birth: dob,
            email: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_age_on() {
        let t = traveler(NaiveDate::from_ymd_opt(2000, 6, 15));
        let before_birthday = NaiveDate::from_ymd_opt(2016, 6, 14).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2016, 6, 15).unwrap();
        assert_eq!(t.age_on(before_birthday), Some(15));
        assert_eq!(t.age_on(on_birthday), Some(16));
        assert_eq!(traveler(None).age_on(on_birthday), None);
    }

    #[test]
    fn test_passport_copy_not_serialized() {
        let json = serde_json::to_string(&traveler(None)).unwrap();
        assert!(!json.contains("P001234"));
        assert!(json.contains("\"passport_last4\":\"1234\""));
    }
}
