/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random
///
/// Strictly increasing within a process, so ids minted in the same
/// millisecond never collide.
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    use std::sync::atomic::{AtomicI64, Ordering};

    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    static LAST: AtomicI64 = AtomicI64::new(0);

    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    let candidate = (ts << 12) | rand_bits;

    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = candidate.max(prev + 1);
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Milliseconds in one day
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Render a millisecond timestamp as RFC 3339 (UTC, second precision)
pub fn millis_to_rfc3339(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

/// Calendar date (UTC) for a millisecond timestamp
pub fn millis_to_date(millis: i64) -> Option<chrono::NaiveDate> {
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_id_fits_53_bits() {
        let id = snowflake_id();
        assert!(id > 0);
        assert!(id < (1_i64 << 53));
    }

    #[test]
    fn test_snowflake_ids_are_distinct() {
        let mut ids: Vec<i64> = (0..1000).map(|_| snowflake_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_millis_to_rfc3339() {
        assert_eq!(
            millis_to_rfc3339(1_704_067_200_000).as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_millis_to_date() {
        let date = millis_to_date(1_704_067_200_000 + DAY_MILLIS).unwrap();
        assert_eq!(date.to_string(), "2024-01-02");
    }
}
