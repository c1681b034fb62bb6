/// Time utilities.
///
/// Every `updatedTime` stamp written by this crate comes from here, so the
/// merge engine compares timestamps produced by a single clock source.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_millis_is_reasonable() {
        let ts = now_timestamp_millis();
        // Should be after 2024-01-01 in millis
        assert!(ts > 1704067200_000, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 in millis
        assert!(ts < 4102444800_000, "Timestamp {} is too far in future", ts);
    }
}
