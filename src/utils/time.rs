use jiff::Timestamp;

use crate::err::{DeserializationError, DeserializationResult};

/// EVT timestamps are 32-bit POSIX seconds (UTC).
pub(crate) fn timestamp_from_posix_seconds(seconds: u32) -> DeserializationResult<Timestamp> {
    Timestamp::from_second(i64::from(seconds)).map_err(|_| DeserializationError::OutOfBounds {
        what: "posix timestamp",
        offset: 0,
        size: u64::from(seconds),
        limit: u64::from(u32::MAX),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_posix_seconds() {
        let ts = timestamp_from_posix_seconds(1289437817).unwrap();
        assert_eq!(ts.to_string(), "2010-11-11T01:10:17Z");
    }
}
