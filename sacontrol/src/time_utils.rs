//! Time formatting and parsing utilities for speaker timecodes.
//!
//! Speakers report durations and positions as colon-separated timecodes
//! (`H:MM:SS`, hours unbounded). These helpers convert them to seconds and back.

use crate::errors::ControlError;

/// Parses a colon-separated timecode into a number of seconds.
///
/// Fields are weighted by position from the right (`60^0`, `60^1`, ...), so any
/// number of fields is accepted and no range check is made on a field:
/// `"0:00:75"` is 75 seconds.
///
/// # Examples
/// ```
/// # use sacontrol::time_utils::parse_duration;
/// assert_eq!(parse_duration("0:03:18").unwrap(), 198);
/// assert_eq!(parse_duration("1:00:00").unwrap(), 3600);
/// assert!(parse_duration("abc").is_err());
/// ```
///
/// # Errors
/// Returns [`ControlError::InvalidTimeFormat`] if the input is empty, a field is
/// not a non-negative integer, or the total overflows.
pub fn parse_duration(input: &str) -> Result<u64, ControlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ControlError::InvalidTimeFormat(
            "empty time string".to_string(),
        ));
    }

    let overflow =
        || ControlError::InvalidTimeFormat(format!("time string '{}' is too large", input));

    let mut total: u64 = 0;
    let mut weight: u64 = 1;
    for (position, part) in input.rsplit(':').enumerate() {
        let value = part.parse::<u64>().map_err(|_| {
            ControlError::InvalidTimeFormat(format!(
                "Invalid numeric value '{}' in time string '{}'",
                part, input
            ))
        })?;

        if position > 0 {
            weight = weight.checked_mul(60).ok_or_else(overflow)?;
        }
        total = value
            .checked_mul(weight)
            .and_then(|v| v.checked_add(total))
            .ok_or_else(overflow)?;
    }

    Ok(total)
}

/// Formats a number of seconds as H:MM:SS, the form AVTransport Seek expects.
///
/// # Examples
/// ```
/// # use sacontrol::time_utils::format_hhmmss;
/// assert_eq!(format_hhmmss(0), "0:00:00");
/// assert_eq!(format_hhmmss(3661), "1:01:01");
/// ```
pub fn format_hhmmss(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0:03:18").unwrap(), 198);
        assert_eq!(parse_duration("1:00:00").unwrap(), 3600);
        assert_eq!(parse_duration("0:00:05").unwrap(), 5);
        assert_eq!(parse_duration("00:00:00").unwrap(), 0);
        assert_eq!(parse_duration("125:00:00").unwrap(), 450_000);

        // fewer and more fields
        assert_eq!(parse_duration("42").unwrap(), 42);
        assert_eq!(parse_duration("2:03").unwrap(), 123);
        assert_eq!(parse_duration("1:0:0:0").unwrap(), 216_000);

        // positional weighting, not calendar validation
        assert_eq!(parse_duration("0:00:75").unwrap(), 75);
        assert_eq!(parse_duration("0:61:00").unwrap(), 3660);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(matches!(
            parse_duration("abc"),
            Err(ControlError::InvalidTimeFormat(_))
        ));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0:ab:00").is_err());
        assert!(parse_duration("0::00").is_err());
        assert!(parse_duration("-1:00:00").is_err());
        assert!(parse_duration("NOT_IMPLEMENTED").is_err());
        assert!(parse_duration("99999999999999999999:00").is_err());
    }

    #[test]
    fn test_format_hhmmss() {
        assert_eq!(format_hhmmss(0), "0:00:00");
        assert_eq!(format_hhmmss(61), "0:01:01");
        assert_eq!(format_hhmmss(198), "0:03:18");
        assert_eq!(format_hhmmss(36_000), "10:00:00");
    }
}
