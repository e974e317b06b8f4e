//! Conversion between [Duration] and the textual interval form (`"15 minutes"`, `"14 days"`)
//! accepted in string-valued options.

use std::time::Duration;

const UNITS: [(&str, u64); 5] = [
    ("day", 86400),
    ("hour", 3600),
    ("minute", 60),
    ("second", 1),
    ("week", 604800),
];

fn unit_seconds(unit: &str) -> Option<u64> {
    let unit = unit.to_ascii_lowercase();
    let unit = match unit.as_str() {
        "s" | "sec" | "secs" => "second",
        "min" | "mins" => "minute",
        "h" | "hr" | "hrs" => "hour",
        "d" => "day",
        u => u.strip_suffix('s').unwrap_or(u),
    };

    UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, seconds)| *seconds)
}

/// Parse an interval such as `"90 seconds"`, `"1 hour 30 minutes"` or `"14 days"`.
/// A bare number is taken as seconds. Returns `None` if the text is not an interval.
pub fn parse_interval(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(seconds) = text.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let mut parts = text.split_whitespace();
    let mut total: u64 = 0;
    while let Some(amount) = parts.next() {
        let amount = amount.parse::<u64>().ok()?;
        let unit = unit_seconds(parts.next()?)?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
    }

    Some(Duration::from_secs(total))
}

/// Format a duration using the largest unit that represents it exactly, e.g. `"15 minutes"`.
pub fn format_interval(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let (name, size) = UNITS[..4]
        .iter()
        .find(|(_, size)| seconds != 0 && seconds % size == 0)
        .copied()
        .unwrap_or(("second", 1));

    let amount = seconds / size;
    if amount == 1 {
        format!("1 {name}")
    } else {
        format!("{amount} {name}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_intervals() {
        assert_eq!(parse_interval("15 minutes"), Some(Duration::from_secs(900)));
        assert_eq!(parse_interval("1 hour"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_interval("14 days"), Some(Duration::from_secs(14 * 86400)));
        assert_eq!(
            parse_interval("1 hour 30 mins"),
            Some(Duration::from_secs(5400))
        );
        assert_eq!(parse_interval("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_interval("2 Weeks"), Some(Duration::from_secs(1209600)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_interval(""), None);
        assert_eq!(parse_interval("soon"), None);
        assert_eq!(parse_interval("5 fortnights"), None);
        assert_eq!(parse_interval("5 minutes and"), None);
        assert_eq!(parse_interval("-5 minutes"), None);
    }

    #[test]
    fn formats_with_largest_exact_unit() {
        assert_eq!(format_interval(Duration::from_secs(900)), "15 minutes");
        assert_eq!(format_interval(Duration::from_secs(3600)), "1 hour");
        assert_eq!(format_interval(Duration::from_secs(14 * 86400)), "14 days");
        assert_eq!(format_interval(Duration::from_secs(90)), "90 seconds");
        assert_eq!(format_interval(Duration::ZERO), "0 seconds");
    }
}
