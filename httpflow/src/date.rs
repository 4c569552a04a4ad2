//! HTTP date parsing and formatting.
//!
//! Parsing is lenient in the ways real servers need: the weekday is ignored
//! (some servers send one that disagrees with the date) and the Netscape
//! cookie form `31-Dec-2037` is accepted next to RFC 1123 `31 Dec 2037`.
//! asctime dates are read too. `UTC` and a missing zone both mean GMT.
//! Formatting always emits IMF-fixdate in GMT.

use chrono::{DateTime, FixedOffset, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Current time as epoch seconds.
pub fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Parse an RFC 822 style date, keeping its UTC offset.
pub fn parse_http_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize(value)?;
    DateTime::parse_from_rfc2822(&normalized).ok()
}

/// Format epoch seconds as IMF-fixdate, flooring any fraction.
pub fn format_http_date(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor() as i64;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format(IMF_FIXDATE).to_string())
}

/// Parse `value`, move it `delta` seconds, and format it again.
pub fn shift_http_date(value: &str, delta: f64) -> Option<String> {
    let parsed = parse_http_date(value)?;
    format_http_date(parsed.timestamp() as f64 + delta)
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Rewrite the accepted forms into `DD Mon YYYY HH:MM:SS ZONE`.
fn normalize(value: &str) -> Option<String> {
    let mut rest = value.trim();
    if let Some((weekday, tail)) = rest.split_once(',') {
        if weekday.chars().all(|c| c.is_ascii_alphabetic()) {
            rest = tail;
        }
    }

    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens
        .first()
        .is_some_and(|first| WEEKDAYS.iter().any(|day| day.eq_ignore_ascii_case(first)))
    {
        tokens.remove(0);
    }

    let first = *tokens.first()?;
    let mut fields: Vec<&str> = Vec::with_capacity(5);
    if first.starts_with(|c: char| c.is_ascii_alphabetic()) {
        // asctime: Nov  6 08:49:37 1994
        let [month, day, time, year, zone @ ..] = &tokens[..] else {
            return None;
        };
        fields.extend([*day, *month, *year, *time]);
        fields.extend(zone);
    } else if let [day, month, year] = first.split('-').collect::<Vec<_>>()[..] {
        fields.extend([day, month, year]);
        fields.extend(&tokens[1..]);
    } else {
        fields.extend(&tokens);
    }

    match fields.len() {
        4 => fields.push("GMT"),
        5 if fields[4].eq_ignore_ascii_case("UTC") => fields[4] = "GMT",
        _ => {}
    }
    Some(fields.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Sun, 06 Nov 1994 08:49:37 GMT", 784111777)]
    #[case("06 Nov 1994 08:49:37 GMT", 784111777)]
    #[case("Sun, 06 Nov 1994 00:49:37 -0800", 784111777)]
    #[case("Thu, 31-Dec-2037 23:59:59 GMT", 2145916799)]
    #[case("Mon, 31 Dec 2037 23:59:59 GMT", 2145916799)]
    #[case("  Sun, 09 Sep 2001 01:46:40 +0000 ", 1000000000)]
    #[case("Sun Nov  6 08:49:37 1994", 784111777)]
    #[case("Nov  6 08:49:37 1994", 784111777)]
    #[case("Sun, 06 Nov 1994 08:49:37 UTC", 784111777)]
    #[case("Sun, 06 Nov 1994 08:49:37", 784111777)]
    #[case("Sun, 06-Nov-1994 08:49:37", 784111777)]
    fn test_parse_http_date(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(parse_http_date(input).map(|d| d.timestamp()), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("Thu, 99 Foo 2037 23:59:59 GMT")]
    #[case("Thu, 31-Dec-2037")]
    #[case("Sun Nov  6 1994")]
    fn test_parse_http_date_rejects(#[case] input: &str) {
        assert_eq!(parse_http_date(input), None);
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(
            format_http_date(784111777.0).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
        assert_eq!(
            format_http_date(1000000000.9).as_deref(),
            Some("Sun, 09 Sep 2001 01:46:40 GMT")
        );
        assert_eq!(format_http_date(f64::NAN), None);
    }

    #[test]
    fn test_shift_http_date() {
        assert_eq!(
            shift_http_date("Sun, 09 Sep 2001 01:46:40 GMT", 3600.0).as_deref(),
            Some("Sun, 09 Sep 2001 02:46:40 GMT")
        );
        assert_eq!(
            shift_http_date("Thu, 31-Dec-2037 23:59:59 GMT", 3600.0).as_deref(),
            Some("Fri, 01 Jan 2038 00:59:59 GMT")
        );
        assert_eq!(
            shift_http_date("Sun, 06 Nov 1994 00:49:37 -0800", 0.0).as_deref(),
            Some("Sun, 06 Nov 1994 08:49:37 GMT")
        );
    }

    #[test]
    fn test_now_is_recent() {
        assert!(now() > 1_600_000_000.0);
    }
}
