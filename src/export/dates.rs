//! Splits the free-text dates scraped from listings into a start and end.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

struct Patterns {
    numeric_range: Regex,
    day_month_range: Regex,
    full_range: Regex,
    until: Regex,
    weekday_range: Regex,
    trailing_date: Regex,
    tickets_from: Regex,
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(|| {
    Ok(Patterns {
        numeric_range: Regex::new(r"^(\d{2}/\d{2}/\d{4}) - (\d{2}/\d{2}/\d{4})$")?,
        day_month_range: Regex::new(r"^(\d{1,2} \w+) - (\d{1,2} \w+)$")?,
        full_range: Regex::new(r"^(\d{1,2} \w+ \d{4}) - (\d{1,2} \w+ \d{4})$")?,
        until: Regex::new(r"^Until .*?(\d{1,2} \w+ \d{4})$")?,
        weekday_range: Regex::new(r"^(?:\w+ )?(\d{1,2} \w+ \d{4}) - (?:\w+ )?(\d{1,2} \w+ \d{4})$")?,
        trailing_date: Regex::new(r"(?:\w+ )?(\d{1,2} \w+ \d{4})$")?,
        tickets_from: Regex::new(r"(?i)tickets from")?,
    })
});

/// `dd/mm/yyyy` as `D Month YYYY`; text that is not a real date is kept.
fn long_date(numeric: &str) -> String {
    NaiveDate::parse_from_str(numeric, "%d/%m/%Y")
        .map(|d| d.format("%-d %B %Y").to_string())
        .unwrap_or_else(|_| numeric.to_string())
}

fn pair(caps: &regex::Captures<'_>) -> (String, String) {
    (caps[1].to_string(), caps[2].to_string())
}

/// Returns `(start, end)` for a listing date. Either side may be empty.
///
/// Recognised forms, tried in order:
/// `02/05/2025 - 10/05/2025`, `6 February - 20 April`,
/// `6 February 2025 - 20 April 2025`, `Until Sun 26 Oct 2025` (end only),
/// `Sat 1 Feb 2025 - Sat 30 May 2026`, a trailing single date (start only)
/// and `Tickets from ...` (neither). Anything else is returned whole as the
/// start.
pub fn start_end_date(text: &str) -> (String, String) {
    if text.is_empty() {
        return (String::new(), String::new());
    }
    let Ok(p) = PATTERNS.as_ref() else {
        return (text.to_string(), String::new());
    };

    if let Some(caps) = p.numeric_range.captures(text) {
        return (long_date(&caps[1]), long_date(&caps[2]));
    }
    if let Some(caps) = p.day_month_range.captures(text) {
        return pair(&caps);
    }
    if let Some(caps) = p.full_range.captures(text) {
        return pair(&caps);
    }
    if let Some(caps) = p.until.captures(text) {
        return (String::new(), caps[1].to_string());
    }
    if let Some(caps) = p.weekday_range.captures(text) {
        return pair(&caps);
    }
    if let Some(caps) = p.trailing_date.captures(text) {
        return (caps[1].to_string(), String::new());
    }
    if p.tickets_from.is_match(text) {
        return (String::new(), String::new());
    }

    (text.to_string(), String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> (String, String) {
        start_end_date(text)
    }

    fn owned(start: &str, end: &str) -> (String, String) {
        (start.to_string(), end.to_string())
    }

    #[test]
    fn numeric_ranges_are_written_out() {
        assert_eq!(
            split("02/05/2025 - 10/05/2025"),
            owned("2 May 2025", "10 May 2025")
        );
    }

    #[test]
    fn ranges_with_and_without_years_or_weekdays() {
        assert_eq!(split("6 February - 20 April"), owned("6 February", "20 April"));
        assert_eq!(
            split("6 February 2025 - 20 April 2025"),
            owned("6 February 2025", "20 April 2025")
        );
        assert_eq!(
            split("Sat 1 Feb 2025 - Sat 30 May 2026"),
            owned("1 Feb 2025", "30 May 2026")
        );
    }

    #[test]
    fn open_ended_and_single_dates() {
        assert_eq!(split("Until Sun 26 Oct 2025"), owned("", "26 Oct 2025"));
        assert_eq!(split("Sun 9 February 2025"), owned("9 February 2025", ""));
    }

    #[test]
    fn prices_and_unknown_text() {
        assert_eq!(split("Tickets from £25"), owned("", ""));
        assert_eq!(split("Coming soon"), owned("Coming soon", ""));
        assert_eq!(split(""), owned("", ""));
    }
}
