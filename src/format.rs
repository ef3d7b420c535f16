use chrono::{DateTime, Utc};

/// Shown instead of a number when a value cannot be displayed.
pub const PLACEHOLDER: &str = "--";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayDirection {
    /// Days remaining until the date.
    Until,
    /// Days elapsed since the date.
    Since,
}

/// Formats the leading number in `input` to one decimal place, e.g. `"3.46"` -> `"3.5"`.
/// Input with no leading number yields [`PLACEHOLDER`].
pub fn format_fixed1(input: &str) -> String {
    match parse_leading_number(input) {
        Some(value) => format!("{value:.1}"),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn format_score(value: Option<f64>) -> String {
    match value.filter(|value| value.is_finite()) {
        Some(value) => format!("{value:.1}"),
        None => PLACEHOLDER.to_string(),
    }
}

// Longest prefix (after leading whitespace) that reads as a finite number, so "4.2/5" is 4.2.
fn parse_leading_number(input: &str) -> Option<f64> {
    let trimmed = input.trim_start();
    let end = numeric_prefix_len(trimmed.as_bytes());
    if end == 0 {
        return None;
    }
    trimmed[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|byte| byte.is_ascii_digit()).count()
}

// Length of `[+-]digits[.digits][(e|E)[+-]digits]`, needing at least one mantissa digit.
fn numeric_prefix_len(bytes: &[u8]) -> usize {
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = count_digits(&bytes[exponent..]);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }

    end
}

/// Whole days between `date` and `now`, rounded up.
///
/// Returns `None` when `date` is missing or the count would be negative, so a deadline that
/// has passed has no "days remaining". A deadline earlier today still counts as 0.
pub fn days_between(
    date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    direction: DayDirection,
) -> Option<i64> {
    let date = date?;
    let diff = match direction {
        DayDirection::Until => date - now,
        DayDirection::Since => now - date,
    };
    let days = (diff.num_milliseconds() as f64 / MILLIS_PER_DAY).ceil();
    if days >= 0.0 {
        Some(days as i64)
    } else {
        None
    }
}

/// Display label for a metric name: first letter capitalised.
pub fn metric_label(metric: &str) -> String {
    let mut chars = metric.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Joins items as prose: "a", "a and b", "a, b and c".
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(|item| item.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Staff-facing phrase for a wellbeing tag, e.g. "Lonely" -> "have reported feeling lonely".
pub fn tag_phrase(tag: &str) -> String {
    let normalized = tag
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    match normalized.as_str() {
        "" => String::new(),
        "stressed" => "have reported feeling stressed".to_string(),
        "financial worry" => "have experienced financial worry".to_string(),
        "academic worry" => "have experienced academic worry".to_string(),
        "relationship issues" => "have experienced relationship issues".to_string(),
        "family issues" => "have experienced family issues".to_string(),
        "lonely" => "have reported feeling lonely".to_string(),
        "grieving" => "have experienced grief".to_string(),
        "anxious" => "have reported feeling anxious".to_string(),
        other => format!("have experienced {other}"),
    }
}

/// Timestamped export name, e.g. `StudentList_20261019153000.csv`.
pub fn export_file_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}.csv", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
    }

    #[test]
    fn fixed1_rounds_numbers_and_hides_garbage() {
        assert_eq!(format_fixed1("3.46"), "3.5");
        assert_eq!(format_fixed1("4"), "4.0");
        assert_eq!(format_fixed1("  2.04/5"), "2.0");
        assert_eq!(format_fixed1("-1.26"), "-1.3");
        assert_eq!(format_fixed1("abc"), PLACEHOLDER);
        assert_eq!(format_fixed1(""), PLACEHOLDER);
        assert_eq!(format_fixed1("NaN"), PLACEHOLDER);
        assert_eq!(format_fixed1("--"), PLACEHOLDER);
    }

    #[test]
    fn fixed1_reads_only_the_numeric_prefix() {
        assert_eq!(format_fixed1("1e3kg"), "1000.0");
        assert_eq!(format_fixed1("2.5e"), "2.5");
        assert_eq!(format_fixed1(".75 hours"), "0.8");
        assert_eq!(format_fixed1("+4."), "4.0");
        assert_eq!(format_fixed1("-"), PLACEHOLDER);
        assert_eq!(format_fixed1("."), PLACEHOLDER);
        assert_eq!(format_fixed1("1e999"), PLACEHOLDER);

        let long_tail = format!("4.26{}", "x".repeat(20_000));
        assert_eq!(format_fixed1(&long_tail), "4.3");
        let long_digits = format!("3.{}", "1".repeat(20_000));
        assert_eq!(format_fixed1(&long_digits), "3.1");
    }

    #[test]
    fn score_formatting_uses_placeholder_for_gaps() {
        assert_eq!(format_score(Some(2.66)), "2.7");
        assert_eq!(format_score(None), PLACEHOLDER);
        assert_eq!(format_score(Some(f64::NAN)), PLACEHOLDER);
    }

    #[test]
    fn deadline_today_is_zero_days_away() {
        let midnight = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        assert_eq!(days_between(Some(midnight), now(), DayDirection::Until), Some(0));
        assert_eq!(days_between(Some(now()), now(), DayDirection::Until), Some(0));
    }

    #[test]
    fn partial_days_round_up() {
        let later_tomorrow = now() + Duration::hours(30);
        assert_eq!(days_between(Some(later_tomorrow), now(), DayDirection::Until), Some(2));
    }

    #[test]
    fn past_deadline_has_no_days_remaining() {
        let past = now() - Duration::days(3);
        assert_eq!(days_between(Some(past), now(), DayDirection::Until), None);
        assert_eq!(days_between(Some(past), now(), DayDirection::Since), Some(3));
    }

    #[test]
    fn missing_date_has_no_day_count() {
        assert_eq!(days_between(None, now(), DayDirection::Until), None);
        assert_eq!(days_between(None, now(), DayDirection::Since), None);
    }

    #[test]
    fn lists_read_as_prose() {
        let empty: [&str; 0] = [];
        assert_eq!(join_list(&empty), "");
        assert_eq!(join_list(&["low mood"]), "low mood");
        assert_eq!(join_list(&["low mood", "poor sleep"]), "low mood and poor sleep");
        assert_eq!(
            join_list(&["low mood", "poor sleep", "low exercise"]),
            "low mood, poor sleep and low exercise"
        );
    }

    #[test]
    fn tags_become_phrases() {
        assert_eq!(tag_phrase("Stressed"), "have reported feeling stressed");
        assert_eq!(tag_phrase("FINANCIAL  worry"), "have experienced financial worry");
        assert_eq!(tag_phrase("Grieving"), "have experienced grief");
        assert_eq!(tag_phrase("Homesick"), "have experienced homesick");
        assert_eq!(tag_phrase(""), "");
    }

    #[test]
    fn labels_and_export_names() {
        assert_eq!(metric_label("socialisation"), "Socialisation");
        assert_eq!(metric_label(""), "");
        assert_eq!(
            export_file_name("StudentList", now()),
            "StudentList_20261019150000.csv"
        );
    }
}
