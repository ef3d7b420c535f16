use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};

/// Named relative window used to restrict chart data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    SevenDays,
    OneMonth,
    OneYear,
    AllTime,
}

impl DateRange {
    /// Maps a range key to a window. Unknown keys mean all time rather than an error.
    pub fn from_key(key: &str) -> Self {
        match key.trim() {
            "7_days" => DateRange::SevenDays,
            "1_month" => DateRange::OneMonth,
            "1_year" => DateRange::OneYear,
            _ => DateRange::AllTime,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            DateRange::SevenDays => "7_days",
            DateRange::OneMonth => "1_month",
            DateRange::OneYear => "1_year",
            DateRange::AllTime => "all_time",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateRange::SevenDays => "Last 7 Days",
            DateRange::OneMonth => "Last Month",
            DateRange::OneYear => "Last Year",
            DateRange::AllTime => "All Time",
        }
    }

    /// Earliest instant inside the window ending at `now`.
    pub fn lower_bound(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateRange::SevenDays => now - Duration::days(7),
            DateRange::OneMonth => shift_back_months(now, 1),
            DateRange::OneYear => shift_back_months(now, 12),
            DateRange::AllTime => DateTime::UNIX_EPOCH,
        }
    }

    /// Calendar day of [`DateRange::lower_bound`]; chart points on this day are kept.
    pub fn lower_bound_date(self, now: DateTime<Utc>) -> NaiveDate {
        self.lower_bound(now).date_naive()
    }
}

pub fn lower_bound(range: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    DateRange::from_key(range).lower_bound(now)
}

// Keeps the day of month; a day past the end of the target month rolls into the next one
// (31 March minus one month is 3 March, 29 February minus one year is 1 March).
fn shift_back_months(now: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let date = now.date_naive();
    let total = date.year() * 12 + date.month0() as i32 - months;
    let (year, month0) = (total.div_euclid(12), total.rem_euclid(12) as u32);

    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day() - 1))))
        .map(|day| day.and_time(now.time()).and_utc())
        .unwrap_or(DateTime::UNIX_EPOCH)
}
