//! Decoding of dashboard exports (backend JSON responses and CSV downloads) into core types.
//!
//! Individual malformed fields become gaps; a row that cannot be placed at all (no timestamp,
//! no student id) is skipped with a warning. Only unreadable files are errors.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{RawMetricRecord, RosterEntity, SecondaryId, SCORE_SUFFIX};

const TIMESTAMP_FIELDS: [&str; 3] = ["daily_record_timestamp", "timestamp", "date"];

/// Parses backend timestamps: RFC 3339, naive date-times (taken as UTC) or bare dates
/// (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    score.filter(|score| score.is_finite())
}

fn label(object: &Map<String, Value>, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn record_from_object(object: &Map<String, Value>) -> Option<RawMetricRecord> {
    let recorded_at = TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .find_map(parse_timestamp)?;

    let scores: BTreeMap<String, f64> = object
        .iter()
        .filter_map(|(key, value)| {
            let metric = key.strip_suffix(SCORE_SUFFIX)?;
            Some((metric.to_string(), parse_score(value)?))
        })
        .collect();

    Some(RawMetricRecord {
        recorded_at,
        academic_year: label(object, "academic_year_name"),
        course: label(object, "course_name"),
        scores,
    })
}

// Backend responses wrap lists as `{"<key>": [...]}`; exports may be bare arrays.
fn unwrap_list(value: Value, key: &str) -> anyhow::Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => anyhow::bail!("field '{key}' is not a list"),
        },
        _ => anyhow::bail!("expected a list or an object with a '{key}' list"),
    }
}

pub fn parse_records_json(input: &str) -> anyhow::Result<Vec<RawMetricRecord>> {
    let value: Value = serde_json::from_str(input).context("records are not valid JSON")?;
    let items = unwrap_list(value, "data")?;

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_object().and_then(record_from_object) {
            Some(record) => records.push(record),
            None => warn!(index, "skipping record without a readable timestamp"),
        }
    }

    debug!(total = items.len(), kept = records.len(), "decoded metric records");
    Ok(records)
}

pub fn read_records_csv<R: Read>(reader: R) -> anyhow::Result<Vec<RawMetricRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers().context("records CSV has no header row")?.clone();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("records CSV row {} is unreadable", index + 1))?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, field)| !field.trim().is_empty())
            .map(|(header, field)| (header.trim().to_string(), Value::String(field.to_string())))
            .collect();

        match record_from_object(&object) {
            Some(record) => records.push(record),
            None => warn!(row = index + 1, "skipping record without a readable timestamp"),
        }
    }

    debug!(kept = records.len(), "decoded metric records from CSV");
    Ok(records)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"))
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<RawMetricRecord>> {
    if is_csv(path) {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_records_csv(file)
    } else {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_records_json(&input)
    }
}

/// Numeric student numbers stay numeric; anything else (including leading zeros) is text.
pub fn parse_secondary_id(value: &str) -> SecondaryId {
    let value = value.trim();
    match value.parse::<i64>() {
        Ok(number) if number.to_string() == value => SecondaryId::Number(number),
        _ => SecondaryId::Text(value.to_string()),
    }
}

fn parse_trend(value: Option<&Value>) -> Option<f64> {
    // "no record" and other text mean there is no trend
    match value? {
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

fn entity_from_object(object: &Map<String, Value>) -> Option<RosterEntity> {
    let id = match object.get("student_id")? {
        Value::Number(number) => number.as_i64()?,
        Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };

    let secondary_id = match object.get("student_number") {
        Some(Value::Number(number)) => match number.as_i64() {
            Some(value) => SecondaryId::Number(value),
            None => SecondaryId::Text(number.to_string()),
        },
        Some(Value::String(text)) => parse_secondary_id(text),
        _ => SecondaryId::Text(String::new()),
    };

    Some(RosterEntity {
        id,
        name: object
            .get("student_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        secondary_id,
        course: label(object, "course_name"),
        academic_year: label(object, "academic_year_name"),
        last_activity: object
            .get("last_recording_date")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .map(|at| at.date_naive()),
        mood_trend: parse_trend(object.get("moodTrend").or_else(|| object.get("mood_trend"))),
    })
}

pub fn parse_roster_json(input: &str) -> anyhow::Result<Vec<RosterEntity>> {
    let value: Value = serde_json::from_str(input).context("roster is not valid JSON")?;
    let items = unwrap_list(value, "students")?;

    let mut roster = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_object().and_then(entity_from_object) {
            Some(entity) => roster.push(entity),
            None => warn!(index, "skipping roster entry without a student id"),
        }
    }

    debug!(total = items.len(), kept = roster.len(), "decoded roster");
    Ok(roster)
}

pub fn read_roster_csv<R: Read>(reader: R) -> anyhow::Result<Vec<RosterEntity>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: i64,
        student_name: String,
        student_number: String,
        course_name: Option<String>,
        academic_year_name: Option<String>,
        last_recording_date: Option<String>,
        #[serde(alias = "moodTrend")]
        mood_trend: Option<String>,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut roster = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(row = index + 1, error = %err, "skipping malformed roster row");
                continue;
            }
        };

        roster.push(RosterEntity {
            id: row.student_id,
            name: row.student_name,
            secondary_id: parse_secondary_id(&row.student_number),
            course: row.course_name.filter(|course| !course.trim().is_empty()),
            academic_year: row.academic_year_name.filter(|year| !year.trim().is_empty()),
            last_activity: row
                .last_recording_date
                .as_deref()
                .and_then(parse_timestamp)
                .map(|at| at.date_naive()),
            mood_trend: row
                .mood_trend
                .as_deref()
                .and_then(|trend| trend.trim().parse::<f64>().ok())
                .filter(|trend| trend.is_finite()),
        });
    }

    debug!(kept = roster.len(), "decoded roster from CSV");
    Ok(roster)
}

pub fn load_roster(path: &Path) -> anyhow::Result<Vec<RosterEntity>> {
    if is_csv(path) {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_roster_csv(file)
    } else {
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        parse_roster_json(&input)
    }
}
