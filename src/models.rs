use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Suffix the backend appends to a metric name to form its score field.
pub const SCORE_SUFFIX: &str = "_score";

/// One of the wellbeing scores students record each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mood,
    Exercise,
    Sleep,
    Socialisation,
    Productivity,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Mood,
        Metric::Exercise,
        Metric::Sleep,
        Metric::Socialisation,
        Metric::Productivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Mood => "mood",
            Metric::Exercise => "exercise",
            Metric::Sleep => "sleep",
            Metric::Socialisation => "socialisation",
            Metric::Productivity => "productivity",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Mood => "Mood",
            Metric::Exercise => "Exercise",
            Metric::Sleep => "Sleep",
            Metric::Socialisation => "Socialisation",
            Metric::Productivity => "Productivity",
        }
    }

    /// Field name the backend uses for this score, e.g. `mood_score`.
    pub fn score_field(self) -> String {
        format!("{}{SCORE_SUFFIX}", self.as_str())
    }
}

impl AsRef<str> for Metric {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_lowercase();
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == needle)
            .ok_or_else(|| anyhow::anyhow!("unknown metric '{value}'"))
    }
}

/// A single daily-track observation as decoded from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricRecord {
    pub recorded_at: DateTime<Utc>,
    pub academic_year: Option<String>,
    pub course: Option<String>,
    pub scores: BTreeMap<String, f64>,
}

impl RawMetricRecord {
    pub fn new(recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            academic_year: None,
            course: None,
            scores: BTreeMap::new(),
        }
    }

    pub fn with_score(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.scores.insert(metric.into(), value);
        self
    }

    pub fn with_cohort(mut self, academic_year: impl Into<String>, course: impl Into<String>) -> Self {
        self.academic_year = Some(academic_year.into());
        self.course = Some(course.into());
        self
    }

    /// Calendar day (UTC) the record falls on.
    pub fn day(&self) -> NaiveDate {
        self.recorded_at.date_naive()
    }

    /// Score for `metric`, or `None` when it was not recorded or is not a finite number.
    pub fn score(&self, metric: &str) -> Option<f64> {
        self.scores
            .get(metric)
            .copied()
            .filter(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: NaiveDate,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub metric: String,
    pub label: String,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn is_all_gaps(&self) -> bool {
        self.points.iter().all(|point| point.y.is_none())
    }
}

/// Flat overlay line at a series' mean value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub metric: String,
    pub label: String,
    pub value: f64,
    pub points: Vec<ChartPoint>,
}

/// Student number as the backend sends it: usually numeric, sometimes free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SecondaryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for SecondaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondaryId::Number(value) => write!(f, "{value}"),
            SecondaryId::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntity {
    pub id: i64,
    pub name: String,
    pub secondary_id: SecondaryId,
    pub course: Option<String>,
    pub academic_year: Option<String>,
    pub last_activity: Option<NaiveDate>,
    pub mood_trend: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    StudentName,
    StudentNumber,
    CourseName,
    AcademicYearName,
    LastRecordingDate,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::StudentName => "student_name",
            SortField::StudentNumber => "student_number",
            SortField::CourseName => "course_name",
            SortField::AcademicYearName => "academic_year_name",
            SortField::LastRecordingDate => "last_recording_date",
        }
    }

    /// String the field compares by; missing values compare as the empty string.
    pub fn sort_value(self, entity: &RosterEntity) -> String {
        match self {
            SortField::StudentName => entity.name.clone(),
            SortField::StudentNumber => entity.secondary_id.to_string(),
            SortField::CourseName => entity.course.clone().unwrap_or_default(),
            SortField::AcademicYearName => entity.academic_year.clone().unwrap_or_default(),
            SortField::LastRecordingDate => entity
                .last_activity
                .map(|date| date.to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    /// Parses the dashboard's `<field>-<asc|desc>` option strings, e.g. `student_name-desc`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (field, direction) = value
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| anyhow::anyhow!("sort key '{value}' must look like <field>-<asc|desc>"))?;

        let field = match field {
            "student_name" => SortField::StudentName,
            "student_number" => SortField::StudentNumber,
            "course_name" => SortField::CourseName,
            "academic_year_name" => SortField::AcademicYearName,
            "last_recording_date" => SortField::LastRecordingDate,
            other => anyhow::bail!("unknown sort field '{other}'"),
        };
        let direction = match direction.to_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            other => anyhow::bail!("unknown sort direction '{other}'"),
        };

        Ok(SortKey { field, direction })
    }
}

/// Roster view controls. Empty sets mean "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub courses: BTreeSet<String>,
    pub academic_years: BTreeSet<String>,
    pub search: String,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortAverage {
    pub academic_year: String,
    pub course: String,
    pub record_count: usize,
    pub averages: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortConcern {
    pub cohort: CohortAverage,
    pub concerns: Vec<&'static str>,
}
