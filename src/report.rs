use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::aggregate::series_average;
use crate::format::{format_score, join_list};
use crate::models::{ChartSeries, CohortConcern, RosterEntity};
use crate::range::DateRange;
use crate::roster::MoodTrend;

fn last_recording(entity: &RosterEntity) -> String {
    entity
        .last_activity
        .map(|date| date.to_string())
        .unwrap_or_else(|| "No record".to_string())
}

pub fn build_report(
    range: DateRange,
    now: DateTime<Utc>,
    series: &[ChartSeries],
    cohorts: &[CohortConcern],
    roster: &[RosterEntity],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Wellbeing Report");
    let _ = writeln!(
        output,
        "Generated {} for {} (data since {})",
        now.format("%Y-%m-%d %H:%M UTC"),
        range.label(),
        range.lower_bound_date(now)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Averages");

    if series.is_empty() {
        let _ = writeln!(output, "No metrics selected.");
    }
    for metric in series {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} (average {})",
            metric.label,
            format_score(series_average(metric))
        );
        if metric.points.is_empty() {
            let _ = writeln!(output, "No records in this window.");
            continue;
        }
        if metric.is_all_gaps() {
            let _ = writeln!(output, "No {} scores recorded in this window.", metric.metric);
            continue;
        }
        for point in &metric.points {
            let _ = writeln!(output, "- {}: {}", point.x, format_score(point.y));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Concerning Cohorts");

    if cohorts.is_empty() {
        let _ = writeln!(output, "No cohorts below wellbeing thresholds.");
    } else {
        for flagged in cohorts {
            let _ = writeln!(
                output,
                "- {} {} students are showing signs of {} ({} records)",
                flagged.cohort.academic_year,
                flagged.cohort.course,
                join_list(&flagged.concerns),
                flagged.cohort.record_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if roster.is_empty() {
        let _ = writeln!(output, "No students match the current filters.");
    } else {
        for entity in roster {
            let _ = writeln!(
                output,
                "- {} ({}): mood {}, last recording {}",
                entity.name,
                entity.secondary_id,
                MoodTrend::classify(entity.mood_trend).label(),
                last_recording(entity)
            );
        }
    }

    output
}

/// Writes the roster view as the staff "student list" CSV download.
pub fn write_roster_csv<W: std::io::Write>(writer: W, roster: &[RosterEntity]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        "Student Name",
        "Student Number",
        "Course",
        "Academic Year",
        "Mood Trend",
        "Last Recording",
    ])?;

    for entity in roster {
        writer.write_record([
            entity.name.clone(),
            entity.secondary_id.to_string(),
            entity.course.clone().unwrap_or_default(),
            entity.academic_year.clone().unwrap_or_default(),
            MoodTrend::classify(entity.mood_trend).label().to_string(),
            last_recording(entity),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartPoint, CohortAverage, SecondaryId};
    use chrono::{NaiveDate, TimeZone};
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn entity() -> RosterEntity {
        RosterEntity {
            id: 1,
            name: "Avery Lee".to_string(),
            secondary_id: SecondaryId::Number(20221187),
            course: Some("Psychology".to_string()),
            academic_year: None,
            last_activity: NaiveDate::from_ymd_opt(2026, 10, 18),
            mood_trend: Some(1.0),
        }
    }

    #[test]
    fn empty_report_has_explicit_empty_states() {
        let report = build_report(DateRange::SevenDays, now(), &[], &[], &[]);
        assert!(report.contains("data since 2026-10-12"));
        assert!(report.contains("No metrics selected."));
        assert!(report.contains("No cohorts below wellbeing thresholds."));
        assert!(report.contains("No students match the current filters."));
    }

    #[test]
    fn report_lists_points_gaps_and_cohorts() {
        let series = vec![ChartSeries {
            metric: "mood".to_string(),
            label: "Mood".to_string(),
            points: vec![
                ChartPoint {
                    x: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
                    y: Some(2.0),
                },
                ChartPoint {
                    x: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                    y: None,
                },
            ],
        }];
        let cohorts = vec![CohortConcern {
            cohort: CohortAverage {
                academic_year: "Year 2".to_string(),
                course: "Nursing".to_string(),
                record_count: 4,
                averages: BTreeMap::new(),
            },
            concerns: vec!["low mood", "poor sleep"],
        }];
        let report = build_report(DateRange::SevenDays, now(), &series, &cohorts, &[entity()]);

        assert!(report.contains("### Mood (average 2.0)"));
        assert!(report.contains("- 2026-10-18: --"));
        assert!(report.contains("Year 2 Nursing students are showing signs of low mood and poor sleep"));
        assert!(report.contains("- Avery Lee (20221187): mood improving, last recording 2026-10-18"));
    }

    #[test]
    fn all_gap_metrics_are_summarised_instead_of_listed() {
        let series = vec![ChartSeries {
            metric: "sleep".to_string(),
            label: "Sleep".to_string(),
            points: vec![ChartPoint {
                x: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                y: None,
            }],
        }];
        assert!(series[0].is_all_gaps());

        let report = build_report(DateRange::SevenDays, now(), &series, &[], &[]);
        assert!(report.contains("### Sleep (average --)"));
        assert!(report.contains("No sleep scores recorded in this window."));
        assert!(!report.contains("- 2026-10-18: --"));
    }

    #[test]
    fn roster_csv_has_header_and_rows() {
        let mut buffer = Vec::new();
        let mut missing = entity();
        missing.last_activity = None;
        missing.mood_trend = None;
        write_roster_csv(&mut buffer, &[entity(), missing]).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Student Name,Student Number,Course,Academic Year,Mood Trend,Last Recording"
        );
        assert_eq!(lines[1], "Avery Lee,20221187,Psychology,,improving,2026-10-18");
        assert_eq!(lines[2], "Avery Lee,20221187,Psychology,,no record,No record");
    }
}
