use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::format::metric_label;
use crate::models::{ChartPoint, ChartSeries, RawMetricRecord, ReferenceLine};
use crate::range::DateRange;

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    total: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.total += value;
        self.count += 1;
    }

    fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Emit every calendar day from the range start through today, gaps included.
    pub fill_calendar_days: bool,
}

/// Daily averages per metric over `range`, on a sparse axis of days that have records.
pub fn aggregate<S: AsRef<str>>(
    records: &[RawMetricRecord],
    metrics: &[S],
    range: DateRange,
    now: DateTime<Utc>,
) -> Vec<ChartSeries> {
    aggregate_with(records, metrics, range, now, AggregateOptions::default())
}

/// Groups records by UTC calendar day and computes the mean of the values present for each
/// metric. A day with no value for a metric yields a `None` point for that metric; missing
/// values never count as zero.
///
/// Points are restricted to `[range.lower_bound_date(now), now.date_naive()]` and come out in
/// ascending date order. Both ends are whole calendar days, so the boundary day is always
/// kept: `7_days` spans 8 calendar days (today and the 7 before it). One series is returned
/// per requested metric, in request order.
pub fn aggregate_with<S: AsRef<str>>(
    records: &[RawMetricRecord],
    metrics: &[S],
    range: DateRange,
    now: DateTime<Utc>,
    options: AggregateOptions,
) -> Vec<ChartSeries> {
    let start = range.lower_bound_date(now);
    let today = now.date_naive();

    // BTreeMap keeps the axis in date order.
    let mut buckets: BTreeMap<NaiveDate, Vec<Accumulator>> = BTreeMap::new();

    for record in records {
        let bucket = buckets
            .entry(record.day())
            .or_insert_with(|| vec![Accumulator::default(); metrics.len()]);

        for (slot, metric) in bucket.iter_mut().zip(metrics) {
            if let Some(value) = record.score(metric.as_ref()) {
                slot.push(value);
            }
        }
    }

    if options.fill_calendar_days {
        let first_day = match range {
            DateRange::AllTime => buckets
                .keys()
                .copied()
                .find(|day| *day >= start && *day <= today),
            _ => Some(start),
        };
        let mut cursor = first_day;
        while let Some(day) = cursor.filter(|day| *day <= today) {
            buckets
                .entry(day)
                .or_insert_with(|| vec![Accumulator::default(); metrics.len()]);
            cursor = day.succ_opt();
        }
    }

    let days: Vec<(NaiveDate, &Vec<Accumulator>)> = buckets
        .iter()
        .filter(|(day, _)| **day >= start && **day <= today)
        .map(|(day, bucket)| (*day, bucket))
        .collect();

    metrics
        .iter()
        .enumerate()
        .map(|(index, metric)| ChartSeries {
            metric: metric.as_ref().to_string(),
            label: metric_label(metric.as_ref()),
            points: days
                .iter()
                .map(|(day, bucket)| ChartPoint {
                    x: *day,
                    y: bucket[index].average(),
                })
                .collect(),
        })
        .collect()
}

/// Mean of the non-gap points of `series`, or `None` when every point is a gap.
pub fn series_average(series: &ChartSeries) -> Option<f64> {
    let mut accumulator = Accumulator::default();
    for value in series.points.iter().filter_map(|point| point.y) {
        accumulator.push(value);
    }
    accumulator.average()
}

/// Flat "average" overlay for each series across the same x-range. Series with no data
/// produce no line.
pub fn reference_lines(series: &[ChartSeries]) -> Vec<ReferenceLine> {
    series
        .iter()
        .filter_map(|series| {
            let value = series_average(series)?;
            Some(ReferenceLine {
                metric: series.metric.clone(),
                label: format!("{} average", series.label),
                value,
                points: series
                    .points
                    .iter()
                    .map(|point| ChartPoint {
                        x: point.x,
                        y: Some(value),
                    })
                    .collect(),
            })
        })
        .collect()
}
