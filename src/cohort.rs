use std::collections::{BTreeMap, HashMap};

use crate::models::{CohortAverage, CohortConcern, Metric, RawMetricRecord};

/// Average below which a cohort's metric is flagged, with the phrase used for it.
pub fn concern_threshold(metric: Metric) -> (f64, &'static str) {
    match metric {
        Metric::Mood => (3.0, "low mood"),
        Metric::Exercise => (2.0, "low exercise"),
        Metric::Sleep => (2.0, "poor sleep"),
        Metric::Socialisation => (2.0, "low socialisation"),
        Metric::Productivity => (2.0, "low productivity"),
    }
}

/// Mean of the available values per metric for every (academic year, course) pair.
/// Records missing either label are left out; metrics with no values are absent from
/// `averages`.
pub fn cohort_averages<S: AsRef<str>>(
    records: &[RawMetricRecord],
    metrics: &[S],
) -> Vec<CohortAverage> {
    let mut groups: HashMap<(String, String), (usize, BTreeMap<String, (f64, usize)>)> =
        HashMap::new();

    for record in records {
        let (Some(year), Some(course)) = (&record.academic_year, &record.course) else {
            continue;
        };

        let entry = groups
            .entry((year.clone(), course.clone()))
            .or_insert_with(|| (0, BTreeMap::new()));
        entry.0 += 1;

        for metric in metrics {
            if let Some(value) = record.score(metric.as_ref()) {
                let slot = entry
                    .1
                    .entry(metric.as_ref().to_string())
                    .or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }
    }

    let mut cohorts: Vec<CohortAverage> = groups
        .into_iter()
        .map(|((academic_year, course), (record_count, totals))| CohortAverage {
            academic_year,
            course,
            record_count,
            averages: totals
                .into_iter()
                .map(|(metric, (total, count))| (metric, total / count as f64))
                .collect(),
        })
        .collect();

    cohorts.sort_by(|a, b| {
        a.academic_year
            .cmp(&b.academic_year)
            .then_with(|| a.course.cmp(&b.course))
    });
    cohorts
}

/// Concern phrases for a cohort, in metric order.
pub fn concerns(cohort: &CohortAverage) -> Vec<&'static str> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let average = cohort.averages.get(metric.as_str())?;
            let (threshold, phrase) = concern_threshold(metric);
            (*average < threshold).then_some(phrase)
        })
        .collect()
}

/// Cohorts with at least one concern, most concerns first.
pub fn concerning_cohorts(records: &[RawMetricRecord]) -> Vec<CohortConcern> {
    let mut flagged: Vec<CohortConcern> = cohort_averages(records, &Metric::ALL)
        .into_iter()
        .filter_map(|cohort| {
            let concerns = concerns(&cohort);
            if concerns.is_empty() {
                None
            } else {
                Some(CohortConcern { cohort, concerns })
            }
        })
        .collect();

    // Stable, so ties keep the year/course order from cohort_averages.
    flagged.sort_by(|a, b| b.concerns.len().cmp(&a.concerns.len()));
    flagged
}
