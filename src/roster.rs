use std::cmp::Ordering;

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{FilterState, RosterEntity, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodTrend {
    Improving,
    Declining,
    NoRecord,
}

impl MoodTrend {
    pub fn classify(trend: Option<f64>) -> Self {
        match trend.filter(|value| value.is_finite()) {
            None => MoodTrend::NoRecord,
            Some(value) if value > 0.0 => MoodTrend::Improving,
            Some(_) => MoodTrend::Declining,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MoodTrend::Improving => "improving",
            MoodTrend::Declining => "declining",
            MoodTrend::NoRecord => "no record",
        }
    }
}

/// True when `entity` passes the course, year and search filters of `state`.
pub fn matches(entity: &RosterEntity, state: &FilterState) -> bool {
    let matches_course = state.courses.is_empty()
        || entity
            .course
            .as_ref()
            .is_some_and(|course| state.courses.contains(course));
    let matches_year = state.academic_years.is_empty()
        || entity
            .academic_year
            .as_ref()
            .is_some_and(|year| state.academic_years.contains(year));

    let needle = state.search.to_lowercase();
    let matches_search = needle.is_empty()
        || entity.name.to_lowercase().contains(&needle)
        || entity
            .secondary_id
            .to_string()
            .to_lowercase()
            .contains(&needle);

    matches_course && matches_year && matches_search
}

/// Applies the filters in `state`, then its sort key if any. Without a sort key the
/// surviving entities keep their input order.
pub fn filter_and_sort(roster: &[RosterEntity], state: &FilterState) -> Vec<RosterEntity> {
    let mut view: Vec<RosterEntity> = roster
        .iter()
        .filter(|entity| matches(entity, state))
        .cloned()
        .collect();

    if let Some(key) = state.sort {
        view.sort_by(|a, b| {
            let left = key.field.sort_value(a);
            let right = key.field.sort_value(b);
            match key.direction {
                SortDirection::Asc => locale_compare(&left, &right),
                SortDirection::Desc => locale_compare(&right, &left),
            }
        });
    }

    view
}

// Lowercased with diacritics stripped, so "Élodie" sorts beside "Elodie".
fn base_letters(value: &str) -> impl Iterator<Item = char> + '_ {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Locale-style ordering: base letters first, then accents, then case (lowercase first).
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            let accented_a = a.nfd().flat_map(char::to_lowercase);
            let accented_b = b.nfd().flat_map(char::to_lowercase);
            accented_a.cmp(accented_b)
        })
        .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SecondaryId, SortField, SortKey};
    use chrono::NaiveDate;

    fn student(id: i64, name: &str, number: i64, course: &str, year: &str) -> RosterEntity {
        RosterEntity {
            id,
            name: name.to_string(),
            secondary_id: SecondaryId::Number(number),
            course: Some(course.to_string()),
            academic_year: Some(year.to_string()),
            last_activity: None,
            mood_trend: None,
        }
    }

    fn roster() -> Vec<RosterEntity> {
        vec![
            student(1, "Kiara Patel", 20231004, "Computer Science", "Year 2"),
            student(2, "avery Lee", 20221187, "Psychology", "Year 3"),
            student(3, "Jules Moreno", 20240012, "Computer Science", "Year 1"),
            student(4, "Bea Okafor", 20231555, "Nursing", "Year 2"),
        ]
    }

    fn ids(view: &[RosterEntity]) -> Vec<i64> {
        view.iter().map(|entity| entity.id).collect()
    }

    #[test]
    fn empty_filter_is_identity() {
        let view = filter_and_sort(&roster(), &FilterState::default());
        assert_eq!(view, roster());
    }

    #[test]
    fn course_and_year_sets_intersect() {
        let mut state = FilterState::default();
        state.courses.insert("Computer Science".to_string());
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![1, 3]);

        state.academic_years.insert("Year 2".to_string());
        state.academic_years.insert("Year 3".to_string());
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![1]);
    }

    #[test]
    fn entities_without_a_course_fail_a_course_filter() {
        let mut entity = student(9, "No Course", 1, "", "Year 1");
        entity.course = None;
        let mut state = FilterState::default();
        assert!(matches(&entity, &state));
        state.courses.insert("Nursing".to_string());
        assert!(!matches(&entity, &state));
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_number() {
        let state = FilterState {
            search: "AVERY".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![2]);

        let state = FilterState {
            search: "2023".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![1, 4]);
    }

    #[test]
    fn search_matching_nothing_is_empty() {
        let state = FilterState {
            search: "zzz".to_string(),
            ..FilterState::default()
        };
        assert!(filter_and_sort(&roster(), &state).is_empty());
    }

    #[test]
    fn text_secondary_ids_are_searchable() {
        let mut entity = student(5, "Sam Doe", 0, "Nursing", "Year 1");
        entity.secondary_id = SecondaryId::Text("EXT-77A".to_string());
        let state = FilterState {
            search: "77a".to_string(),
            ..FilterState::default()
        };
        assert!(matches(&entity, &state));
    }

    #[test]
    fn sorts_names_ignoring_case_in_both_directions() {
        let mut state = FilterState {
            sort: Some(SortKey {
                field: SortField::StudentName,
                direction: SortDirection::Asc,
            }),
            ..FilterState::default()
        };
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![2, 4, 3, 1]);

        state.sort = Some("student_name-desc".parse().unwrap());
        assert_eq!(ids(&filter_and_sort(&roster(), &state)), vec![1, 3, 4, 2]);
    }

    #[test]
    fn missing_sort_values_sort_first() {
        let mut recent = student(1, "A", 1, "X", "Y");
        recent.last_activity = NaiveDate::from_ymd_opt(2026, 10, 18);
        let never = student(2, "B", 2, "X", "Y");
        let state = FilterState {
            sort: Some("last_recording_date-asc".parse().unwrap()),
            ..FilterState::default()
        };
        assert_eq!(ids(&filter_and_sort(&[recent, never], &state)), vec![2, 1]);
    }

    #[test]
    fn sort_keys_reject_unknown_fields() {
        assert!("student_email-asc".parse::<SortKey>().is_err());
        assert!("student_name-up".parse::<SortKey>().is_err());
        assert!("student_name".parse::<SortKey>().is_err());
    }

    #[test]
    fn locale_compare_puts_lowercase_first_on_ties() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn accented_names_sort_with_their_base_letters() {
        let names = [
            "Zoë Byrne",
            "Élodie Martin",
            "Eva Kelly",
            "Síofra Ní Bhriain",
            "Sean Walsh",
        ];
        let roster: Vec<RosterEntity> = names
            .iter()
            .enumerate()
            .map(|(index, name)| student(index as i64, name, index as i64, "Irish", "Year 1"))
            .collect();
        let state = FilterState {
            sort: Some("student_name-asc".parse().unwrap()),
            ..FilterState::default()
        };
        let sorted: Vec<String> = filter_and_sort(&roster, &state)
            .into_iter()
            .map(|entity| entity.name)
            .collect();

        assert_eq!(
            sorted,
            vec![
                "Élodie Martin",
                "Eva Kelly",
                "Sean Walsh",
                "Síofra Ní Bhriain",
                "Zoë Byrne"
            ]
        );
        assert_eq!(locale_compare("e", "é"), Ordering::Less);
        assert_eq!(locale_compare("Élan", "elan"), Ordering::Greater);
    }

    #[test]
    fn mood_trend_classification() {
        assert_eq!(MoodTrend::classify(Some(0.4)), MoodTrend::Improving);
        assert_eq!(MoodTrend::classify(Some(0.0)), MoodTrend::Declining);
        assert_eq!(MoodTrend::classify(Some(-1.0)), MoodTrend::Declining);
        assert_eq!(MoodTrend::classify(None), MoodTrend::NoRecord);
    }
}
