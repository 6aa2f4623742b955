pub mod classify;
pub mod eligibility;
pub mod normalize;
pub mod tokens;

use crate::db::{MergedRecord, TrialRow};

/// Per-record pipeline: raw criteria → normalized statements → topic matches
/// → token bag. Pure function of the merged record, run under rayon.
pub fn process_record(record: &MergedRecord) -> TrialRow {
    let inclusion_cleaned = normalize::normalize(&record.inclusion_raw);
    let exclusion_cleaned = normalize::normalize(&record.exclusion_raw);

    let incl = classify::classify(&inclusion_cleaned);
    let excl = classify::classify(&exclusion_cleaned);

    let inclusion_bag = tokens::bag_of_words(&inclusion_cleaned);
    let exclusion_bag = tokens::bag_of_words(&exclusion_cleaned);

    TrialRow {
        record: record.clone(),
        inclusion_cleaned,
        exclusion_cleaned,
        inclusion_people: incl.statements,
        exclusion_people: excl.statements,
        inclusion_topics: incl.topics,
        exclusion_topics: excl.topics,
        inclusion_bag,
        exclusion_bag,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_criteria(inclusion: &str, exclusion: &str) -> MergedRecord {
        MergedRecord {
            rank: 1,
            title: "Test Trial".into(),
            status: "Recruiting".into(),
            study_results: "No Results Available".into(),
            conditions: "Wounds".into(),
            interventions: "".into(),
            locations: "".into(),
            url: "https://example.org/ct2/show/NCT0001".into(),
            eligible_ages: "18 Years and older".into(),
            eligible_sexes: "All".into(),
            healthy_volunteers: "No".into(),
            inclusion_raw: inclusion.into(),
            exclusion_raw: exclusion.into(),
        }
    }

    #[test]
    fn empty_criteria_yield_zero_counts() {
        let row = process_record(&record_with_criteria("", ""));
        assert!(row.inclusion_cleaned.is_empty());
        assert!(row.exclusion_cleaned.is_empty());
        assert!(row.inclusion_bag.is_empty());
        assert!(row.exclusion_bag.is_empty());
        assert!(row.inclusion_topics.is_empty());
    }

    #[test]
    fn markup_exclusion_block_end_to_end() {
        let raw = "<ul style=\"margin-top:1ex; margin-bottom:1ex;\">\
                   <li style=\"margin-top:0.7ex;\">Age over 18</li>\
                   <li style=\"margin-top:0.7ex;\">Pregnant women</li></ul>";
        let row = process_record(&record_with_criteria("", raw));
        assert_eq!(
            row.exclusion_cleaned,
            vec!["age >18".to_string(), "pregnant women".to_string()]
        );
        assert_eq!(row.exclusion_topics, vec!["Pregnancy".to_string()]);
        assert_eq!(row.exclusion_people, vec!["pregnant women".to_string()]);
        assert_eq!(row.exclusion_bag.len(), 4);
    }

    #[test]
    fn statement_counts_follow_cleaned_sequences() {
        let row = process_record(&record_with_criteria(
            "Able to provide informed consent,Chronic wound of area over 5 square centimeters",
            "",
        ));
        assert_eq!(row.inclusion_cleaned.len(), 2);
        assert_eq!(row.inclusion_topics, vec!["Consent".to_string()]);
        assert!(row.inclusion_cleaned[1].contains("cm^2"));
    }
}
