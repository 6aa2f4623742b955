/// Fixed ordered rule table: any trigger substring occurring anywhere in a
/// statement assigns the topic label. Input statements are already
/// lowercased, so triggers are stored lowercase ("smoker" also covers
/// "nonsmoker" by containment).
pub const RULES: &[(&[&str], &str)] = &[
    (&["smoker", "smoking"], "Smoking"),
    (&["substance abuse", "alcohol"], "Alcohol"),
    (&["mentally handicapped"], "Mentally handicapped"),
    (&["consent"], "Consent"),
    (&["outpatient"], "Outpatient"),
    (&["pregnant", "pregnancy", "childbearing", "mother"], "Pregnancy"),
    (&["team", "sport", "exercise", "varsity", "athlete"], "Athletic"),
    (&["therapy"], "Therapy"),
    (&["english", "language"], "Language"),
    (&["read", "write", "writing"], "Reading and writing skills"),
    (&["hipaa"], "HIPAA"),
    (&["military", "veteran"], "Military"),
    (
        &["righthanded", "lefthanded", "left-handed", "right-handed"],
        "righthanded/lefthanded",
    ),
    (&["driving", "drive", "driver's license"], "Driver"),
    (&["resident"], "Resident"),
    (&["sexually active"], "Sexually active"),
];

/// Parallel views over one trial's statements: the matched statement texts
/// and the matched topic labels. One entry per (statement, rule) match —
/// a statement hitting several rules appears once per rule, and both lists
/// may therefore be longer than the input.
#[derive(Debug, Default, PartialEq)]
pub struct Classification {
    pub statements: Vec<String>,
    pub topics: Vec<String>,
}

pub fn classify(statements: &[String]) -> Classification {
    let mut out = Classification::default();
    for stmt in statements {
        for (triggers, label) in RULES {
            if triggers.iter().any(|t| stmt.contains(t)) {
                out.statements.push(stmt.clone());
                out.topics.push((*label).to_string());
            }
        }
    }
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pregnant_statements_always_carry_pregnancy() {
        for s in ["pregnant women", "no pregnancy test", "women of childbearing potential"] {
            let c = classify(&stmts(&[s]));
            assert!(
                c.topics.contains(&"Pregnancy".to_string()),
                "missing Pregnancy for {:?}",
                s
            );
        }
    }

    #[test]
    fn one_entry_per_rule_match_not_deduplicated() {
        // Two triggers of the same rule still emit a single entry
        let c = classify(&stmts(&["pregnant or nursing mothers"]));
        assert_eq!(c.topics, vec!["Pregnancy"]);
        assert_eq!(c.statements.len(), 1);

        // One statement matching two different rules appears twice.
        let c = classify(&stmts(&["pregnant and unable to consent"]));
        assert_eq!(c.topics, vec!["Consent", "Pregnancy"]);
        assert_eq!(c.statements, stmts(&["pregnant and unable to consent", "pregnant and unable to consent"]));
    }

    #[test]
    fn emission_is_statement_major_rule_minor() {
        let c = classify(&stmts(&["current smoker", "able to consent"]));
        assert_eq!(c.topics, vec!["Smoking", "Consent"]);
    }

    #[test]
    fn nonsmoker_matches_smoking() {
        let c = classify(&stmts(&["nonsmoker for 6 months"]));
        assert_eq!(c.topics, vec!["Smoking"]);
    }

    #[test]
    fn hipaa_rule_fires_on_lowercased_input() {
        let c = classify(&stmts(&["signed hipaa authorization"]));
        assert_eq!(c.topics, vec!["HIPAA"]);
    }

    #[test]
    fn unmatched_statements_emit_nothing() {
        let c = classify(&stmts(&["age >18", "wound area <5 cm^2"]));
        assert!(c.statements.is_empty());
        assert!(c.topics.is_empty());
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(classify(&[]), Classification::default());
    }
}
