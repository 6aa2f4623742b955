use std::collections::{BTreeMap, HashMap, HashSet};

/// Term table for one status group.
pub struct GroupTerms {
    pub status: String,
    pub trials: usize,
    pub tokens: usize,
    /// (token, tf × idf) sorted by descending score.
    pub top: Vec<(String, f64)>,
}

/// Group token bags by status and score tokens by tf × ln(G / df), where a
/// "document" is a whole status group. Tokens present in every group score
/// zero; tokens unique to one group score highest. Empty groups and ties
/// are fine.
pub fn distinctive_terms(bags: &[(String, Vec<String>)], top_n: usize) -> Vec<GroupTerms> {
    let mut grouped: BTreeMap<&str, Vec<&[String]>> = BTreeMap::new();
    for (status, bag) in bags {
        grouped.entry(status.as_str()).or_default().push(bag);
    }
    let group_count = grouped.len();

    // Per-group term frequencies
    let tfs: BTreeMap<&str, (usize, HashMap<&str, usize>)> = grouped
        .iter()
        .map(|(status, trial_bags)| {
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for bag in trial_bags {
                for token in bag.iter() {
                    *tf.entry(token.as_str()).or_insert(0) += 1;
                }
            }
            (*status, (trial_bags.len(), tf))
        })
        .collect();

    // Document frequency: number of groups containing each token
    let mut df: HashMap<&str, usize> = HashMap::new();
    for (_, (_, tf)) in &tfs {
        let seen: HashSet<&str> = tf.keys().copied().collect();
        for token in seen {
            *df.entry(token).or_insert(0) += 1;
        }
    }

    tfs.into_iter()
        .map(|(status, (trials, tf))| {
            let tokens = tf.values().sum();
            let mut scored: Vec<(String, f64)> = tf
                .into_iter()
                .map(|(token, count)| {
                    let idf = (group_count as f64 / df[token] as f64).ln();
                    (token.to_string(), count as f64 * idf)
                })
                .collect();
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            scored.truncate(top_n);
            GroupTerms {
                status: status.to_string(),
                trials,
                tokens,
                top: scored,
            }
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(status: &str, tokens: &[&str]) -> (String, Vec<String>) {
        (
            status.to_string(),
            tokens.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn tokens_shared_by_all_groups_score_zero() {
        let bags = vec![
            bag("Recruiting", &["wound", "consent"]),
            bag("Completed", &["wound", "dressing"]),
        ];
        let terms = distinctive_terms(&bags, 10);
        let recruiting = terms.iter().find(|g| g.status == "Recruiting").unwrap();
        let wound = recruiting.top.iter().find(|(t, _)| t == "wound").unwrap();
        assert_eq!(wound.1, 0.0);
    }

    #[test]
    fn group_unique_tokens_rank_first() {
        let bags = vec![
            bag("Recruiting", &["wound", "consent", "consent"]),
            bag("Completed", &["wound", "dressing"]),
        ];
        let terms = distinctive_terms(&bags, 1);
        let recruiting = terms.iter().find(|g| g.status == "Recruiting").unwrap();
        assert_eq!(recruiting.top[0].0, "consent");
        assert!(recruiting.top[0].1 > 0.0);
    }

    #[test]
    fn multiple_trials_per_group_merge_into_one_bag() {
        let bags = vec![
            bag("Recruiting", &["wound"]),
            bag("Recruiting", &["wound", "ulcer"]),
            bag("Completed", &["dressing"]),
        ];
        let terms = distinctive_terms(&bags, 10);
        let recruiting = terms.iter().find(|g| g.status == "Recruiting").unwrap();
        assert_eq!(recruiting.trials, 2);
        assert_eq!(recruiting.tokens, 3);
    }

    #[test]
    fn empty_groups_are_tolerated() {
        let bags = vec![bag("Recruiting", &[]), bag("Completed", &["wound"])];
        let terms = distinctive_terms(&bags, 10);
        let recruiting = terms.iter().find(|g| g.status == "Recruiting").unwrap();
        assert!(recruiting.top.is_empty());
        assert_eq!(recruiting.tokens, 0);
    }

    #[test]
    fn no_input_yields_no_groups() {
        assert!(distinctive_terms(&[], 5).is_empty());
    }
}
