/// Flatten normalized statements into one ordered token bag by whitespace
/// splitting. Zero statements yield zero tokens.
pub fn bag_of_words(statements: &[String]) -> Vec<String> {
    statements
        .iter()
        .flat_map(|s| s.split_whitespace().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_in_order() {
        let stmts = vec!["age >18".to_string(), "pregnant women".to_string()];
        assert_eq!(bag_of_words(&stmts), vec!["age", ">18", "pregnant", "women"]);
    }

    #[test]
    fn empty_statements_yield_empty_bag() {
        assert!(bag_of_words(&[]).is_empty());
    }
}
