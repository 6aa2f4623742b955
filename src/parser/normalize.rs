use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DIM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d)\s*x\s*(\d)").unwrap());
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn squish(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").to_string()
}

/// Normalize one raw criteria block into its ordered criterion statements.
///
/// Deterministic transform: strip markup, canonicalize symbols and units,
/// lowercase, split on commas. Empty or blank input yields an empty vector,
/// never `[""]` — statement counts depend on that. The output is a fixed
/// point: normalizing any returned statement yields the statement itself.
pub fn normalize(raw: &str) -> Vec<String> {
    let text = strip_markup(raw);
    let cleaned = clean(&text);
    if cleaned.is_empty() {
        return Vec::new();
    }
    cleaned
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Markup-free text for one criteria block. Each `li` becomes one
/// comma-separated segment; bare text passes through unchanged. A stray `<`
/// used as a comparison operator is not markup and survives parsing.
fn strip_markup(raw: &str) -> String {
    if !raw.contains('<') {
        return raw.to_string();
    }
    let fragment = Html::parse_fragment(raw);
    let items: Vec<String> = fragment
        .select(&LI_SEL)
        .map(|li| squish(&li.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .collect();
    if !items.is_empty() {
        return items.join(",");
    }
    squish(&fragment.root_element().text().collect::<String>())
}

/// The ordered replacement chain. Order matters: "over " and operator
/// spacing collapse only after lowercasing and punctuation stripping, so a
/// stripped "over." or ">." can no longer reveal a fresh "over " or "> "
/// that would escape collapsing.
fn clean(text: &str) -> String {
    let mut s = text.replace(['[', ']'], "");
    s = s.replace(['(', ')'], " ");
    s = squish(&s);
    s = s.to_lowercase();
    s = s.replace(['.', '!', '?', ':', '®', '™'], "");
    s = squish(&s);
    s = s.replace("over ", ">");
    s = s.replace("> ", ">").replace("< ", "<").replace("= ", "=");
    s = s.replace("cm2", "cm^2");
    s = s.replace("square centimeters", "cm^2");
    s = DIM_RE.replace_all(&s, "${1}x${2}").to_string();
    s.trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert!(normalize("\n").is_empty());
    }

    #[test]
    fn markup_list_splits_into_statements() {
        let raw = "<ul style=\"margin-top:1ex; margin-bottom:1ex;\">\
                   <li style=\"margin-top:0.7ex;\">Age over 18</li>\
                   <li style=\"margin-top:0.7ex;\">Pregnant women</li></ul>";
        assert_eq!(normalize(raw), vec!["age >18", "pregnant women"]);
    }

    #[test]
    fn over_collapses_to_operator() {
        assert_eq!(normalize("Age over 18"), vec!["age >18"]);
        assert_eq!(normalize("Wound present for over 6 weeks"), vec!["wound present for >6 weeks"]);
    }

    #[test]
    fn punctuation_strip_cannot_reveal_uncollapsed_over() {
        // "over." loses its dot before the collapse runs, so the revealed
        // "over " still becomes ">" on the first pass
        assert_eq!(normalize("Healed over. 6 weeks"), vec!["healed >6 weeks"]);
    }

    #[test]
    fn operator_spacing_collapses_toward_operand() {
        assert_eq!(normalize("HbA1c > 8"), vec!["hba1c >8"]);
        assert_eq!(normalize("Wound area < 5"), vec!["wound area <5"]);
        assert_eq!(normalize("Score = 3"), vec!["score =3"]);
    }

    #[test]
    fn terminal_punctuation_and_trademarks_stripped() {
        assert_eq!(normalize("Willing to consent."), vec!["willing to consent"]);
        assert_eq!(
            normalize("Treated with Apligraf® or Dermagraft™!"),
            vec!["treated with apligraf or dermagraft"]
        );
        assert_eq!(normalize("Note: diabetic?"), vec!["note diabetic"]);
    }

    #[test]
    fn area_units_canonicalized() {
        assert_eq!(normalize("Wound over 5 cm2"), vec!["wound >5 cm^2"]);
        assert_eq!(
            normalize("Ulcer area of 10 square centimeters"),
            vec!["ulcer area of 10 cm^2"]
        );
    }

    #[test]
    fn parentheses_become_spaces_not_joins() {
        // A removed paren must not merge the adjacent words
        assert_eq!(normalize("wound(chronic)type"), vec!["wound chronic type"]);
    }

    #[test]
    fn dimension_spacing_collapses() {
        assert_eq!(normalize("Wound of 2 x 2 cm2"), vec!["wound of 2x2 cm^2"]);
        // Ordinary words around the letter x are untouched
        assert_eq!(normalize("six apples"), vec!["six apples"]);
    }

    #[test]
    fn comma_split_preserves_order() {
        let out = normalize("Adults over 18, non smoker, willing to consent");
        assert_eq!(out, vec!["adults >18", "non smoker", "willing to consent"]);
    }

    #[test]
    fn normalization_is_idempotent_on_its_output() {
        let inputs = [
            "Age over 18,Pregnant women",
            "Wound area > 5 square centimeters (chronic)",
            "HbA1c = 8.5, on insulin therapy!",
            "Lesion of 2 x 2 cm2 or larger",
            "Healed over. 6 weeks, stable over: 3 visits",
        ];
        for raw in inputs {
            let first = normalize(raw);
            for stmt in &first {
                assert_eq!(normalize(stmt), vec![stmt.clone()], "not a fixed point: {}", stmt);
            }
        }
    }

    #[test]
    fn bare_comparison_survives_fragment_parsing() {
        assert_eq!(normalize("area <10 cm2"), vec!["area <10 cm^2"]);
    }
}
