use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::normalize::squish;

static ELG_CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td[headers="elgData"]"#).unwrap());
static CRITERIA_UL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"ul[style="margin-top:1ex; margin-bottom:1ex;"]"#).unwrap());
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());

/// Best-effort eligibility fields for one detail page. Every field defaults
/// to the empty string when its markup is absent; absence means "unknown".
#[derive(Debug, Default, PartialEq)]
pub struct EligibilityFields {
    pub eligible_ages: String,
    pub eligible_sexes: String,
    pub healthy_volunteers: String,
    pub inclusion_raw: String,
    pub exclusion_raw: String,
}

/// Extract the eligibility data from a detail page.
///
/// The eligibility table exposes its cells as `td[headers=elgData]` in
/// document order: ages, sexes, healthy-volunteer acceptance. The ages cell
/// carries a parenthesized age-group gloss that is dropped. Inclusion and
/// exclusion criteria are the first two lists styled as criteria blocks;
/// each becomes the comma-joined sequence of its item texts.
pub fn extract_fields(html: &str) -> EligibilityFields {
    let doc = Html::parse_document(html);

    let cells: Vec<String> = doc
        .select(&ELG_CELL_SEL)
        .map(|td| squish(&td.text().collect::<String>()))
        .collect();

    let eligible_ages = cells
        .first()
        .map(|t| t.split('(').next().unwrap_or("").trim().to_string())
        .unwrap_or_default();
    let eligible_sexes = cells.get(1).cloned().unwrap_or_default();
    let healthy_volunteers = cells.get(2).cloned().unwrap_or_default();

    let lists: Vec<String> = doc
        .select(&CRITERIA_UL_SEL)
        .map(|ul| {
            ul.select(&LI_SEL)
                .map(|li| squish(&li.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    let inclusion_raw = lists.first().cloned().unwrap_or_default();
    let exclusion_raw = lists.get(1).cloned().unwrap_or_default();

    EligibilityFields {
        eligible_ages,
        eligible_sexes,
        healthy_volunteers,
        inclusion_raw,
        exclusion_raw,
    }
}

// ── Tests ──
