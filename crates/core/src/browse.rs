//! Browse query objects, pagination, and fragment rendering mode.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::catalog::{MassPart, Season};
use crate::error::CoreError;
use crate::forms::clean_text;

/// Songs per page in the public library.
pub const PAGE_SIZE: i64 = 12;

/// Songs per page in a member's own submission list.
pub const MY_SONGS_PAGE_SIZE: i64 = 10;

/// Recent published songs shown on the dashboard.
pub const DASHBOARD_RECENT_LIMIT: i64 = 6;

/// Header set by htmx on partial-page requests.
pub const FRAGMENT_HEADER: &str = "hx-request";

/// Whether to answer with the full page or only the result fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Full,
    Fragment,
}

impl RenderMode {
    /// A non-empty `HX-Request` header, whatever its value, selects fragment mode.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => Self::Fragment,
            _ => Self::Full,
        }
    }

    pub fn is_fragment(self) -> bool {
        self == Self::Fragment
    }
}

/// Filters for the published-song library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryQuery {
    /// Trimmed free-text term; empty means no text filter.
    pub text: String,
    pub seasons: BTreeSet<Season>,
    pub parts: BTreeSet<MassPart>,
    /// Raw `page` parameter, resolved against the result count later.
    pub page: Option<String>,
}

impl LibraryQuery {
    /// Build from raw query pairs. `season` and `part` may repeat; unknown
    /// codes are dropped.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => query.text = clean_text(Some(value)),
                "season" => {
                    if let Ok(season) = Season::from_code(value.trim()) {
                        query.seasons.insert(season);
                    }
                }
                "part" => {
                    if let Ok(part) = MassPart::from_code(value.trim()) {
                        query.parts.insert(part);
                    }
                }
                "page" => query.page = Some(value.clone()),
                _ => {}
            }
        }
        query
    }

    /// Season codes the text term also matches through code or label.
    pub fn text_season_codes(&self) -> Vec<&'static str> {
        Season::codes_matching(&self.text)
    }

    /// Mass-part codes the text term also matches through code or label.
    pub fn text_part_codes(&self) -> Vec<&'static str> {
        MassPart::codes_matching(&self.text)
    }

    pub fn season_codes(&self) -> Vec<&'static str> {
        self.seasons.iter().map(|s| s.code()).collect()
    }

    pub fn part_codes(&self) -> Vec<&'static str> {
        self.parts.iter().map(|p| p.code()).collect()
    }

    /// Season choices flagged with whether this query selects them.
    pub fn season_choices(&self) -> Vec<FilterChoice> {
        Season::ALL
            .iter()
            .map(|s| FilterChoice::new(s.code(), s.label(), self.seasons.contains(s)))
            .collect()
    }

    /// Mass-part choices flagged with whether this query selects them.
    pub fn part_choices(&self) -> Vec<FilterChoice> {
        MassPart::ALL
            .iter()
            .map(|p| FilterChoice::new(p.code(), p.label(), self.parts.contains(p)))
            .collect()
    }
}

/// Filter for the moderation queue and a member's own list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextQuery {
    pub text: String,
    pub page: Option<String>,
}

impl TextQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => query.text = clean_text(Some(value)),
                "page" => query.page = Some(value.clone()),
                _ => {}
            }
        }
        query
    }
}

/// A facet option with its selection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChoice {
    pub code: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl FilterChoice {
    fn new(code: &'static str, label: &'static str, selected: bool) -> Self {
        Self {
            code,
            label,
            selected,
        }
    }
}

/// Position of a page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageInfo {
    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }
}

/// Resolve a raw page parameter against the total item count.
///
/// Missing or blank means page 1. Page 1 always exists, even with no items.
/// Anything non-numeric, below 1, or past the last page is not found.
pub fn resolve_page(raw: Option<&str>, total_items: i64, per_page: i64) -> Result<PageInfo, CoreError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let not_found = || CoreError::NotFoundByKey {
        entity: "Page",
        key: raw.to_string(),
    };

    let number = if raw.is_empty() {
        1
    } else {
        raw.parse::<i64>().map_err(|_| not_found())?
    };

    let total_items = total_items.max(0);
    let total_pages = ((total_items + per_page - 1) / per_page).max(1);
    if number < 1 || number > total_pages {
        return Err(not_found());
    }

    Ok(PageInfo {
        number,
        per_page,
        total_items,
        total_pages,
        has_previous: number > 1,
        has_next: number < total_pages,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_repeatable_facets_and_unknown_codes() {
        let query = LibraryQuery::from_pairs(&pairs(&[
            ("q", "  ave "),
            ("season", "lent"),
            ("season", "advent"),
            ("season", "pentecost"),
            ("part", "communion"),
            ("page", "2"),
            ("utm_source", "x"),
        ]));
        assert_eq!(query.text, "ave");
        assert_eq!(query.season_codes(), vec!["lent", "advent"]);
        assert_eq!(query.part_codes(), vec!["communion"]);
        assert_eq!(query.page.as_deref(), Some("2"));
    }

    #[test]
    fn test_choice_states() {
        let query = LibraryQuery::from_pairs(&pairs(&[("season", "easter")]));
        let choices = query.season_choices();
        assert_eq!(choices.len(), 5);
        let selected: Vec<_> = choices.iter().filter(|c| c.selected).map(|c| c.code).collect();
        assert_eq!(selected, vec!["easter"]);
        assert!(query.part_choices().iter().all(|c| !c.selected));
    }

    #[test]
    fn test_text_matches_labels() {
        let query = LibraryQuery::from_pairs(&pairs(&[("q", "Eucharist")]));
        assert_eq!(query.text_part_codes(), vec!["communion"]);
        assert!(query.text_season_codes().is_empty());
    }

    #[test]
    fn test_render_mode() {
        assert_eq!(RenderMode::from_header(Some("true")), RenderMode::Fragment);
        assert_eq!(RenderMode::from_header(Some("false")), RenderMode::Fragment);
        assert_eq!(RenderMode::from_header(Some("")), RenderMode::Full);
        assert_eq!(RenderMode::from_header(None), RenderMode::Full);
    }

    #[test]
    fn test_first_page_of_empty_set() {
        let page = resolve_page(None, 0, PAGE_SIZE).unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_bounds() {
        let page = resolve_page(Some("3"), 25, PAGE_SIZE).unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 24);
        assert!(page.has_previous);
        assert!(!page.has_next);

        assert_matches!(
            resolve_page(Some("4"), 25, PAGE_SIZE),
            Err(CoreError::NotFoundByKey { entity: "Page", .. })
        );
        assert_matches!(resolve_page(Some("0"), 25, PAGE_SIZE), Err(_));
        assert_matches!(resolve_page(Some("two"), 25, PAGE_SIZE), Err(_));
    }

    #[test]
    fn test_exact_multiple_of_page_size() {
        let page = resolve_page(Some("2"), 24, PAGE_SIZE).unwrap();
        assert_eq!(page.total_pages, 2);
        assert!(resolve_page(Some("3"), 24, PAGE_SIZE).is_err());
    }

    #[test]
    fn test_text_query() {
        let query = TextQuery::from_pairs(&pairs(&[("q", "Gloria"), ("page", "")]));
        assert_eq!(query.text, "Gloria");
        assert_eq!(resolve_page(query.page.as_deref(), 3, MY_SONGS_PAGE_SIZE).unwrap().number, 1);
    }
}
