use lazy_static::lazy_static;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref PLACEMENTS: HashSet<&'static str> = {
        let names: &[&str] = &[
            "homepage_sidebar", "video_preroll", "article_inline_1", "mobile_sticky",
            "footer_banner", "homepage_top", "article_inline_2",
        ];
        names.iter().copied().collect()
    };
}

/// Placement slots that line items may be created for.
pub fn is_known_placement(placement: &str) -> bool { PLACEMENTS.contains(placement) }

/// Normalize a keyword or category tag: NFKC, trimmed, lowercased.
/// Used on both sides (index build and request) so lookups agree.
pub fn normalize_tag(tag: &str) -> String {
    tag.nfkc().collect::<String>().trim().to_lowercase()
}

/// Normalize a tag list, dropping empties and repeats while keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = normalize_tag(tag);
        if t.is_empty() { continue; }
        if seen.insert(t.clone()) { out.push(t); }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_width() {
        assert_eq!(normalize_tag("  Sports "), "sports");
        // fullwidth letters fold under NFKC
        assert_eq!(normalize_tag("ＳＡＬＥ"), "sale");
    }

    #[test]
    fn drops_repeats_and_blanks() {
        let tags = vec!["Deal".to_string(), "deal".to_string(), " ".to_string(), "new".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["deal".to_string(), "new".to_string()]);
    }

    #[test]
    fn knows_placements() {
        assert!(is_known_placement("homepage_top"));
        assert!(!is_known_placement("Homepage_Top"));
    }
}
