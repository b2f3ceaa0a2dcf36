use std::borrow::Borrow;
use time::format_description::well_known::Rfc3339;

use crate::tags::normalize_tags;
use crate::{IndexStore, Item};

/// Build a fresh index snapshot from catalog items.
///
/// Always starts from empty maps, so repeated builds over the same items
/// never accumulate duplicates. Items are taken as-is: shape validation is
/// the catalog's job.
pub fn build_index<I, T>(items: I) -> IndexStore
where
    I: IntoIterator<Item = T>,
    T: Borrow<Item>,
{
    let mut store = IndexStore::new();
    for item in items {
        let item = item.borrow();
        let id = &item.id;
        let categories = normalize_tags(&item.categories);
        let keywords = normalize_tags(&item.keywords);

        for category in &categories {
            store.by_category.entry(category.clone()).or_default().push(id.clone());
        }
        for keyword in &keywords {
            store.by_keyword.entry(keyword.clone()).or_default().push(id.clone());
        }
        store.by_placement.entry(item.placement.clone()).or_default().push(id.clone());

        let dims = (categories.len() + keywords.len()) as u32;
        store.dimension_count.insert(id.clone(), dims);
        if dims == 0 {
            store.untargeted.insert(id.clone(), 0.0);
        }
    }
    store.built_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    tracing::debug!(
        items = store.dimension_count.len(),
        placements = store.by_placement.len(),
        untargeted = store.untargeted.len(),
        "index built"
    );
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dimension, ItemStatus};

    fn item(id: &str, placement: &str, categories: &[&str], keywords: &[&str]) -> Item {
        Item {
            id: id.into(),
            name: format!("item {id}"),
            advertiser_id: "adv1".into(),
            bid: 1.0,
            budget: 1000.0,
            placement: placement.into(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            status: ItemStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn registers_every_dimension() {
        let items = vec![
            item("a", "homepage_top", &["sports"], &["sale"]),
            item("b", "homepage_top", &[], &[]),
            item("c", "video_preroll", &["Sports"], &[]),
        ];
        let store = build_index(&items);
        assert_eq!(store.lookup(Dimension::Category, "sports"), &["a".to_string(), "c".to_string()]);
        assert_eq!(store.lookup(Dimension::Keyword, "sale"), &["a".to_string()]);
        assert_eq!(store.lookup(Dimension::Placement, "homepage_top"), &["a".to_string(), "b".to_string()]);
        assert_eq!(store.dimension_count("a"), 2);
        assert_eq!(store.dimension_count("b"), 0);
        assert_eq!(store.base_score("b"), Some(0.0));
        assert_eq!(store.base_score("a"), None);
    }

    #[test]
    fn repeated_tag_registers_once() {
        let items = vec![item("a", "homepage_top", &["sports", "SPORTS"], &["deal", "deal"])];
        let store = build_index(&items);
        assert_eq!(store.lookup(Dimension::Category, "sports").len(), 1);
        assert_eq!(store.lookup(Dimension::Keyword, "deal").len(), 1);
        assert_eq!(store.dimension_count("a"), 2);
    }

    #[test]
    fn rebuilding_does_not_accumulate() {
        let items = vec![item("a", "homepage_top", &["sports"], &[])];
        let _first = build_index(&items);
        let second = build_index(&items);
        assert_eq!(second.lookup(Dimension::Category, "sports").len(), 1);
        assert_eq!(second.lookup(Dimension::Placement, "homepage_top").len(), 1);
    }

    #[test]
    fn blank_tags_leave_an_item_untargeted() {
        let items = vec![item("a", "homepage_top", &[" ", ""], &["\t"])];
        let store = build_index(&items);
        assert_eq!(store.dimension_count("a"), 0);
        assert_eq!(store.base_score("a"), Some(0.0));
        assert!(store.lookup(Dimension::Category, "").is_empty());
    }

    #[test]
    fn item_without_placement_is_accepted() {
        let items = vec![item("a", "", &[], &["sale"])];
        let store = build_index(&items);
        assert_eq!(store.lookup(Dimension::Placement, ""), &["a".to_string()]);
        assert_eq!(store.stats().num_items, 1);
    }
}
