use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::ItemId;

/// Targeting dimension an id list is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Keyword,
    Category,
    Placement,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub epoch: u64,
    pub built_at: String,
    pub num_items: usize,
    pub num_placements: usize,
    pub num_keywords: usize,
    pub num_categories: usize,
    pub num_untargeted: usize,
}

/// Inverted indices over the catalog for one serving epoch.
///
/// A store is never mutated after it is built; a rebuild produces a new one
/// which is swapped in through [`crate::IndexHandle`].
#[derive(Debug, Default)]
pub struct IndexStore {
    pub(crate) by_keyword: HashMap<String, Vec<ItemId>>,
    pub(crate) by_category: HashMap<String, Vec<ItemId>>,
    pub(crate) by_placement: HashMap<String, Vec<ItemId>>, // insertion order
    pub(crate) untargeted: BTreeMap<ItemId, f64>,
    pub(crate) dimension_count: HashMap<ItemId, u32>,
    pub(crate) epoch: u64,
    pub(crate) built_at: String,
}

impl IndexStore {
    pub fn new() -> Self { Self::default() }

    /// Ids registered under `key`; unknown keys yield an empty slice.
    pub fn lookup(&self, dimension: Dimension, key: &str) -> &[ItemId] {
        let map = match dimension {
            Dimension::Keyword => &self.by_keyword,
            Dimension::Category => &self.by_category,
            Dimension::Placement => &self.by_placement,
        };
        map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn base_score(&self, id: &str) -> Option<f64> { self.untargeted.get(id).copied() }

    pub fn dimension_count(&self, id: &str) -> u32 { self.dimension_count.get(id).copied().unwrap_or(0) }

    /// Fresh copy of the untargeted base scores, ordered by id. Ranking seeds
    /// its per-request accumulator from this, never from the shared map.
    pub fn copy_base_scores(&self) -> BTreeMap<ItemId, f64> { self.untargeted.clone() }

    pub fn epoch(&self) -> u64 { self.epoch }

    pub fn built_at(&self) -> &str { &self.built_at }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            epoch: self.epoch,
            built_at: self.built_at.clone(),
            num_items: self.dimension_count.len(),
            num_placements: self.by_placement.len(),
            num_keywords: self.by_keyword.len(),
            num_categories: self.by_category.len(),
            num_untargeted: self.untargeted.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_answers_without_errors() {
        let store = IndexStore::new();
        assert!(store.lookup(Dimension::Keyword, "sale").is_empty());
        assert!(store.lookup(Dimension::Placement, "homepage_top").is_empty());
        assert_eq!(store.base_score("li_x"), None);
        assert_eq!(store.dimension_count("li_x"), 0);
        assert!(store.copy_base_scores().is_empty());
    }

    #[test]
    fn copied_base_scores_are_detached() {
        let mut store = IndexStore::new();
        store.untargeted.insert("li_b".into(), 0.0);
        let mut copy = store.copy_base_scores();
        *copy.get_mut("li_b").unwrap() += 6.0;
        assert_eq!(store.base_score("li_b"), Some(0.0));
    }
}
