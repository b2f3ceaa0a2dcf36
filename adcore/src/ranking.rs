use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::tags::normalize_tag;
use crate::{Dimension, IndexStore, Item, ItemId, ItemLookup, ItemStatus};

pub const DEFAULT_SERVE_BASE_URL: &str = "https://content.realtimemediatool.com/data";
pub const DEFAULT_MIN_SCORE: f64 = 0.01;
pub const DEFAULT_BUCKET_WIDTH: f64 = 0.50;

/// Relevance credited per matched targeting dimension, out of 100.
const RELEVANCE_PER_DIMENSION: u32 = 50;
const MAX_RELEVANCE: u32 = 100;

/// Additive score coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub keyword: f64,
    pub category: f64,
    /// Full-match bonus, once all of an item's tags matched.
    pub param: f64,
    /// Bid-leader bonus.
    pub bid: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self { Self { keyword: 5.0, category: 5.0, param: 5.0, bid: 6.0 } }
}

impl ScoringWeights {
    /// Highest score a candidate can reach from a zero base score.
    pub fn max_score(&self) -> f64 {
        self.keyword.max(0.0) + self.category.max(0.0) + self.param.max(0.0) + self.bid.max(0.0)
    }
}

/// Score range partitioning used for top-K selection. Only built through
/// [`BucketLayout::new`], which keeps at least one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLayout {
    min_score: f64,
    width: f64,
    count: usize,
}

impl BucketLayout {
    /// `ceil((max_score - min_score) / width)` buckets, at least one.
    /// A non-positive width collapses everything into a single bucket.
    pub fn new(min_score: f64, max_score: f64, width: f64) -> Self {
        if !(width > 0.0) {
            return Self { min_score, width: 1.0, count: 1 };
        }
        let count = ((max_score - min_score) / width).ceil();
        let count = if count.is_finite() && count >= 1.0 { count as usize } else { 1 };
        Self { min_score, width, count }
    }

    /// Buckets spanning every score reachable under `weights`, so the top
    /// bucket does not swallow unrelated scores.
    pub fn for_weights(weights: &ScoringWeights) -> Self {
        Self::new(DEFAULT_MIN_SCORE, weights.max_score(), DEFAULT_BUCKET_WIDTH)
    }

    pub fn min_score(&self) -> f64 { self.min_score }

    pub fn width(&self) -> f64 { self.width }

    pub fn count(&self) -> usize { self.count }

    pub fn index_of(&self, score: f64) -> usize {
        let raw = ((score - self.min_score) / self.width).floor();
        if !(raw > 0.0) {
            0
        } else {
            (raw as usize).min(self.count - 1)
        }
    }
}

/// One ranking request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdQuery {
    pub placement: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub category: String,
    pub limit: usize,
}

impl AdQuery {
    pub fn new(placement: impl Into<String>, limit: usize) -> Self {
        Self { placement: placement.into(), limit, ..Self::default() }
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A selected ad, ready to serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub id: ItemId,
    pub name: String,
    pub advertiser_id: String,
    pub bid: f64,
    pub placement: String,
    pub serve_url: String,
    pub relevance: u32,
    pub score: f64,
}

/// Scores indexed candidates for a request and picks the top winners.
#[derive(Debug, Clone)]
pub struct RankingEngine {
    weights: ScoringWeights,
    layout: BucketLayout,
    serve_base_url: String,
}

impl Default for RankingEngine {
    fn default() -> Self { Self::new(ScoringWeights::default()) }
}

impl RankingEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            layout: BucketLayout::for_weights(&weights),
            weights,
            serve_base_url: DEFAULT_SERVE_BASE_URL.to_string(),
        }
    }

    pub fn with_layout(mut self, layout: BucketLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_serve_base_url(mut self, base: impl Into<String>) -> Self {
        self.serve_base_url = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn weights(&self) -> &ScoringWeights { &self.weights }

    pub fn layout(&self) -> &BucketLayout { &self.layout }

    pub fn serve_url(&self, id: &str) -> String { format!("{}/{}", self.serve_base_url, id) }

    /// Rank the candidates of `query.placement`. Never fails: unknown
    /// placements, keywords or categories just yield fewer winners.
    pub fn rank<L>(&self, index: &IndexStore, catalog: &L, query: &AdQuery) -> Vec<Winner>
    where
        L: ItemLookup + ?Sized,
    {
        if query.limit == 0 || index.lookup(Dimension::Placement, &query.placement).is_empty() {
            return Vec::new();
        }

        let mut pass = RankPass::new(self, index, catalog, &query.placement);
        for (id, base) in index.copy_base_scores() {
            pass.seed(id, base);
        }

        let keyword = normalize_tag(&query.keyword);
        if !keyword.is_empty() {
            for id in index.lookup(Dimension::Keyword, &keyword) {
                pass.apply_match(id, self.weights.keyword);
            }
        }
        let category = normalize_tag(&query.category);
        if !category.is_empty() {
            for id in index.lookup(Dimension::Category, &category) {
                pass.apply_match(id, self.weights.category);
            }
        }
        pass.award_bid_leader();

        let winners = pass.select(query.limit);
        tracing::debug!(
            placement = %query.placement,
            keyword = %keyword,
            category = %category,
            candidates = pass.scores.len(),
            winners = winners.len(),
            epoch = index.epoch(),
            "ranked"
        );
        winners
    }
}

/// Scratch state owned by a single `rank` call.
struct RankPass<'a, L: ?Sized> {
    engine: &'a RankingEngine,
    index: &'a IndexStore,
    catalog: &'a L,
    placement: &'a str,
    eligible: HashMap<ItemId, Option<Arc<Item>>>,
    scores: HashMap<ItemId, f64>,
    matched: HashMap<ItemId, u32>,
    full_matched: HashSet<ItemId>,
    leader: Option<(ItemId, f64)>,
    buckets: Vec<Vec<ItemId>>,
}

impl<'a, L> RankPass<'a, L>
where
    L: ItemLookup + ?Sized,
{
    fn new(engine: &'a RankingEngine, index: &'a IndexStore, catalog: &'a L, placement: &'a str) -> Self {
        Self {
            engine,
            index,
            catalog,
            placement,
            eligible: HashMap::new(),
            scores: HashMap::new(),
            matched: HashMap::new(),
            full_matched: HashSet::new(),
            leader: None,
            buckets: vec![Vec::new(); engine.layout.count],
        }
    }

    /// Catalog item for `id` if it can serve this placement right now.
    fn eligible(&mut self, id: &str) -> Option<Arc<Item>> {
        if let Some(cached) = self.eligible.get(id) {
            return cached.clone();
        }
        let item = self
            .catalog
            .get_by_id(id)
            .filter(|item| item.placement == self.placement && item.status == ItemStatus::Active);
        self.eligible.insert(id.to_string(), item.clone());
        item
    }

    fn seed(&mut self, id: ItemId, base: f64) {
        let Some(item) = self.eligible(&id) else { return };
        self.scores.insert(id.clone(), base);
        self.consider_leader(&id, item.bid);
        self.insert_into_bucket(id, base);
    }

    fn apply_match(&mut self, id: &ItemId, weight: f64) {
        let Some(item) = self.eligible(id) else { return };
        let score = self.scores.entry(id.clone()).or_insert(0.0);
        *score += weight;
        let count = self.matched.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count == self.index.dimension_count(id) && self.full_matched.insert(id.clone()) {
            *score += self.engine.weights.param;
        }
        let score = *score;
        self.consider_leader(id, item.bid);
        self.insert_into_bucket(id.clone(), score);
    }

    /// Strictly higher bid takes the lead, so the first-seen candidate keeps ties.
    fn consider_leader(&mut self, id: &str, bid: f64) {
        let ahead = match &self.leader {
            Some((_, best)) => bid > *best,
            None => true,
        };
        if ahead {
            self.leader = Some((id.to_string(), bid));
        }
    }

    fn award_bid_leader(&mut self) {
        let Some((id, _)) = self.leader.take() else { return };
        let Some(score) = self.scores.get_mut(&id) else { return };
        *score += self.engine.weights.bid;
        let score = *score;
        self.insert_into_bucket(id, score);
    }

    fn insert_into_bucket(&mut self, id: ItemId, score: f64) {
        let idx = self.engine.layout.index_of(score);
        self.buckets[idx].push(id);
    }

    fn relevance(&self, id: &str) -> u32 {
        let matched = self.matched.get(id).copied().unwrap_or(0);
        matched.saturating_mul(RELEVANCE_PER_DIMENSION).min(MAX_RELEVANCE)
    }

    /// Walk buckets from the top, ordering each by score then id. Entries
    /// left behind by earlier, lower scores are skipped: only the bucket an
    /// id's final score maps to counts.
    fn select(&self, limit: usize) -> Vec<Winner> {
        let layout = &self.engine.layout;
        let mut out = Vec::with_capacity(limit.min(self.scores.len()));
        for (idx, bucket) in self.buckets.iter().enumerate().rev() {
            if bucket.is_empty() { continue; }
            let mut members: Vec<(&ItemId, f64)> = bucket
                .iter()
                .map(|id| (id, self.scores[id]))
                .filter(|(_, score)| layout.index_of(*score) == idx)
                .collect();
            members.sort_by(|a, b| match b.1.total_cmp(&a.1) {
                Ordering::Equal => a.0.cmp(b.0),
                other => other,
            });
            members.dedup_by(|a, b| a.0 == b.0);

            for (id, score) in members {
                if let Some(Some(item)) = self.eligible.get(id) {
                    out.push(Winner {
                        id: id.clone(),
                        name: item.name.clone(),
                        advertiser_id: item.advertiser_id.clone(),
                        bid: item.bid,
                        placement: item.placement.clone(),
                        serve_url: self.engine.serve_url(id),
                        relevance: self.relevance(id),
                        score,
                    });
                }
                if out.len() == limit {
                    return out;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_covers_all_weights() {
        let layout = BucketLayout::for_weights(&ScoringWeights::default());
        // (21 - 0.01) / 0.5 rounded up
        assert_eq!(layout.count(), 42);
        assert_eq!(layout.index_of(21.0), 41);
        assert_eq!(layout.index_of(0.0), 0);
        assert_eq!(layout.index_of(-3.0), 0);
        assert_eq!(layout.index_of(500.0), 41);
    }

    #[test]
    fn bid_range_layout_saturates_above_max_bid() {
        let layout = BucketLayout::new(0.01, 10.0, 0.5);
        assert_eq!(layout.count(), 20);
        assert_eq!(layout.index_of(10.0), 19);
        assert_eq!(layout.index_of(16.0), 19);
    }

    #[test]
    fn degenerate_layouts_have_one_bucket() {
        assert_eq!(BucketLayout::new(0.01, 10.0, 0.0).count(), 1);
        assert_eq!(BucketLayout::new(5.0, 1.0, 0.5).count(), 1);
        assert_eq!(BucketLayout::new(5.0, 1.0, 0.5).index_of(100.0), 0);
    }

    #[test]
    fn empty_score_range_still_ranks() {
        use crate::{build_index, InMemoryCatalog, Item};

        let layout = BucketLayout::new(0.01, 0.01, 0.5);
        assert_eq!(layout.count(), 1);
        let engine = RankingEngine::default().with_layout(layout);
        let catalog = InMemoryCatalog::new();
        for (id, bid) in [("li_a", 1.0), ("li_b", 2.0)] {
            catalog.insert(Item {
                id: id.into(),
                name: id.into(),
                advertiser_id: "adv".into(),
                bid,
                budget: 1000.0,
                placement: "homepage_top".into(),
                categories: vec![],
                keywords: vec![],
                status: ItemStatus::Active,
                created_at: String::new(),
                updated_at: String::new(),
            });
        }
        let index = build_index(catalog.snapshot());
        let winners = engine.rank(&index, &catalog, &AdQuery::new("homepage_top", 4));
        let ids: Vec<&str> = winners.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["li_b", "li_a"]);
    }

    #[test]
    fn serve_url_is_templated_from_id() {
        let engine = RankingEngine::default().with_serve_base_url("https://cdn.example.com/ads/");
        assert_eq!(engine.serve_url("li_1"), "https://cdn.example.com/ads/li_1");
    }

    #[test]
    fn query_builder_sets_fields() {
        let q = AdQuery::new("homepage_top", 4).keyword("sale").category("sports");
        assert_eq!(q.placement, "homepage_top");
        assert_eq!(q.keyword, "sale");
        assert_eq!(q.category, "sports");
        assert_eq!(q.limit, 4);
    }
}
