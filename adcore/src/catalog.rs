use parking_lot::RwLock;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

use crate::{CatalogError, Item, ItemCreate, ItemId, ItemStatus};

/// Read access to line items by id, as needed while assembling winners.
pub trait ItemLookup {
    fn get_by_id(&self, id: &str) -> Option<Arc<Item>>;
}

impl ItemLookup for HashMap<ItemId, Arc<Item>> {
    fn get_by_id(&self, id: &str) -> Option<Arc<Item>> { self.get(id).cloned() }
}

/// Optional filters for listing line items.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ItemFilter {
    pub advertiser_id: Option<String>,
    pub placement: Option<String>,
}

impl ItemFilter {
    fn matches(&self, item: &Item) -> bool {
        self.advertiser_id.as_deref().map_or(true, |a| item.advertiser_id == a)
            && self.placement.as_deref().map_or(true, |p| item.placement == p)
    }
}

/// Process-local catalog of line items.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<ItemId, Arc<Item>>>,
    seq: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    /// Validate and store a new active line item.
    pub fn create(&self, input: ItemCreate) -> Result<Arc<Item>, CatalogError> {
        input.validate()?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let now = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        let item = Item {
            id: derive_id(&input.advertiser_id, &input.name, seq),
            name: input.name,
            advertiser_id: input.advertiser_id,
            bid: input.bid,
            budget: input.budget,
            placement: input.placement,
            categories: input.categories,
            keywords: input.keywords,
            status: ItemStatus::Active,
            created_at: now.clone(),
            updated_at: now,
        };
        Ok(self.insert(item))
    }

    /// Store an item exactly as given, replacing any item with the same id.
    pub fn insert(&self, item: Item) -> Arc<Item> {
        let item = Arc::new(item);
        self.items.write().insert(item.id.clone(), item.clone());
        item
    }

    pub fn get(&self, id: &str) -> Result<Arc<Item>, CatalogError> {
        self.get_by_id(id).ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &ItemFilter) -> Vec<Arc<Item>> {
        let mut out: Vec<Arc<Item>> = self.items.read().values().filter(|i| filter.matches(i)).cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// All items, for index builds.
    pub fn snapshot(&self) -> Vec<Arc<Item>> { self.items.read().values().cloned().collect() }

    pub fn len(&self) -> usize { self.items.read().len() }

    pub fn is_empty(&self) -> bool { self.items.read().is_empty() }
}

impl ItemLookup for InMemoryCatalog {
    fn get_by_id(&self, id: &str) -> Option<Arc<Item>> { self.items.read().get(id).cloned() }
}

fn derive_id(advertiser_id: &str, name: &str, seq: u64) -> ItemId {
    let mut hasher = Sha1::new();
    hasher.update(advertiser_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(name.as_bytes());
    hasher.update(b"\n");
    hasher.update(seq.to_le_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!("li_{}", &hex[..16])
}
