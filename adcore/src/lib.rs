//! In-memory targeting index and ranking engine for ad selection.

pub mod builder;
pub mod catalog;
pub mod error;
pub mod feed;
pub mod index;
pub mod item;
pub mod ranking;
pub mod snapshot;
pub mod tags;

pub use builder::build_index;
pub use catalog::{InMemoryCatalog, ItemFilter, ItemLookup};
pub use error::CatalogError;
pub use index::{Dimension, IndexStats, IndexStore};
pub use item::{Item, ItemCreate, ItemId, ItemStatus};
pub use ranking::{AdQuery, BucketLayout, RankingEngine, ScoringWeights, Winner};
pub use snapshot::IndexHandle;
