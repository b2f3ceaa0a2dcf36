use serde::{Deserialize, Serialize};

use crate::tags::is_known_placement;
use crate::CatalogError;

pub type ItemId = String;

pub const MIN_BID: f64 = 0.1;
pub const MAX_BID: f64 = 10.0;
pub const MIN_BUDGET: f64 = 1000.0;
pub const MAX_BUDGET: f64 = 10000.0;
const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

/// A line item: one advertisable unit with its bid and targeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub advertiser_id: String,
    pub bid: f64,
    pub budget: f64,
    pub placement: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Payload for creating a line item; ids and timestamps are assigned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreate {
    pub name: String,
    pub advertiser_id: String,
    pub bid: f64,
    pub budget: f64,
    pub placement: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ItemCreate {
    pub fn validate(&self) -> Result<(), CatalogError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_CHARS {
            return Err(CatalogError::invalid("name", format!("must be 1..={MAX_NAME_CHARS} characters")));
        }
        if self.advertiser_id.trim().is_empty() {
            return Err(CatalogError::invalid("advertiser_id", "is required"));
        }
        // NaN fails both comparisons, so it is rejected here too
        if !(self.bid >= MIN_BID && self.bid <= MAX_BID) {
            return Err(CatalogError::invalid("bid", format!("must be within [{MIN_BID}, {MAX_BID}]")));
        }
        if !(self.budget >= MIN_BUDGET && self.budget <= MAX_BUDGET) {
            return Err(CatalogError::invalid("budget", format!("must be within [{MIN_BUDGET}, {MAX_BUDGET}]")));
        }
        if !is_known_placement(&self.placement) {
            return Err(CatalogError::invalid("placement", format!("unknown placement '{}'", self.placement)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> ItemCreate {
        ItemCreate {
            name: "Summer Sale Banner".into(),
            advertiser_id: "adv123".into(),
            bid: 2.5,
            budget: 3000.0,
            placement: "homepage_top".into(),
            categories: vec!["electronics".into()],
            keywords: vec![],
        }
    }

    #[test]
    fn accepts_valid_create() {
        assert!(create().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_bid() {
        let mut c = create();
        c.bid = 12.0;
        let err = c.validate().unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { field: "bid", .. }));
        c.bid = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_unknown_placement() {
        let mut c = create();
        c.placement = "sidebar".into();
        assert!(matches!(c.validate(), Err(CatalogError::Invalid { field: "placement", .. })));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ItemStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }
}
