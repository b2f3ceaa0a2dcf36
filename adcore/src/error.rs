use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("line item not found: {0}")]
    NotFound(String),
}

impl CatalogError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CatalogError::Invalid { field, reason: reason.into() }
    }
}
