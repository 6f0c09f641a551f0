use thiserror::Error;

use crate::wire::StyleGroup;

/// Failures of the generation backend itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("backend configuration error: {0}")]
    Config(String),
    #[error("backend rate limited: {0}")]
    RateLimited(String),
    #[error("backend returned no content")]
    NoContent,
    #[error("backend error: {0}")]
    Backend(String),
}

/// The model answered, but not with the five-variation contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("malformed model output: {0}")]
    Malformed(String),
    #[error("invalid response structure: {0}")]
    InvalidStructure(String),
    #[error("variation {index} is missing string field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("variation {index} has unknown style group `{value}`")]
    UnknownStyle { index: usize, value: String },
    #[error("style group {0:?} appears more than once")]
    DuplicateStyle(StyleGroup),
    #[error("style group {0:?} is missing")]
    MissingStyle(StyleGroup),
    #[error("{style:?} {field} is {len} characters, limit {limit}")]
    LimitExceeded { style: StyleGroup, field: &'static str, len: usize, limit: usize },
    #[error("backend returned no content")]
    Empty,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credit limit reached ({used}/{limit})")]
    LimitReached { used: u32, limit: u32 },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Other(String),
}

/// End-to-end failure taxonomy of one generation call.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("missing required fields")]
    MissingFields,
    #[error("unauthorized")]
    Unauthorized,
    #[error("credit limit reached ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },
    #[error("generation backend misconfigured: {0}")]
    BackendConfig(String),
    #[error("generation backend rate limited: {0}")]
    RateLimited(String),
    #[error("generation backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<ProviderError> for GenError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Config(m) => GenError::BackendConfig(m),
            ProviderError::RateLimited(m) => GenError::RateLimited(m),
            ProviderError::NoContent => GenError::Contract(ContractViolation::Empty),
            ProviderError::Backend(m) => GenError::Backend(m),
        }
    }
}
