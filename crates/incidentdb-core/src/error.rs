use thiserror::Error;

/// Core retrieval error taxonomy.
///
/// `InvalidQuery` is rejected before any backend call; `Unavailable`
/// means the vector index, incident store or embedder could not serve
/// the request. Neither is retried internally. Index/store id drift is
/// deliberately NOT an error: it is recovered by omission in the store
/// adapter, and an empty result set is a valid outcome, not a failure.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
