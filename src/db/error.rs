/// Errors surfaced by the document store.
///
/// "Document not found" is not an error; reads return `Ok(None)` for it.
#[derive(Debug)]
pub enum StoreError {
    /// The connection could not be established, or is not established yet.
    ConnectionUnavailable(String),
    /// The collection is not on the allow-list.
    CollectionNotAllowed(String),
    /// The backing store rejected or failed an operation.
    Backend(sqlx::Error),
    /// A stored JSON document could not be parsed back.
    CorruptContent(String, serde_json::Error),
    /// A JSON document could not be serialized for storage.
    Encode(String, serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ConnectionUnavailable(e) => {
                write!(f, "Database connection unavailable: {}", e)
            }
            StoreError::CollectionNotAllowed(c) => write!(f, "Collection not supported: {}", c),
            StoreError::Backend(e) => write!(f, "Database error: {}", e),
            StoreError::CorruptContent(id, e) => {
                write!(f, "Stored content for {} is not valid JSON: {}", id, e)
            }
            StoreError::Encode(id, e) => {
                write!(f, "Content for {} could not be serialized: {}", id, e)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Backend(e) => Some(e),
            StoreError::CorruptContent(_, e) | StoreError::Encode(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e)
    }
}
