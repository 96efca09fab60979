use serde_json::{Map, Value};
use uuid::Uuid;

/// Stored payload: a JSON object or a raw byte sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Json(Map<String, Value>),
    Binary(Vec<u8>),
}

impl Content {
    pub fn is_json(&self) -> bool {
        matches!(self, Content::Json(_))
    }

    /// Returns the JSON object, if this is JSON content.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Content::Json(map) => Some(map),
            Content::Binary(_) => None,
        }
    }
}

/// A native document as received from an upstream system.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub content: Content,
    /// Content type exactly as supplied by the writer, directives included.
    pub content_type: String,
    pub origin_system_id: Option<String>,
}

impl Resource {
    /// Wraps decoded content into a resource.
    ///
    /// An empty origin system id is treated as absent.
    pub fn wrap(
        content: Content,
        id: impl Into<String>,
        content_type: impl Into<String>,
        origin_system_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            content_type: content_type.into(),
            origin_system_id: origin_system_id.filter(|s| !s.is_empty()),
        }
    }
}

/// Checks that `id` is a lowercase, hyphenated UUID with a version nibble in 1..=5.
pub fn is_valid_id(id: &str) -> bool {
    if id.len() != 36 {
        return false;
    }

    match Uuid::try_parse(id) {
        Ok(uuid) => {
            uuid.hyphenated().to_string() == id && (1..=5).contains(&uuid.get_version_num())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_id("cda5d6a9-cd25-4d76-8bad-9eaa35e85f4a"));
        assert!(is_valid_id("9f365884-0c25-11e8-bb4c-12ab2b8e2c0b"));
        assert!(is_valid_id("12345678-1234-5234-9234-123456789012"));
    }

    #[test]
    fn test_invalid_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("a-real-uuid"));
        // Uppercase hex is rejected
        assert!(!is_valid_id("CDA5D6A9-CD25-4D76-8BAD-9EAA35E85F4A"));
        // Version nibble out of range
        assert!(!is_valid_id("cda5d6a9-cd25-0d76-8bad-9eaa35e85f4a"));
        assert!(!is_valid_id("cda5d6a9-cd25-6d76-8bad-9eaa35e85f4a"));
        // Not hyphenated
        assert!(!is_valid_id("cda5d6a9cd254d768bad9eaa35e85f4a"));
        assert!(!is_valid_id("{cda5d6a9-cd25-4d76-8bad-9eaa35e85f4}"));
    }

    #[test]
    fn test_wrap_drops_empty_origin() {
        let resource = Resource::wrap(
            Content::Binary(b"abc".to_vec()),
            "cda5d6a9-cd25-4d76-8bad-9eaa35e85f4a",
            "application/octet-stream",
            Some(String::new()),
        );
        assert_eq!(resource.origin_system_id, None);
        assert_eq!(resource.content_type, "application/octet-stream");
    }

    #[test]
    fn test_content_as_object() {
        let Value::Object(map) = json!({"foo": 1}) else {
            panic!("expected object");
        };
        assert!(Content::Json(map).as_object().is_some());
        assert!(Content::Binary(vec![1]).as_object().is_none());
    }
}
