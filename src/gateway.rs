//! Access gateway: the operations the HTTP layer (and the admin CLI) call.
//!
//! Validates the collection and id, applies the codec registry and runs the
//! merge-patch for partial updates. Never touches the store for a request
//! that fails validation.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha224};
use tokio_util::sync::CancellationToken;

use crate::codec::{decoder_for, encoder_for, CodecError, DEFAULT_CONTENT_TYPE};
use crate::db::{Connection, Db, IdStream, StoreError};
use crate::models::{is_valid_id, Content, Resource};
use crate::patch;

/// Errors returned by gateway operations.
#[derive(Debug)]
pub enum GatewayError {
    /// The store is not connected (yet).
    Unavailable(StoreError),
    /// Unknown collection or malformed id.
    InvalidAccess {
        collection: String,
        id: Option<String>,
    },
    /// Unsupported content type or malformed body.
    Codec(CodecError),
    /// Merge-patch needs JSON on both sides.
    PatchRequiresJson,
    /// The backing store failed.
    Store(StoreError),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Unavailable(e) => write!(f, "{}", e),
            GatewayError::InvalidAccess {
                collection,
                id: Some(id),
            } => write!(
                f,
                "Invalid collectionId ({}) or resourceId ({})",
                collection, id
            ),
            GatewayError::InvalidAccess {
                collection,
                id: None,
            } => write!(f, "Invalid collectionId ({})", collection),
            GatewayError::Codec(e) => write!(f, "{}", e),
            GatewayError::PatchRequiresJson => {
                write!(f, "Patching requires JSON content in both the request and the store")
            }
            GatewayError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Unavailable(e) | GatewayError::Store(e) => Some(e),
            GatewayError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConnectionUnavailable(_) => GatewayError::Unavailable(e),
            StoreError::CollectionNotAllowed(collection) => GatewayError::InvalidAccess {
                collection,
                id: None,
            },
            other => GatewayError::Store(other),
        }
    }
}

impl From<CodecError> for GatewayError {
    fn from(e: CodecError) -> Self {
        GatewayError::Codec(e)
    }
}

/// Outcome of comparing a client-supplied native hash with the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCheck {
    /// The stored content hashes to the supplied value.
    Matches,
    /// Different content, or nothing stored under the id.
    Mismatch,
}

/// An incoming document body with its headers.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    /// `Content-Type`; `None` stores the body as `application/octet-stream`.
    pub content_type: Option<&'a str>,
    pub origin_system_id: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct Gateway {
    db: Db,
}

impl Gateway {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Connection for a request on a single document.
    fn connection_for(&self, collection: &str, id: &str) -> Result<Connection, GatewayError> {
        let connection = self.db.try_open()?;
        if connection.is_supported(collection) && is_valid_id(id) {
            Ok(connection)
        } else {
            Err(GatewayError::InvalidAccess {
                collection: collection.to_string(),
                id: Some(id.to_string()),
            })
        }
    }

    /// Connection for a request on a whole collection.
    fn connection_for_collection(&self, collection: &str) -> Result<Connection, GatewayError> {
        let connection = self.db.try_open()?;
        if connection.is_supported(collection) {
            Ok(connection)
        } else {
            Err(GatewayError::InvalidAccess {
                collection: collection.to_string(),
                id: None,
            })
        }
    }

    pub async fn read(&self, collection: &str, id: &str) -> Result<Option<Resource>, GatewayError> {
        let connection = self.connection_for(collection, id)?;
        Ok(connection.read(collection, id).await?)
    }

    /// Decodes and upserts a document, returning what was stored.
    pub async fn write(
        &self,
        collection: &str,
        id: &str,
        payload: Payload<'_>,
    ) -> Result<Resource, GatewayError> {
        let connection = self.connection_for(collection, id)?;

        let content_type = payload.content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let content = decoder_for(content_type)?(payload.body)?;
        let resource = Resource::wrap(
            content,
            id,
            content_type,
            payload.origin_system_id.map(String::from),
        );

        connection.write(collection, &resource).await?;
        Ok(resource)
    }

    /// Compares `hash` against the native hash of the stored document.
    pub async fn check_native_hash(
        &self,
        collection: &str,
        id: &str,
        hash: &str,
    ) -> Result<HashCheck, GatewayError> {
        let connection = self.connection_for(collection, id)?;

        match connection.read(collection, id).await? {
            Some(existing) if native_hash(&existing.content) == hash.trim() => {
                Ok(HashCheck::Matches)
            }
            Some(_) => Ok(HashCheck::Mismatch),
            None => {
                tracing::warn!(
                    collection,
                    uuid = id,
                    "Native hash supplied but no native content is stored for this id"
                );
                Ok(HashCheck::Mismatch)
            }
        }
    }

    /// Merge-patches a stored JSON document. `Ok(None)` when nothing is stored.
    ///
    /// Only the content is recomputed; the stored content type and origin
    /// system id are kept.
    pub async fn patch(
        &self,
        collection: &str,
        id: &str,
        payload: Payload<'_>,
    ) -> Result<Option<Resource>, GatewayError> {
        let connection = self.connection_for(collection, id)?;

        let Some(mut resource) = connection.read(collection, id).await? else {
            return Ok(None);
        };

        let content_type = payload.content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let patch_content = decoder_for(content_type)?(payload.body)?;

        let (Content::Json(original), Content::Json(changes)) = (&resource.content, &patch_content)
        else {
            return Err(GatewayError::PatchRequiresJson);
        };

        resource.content = Content::Json(patch::merge(original, changes));
        connection.write(collection, &resource).await?;
        Ok(Some(resource))
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), GatewayError> {
        let connection = self.connection_for(collection, id)?;
        Ok(connection.delete(collection, id).await?)
    }

    /// Streams every id in the collection until exhausted or `token` fires.
    pub async fn ids(
        &self,
        collection: &str,
        token: CancellationToken,
    ) -> Result<IdStream, GatewayError> {
        let connection = self.connection_for_collection(collection)?;
        Ok(connection.read_ids(token, collection).await?)
    }
}

/// Encodes a stored resource using the codec for its own content type.
pub fn encode(resource: &Resource) -> Result<Vec<u8>, CodecError> {
    encoder_for(&resource.content_type)?(&resource.content)
}

/// SHA-224 hex digest of stored content, as upstream publishers compute it.
///
/// JSON content is hashed in its canonical (key-sorted, compact) form with
/// `<`, `>`, `&`, U+2028 and U+2029 escaped as `\uXXXX`. Binary content is
/// hashed as a quoted standard base64 string.
pub fn native_hash(content: &Content) -> String {
    let text = match content {
        Content::Json(map) => escape_html(&serde_json::Value::Object(map.clone()).to_string()),
        Content::Binary(bytes) => format!("\"{}\"", STANDARD.encode(bytes)),
    };
    format!("{:x}", Sha224::digest(text.as_bytes()))
}

// These characters only occur inside string literals of serialized JSON.
fn escape_html(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbSettings;
    use serde_json::json;
    use tempfile::TempDir;

    const ID: &str = "cda5d6a9-cd25-4d76-8bad-9eaa35e85f4a";

    async fn setup() -> (Gateway, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::connect(DbSettings::new(
            temp_dir.path().join("native.db"),
            vec!["methode".to_string()],
        ));
        db.open().await.unwrap();
        (Gateway::new(db), temp_dir)
    }

    fn json_payload(body: &[u8]) -> Payload<'_> {
        Payload {
            content_type: Some("application/json"),
            origin_system_id: Some("methode-web-pub"),
            body,
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (gateway, _temp) = setup().await;

        let stored = gateway
            .write("methode", ID, json_payload(br#"{"title":"hello"}"#))
            .await
            .unwrap();
        let loaded = gateway.read("methode", ID).await.unwrap().unwrap();

        assert_eq!(loaded, stored);
        assert_eq!(loaded.origin_system_id.as_deref(), Some("methode-web-pub"));
        assert_eq!(encode(&loaded).unwrap(), br#"{"title":"hello"}"#);
    }

    #[tokio::test]
    async fn test_write_without_content_type_defaults_to_binary() {
        let (gateway, _temp) = setup().await;

        let payload = Payload {
            content_type: None,
            origin_system_id: None,
            body: b"{\"looks\":\"like json\"}",
        };
        let stored = gateway.write("methode", ID, payload).await.unwrap();

        assert_eq!(stored.content_type, "application/octet-stream");
        assert_eq!(stored.content, Content::Binary(payload.body.to_vec()));
    }

    #[tokio::test]
    async fn test_write_keeps_header_verbatim() {
        let (gateway, _temp) = setup().await;
        let payload = Payload {
            content_type: Some("application/vnd.ft-upp-article+json; charset=utf-8"),
            origin_system_id: None,
            body: b"{}",
        };

        gateway.write("methode", ID, payload).await.unwrap();
        let loaded = gateway.read("methode", ID).await.unwrap().unwrap();
        assert_eq!(
            loaded.content_type,
            "application/vnd.ft-upp-article+json; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_invalid_access_rejected() {
        let (gateway, _temp) = setup().await;

        let err = gateway.read("unknown", ID).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAccess { .. }));

        let err = gateway.read("methode", "not-a-uuid").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAccess { id: Some(_), .. }));

        let err = gateway
            .ids("unknown", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAccess { id: None, .. }));
    }

    #[tokio::test]
    async fn test_unsupported_and_malformed_bodies() {
        let (gateway, _temp) = setup().await;

        let payload = Payload {
            content_type: Some("text/plain"),
            origin_system_id: None,
            body: b"hi",
        };
        let err = gateway.write("methode", ID, payload).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Codec(CodecError::UnsupportedContentType(_))
        ));

        let err = gateway
            .write("methode", ID, json_payload(b"{broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Codec(CodecError::Decode(_))));

        // Nothing was written
        assert!(gateway.read("methode", ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_merges_and_keeps_metadata() {
        let (gateway, _temp) = setup().await;
        gateway
            .write(
                "methode",
                ID,
                json_payload(br#"{"myInt":0,"myHash":{"myRemove":999},"keep":"x"}"#),
            )
            .await
            .unwrap();

        let patch = Payload {
            content_type: Some("application/json; charset=utf-8"),
            origin_system_id: Some("other-system"),
            body: br#"{"myInt":1,"myHash":{"myRemove":null},"added":[1]}"#,
        };
        let patched = gateway.patch("methode", ID, patch).await.unwrap().unwrap();

        let expected = json!({"myInt": 1, "keep": "x", "added": [1]});
        assert_eq!(patched.content.as_object(), expected.as_object());
        assert_eq!(patched.content_type, "application/json");
        assert_eq!(patched.origin_system_id.as_deref(), Some("methode-web-pub"));

        let loaded = gateway.read("methode", ID).await.unwrap().unwrap();
        assert_eq!(loaded, patched);
    }

    #[tokio::test]
    async fn test_patch_missing_document() {
        let (gateway, _temp) = setup().await;
        let result = gateway
            .patch("methode", ID, json_payload(b"{}"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_patch_binary_rejected() {
        let (gateway, _temp) = setup().await;
        let binary = Payload {
            content_type: Some("application/octet-stream"),
            origin_system_id: None,
            body: b"raw",
        };
        gateway.write("methode", ID, binary).await.unwrap();

        let err = gateway
            .patch("methode", ID, json_payload(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PatchRequiresJson));
    }

    #[tokio::test]
    async fn test_native_hash_check() {
        let (gateway, _temp) = setup().await;

        let check = gateway
            .check_native_hash("methode", ID, "anything")
            .await
            .unwrap();
        assert_eq!(check, HashCheck::Mismatch);

        let stored = gateway
            .write("methode", ID, json_payload(br#"{"b":1,"a":2}"#))
            .await
            .unwrap();
        let hash = native_hash(&stored.content);

        let check = gateway.check_native_hash("methode", ID, &hash).await.unwrap();
        assert_eq!(check, HashCheck::Matches);

        let check = gateway
            .check_native_hash("methode", ID, "deadbeef")
            .await
            .unwrap();
        assert_eq!(check, HashCheck::Mismatch);
    }

    #[test]
    fn test_native_hash_is_sha224_hex() {
        let serde_json::Value::Object(map) = json!({"b": 1, "a": 2}) else {
            panic!("expected object");
        };
        // SHA-224 of {"a":2,"b":1}
        assert_eq!(
            native_hash(&Content::Json(map)),
            "129c5fe98b5e5e0340768bdc39f7f66f9dc454a382163311ebaa15d1"
        );
    }

    #[test]
    fn test_native_hash_escapes_html_characters() {
        let serde_json::Value::Object(map) = json!({"body": "<p>Hi & bye</p>"}) else {
            panic!("expected object");
        };
        // SHA-224 of {"body":"\u003cp\u003eHi \u0026 bye\u003c/p\u003e"}
        assert_eq!(
            native_hash(&Content::Json(map)),
            "9ef712cc4211f7c71f9fdc6c0b2bc01326ce0e668d41a7ceb321f05e"
        );
        assert_eq!(
            escape_html("{\"k\":\"a\u{2028}b>\"}"),
            "{\"k\":\"a\\u2028b\\u003e\"}"
        );
    }

    #[test]
    fn test_native_hash_of_binary_is_quoted_base64() {
        // SHA-224 of "cmF3"
        assert_eq!(
            native_hash(&Content::Binary(b"raw".to_vec())),
            "99fd5795cd2ec3a24e97ee44ad36ceee432a4a19ec9d7cd2ea5f85f8"
        );
        // SHA-224 of ""
        assert_eq!(
            native_hash(&Content::Binary(Vec::new())),
            "106eab90d1bb9f41a6bc937ccb191f4ff67809fffb93ce4a6e81822d"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (gateway, _temp) = setup().await;
        gateway.delete("methode", ID).await.unwrap();
        gateway
            .write("methode", ID, json_payload(b"{}"))
            .await
            .unwrap();
        gateway.delete("methode", ID).await.unwrap();
        assert!(gateway.read("methode", ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_before_connect() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = DbSettings::new(
            temp_dir.path().join("missing").join("native.db"),
            vec!["methode".to_string()],
        );
        settings.retry_interval = std::time::Duration::from_millis(10);
        let gateway = Gateway::new(Db::connect(settings));

        let err = gateway.read("methode", ID).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }
}
