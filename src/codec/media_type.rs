//! Minimal media-type parsing for codec lookup.
//!
//! Only the `type/subtype` essence matters for dispatch; parameters such as
//! `charset` are kept for inspection but never influence the codec.

use std::fmt;

/// A parsed `type/subtype; name=value` media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub type_: String,
    pub subtype: String,
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Parses a `Content-Type` header value.
    ///
    /// Type and subtype are lowercased. Returns `None` when there is no
    /// `type/subtype` pair before the first `;`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        let essence = parts.next()?.trim();

        let (type_, subtype) = essence.split_once('/')?;
        let type_ = type_.trim();
        let subtype = subtype.trim();
        if type_.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return None;
        }

        let params = parts
            .filter_map(|param| {
                let (name, value) = param.split_once('=')?;
                Some((
                    name.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                ))
            })
            .collect();

        Some(Self {
            type_: type_.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    /// The directive-free `type/subtype` form.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `application/json` or any `application/*+json` structured-syntax type.
    pub fn is_json(&self) -> bool {
        self.type_ == "application" && (self.subtype == "json" || self.subtype.ends_with("+json"))
    }

    pub fn is_octet_stream(&self) -> bool {
        self.type_ == "application" && self.subtype == "octet-stream"
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.params {
            write!(f, "; {}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let mt = MediaType::parse("application/json").unwrap();
        assert_eq!(mt.type_, "application");
        assert_eq!(mt.subtype, "json");
        assert!(mt.params.is_empty());
    }

    #[test]
    fn test_parse_strips_directives() {
        let mt = MediaType::parse("application/json; charset=utf-8").unwrap();
        assert_eq!(mt.essence(), "application/json");
        assert_eq!(mt.param("charset"), Some("utf-8"));
        assert_eq!(mt.param("CHARSET"), Some("utf-8"));
    }

    #[test]
    fn test_parse_quoted_param() {
        let mt = MediaType::parse("application/octet-stream; version=\"1.0\"").unwrap();
        assert_eq!(mt.param("version"), Some("1.0"));
        assert_eq!(mt.to_string(), "application/octet-stream; version=1.0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(MediaType::parse("").is_none());
        assert!(MediaType::parse("json").is_none());
        assert!(MediaType::parse("application/").is_none());
        assert!(MediaType::parse("/json").is_none());
        assert!(MediaType::parse("a/b/c").is_none());
    }

    #[test]
    fn test_json_family() {
        assert!(MediaType::parse("application/json").unwrap().is_json());
        assert!(MediaType::parse("Application/JSON").unwrap().is_json());
        assert!(MediaType::parse("application/vnd.something+json")
            .unwrap()
            .is_json());
        assert!(!MediaType::parse("text/json").unwrap().is_json());
        assert!(!MediaType::parse("application/jsonx").unwrap().is_json());
    }
}
