use axum::extract::Query;
use axum::http::{HeaderMap, Uri, header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Query parameter that forces the body format
pub const FORMAT_PARAM: &str = "format";

/// Serialization format of a submitted configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    /// File suffix used for the transient file handed to the validator
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => ".json",
            Format::Yaml => ".yaml",
        }
    }

    /// Map an explicit format token (case-insensitive) to a format
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// Guess the format from a Content-Type value. YAML tokens win over JSON ones.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("yaml") || content_type.contains("yml") {
            Some(Format::Yaml)
        } else if content_type.contains("json") {
            Some(Format::Json)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_token)
    }

    /// Classify by content: a document opening with `{` or `[` is JSON, anything else YAML
    pub fn sniff(body: &[u8]) -> Self {
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => Format::Json,
            _ => Format::Yaml,
        }
    }

    /// Resolve the format of a request body.
    ///
    /// First match wins:
    /// - `format` query parameter
    /// - Content-Type header
    /// - content sniffing, defaulting to YAML
    pub fn resolve(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        if let Some(format) = query_param(uri, FORMAT_PARAM).and_then(|v| Self::from_token(&v)) {
            return format;
        }

        if let Some(format) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .and_then(Self::from_content_type)
        {
            return format;
        }

        Self::sniff(body)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read a single query parameter. Malformed query strings read as absent.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .ok()
        .and_then(|Query(mut params)| params.remove(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap(),
        );
        headers
    }

    #[test]
    fn test_query_overrides_header_and_body() {
        let uri: Uri = "/api/config?format=YAML".parse().unwrap();
        let format = Format::resolve(&uri, &headers_with("application/json"), b"{}");
        assert_eq!(format, Format::Yaml);

        let uri: Uri = "/api/config?format=Json".parse().unwrap();
        let format = Format::resolve(&uri, &headers_with("application/x-yaml"), b"a: 1");
        assert_eq!(format, Format::Json);
    }

    #[test]
    fn test_unknown_query_token_falls_through() {
        let uri: Uri = "/api/config?format=xml".parse().unwrap();
        let format = Format::resolve(&uri, &headers_with("application/json"), b"a: 1");
        assert_eq!(format, Format::Json);
    }

    #[test]
    fn test_header_overrides_sniffing() {
        let uri: Uri = "/api/config".parse().unwrap();
        let format = Format::resolve(&uri, &headers_with("text/yaml; charset=utf-8"), b"{}");
        assert_eq!(format, Format::Yaml);

        let format = Format::resolve(&uri, &headers_with("application/json"), b"route: {}");
        assert_eq!(format, Format::Json);
    }

    #[test]
    fn test_yaml_token_wins_in_content_type() {
        assert_eq!(
            Format::from_content_type("application/yaml+json"),
            Some(Format::Yaml)
        );
        assert_eq!(Format::from_content_type("text/plain"), None);
    }

    #[test]
    fn test_sniffing() {
        let uri: Uri = "/api/config".parse().unwrap();
        let headers = HeaderMap::new();
        assert_eq!(Format::resolve(&uri, &headers, b"  \n{\"a\":1}"), Format::Json);
        assert_eq!(Format::resolve(&uri, &headers, b"[1, 2]"), Format::Json);
        assert_eq!(Format::resolve(&uri, &headers, b"route: {}"), Format::Yaml);
        assert_eq!(Format::resolve(&uri, &headers, b""), Format::Yaml);
        assert_eq!(Format::resolve(&uri, &headers, b"   "), Format::Yaml);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.yml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("b.JSON")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("b.conf")), None);
        assert_eq!(Format::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_query_param() {
        let uri: Uri = "/x?dry_run=TRUE&format=json".parse().unwrap();
        assert_eq!(query_param(&uri, "dry_run").as_deref(), Some("TRUE"));
        assert_eq!(query_param(&uri, "missing"), None);
        let uri: Uri = "/x".parse().unwrap();
        assert_eq!(query_param(&uri, "dry_run"), None);
    }
}
