//! Request classification.
//!
//! Every intercepted request is either passed through untouched or assigned
//! exactly one class, which fixes both its caching strategy and the namespace
//! it is stored in.

use harbor_core::{AppConfig, Error, NamespaceCategory};
use serde::{Deserialize, Serialize};
use url::Url;

/// What an intercepted request is, for caching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestClass {
    /// Scripts, stylesheets, fonts and images. Served cache-first.
    Static,
    /// API reads. Served network-first.
    Api,
    /// Navigable pages. Served stale-while-revalidate from the shell namespace.
    Document,
}

impl RequestClass {
    /// Namespace category this class is stored in.
    pub fn category(&self) -> NamespaceCategory {
        match self {
            RequestClass::Static => NamespaceCategory::Static,
            RequestClass::Api => NamespaceCategory::Api,
            RequestClass::Document => NamespaceCategory::Shell,
        }
    }
}

/// Pure path/method/origin classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    static_suffixes: Vec<String>,
    api_prefixes: Vec<String>,
}

impl Classifier {
    pub fn new(origin: Url, static_suffixes: &[String], api_prefixes: &[String]) -> Self {
        Self {
            origin,
            static_suffixes: static_suffixes.iter().map(|s| s.to_ascii_lowercase()).collect(),
            api_prefixes: api_prefixes.to_vec(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(origin, &config.static_suffixes, &config.api_prefixes))
    }

    /// The serving origin requests are compared against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        self.origin.origin() == url.origin()
    }

    /// Classify a request, or return None if it must pass through untouched.
    ///
    /// Non-GET methods and foreign origins pass through. Otherwise a static
    /// suffix wins over an API prefix, and anything else is a document.
    pub fn classify(&self, method: &str, url: &Url) -> Option<RequestClass> {
        if !method.eq_ignore_ascii_case("GET") || !self.is_same_origin(url) {
            return None;
        }

        let path = url.path();
        let lowered = path.to_ascii_lowercase();
        if self.static_suffixes.iter().any(|suffix| lowered.ends_with(suffix.as_str())) {
            return Some(RequestClass::Static);
        }
        if self.api_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Some(RequestClass::Api);
        }
        Some(RequestClass::Document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::from_config(&AppConfig { origin: "https://app.example.com".into(), ..Default::default() }).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_static_suffixes() {
        let c = classifier();
        for path in ["/app.js", "/styles/main.css", "/fonts/inter.woff2", "/img/logo.PNG", "/favicon.ico"] {
            let u = url(&format!("https://app.example.com{path}"));
            assert_eq!(c.classify("GET", &u), Some(RequestClass::Static), "{path}");
        }
    }

    #[test]
    fn test_api_prefix() {
        let c = classifier();
        assert_eq!(c.classify("GET", &url("https://app.example.com/api/review/queue")), Some(RequestClass::Api));
        assert_eq!(c.classify("GET", &url("https://app.example.com/api/stats?range=7d")), Some(RequestClass::Api));
    }

    #[test]
    fn test_static_suffix_wins_over_api_prefix() {
        let c = classifier();
        assert_eq!(c.classify("GET", &url("https://app.example.com/api/widget.js")), Some(RequestClass::Static));
    }

    #[test]
    fn test_everything_else_is_document() {
        let c = classifier();
        assert_eq!(c.classify("GET", &url("https://app.example.com/")), Some(RequestClass::Document));
        assert_eq!(c.classify("GET", &url("https://app.example.com/study/deck-1")), Some(RequestClass::Document));
        assert_eq!(c.classify("GET", &url("https://app.example.com/apiary")), Some(RequestClass::Document));
    }

    #[test]
    fn test_non_get_passes_through() {
        let c = classifier();
        for method in ["POST", "PUT", "DELETE", "HEAD"] {
            assert_eq!(c.classify(method, &url("https://app.example.com/api/review/queue")), None);
        }
        assert!(c.classify("get", &url("https://app.example.com/")).is_some());
    }

    #[test]
    fn test_cross_origin_passes_through() {
        let c = classifier();
        assert_eq!(c.classify("GET", &url("https://cdn.example.com/app.js")), None);
        assert_eq!(c.classify("GET", &url("http://app.example.com/app.js")), None);
    }

    #[test]
    fn test_class_category() {
        assert_eq!(RequestClass::Static.category(), NamespaceCategory::Static);
        assert_eq!(RequestClass::Api.category(), NamespaceCategory::Api);
        assert_eq!(RequestClass::Document.category(), NamespaceCategory::Shell);
    }
}
