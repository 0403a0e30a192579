//! Cache key derivation.

use std::fmt;

use url::form_urlencoded;

use super::query::forwardable;

/// Deterministic cache key over (resource type, resource id, query).
///
/// Control parameters are dropped and the rest are sorted by name, so the
/// key covers everything that changes the upstream body and nothing else.
/// Repeated names keep their relative order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_resource(resource: &str, id: &str, params: &[(String, String)]) -> Self {
        let mut params = forwardable(params);
        params.sort_by(|a, b| a.0.cmp(&b.0));

        if params.is_empty() {
            return Self(format!("{}:{}", resource, id));
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        Self(format!("{}:{}?{}", resource, id, query))
    }

    /// Key for an absolute asset URL.
    pub fn for_url(resource: &str, url: &str) -> Self {
        Self(format!("{}:{}", resource, url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
