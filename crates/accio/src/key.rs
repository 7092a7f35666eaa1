//! Resource keys.
//!
//! A resource key is the identity of a cacheable resource: a path (or absolute URL) plus its
//! serialized query. Two keys that only differ in the order of their query parameters name the
//! same resource, so [`ResourceKey`] always renders parameters sorted by name.

use std::collections::BTreeMap;
use std::fmt;

use url::form_urlencoded;

/// Builder for resource keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceKey {
    path: String,
    query: BTreeMap<String, String>,
}

impl ResourceKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    /// Adds a query parameter, replacing an earlier one with the same name.
    pub fn query(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.insert(name.into(), value.to_string());
        self
    }

    /// Adds a query parameter if `value` is present.
    pub fn query_opt<V: fmt::Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let key = ResourceKey::new("/api/player/42/full");
        assert_eq!(key.to_string(), "/api/player/42/full");
    }

    #[test]
    fn test_query_is_sorted_and_encoded() {
        let key = ResourceKey::new("/api/players")
            .query("page", 2)
            .query("countries", "de,at")
            .query_opt("search", Some("Alice B"))
            .query_opt::<u32>("verified", None);
        assert_eq!(
            key.to_string(),
            "/api/players?countries=de%2Cat&page=2&search=Alice+B"
        );
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let a = ResourceKey::new("/api/players")
            .query("page", 1)
            .query("search", "x");
        let b = ResourceKey::new("/api/players")
            .query("search", "x")
            .query("page", 1);
        assert_eq!(String::from(a), String::from(b));
    }
}
