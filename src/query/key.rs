//! Canonical cache keys.
//!
//! A [`QueryKey`] is a resource tag plus a sorted parameter record. Parameters
//! come from any `Serialize` value, so a key can be derived from the same
//! struct that builds the request:
//!
//! ```
//! use serde::Serialize;
//! use workervet_query::query::QueryKey;
//!
//! #[derive(Serialize)]
//! struct Params { search: String, page: u32, limit: Option<u32> }
//!
//! let key = QueryKey::from_params("candidates", &Params {
//!     search: "ali".into(),
//!     page: 1,
//!     limit: None,
//! });
//! assert_eq!(key, QueryKey::new("candidates").with("page", 1).with("search", "ali"));
//! assert_eq!(key.to_string(), "candidates{page=1,search=\"ali\"}");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// A single canonical parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<ParamValue>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

macro_rules! int_param {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                Self::Int(i64::from(value))
            }
        })*
    };
}

int_param!(i8, i16, i32, i64, u8, u16, u32);

/// Identifier of a cached query: resource tag plus canonical parameters.
///
/// Equality and hashing ignore the order in which parameters were supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    resource: Arc<str>,
    params: BTreeMap<String, ParamValue>,
}

impl QueryKey {
    /// A key with no parameters.
    #[must_use]
    pub fn new(resource: &str) -> Self {
        Self {
            resource: Arc::from(resource),
            params: BTreeMap::new(),
        }
    }

    /// Derives a key from a serializable parameter record.
    ///
    /// Null/`None` fields are dropped, nested objects flatten to dotted names,
    /// and non-integral numbers are kept by their textual form. A non-object
    /// value is stored under the parameter name `value`.
    #[must_use]
    pub fn from_params<P: Serialize + ?Sized>(resource: &str, params: &P) -> Self {
        let mut key = Self::new(resource);
        match serde_json::to_value(params) {
            Ok(Value::Object(map)) => {
                for (name, value) in map {
                    flatten_into(&mut key.params, name, value);
                }
            }
            Ok(other) => flatten_into(&mut key.params, "value".to_string(), other),
            Err(err) => {
                tracing::warn!(resource, error = %err, "query params failed to serialize");
            }
        }
        key
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if `self` has the same resource and contains every
    /// parameter of `prefix` with an equal value.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.resource == prefix.resource
            && prefix
                .params
                .iter()
                .all(|(name, value)| self.params.get(name) == Some(value))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

impl From<&str> for QueryKey {
    fn from(resource: &str) -> Self {
        Self::new(resource)
    }
}

fn flatten_into(out: &mut BTreeMap<String, ParamValue>, name: String, value: Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (child, value) in map {
                flatten_into(out, format!("{name}.{child}"), value);
            }
        }
        other => {
            if let Some(param) = to_param(other) {
                out.insert(name, param);
            }
        }
    }
}

fn to_param(value: Value) -> Option<ParamValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(ParamValue::Bool(b)),
        Value::Number(n) => Some(
            n.as_i64()
                .map_or_else(|| ParamValue::Str(n.to_string()), ParamValue::Int),
        ),
        Value::String(s) => Some(ParamValue::Str(s)),
        Value::Array(items) => Some(ParamValue::List(
            items.into_iter().filter_map(to_param).collect(),
        )),
        Value::Object(map) => Some(ParamValue::Str(Value::Object(map).to_string())),
    }
}

/// Selects cache entries, for invalidation.
#[derive(Clone)]
pub enum KeyFilter {
    /// Exactly this key.
    Exact(QueryKey),
    /// Keys of the same resource whose parameters include all of these.
    Prefix(QueryKey),
    /// Every key of a resource, regardless of parameters.
    Resource(String),
    /// Arbitrary predicate.
    Predicate(Arc<dyn Fn(&QueryKey) -> bool + Send + Sync>),
}

impl KeyFilter {
    #[must_use]
    pub fn resource(tag: &str) -> Self {
        Self::Resource(tag.to_string())
    }

    pub fn predicate(f: impl Fn(&QueryKey) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(exact) => key == exact,
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Resource(tag) => key.resource() == tag,
            Self::Predicate(f) => f(key),
        }
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => f.debug_tuple("Exact").field(&key.to_string()).finish(),
            Self::Prefix(key) => f.debug_tuple("Prefix").field(&key.to_string()).finish(),
            Self::Resource(tag) => f.debug_tuple("Resource").field(tag).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<QueryKey> for KeyFilter {
    fn from(key: QueryKey) -> Self {
        Self::Exact(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Serialize;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    #[derive(Serialize)]
    struct CandidateParams {
        search: String,
        page: u32,
        limit: u32,
    }

    #[derive(Serialize)]
    struct Reordered {
        limit: u32,
        page: u32,
        search: String,
    }

    fn hash_of(key: &QueryKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a = QueryKey::from_params(
            "candidates",
            &CandidateParams {
                search: "ali".into(),
                page: 1,
                limit: 20,
            },
        );
        let b = QueryKey::from_params(
            "candidates",
            &Reordered {
                limit: 20,
                page: 1,
                search: "ali".into(),
            },
        );
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_none_fields_are_dropped() {
        #[derive(Serialize)]
        struct Jobs {
            page: Option<u32>,
            department: Option<String>,
        }

        let key = QueryKey::from_params(
            "jobs",
            &Jobs {
                page: Some(2),
                department: None,
            },
        );
        assert_eq!(key, QueryKey::new("jobs").with("page", 2));
    }

    #[test]
    fn test_resource_distinguishes_keys() {
        assert_ne!(
            QueryKey::new("skills"),
            QueryKey::new("departments"),
        );
    }

    #[test]
    fn test_nested_objects_flatten() {
        let value = serde_json::json!({ "filter": { "status": "active" }, "page": 3 });
        let key = QueryKey::from_params("users", &value);
        assert_eq!(
            key.param("filter.status"),
            Some(&ParamValue::Str("active".into()))
        );
        assert_eq!(key.param("page"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn test_display() {
        let key = QueryKey::new("jobs").with("page", 2).with("search", "dev");
        assert_eq!(key.to_string(), "jobs{page=2,search=\"dev\"}");
        assert_eq!(QueryKey::new("skills").to_string(), "skills");
    }

    #[test]
    fn test_prefix_matching() {
        let key = QueryKey::new("jobs").with("page", 2).with("department", "d1");
        assert!(key.starts_with(&QueryKey::new("jobs")));
        assert!(key.starts_with(&QueryKey::new("jobs").with("department", "d1")));
        assert!(!key.starts_with(&QueryKey::new("jobs").with("department", "d2")));
        assert!(!key.starts_with(&QueryKey::new("skills")));
    }

    #[test]
    fn test_filters() {
        let key = QueryKey::new("candidates").with("page", 1);
        assert!(KeyFilter::Exact(key.clone()).matches(&key));
        assert!(!KeyFilter::Exact(QueryKey::new("candidates")).matches(&key));
        assert!(KeyFilter::resource("candidates").matches(&key));
        assert!(KeyFilter::Prefix(QueryKey::new("candidates")).matches(&key));
        assert!(KeyFilter::predicate(|k| k.param("page").is_some()).matches(&key));
    }

    proptest! {
        #[test]
        fn prop_insertion_order_is_irrelevant(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..8)
        ) {
            let forward = entries
                .iter()
                .fold(QueryKey::new("r"), |key, (name, value)| key.with(name, *value));
            let backward = entries
                .iter()
                .rev()
                .fold(QueryKey::new("r"), |key, (name, value)| key.with(name, *value));
            prop_assert_eq!(hash_of(&forward), hash_of(&backward));
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_serialized_and_built_keys_agree(search in "[a-z ]{0,10}", page in 1u32..500) {
            let built = QueryKey::new("candidates")
                .with("limit", 20u32)
                .with("page", page)
                .with("search", search.as_str());
            let derived = QueryKey::from_params(
                "candidates",
                &CandidateParams { search, page, limit: 20 },
            );
            prop_assert_eq!(built, derived);
        }
    }
}
