use serde::{Deserialize, Serialize};

use crate::KeyValue;

/// Ordered list of HTTP header fields.
///
/// Names are matched case-insensitively. Insertion order is preserved so the
/// transport sends headers in the order adapters added them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<KeyValue>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Returns the value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kv| kv.key_matches(name))
            .map(|kv| kv.value())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|kv| kv.key_matches(name))
    }

    /// Replace every field named `name` with a single field holding `value`.
    pub fn set<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        self.remove(&name);
        self.0.push(KeyValue::new(name, value));
        self
    }

    /// Add a field only when no field with that name exists yet.
    ///
    /// Returns `true` if the field was inserted.
    pub fn set_if_absent<K, V>(&mut self, name: K, value: V) -> bool
    where
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(KeyValue::new(name, value));
        true
    }

    /// Append a field without touching existing ones (multi-valued headers).
    pub fn append<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(name, value));
        self
    }

    /// Remove every field named `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|kv| !kv.key_matches(name));
        before - self.0.len()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}
