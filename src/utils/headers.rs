use std::collections::HashMap;

/// Header map with case-insensitive lookup. The key is stored as first
/// inserted so responses go on the wire with their canonical casing;
/// iteration order is irrelevant to every consumer.
#[derive(Debug, Default, Clone)]
pub struct HttpHeaders {
    inner: HashMap<String, (String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        HttpHeaders {
            inner: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.inner.insert(
            key.to_ascii_lowercase(),
            (key.to_string(), value.trim().to_string()),
        );
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.inner
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.inner
            .remove(&key.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.inner.values().map(|(key, value)| (key, value))
    }
}
