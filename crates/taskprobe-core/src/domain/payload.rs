//! Form-style task payload: string keys mapped to string-list values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Payload carried by a task and posted to the worker as
/// `application/x-www-form-urlencoded`.
///
/// Keys keep insertion-independent (sorted) order so the encoded body is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormPayload(BTreeMap<String, Vec<String>>);

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single value insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// First value for `key`, like a form handler's `FormValue`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Encode as an urlencoded form body.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.iter() {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// Decode an urlencoded form body (or query string).
    pub fn decode(input: &[u8]) -> Self {
        let mut payload = Self::new();
        payload.extend_from_encoded(input);
        payload
    }

    /// Merge values from an urlencoded string, appending after existing values.
    pub fn extend_from_encoded(&mut self, input: &[u8]) {
        for (k, v) in url::form_urlencoded::parse(input) {
            self.append(k.into_owned(), v.into_owned());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = Self::new();
        for (k, v) in iter {
            payload.append(k, v);
        }
        payload
    }
}
