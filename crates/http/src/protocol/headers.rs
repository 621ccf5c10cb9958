//! Ordered header storage shared by requests and responses.
//!
//! Unlike `http::HeaderMap`, a [`HeaderList`] keeps the fields in the exact order they
//! were added and keeps the name as written, so a response head is emitted the way the
//! caller spelled it and a request keeps every repeated field (`Set-Cookie`, `Via`, ...).
//! Lookups are ASCII case-insensitive.

use http::HeaderValue;

/// An ordered sequence of `(name, value)` header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    fields: Vec<(String, HeaderValue)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    /// Adds a field after the existing ones, keeping earlier fields with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: HeaderValue) {
        self.fields.push((name.into(), value));
    }

    /// Sets a field, replacing every earlier occurrence of the name.
    ///
    /// The field keeps the position of the first occurrence, so re-setting
    /// `Content-Type` does not move it to the end of the head.
    pub fn insert(&mut self, name: impl Into<String>, value: HeaderValue) {
        let name = name.into();
        let Some(index) = self.position(&name) else {
            self.fields.push((name, value));
            return;
        };

        let mut position = 0_usize;
        self.fields.retain(|(field, _)| {
            let keep = position <= index || !field.eq_ignore_ascii_case(&name);
            position += 1;
            keep
        });
        self.fields[index] = (name, value);
    }

    /// Removes every occurrence of `name`, returning how many fields were dropped.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(field, _)| !field.eq_ignore_ascii_case(name));
        before - self.fields.len()
    }

    /// The first value for `name`.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.fields.iter().find(|(field, _)| field.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    }

    /// The last value for `name`.
    pub fn get_last(&self, name: &str) -> Option<&HeaderValue> {
        self.fields.iter().rev().find(|(field, _)| field.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.fields.iter().filter(move |(field, _)| field.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether any comma separated element of any `name` field equals `token`,
    /// ignoring ASCII case. Used for list headers such as `Connection`.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|value| {
            value.as_bytes().split(|b| *b == b',').any(|element| element.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = (&'a str, &'a HeaderValue);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
