//! Header reconstruction from the raw wire header list.
//!
//! Names keep the case the peer sent. Repeated names are merged with a comma,
//! except `Set-Cookie`, whose values must stay separable and are kept as an
//! ordered list instead.

use std::borrow::Cow;

use super::types::Header;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            HeaderValue::Single(value) => Some(value.as_str()),
            HeaderValue::Multiple(_) => None,
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(value) => vec![value.as_str()],
            HeaderValue::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// All values joined with `,`, borrowing when there is only one.
    pub fn joined(&self) -> Cow<'_, str> {
        match self {
            HeaderValue::Single(value) => Cow::Borrowed(value.as_str()),
            HeaderValue::Multiple(values) => Cow::Owned(values.join(",")),
        }
    }
}

/// Ordered, case-preserving header map.
///
/// Keys are stored exactly as they appeared on the wire, so `Foo` and `foo`
/// are distinct entries. Lookups through [`HeaderMap::get`] ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, HeaderValue)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from a flattened `[name, value, name, value, ...]` list.
    ///
    /// Trailing NUL characters are stripped from every value. A dangling name
    /// at the end of an odd-length list has no value and is ignored.
    pub fn from_raw_pairs<S: AsRef<str>>(raw: &[S]) -> Self {
        let mut map = Self::new();
        for pair in raw.chunks_exact(2) {
            let name = pair[0].as_ref();
            let value = pair[1].as_ref().trim_end_matches('\0');
            map.append_raw(name, value);
        }
        map
    }

    pub fn from_headers(headers: &[Header]) -> Self {
        let raw: Vec<&str> = headers
            .iter()
            .flat_map(|header| [header.name.as_str(), header.value.as_str()])
            .collect();
        Self::from_raw_pairs(&raw)
    }

    fn append_raw(&mut self, name: &str, value: &str) {
        let Some((_, existing)) = self.entries.iter_mut().find(|(key, _)| key == name) else {
            self.entries
                .push((name.to_string(), HeaderValue::Single(value.to_string())));
            return;
        };

        if name.eq_ignore_ascii_case("set-cookie") {
            match existing {
                HeaderValue::Single(first) => {
                    let first = std::mem::take(first);
                    *existing = HeaderValue::Multiple(vec![first, value.to_string()]);
                }
                HeaderValue::Multiple(values) => values.push(value.to_string()),
            }
            return;
        }

        match existing {
            HeaderValue::Single(current) => {
                current.push(',');
                current.push_str(value);
            }
            HeaderValue::Multiple(values) => values.push(value.to_string()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name` to a single value, replacing any entry with the same name
    /// in any case. The replaced entry's position is reused.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = HeaderValue::Single(value.into());
        match self
            .entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some(index) => {
                self.entries[index] = (name.to_string(), value);
                let mut cursor = index + 1;
                while cursor < self.entries.len() {
                    if self.entries[cursor].0.eq_ignore_ascii_case(name) {
                        self.entries.remove(cursor);
                    } else {
                        cursor += 1;
                    }
                }
            }
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Removes every entry named `name` in any case, returning the first.
    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        let mut removed = None;
        self.entries.retain_mut(|(key, value)| {
            if !key.eq_ignore_ascii_case(name) {
                return true;
            }
            if removed.is_none() {
                removed = Some(std::mem::replace(value, HeaderValue::Single(String::new())));
            }
            false
        });
        removed
    }

    /// Moves the value of `from` to `to`. Returns false when `from` is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(value) = self.remove(from) else {
            return false;
        };
        self.insert(to, value.joined().into_owned());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialises as `Name: value\r\n` lines, one line per `Set-Cookie` value.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            for value in value.values() {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
        }
    }
}
