//! Ordered column → value maps used for row payloads, bind parameters and
//! fetched rows.

use crate::error::OrmResult;
use crate::value::Value;
use serde::de::DeserializeOwned;

/// An insertion-ordered mapping from column (or parameter) name to [`Value`].
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

/// Named bind parameters. Keys may carry a leading `:` (`":id"` and `"id"` are the same).
pub type Params = Record;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cap),
        }
    }

    /// Builder-style insert.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Value at a column position.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.entries.get(idx).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a JSON object (column order preserved by serde_json's map when
    /// `preserve_order` is enabled, otherwise sorted).
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Deserialize this row into `T` through its JSON form.
    pub fn deserialize<T: DeserializeOwned>(&self) -> OrmResult<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Record {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, &v.to_json())?;
        }
        map.end()
    }
}

/// Build a [`Record`] row payload.
///
/// ```ignore
/// let row = pgmanager::record! { "name" => "Victor Hugo", "birthdate" => "1802-02-26" };
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut __pgm_record = $crate::Record::new();
        $( __pgm_record.insert($key, $value); )+
        __pgm_record
    }};
}

/// Build named bind [`Params`](crate::Params). Same syntax as [`record!`].
#[macro_export]
macro_rules! params {
    ($($tt:tt)*) => { $crate::record!($($tt)*) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_replaces_in_place() {
        let mut r = Record::new();
        r.insert("b", 1);
        r.insert("a", 2);
        r.insert("b", 3);
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(r.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn macro_builds_record() {
        let r = crate::record! { "name" => "X", "age" => 3 };
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("name"), Some(&Value::from("X")));
        assert!(crate::params! {}.is_empty());
    }

    #[test]
    fn deserializes_into_struct() {
        #[derive(serde::Deserialize)]
        struct Author {
            id: i64,
            name: String,
        }
        let r = crate::record! { "id" => 4, "name" => "Zola" };
        let a: Author = r.deserialize().unwrap();
        assert_eq!(a.id, 4);
        assert_eq!(a.name, "Zola");
    }
}
