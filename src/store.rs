use crate::log::Error;

use serde::Serialize;
use serde_json::{to_value, Value};
use std::collections::{BTreeMap, HashMap};

/// Provides storage for data that a [`Template`][`crate::Template`] can be
/// rendered with.
#[derive(Debug, Default)]
pub struct Store {
    data: HashMap<String, Value>,
}

impl Store {
    /// Create a new [`Store`].
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Store;
    ///
    /// let store = Store::new();
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// # Errors
    ///
    /// Returns an error if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Store;
    ///
    /// let mut store = Store::new();
    /// let result = store.insert("name", "taylor");
    ///
    /// assert!(result.is_ok());
    /// ```
    pub fn insert<S, T>(&mut self, key: S, value: T) -> Result<(), Error>
    where
        S: Into<String>,
        T: Serialize,
    {
        let key = key.into();
        let value = to_value(value)
            .map_err(|_| Error::build(format!("value of key `{key}` is unserializable")))?;
        self.data.insert(key, value);

        Ok(())
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Store;
    ///
    /// let mut store = Store::new();
    /// store.insert_must("name", "taylor");
    /// ```
    #[inline]
    pub fn insert_must<S, T>(&mut self, key: S, value: T)
    where
        S: Into<String>,
        T: Serialize,
    {
        self.data.insert(key.into(), to_value(value).unwrap());
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// Returns the `Store`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns an error if the serialization fails.
    #[inline]
    pub fn with<S, T>(mut self, key: S, value: T) -> Result<Self, Error>
    where
        S: Into<String>,
        T: Serialize,
    {
        self.insert(key, value)?;

        Ok(self)
    }

    /// Inserts a key-value pair into the [`Store`].
    ///
    /// Returns the `Store`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics if the serialization fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Store;
    ///
    /// let store = Store::new().with_must("name", "taylor");
    /// ```
    #[inline]
    pub fn with_must<S, T>(mut self, key: S, value: T) -> Self
    where
        S: Into<String>,
        T: Serialize,
    {
        self.insert_must(key, value);

        self
    }

    /// Returns a reference to the [`Value`] corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Store;
    ///
    /// let store = Store::new().with_must("name", "taylor");
    /// let result = store.get("name");
    ///
    /// assert_eq!(result.unwrap(), "taylor")
    /// ```
    #[inline]
    pub fn get(&self, index: &str) -> Option<&Value> {
        self.data.get(index)
    }

    /// Return an iterator over the key-value pairs of the [`Store`].
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }
}

/// Wrapper for [`Store`] that provides mutable storage for shadowed values.
///
/// Each `for` iteration pushes a frame, and `set` writes into the top frame,
/// so loop bindings shadow outer data without mutating it.
#[derive(Debug)]
pub struct Shadow<'store> {
    pub store: &'store Store,
    data: Vec<HashMap<String, Value>>,
}

impl<'store> Shadow<'store> {
    /// Create a new [`Shadow`] over the given [`Store`].
    #[inline]
    pub fn new(store: &'store Store) -> Self {
        Self {
            store,
            data: vec![HashMap::new()],
        }
    }

    /// Push a new frame onto the [`Shadow`].
    #[inline]
    pub fn push(&mut self) {
        self.data.push(HashMap::new());
    }

    /// Remove the top frame from the [`Shadow`].
    ///
    /// # Panics
    ///
    /// Panics when only the base frame remains, which is always a defect
    /// in the renderer.
    #[inline]
    pub fn pop(&mut self) {
        if self.data.len() == 1 {
            panic!("base frame must never be removed");
        }
        self.data.pop();
    }

    /// Insert the value into the top frame of the [`Shadow`].
    #[inline]
    pub fn insert(&mut self, key: String, value: Value) {
        self.data
            .last_mut()
            .expect("shadow must always have a base frame")
            .insert(key, value);
    }

    /// Get the [`Value`] of the given key.
    ///
    /// If the key is not found within the [`Shadow`], the store will be
    /// searched.
    #[inline]
    pub fn get(&self, index: &str) -> Option<&Value> {
        for frame in self.data.iter().rev() {
            if let Some(value) = frame.get(index) {
                return Some(value);
            }
        }
        self.store.get(index)
    }

    /// Return every visible key-value pair, with shadowed values
    /// replacing the data underneath.
    pub fn visible(&self) -> BTreeMap<&str, &Value> {
        let mut all: BTreeMap<&str, &Value> = self
            .store
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        for frame in &self.data {
            for (key, value) in frame {
                all.insert(key.as_str(), value);
            }
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::Shadow;
    use crate::Store;
    use serde_json::json;

    #[test]
    fn test_store_insert() {
        let mut store = Store::new();
        store.insert_must("one", "two");

        assert!(store
            .get("one")
            .is_some_and(|t| t.as_str().unwrap() == "two"));
    }

    #[test]
    fn test_store_insert_fluent() {
        assert!(Store::new()
            .with_must("three", "four")
            .get("three")
            .is_some_and(|t| t.as_str().unwrap() == "four"))
    }

    #[test]
    fn test_shadow_insert_and_get() {
        let mut store = Store::new();
        store.insert_must("one", "one");
        store.insert_must("two", "two");
        let mut shadow = Shadow::new(&store);
        // Push a frame here or the pop below will panic.
        shadow.push();
        shadow.insert("one".into(), json!("shadowed one"));

        assert_eq!(shadow.get("one"), Some(&json!("shadowed one")));
        assert_eq!(shadow.get("two"), Some(&json!("two")));
        shadow.pop();

        assert_eq!(shadow.get("one"), Some(&json!("one")));
        assert_eq!(shadow.get("two"), Some(&json!("two")));
    }

    #[test]
    fn test_shadow_visible() {
        let store = Store::new().with_must("one", 1).with_must("two", 2);
        let mut shadow = Shadow::new(&store);
        shadow.push();
        shadow.insert("two".into(), json!("shadowed"));

        let visible = shadow.visible();
        assert_eq!(visible.get("one"), Some(&&json!(1)));
        assert_eq!(visible.get("two"), Some(&&json!("shadowed")));
    }

    #[test]
    #[should_panic(expected = "base frame must never be removed")]
    fn test_shadow_pop_empty() {
        let store = Store::new();
        let mut shadow = Shadow::new(&store);

        shadow.pop();
    }
}
