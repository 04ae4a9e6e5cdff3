use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Key carrying the type of the value stored under it
///
/// ```rust
/// use trellis::context::{TypedKey, UserValues};
///
/// const USER_ID: TypedKey<u64> = TypedKey::new("user_id");
///
/// let mut values = UserValues::new();
/// values.insert_typed(USER_ID, 7);
/// assert_eq!(values.get_typed(USER_ID), Some(&7));
/// assert_eq!(values.get::<String>("user_id"), None);
/// ```
pub struct TypedKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedKey<T> {}

impl<T> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedKey({}: {})", self.name, std::any::type_name::<T>())
    }
}

/// Per-request scratch map shared by the stages of one chain
///
/// Values are looked up by key and downcast on read; a lookup with the
/// wrong type behaves like a missing key.
#[derive(Default)]
pub struct UserValues {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl UserValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning `true` if a previous value was replaced
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.values.insert(key.into(), Box::new(value)).is_some()
    }

    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove and return the value if it has type `T`; a value of another
    /// type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert_typed<T>(&mut self, key: TypedKey<T>, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.insert(key.name, value)
    }

    #[must_use]
    pub fn get_typed<T: Any>(&self, key: TypedKey<T>) -> Option<&T> {
        self.get(key.name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for UserValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("UserValues").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_reads_as_missing() {
        let mut v = UserValues::new();
        v.insert("n", 5u32);
        assert_eq!(v.get::<u32>("n"), Some(&5));
        assert!(v.get::<i64>("n").is_none());
        assert!(v.remove::<String>("n").is_none());
        assert!(v.contains_key("n"));
        assert_eq!(v.remove::<u32>("n"), Some(5));
        assert!(v.is_empty());
    }

    #[test]
    fn test_replace_and_mutate() {
        let mut v = UserValues::new();
        assert!(!v.insert("list", vec![1]));
        v.get_mut::<Vec<i32>>("list").unwrap().push(2);
        assert_eq!(v.get::<Vec<i32>>("list"), Some(&vec![1, 2]));
        assert!(v.insert("list", vec![9]));
    }
}
