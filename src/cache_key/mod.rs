//! Composite, order-sensitive execution identity keys.
//!
//! A key accumulates a running multiplicative hash (base 37, seeded at 17),
//! a checksum (sum of contributed value hashes, null contributing 1), a
//! count, and the contributed values themselves for exact equality. Order
//! sensitivity is mandatory, not incidental: SQL argument order is
//! significant, so reordering the same values must produce a different key.

use lazy_static::lazy_static;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::param_object::ParamValue;

const DEFAULT_MULTIPLIER: u64 = 37;
const DEFAULT_HASHCODE: u64 = 17;
const NULL_VALUE_HASH: u64 = 1;

#[derive(Clone)]
pub struct CacheKey {
    hashcode: u64,
    checksum: u64,
    count: u64,
    values: Vec<ParamValue>,
    null_key: bool,
}

lazy_static! {
    static ref NULL_CACHE_KEY: CacheKey = CacheKey {
        hashcode: DEFAULT_HASHCODE,
        checksum: 0,
        count: 0,
        values: Vec::new(),
        null_key: true,
    };
}

impl CacheKey {
    pub fn new() -> Self {
        CacheKey {
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            values: Vec::new(),
            null_key: false,
        }
    }

    /// The designated empty key. Attempting to grow it is a programming
    /// defect and fails loudly.
    pub fn null_key() -> &'static CacheKey {
        &NULL_CACHE_KEY
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Fold one more value into the key.
    ///
    /// # Panics
    ///
    /// Panics when called on the null key; no legitimate code path should
    /// ever try to update it.
    pub fn update(&mut self, value: impl Into<ParamValue>) {
        if self.null_key {
            panic!("not allowed to update the null cache key");
        }
        let value = value.into();
        let base = value_hash(&value);

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        let positional = base.wrapping_mul(self.count);
        self.hashcode = self
            .hashcode
            .wrapping_mul(DEFAULT_MULTIPLIER)
            .wrapping_add(positional);
        self.values.push(value);
    }

    /// Fold a sequence of values, in order.
    pub fn update_all<I, V>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        for value in values {
            self.update(value);
        }
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.values == other.values
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hashcode);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for value in &self.values {
            write!(f, ":{:?}", value)?;
        }
        Ok(())
    }
}

/// Deterministic per-value hash. Null contributes the fixed sentinel 1;
/// lists and maps hash recursively so collection-valued contributions
/// compare element-wise.
fn value_hash(value: &ParamValue) -> u64 {
    match value {
        ParamValue::Null => NULL_VALUE_HASH,
        ParamValue::Bool(b) => {
            if *b {
                1231
            } else {
                1237
            }
        }
        ParamValue::Int(i) => *i as u64,
        ParamValue::Float(f) => f.to_bits(),
        ParamValue::String(s) => string_hash(s),
        ParamValue::List(items) => items
            .iter()
            .fold(1u64, |h, item| {
                h.wrapping_mul(31).wrapping_add(value_hash(item))
            }),
        ParamValue::Map(entries) => entries.iter().fold(0u64, |h, (k, v)| {
            h.wrapping_add(string_hash(k) ^ value_hash(v))
        }),
        ParamValue::Record(handle) => Arc::as_ptr(handle) as *const () as usize as u64,
    }
}

fn string_hash(s: &str) -> u64 {
    s.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_sequences_produce_equal_keys() {
        let mut a = CacheKey::new();
        let mut b = CacheKey::new();
        a.update_all([
            ParamValue::from("stmt1"),
            ParamValue::from("SELECT * FROM t"),
            ParamValue::Int(1),
            ParamValue::Int(2),
        ]);
        b.update_all([
            ParamValue::from("stmt1"),
            ParamValue::from("SELECT * FROM t"),
            ParamValue::Int(1),
            ParamValue::Int(2),
        ]);
        assert_eq!(a, b);

        let mut hasher_a = std::collections::hash_map::DefaultHasher::new();
        let mut hasher_b = std::collections::hash_map::DefaultHasher::new();
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn reordered_values_produce_different_keys() {
        let mut a = CacheKey::new();
        let mut b = CacheKey::new();
        a.update_all([
            ParamValue::from("stmt1"),
            ParamValue::from("SELECT * FROM t"),
            ParamValue::Int(1),
            ParamValue::Int(2),
        ]);
        b.update_all([
            ParamValue::from("stmt1"),
            ParamValue::from("SELECT * FROM t"),
            ParamValue::Int(2),
            ParamValue::Int(1),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn count_mismatch_is_never_equal() {
        let mut a = CacheKey::new();
        let mut b = CacheKey::new();
        a.update(ParamValue::Int(1));
        b.update(ParamValue::Int(1));
        b.update(ParamValue::Int(1));
        assert_ne!(a, b);
    }

    #[test]
    fn null_contributes_the_sentinel_hash() {
        let mut with_null = CacheKey::new();
        with_null.update(ParamValue::Null);
        // The checksum is the sum of contributed hashes; a single null must
        // contribute exactly 1.
        assert_eq!(with_null.checksum, 1);
    }

    #[test]
    fn list_values_compare_element_wise() {
        let mut a = CacheKey::new();
        let mut b = CacheKey::new();
        a.update(ParamValue::from(vec![1i64, 2]));
        b.update(ParamValue::from(vec![1i64, 2]));
        assert_eq!(a, b);

        let mut c = CacheKey::new();
        c.update(ParamValue::from(vec![2i64, 1]));
        assert_ne!(a, c);
    }

    #[test]
    fn fresh_keys_with_no_values_are_equal() {
        assert_eq!(CacheKey::new(), CacheKey::new());
        assert_eq!(&CacheKey::new(), CacheKey::null_key());
    }

    #[test]
    #[should_panic(expected = "null cache key")]
    fn updating_the_null_key_panics() {
        let mut key = CacheKey::null_key().clone();
        key.update(ParamValue::Int(1));
    }
}
