//! Structured-record accessors.
//!
//! The record strategy resolves properties through a static accessor table
//! declared once per concrete type, instead of runtime reflection. Property
//! names are derived from accessor names by the `get<Name>`/`is<Name>`/
//! `set<Name>` convention, with the first letter lowercased unless the name
//! starts with consecutive capitals (`getURL` stays `URL`).

use std::fmt;
use std::sync::RwLock;

use super::errors::{AmbiguousAccessorError, RecordAccessFailure};
use super::value::ParamValue;

/// Derive a property name from an accessor name.
///
/// `getName` -> `name`, `isActive` -> `active`, `setFirstName` -> `firstName`,
/// `getURL` -> `URL`. A name without a recognized prefix is already a
/// property name and is returned unchanged.
pub fn property_name_from_accessor(accessor: &str) -> String {
    let rest = if let Some(r) = accessor.strip_prefix("get") {
        r
    } else if let Some(r) = accessor.strip_prefix("set") {
        r
    } else if let Some(r) = accessor.strip_prefix("is") {
        r
    } else {
        return accessor.to_string();
    };

    if rest.is_empty() {
        return accessor.to_string();
    }

    let mut chars = rest.chars();
    let first = chars.next().unwrap_or_default();
    let second_is_upper = chars.next().is_some_and(|c| c.is_uppercase());

    // Acronym-like names keep their capitals: URL, ID, SQLText.
    if first.is_uppercase() && second_is_upper {
        rest.to_string()
    } else {
        let mut out = String::with_capacity(rest.len());
        out.extend(first.to_lowercase());
        out.push_str(&rest[first.len_utf8()..]);
        out
    }
}

pub struct Getter<T> {
    pub property: String,
    pub accessor_name: &'static str,
    pub read: fn(&T) -> ParamValue,
}

pub struct Setter<T> {
    pub property: String,
    pub accessor_name: &'static str,
    /// Declared parameter type of the setter, used to describe ambiguous
    /// overloads in error messages.
    pub value_type: &'static str,
    pub write: fn(&mut T, ParamValue),
}

/// Static accessor table for one record type.
///
/// Built once per type (the `&'static` table is the per-type cache) and
/// consulted for every property access. Registering two setters that resolve
/// to the same property is allowed here; the ambiguity only becomes an error
/// when that setter is invoked.
pub struct AccessorTable<T> {
    type_name: &'static str,
    getters: Vec<Getter<T>>,
    setters: Vec<Setter<T>>,
}

impl<T> AccessorTable<T> {
    pub fn new(type_name: &'static str) -> Self {
        AccessorTable {
            type_name,
            getters: Vec::new(),
            setters: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Register a getter by accessor name (`getName`, `isActive`, ...).
    pub fn getter(mut self, accessor_name: &'static str, read: fn(&T) -> ParamValue) -> Self {
        self.getters.push(Getter {
            property: property_name_from_accessor(accessor_name),
            accessor_name,
            read,
        });
        self
    }

    /// Register a setter by accessor name and declared value type.
    pub fn setter(
        mut self,
        accessor_name: &'static str,
        value_type: &'static str,
        write: fn(&mut T, ParamValue),
    ) -> Self {
        self.setters.push(Setter {
            property: property_name_from_accessor(accessor_name),
            accessor_name,
            value_type,
            write,
        });
        self
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.getters.iter().any(|g| g.property == property)
            || self.setters.iter().any(|s| s.property == property)
    }

    pub fn get(&self, target: &T, property: &str) -> Result<ParamValue, RecordAccessFailure> {
        match self.getters.iter().find(|g| g.property == property) {
            Some(g) => Ok((g.read)(target)),
            None => Err(RecordAccessFailure::NoSuchProperty),
        }
    }

    pub fn set(
        &self,
        target: &mut T,
        property: &str,
        value: ParamValue,
    ) -> Result<(), RecordAccessFailure> {
        let candidates: Vec<&Setter<T>> = self
            .setters
            .iter()
            .filter(|s| s.property == property)
            .collect();
        match candidates.as_slice() {
            [] => Err(RecordAccessFailure::NoSetter),
            [setter] => {
                (setter.write)(target, value);
                Ok(())
            }
            many => Err(RecordAccessFailure::Ambiguous(AmbiguousAccessorError {
                type_name: self.type_name.to_string(),
                property: property.to_string(),
                candidates: many
                    .iter()
                    .map(|s| format!("{}({})", s.accessor_name, s.value_type))
                    .collect(),
            })),
        }
    }

    /// Declared value type of the property, when unambiguous.
    pub fn property_type(&self, property: &str) -> Option<&'static str> {
        let mut types = self
            .setters
            .iter()
            .filter(|s| s.property == property)
            .map(|s| s.value_type);
        match (types.next(), types.next()) {
            (Some(t), None) => Some(t),
            _ => None,
        }
    }
}

/// A record type with a static accessor table.
pub trait Record: Send + Sync + fmt::Debug + 'static {
    fn accessor_table() -> &'static AccessorTable<Self>
    where
        Self: Sized;
}

/// Object-safe view of a record value, as stored inside [`ParamValue`].
///
/// A record handle wraps but does not own the conceptual object; writes go
/// through the same handle every clone of the value shares.
pub trait RecordObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn has_property(&self, property: &str) -> bool;
    fn get(&self, property: &str) -> Result<ParamValue, RecordAccessFailure>;
    fn set(&self, property: &str, value: ParamValue) -> Result<(), RecordAccessFailure>;
    fn property_type(&self, property: &str) -> Option<&'static str>;
}

/// Shared holder adapting any [`Record`] to the object-safe view.
pub struct RecordCell<T: Record> {
    inner: RwLock<T>,
}

impl<T: Record> RecordCell<T> {
    pub fn new(record: T) -> Self {
        RecordCell {
            inner: RwLock::new(record),
        }
    }

    /// Wrap a record into a parameter value.
    pub fn value(record: T) -> ParamValue {
        ParamValue::Record(std::sync::Arc::new(RecordCell::new(record)))
    }
}

impl<T: Record> fmt::Debug for RecordCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record<{}>", T::accessor_table().type_name())
    }
}

impl<T: Record> RecordObject for RecordCell<T> {
    fn type_name(&self) -> &'static str {
        T::accessor_table().type_name()
    }

    fn has_property(&self, property: &str) -> bool {
        T::accessor_table().has_property(property)
    }

    fn get(&self, property: &str) -> Result<ParamValue, RecordAccessFailure> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        T::accessor_table().get(&guard, property)
    }

    fn set(&self, property: &str, value: ParamValue) -> Result<(), RecordAccessFailure> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        T::accessor_table().set(&mut guard, property, value)
    }

    fn property_type(&self, property: &str) -> Option<&'static str> {
        T::accessor_table().property_type(property)
    }
}
