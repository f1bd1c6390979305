use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::record::RecordObject;

/// Runtime parameter/result value.
///
/// The uniform representation every accessor, template condition and
/// parameter binding works against. Maps and lists are owned trees; records
/// are shared handles into caller-defined structured objects.
#[derive(Clone)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
    Record(Arc<dyn RecordObject>),
}

impl ParamValue {
    /// Short shape name used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::String(_) => "string",
            ParamValue::List(_) => "list",
            ParamValue::Map(_) => "map",
            ParamValue::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Whether this value is a scalar (not a map, list or record).
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ParamValue::List(_) | ParamValue::Map(_) | ParamValue::Record(_)
        )
    }

    /// Render the value as raw SQL text for `${...}` substitution.
    /// Null renders as empty text; everything else uses its literal form.
    pub fn substitution_text(&self) -> String {
        match self {
            ParamValue::Null => String::new(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::String(s) => s.clone(),
            other => format!("{:?}", other),
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "null"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::String(s) => write!(f, "{:?}", s),
            ParamValue::List(items) => f.debug_list().entries(items).finish(),
            ParamValue::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            ParamValue::Record(r) => write!(f, "record<{}>", r.type_name()),
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Null, ParamValue::Null) => true,
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a == b,
            (ParamValue::String(a), ParamValue::String(b)) => a == b,
            (ParamValue::List(a), ParamValue::List(b)) => a == b,
            (ParamValue::Map(a), ParamValue::Map(b)) => a == b,
            // Records compare by identity: two handles are the same value
            // only if they point at the same object.
            (ParamValue::Record(a), ParamValue::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Bool(b) => ParamValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParamValue::Int(i)
                } else {
                    ParamValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => ParamValue::String(s),
            serde_json::Value::Array(items) => {
                ParamValue::List(items.into_iter().map(ParamValue::from).collect())
            }
            serde_json::Value::Object(entries) => ParamValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&ParamValue> for serde_json::Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Null => serde_json::Value::Null,
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
            ParamValue::Int(i) => serde_json::Value::from(*i),
            ParamValue::Float(f) => serde_json::Value::from(*f),
            ParamValue::String(s) => serde_json::Value::String(s.clone()),
            ParamValue::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            ParamValue::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
            // Records have no stable JSON form; render the handle description.
            ParamValue::Record(r) => serde_json::Value::String(format!("record<{}>", r.type_name())),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        // Saturate rather than wrap: row bounds use u64::MAX as "no limit".
        ParamValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}
