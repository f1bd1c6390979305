//! Path-walking accessors over parameter values.
//!
//! Dispatch per target shape: map-backed (index tokens are keys), record-backed
//! (static accessor tables), list-backed (index tokens are positions). Reads
//! against a null container resolve to null; everything else that cannot be
//! resolved is an [`AccessError`] carrying the full original path.

use super::errors::{AccessError, AmbiguousAccessorError, PropertyError, RecordAccessFailure};
use super::value::ParamValue;
use crate::property_path::PropertyPath;

/// Resolve a full path expression against a parameter value.
pub fn get_path(root: &ParamValue, expression: &str) -> Result<ParamValue, AccessError> {
    let head = PropertyPath::parse(expression);
    get_onward(root, &head)
}

/// Resolve `seg` and every following segment against `container`.
fn get_onward(container: &ParamValue, seg: &PropertyPath) -> Result<ParamValue, AccessError> {
    if container.is_null() {
        // Null container: the rest of the path resolves to null, it is not an
        // error. This is what lets conditions test optional nested fields.
        return Ok(ParamValue::Null);
    }
    let value = get_segment(container, seg)?;
    match seg.next() {
        None => Ok(value),
        Some(next) => get_onward(&value, &next),
    }
}

/// Resolve the tail of a path whose head name was already matched against a
/// context binding: apply the head's index token to the bound value, then
/// walk the remaining segments.
pub fn get_from_binding(bound: &ParamValue, head: &PropertyPath) -> Result<ParamValue, AccessError> {
    let after_index = match head.index() {
        None => bound.clone(),
        Some(_) if bound.is_null() => ParamValue::Null,
        Some(token) => index_get(bound, head, token)?,
    };
    match head.next() {
        None => Ok(after_index),
        Some(next) => get_onward(&after_index, &next),
    }
}

/// Whether the head segment name of an expression is addressable at all on
/// this value. Used to distinguish "resolves to null" from "no value source".
pub fn has_head_property(root: &ParamValue, name: &str) -> bool {
    match root {
        ParamValue::Map(entries) => entries.contains_key(name),
        ParamValue::Record(handle) => handle.has_property(name),
        _ => false,
    }
}

fn get_segment(container: &ParamValue, seg: &PropertyPath) -> Result<ParamValue, AccessError> {
    let named: ParamValue = if seg.name().is_empty() {
        container.clone()
    } else {
        match container {
            // Maps are open-shape: a missing key reads as null.
            ParamValue::Map(entries) => entries
                .get(seg.name())
                .cloned()
                .unwrap_or(ParamValue::Null),
            ParamValue::Record(handle) => {
                if !handle.has_property(seg.name()) {
                    return Err(missing_property(seg, "record"));
                }
                handle
                    .get(seg.name())
                    .map_err(|_| missing_property(seg, "record"))?
            }
            other => return Err(wrong_shape(seg, other.shape())),
        }
    };
    match seg.index() {
        None => Ok(named),
        Some(_) if named.is_null() => Ok(ParamValue::Null),
        Some(token) => index_get(&named, seg, token),
    }
}

fn index_get(base: &ParamValue, seg: &PropertyPath, token: &str) -> Result<ParamValue, AccessError> {
    match base {
        ParamValue::Null => Ok(ParamValue::Null),
        ParamValue::List(items) => {
            let idx: usize = token.parse().map_err(|_| invalid_index(seg, token))?;
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| out_of_bounds(seg, idx, items.len()))
        }
        ParamValue::Map(entries) => Ok(entries.get(token).cloned().unwrap_or(ParamValue::Null)),
        other => Err(wrong_shape(seg, other.shape())),
    }
}

/// Write a value at a full path expression.
///
/// Intermediate segments must already exist; maps create the final key on
/// write, lists replace positionally (out-of-range is an error, not an
/// append), records go through their setter table.
pub fn set_path(
    root: &mut ParamValue,
    expression: &str,
    value: ParamValue,
) -> Result<(), PropertyError> {
    let head = PropertyPath::parse(expression);
    set_walk(root, &head, value)
}

fn set_walk(
    container: &mut ParamValue,
    seg: &PropertyPath,
    value: ParamValue,
) -> Result<(), PropertyError> {
    let Some(next) = seg.next() else {
        return set_segment(container, seg, value);
    };

    if let ParamValue::Record(handle) = container {
        // Records hand out owned copies; mutate the copy, then write it back
        // through the (single, unambiguous) setter.
        if !handle.has_property(seg.name()) {
            return Err(missing_property(seg, "record").into());
        }
        let type_name = handle.type_name().to_string();
        let mut copy = handle
            .get(seg.name())
            .map_err(|f| record_failure(seg, f, &type_name))?;
        {
            let slot = match seg.index() {
                Some(token) => indexed_slot_mut(&mut copy, seg, token)?,
                None => &mut copy,
            };
            set_walk(slot, &next, value)?;
        }
        handle
            .set(seg.name(), copy)
            .map_err(|f| record_failure(seg, f, &type_name))?;
        return Ok(());
    }

    let base = name_slot_mut(container, seg)?;
    let slot = match seg.index() {
        Some(token) => indexed_slot_mut(base, seg, token)?,
        None => base,
    };
    set_walk(slot, &next, value)
}

fn set_segment(
    container: &mut ParamValue,
    seg: &PropertyPath,
    value: ParamValue,
) -> Result<(), PropertyError> {
    if let ParamValue::Record(handle) = container {
        let type_name = handle.type_name().to_string();
        return match seg.index() {
            None => handle
                .set(seg.name(), value)
                .map_err(|f| record_failure(seg, f, &type_name)),
            Some(token) => {
                let mut copy = handle
                    .get(seg.name())
                    .map_err(|f| record_failure(seg, f, &type_name))?;
                {
                    let slot = indexed_slot_mut(&mut copy, seg, token)?;
                    *slot = value;
                }
                handle
                    .set(seg.name(), copy)
                    .map_err(|f| record_failure(seg, f, &type_name))
            }
        };
    }

    match seg.index() {
        Some(token) => {
            let base = name_slot_mut(container, seg)?;
            let slot = indexed_slot_mut(base, seg, token)?;
            *slot = value;
            Ok(())
        }
        None => match container {
            ParamValue::Map(entries) => {
                entries.insert(seg.name().to_string(), value);
                Ok(())
            }
            ParamValue::Null => Err(null_container(seg).into()),
            other => Err(wrong_shape(seg, other.shape()).into()),
        },
    }
}

fn name_slot_mut<'v>(
    container: &'v mut ParamValue,
    seg: &PropertyPath,
) -> Result<&'v mut ParamValue, PropertyError> {
    if seg.name().is_empty() {
        return Ok(container);
    }
    match container {
        ParamValue::Map(entries) => entries
            .get_mut(seg.name())
            .ok_or_else(|| missing_property(seg, "map").into()),
        ParamValue::Null => Err(null_container(seg).into()),
        other => Err(wrong_shape(seg, other.shape()).into()),
    }
}

fn indexed_slot_mut<'v>(
    base: &'v mut ParamValue,
    seg: &PropertyPath,
    token: &str,
) -> Result<&'v mut ParamValue, PropertyError> {
    match base {
        ParamValue::List(items) => {
            let idx: usize = token
                .parse()
                .map_err(|_| PropertyError::from(invalid_index(seg, token)))?;
            let len = items.len();
            items
                .get_mut(idx)
                .ok_or_else(|| out_of_bounds(seg, idx, len).into())
        }
        ParamValue::Map(entries) => entries
            .get_mut(token)
            .ok_or_else(|| missing_property(seg, "map").into()),
        ParamValue::Null => Err(null_container(seg).into()),
        other => Err(wrong_shape(seg, other.shape()).into()),
    }
}

fn missing_property(seg: &PropertyPath, shape: &str) -> AccessError {
    AccessError::MissingProperty {
        path: seg.full_expression().to_string(),
        segment: seg.name().to_string(),
        shape: shape.to_string(),
    }
}

fn wrong_shape(seg: &PropertyPath, shape: &str) -> AccessError {
    AccessError::WrongShape {
        path: seg.full_expression().to_string(),
        segment: seg.name().to_string(),
        shape: shape.to_string(),
    }
}

fn invalid_index(seg: &PropertyPath, token: &str) -> AccessError {
    AccessError::InvalidIndex {
        path: seg.full_expression().to_string(),
        token: token.to_string(),
    }
}

fn out_of_bounds(seg: &PropertyPath, index: usize, len: usize) -> AccessError {
    AccessError::IndexOutOfBounds {
        path: seg.full_expression().to_string(),
        index,
        len,
    }
}

fn null_container(seg: &PropertyPath) -> AccessError {
    AccessError::NullContainer {
        path: seg.full_expression().to_string(),
        segment: seg.name().to_string(),
    }
}

fn record_failure(
    seg: &PropertyPath,
    failure: RecordAccessFailure,
    type_name: &str,
) -> PropertyError {
    match failure {
        RecordAccessFailure::NoSuchProperty => missing_property(seg, "record").into(),
        RecordAccessFailure::NoSetter => AccessError::NoSetter {
            path: seg.full_expression().to_string(),
            segment: seg.name().to_string(),
            shape: type_name.to_string(),
        }
        .into(),
        RecordAccessFailure::Ambiguous(inner) => PropertyError::Ambiguous(AmbiguousAccessorError {
            type_name: inner.type_name,
            property: inner.property,
            candidates: inner.candidates,
        }),
    }
}
