//! The mutable evaluation environment threaded through node composition.

use std::collections::BTreeMap;

use super::errors::ComposeError;
use crate::config::EngineConfig;
use crate::param_object::{accessor, ParamValue};
use crate::property_path::PropertyPath;

/// One instance per statement-template evaluation: accumulated SQL
/// fragments, scoped name bindings, and the unique-number counter. Discarded
/// after the bound statement is produced; the root bindings are folded into
/// it first.
pub struct DynamicContext<'a> {
    param: &'a ParamValue,
    config: &'a EngineConfig,
    /// Binding scopes: `frames[0]` is the root frame whose contents become
    /// the bound statement's side-bindings; loop iterations push and pop
    /// overlay frames so sibling iterations never see each other's items.
    frames: Vec<BTreeMap<String, ParamValue>>,
    fragments: Vec<String>,
    unique: u32,
}

impl<'a> DynamicContext<'a> {
    pub fn new(param: &'a ParamValue, config: &'a EngineConfig) -> Self {
        DynamicContext {
            param,
            config,
            frames: vec![BTreeMap::new()],
            fragments: Vec::new(),
            unique: 0,
        }
    }

    pub fn param(&self) -> &ParamValue {
        self.param
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn append_sql(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            self.fragments.push(fragment.to_string());
        }
    }

    /// The accumulated SQL: fragments joined with single spaces, outer
    /// whitespace trimmed.
    pub fn sql(&self) -> String {
        self.fragments.join(" ").trim().to_string()
    }

    /// Returns the current counter value, then increments. Never repeats or
    /// skips within one evaluation.
    pub fn unique_number(&mut self) -> u32 {
        let n = self.unique;
        self.unique += 1;
        n
    }

    /// Bind a name in the innermost scope.
    pub fn bind(&mut self, name: String, value: ParamValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }

    /// Bind a name in the root scope, surviving into the bound statement's
    /// side-bindings.
    pub fn bind_root(&mut self, name: String, value: ParamValue) {
        if let Some(frame) = self.frames.first_mut() {
            frame.insert(name, value);
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    pub fn pop_frame(&mut self) {
        // The root frame is permanent.
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Resolve a property path: innermost binding frames first, then the
    /// parameter object.
    pub fn resolve(&self, path: &str) -> Result<ParamValue, ComposeError> {
        let head = PropertyPath::parse(path);
        for frame in self.frames.iter().rev() {
            if let Some(bound) = frame.get(head.name()) {
                return accessor::get_from_binding(bound, &head).map_err(ComposeError::from);
            }
        }
        accessor::get_path(self.param, path).map_err(ComposeError::from)
    }

    /// Run `f` against an isolated SQL sub-buffer, sharing bindings and the
    /// unique-number counter, and return its continue-flag plus the captured
    /// text.
    pub fn capture<F>(&mut self, f: F) -> Result<(bool, String), ComposeError>
    where
        F: FnOnce(&mut Self) -> Result<bool, ComposeError>,
    {
        let saved = std::mem::take(&mut self.fragments);
        let result = f(self);
        let captured = std::mem::replace(&mut self.fragments, saved);
        let continues = result?;
        Ok((continues, captured.join(" ").trim().to_string()))
    }

    /// Tear down the context, yielding the root-frame bindings.
    pub fn into_side_bindings(mut self) -> BTreeMap<String, ParamValue> {
        if self.frames.is_empty() {
            BTreeMap::new()
        } else {
            std::mem::take(&mut self.frames[0])
        }
    }
}
