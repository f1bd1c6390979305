//! sqlweave - Dynamic SQL mapping engine
//!
//! This crate turns declarative statement templates into executable SQL through:
//! - A template language (`<if>`, `<choose>`, `<foreach>`, `<trim>`, `<where>`, `<set>`,
//!   `<bind>`, `<include>`) parsed once into a node tree
//! - Property-path resolution over arbitrary runtime parameter objects
//! - Per-execution composition into a final SQL string plus ordered parameter bindings
//! - An interception layer for cross-cutting behavior on the binding/execution seams

pub mod cache_key;
pub mod config;
pub mod engine;
pub mod interceptor;
pub mod param_object;
pub mod property_path;
pub mod sql_composer;
pub mod statement_compiler;
pub mod template_parser;
pub mod type_registry;
