//! Cross-module unit tests for the mapping pipeline.

mod end_to_end_tests;
mod interception_tests;
mod registry_tests;
mod template_robustness_tests;
