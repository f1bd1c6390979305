//! Fragment/statement registry and worklist behavior.

use serde_json::json;

use sqlweave::config::EngineConfig;
use sqlweave::engine::{Configuration, EngineError, SqlCommandType};
use sqlweave::param_object::ParamValue;

fn configuration() -> Configuration {
    Configuration::new(EngineConfig::default())
}

#[test]
fn fragment_registered_first_resolves_inline() {
    let config = configuration();
    config.add_fragment("cols", "id, name, email").unwrap();
    config
        .add_statement(
            "findAll",
            SqlCommandType::Select,
            r#"SELECT <include refid="cols"/> FROM users"#,
        )
        .unwrap();
    let bound = config
        .compile_statement("findAll", ParamValue::Null)
        .unwrap();
    assert_eq!(bound.sql(), "SELECT id, name, email FROM users");
}

#[test]
fn statement_registered_before_its_fragment_is_queued_then_resolved() {
    let config = configuration();
    config
        .add_statement(
            "findAll",
            SqlCommandType::Select,
            r#"SELECT <include refid="cols"/> FROM users"#,
        )
        .unwrap();

    // Not failed, just parked.
    assert_eq!(config.pending_ids(), vec!["findAll".to_string()]);
    assert!(matches!(
        config.compile_statement("findAll", ParamValue::Null),
        Err(EngineError::Pending(_))
    ));

    // The fragment arriving drains the worklist.
    config.add_fragment("cols", "id, name").unwrap();
    assert!(config.pending_ids().is_empty());
    let bound = config
        .compile_statement("findAll", ParamValue::Null)
        .unwrap();
    assert_eq!(bound.sql(), "SELECT id, name FROM users");
}

#[test]
fn chained_fragment_arrivals_unblock_in_any_order() {
    let config = configuration();
    config
        .add_statement(
            "s",
            SqlCommandType::Select,
            r#"SELECT <include refid="outer"/> FROM t"#,
        )
        .unwrap();
    // `outer` itself depends on `inner`; registering it is not enough.
    config
        .add_fragment("outer", r#"a, <include refid="inner"/>"#)
        .unwrap();
    assert_eq!(config.pending_ids(), vec!["s".to_string()]);

    config.add_fragment("inner", "b").unwrap();
    assert!(config.pending_ids().is_empty());
    let bound = config.compile_statement("s", ParamValue::Null).unwrap();
    assert_eq!(bound.sql(), "SELECT a, b FROM t");
}

#[test]
fn resolve_pending_escalates_when_no_progress_is_possible() {
    let config = configuration();
    config
        .add_statement(
            "stuck",
            SqlCommandType::Select,
            r#"SELECT <include refid="never"/> FROM t"#,
        )
        .unwrap();
    match config.resolve_pending() {
        Err(EngineError::UnresolvedReferences(ids)) => {
            assert_eq!(ids, vec!["stuck".to_string()]);
        }
        other => panic!("expected escalation, got {:?}", other.err()),
    }
    // The entry stays queued: escalation reports, it does not discard.
    assert_eq!(config.pending_ids(), vec!["stuck".to_string()]);
}

#[test]
fn resolve_pending_with_empty_worklist_is_a_no_op() {
    let config = configuration();
    config
        .add_statement("s", SqlCommandType::Select, "SELECT 1")
        .unwrap();
    config.resolve_pending().unwrap();
}

#[test]
fn circular_includes_escalate_as_fatal() {
    let config = configuration();
    config
        .add_fragment("a", r#"<include refid="b"/>"#)
        .unwrap();
    // Completing the cycle makes the pending statement resolvable but
    // structurally defective.
    config
        .add_statement(
            "s",
            SqlCommandType::Select,
            r#"SELECT <include refid="a"/> FROM t"#,
        )
        .unwrap();
    let result = config.add_fragment("b", r#"<include refid="a"/>"#);
    assert!(matches!(result, Err(EngineError::Build { .. })));
}

#[test]
fn duplicate_fragment_ids_are_rejected() {
    let config = configuration();
    config.add_fragment("cols", "id").unwrap();
    assert!(matches!(
        config.add_fragment("cols", "name"),
        Err(EngineError::DuplicateFragment(_))
    ));
}

#[test]
fn included_fragments_participate_in_dynamic_composition() {
    let config = configuration();
    config
        .add_fragment(
            "name_filter",
            r#"<if test="name != null">name = #{name}</if>"#,
        )
        .unwrap();
    config
        .add_statement(
            "find",
            SqlCommandType::Select,
            r#"SELECT * FROM t <where><include refid="name_filter"/></where>"#,
        )
        .unwrap();

    let with = config
        .compile_statement("find", ParamValue::from(json!({"name": "x"})))
        .unwrap();
    assert_eq!(with.sql(), "SELECT * FROM t WHERE name = ?");

    let without = config
        .compile_statement("find", ParamValue::from(json!({})))
        .unwrap();
    assert_eq!(without.sql(), "SELECT * FROM t");
}
