//! Full pipeline tests: template text + parameter object in, final SQL +
//! ordered arguments out.

use serde_json::json;

use sqlweave::cache_key::CacheKey;
use sqlweave::config::EngineConfig;
use sqlweave::engine::{Configuration, RowBounds, SqlCommandType};
use sqlweave::param_object::{AccessorTable, ParamValue, Record, RecordCell};
use sqlweave::type_registry::SqlArgument;

fn select(template: &str) -> Configuration {
    let config = Configuration::new(EngineConfig::default());
    config
        .add_statement("stmt", SqlCommandType::Select, template)
        .unwrap();
    config
}

fn compile(template: &str, params: serde_json::Value) -> (String, Vec<SqlArgument>) {
    let config = select(template);
    let bound = config
        .compile_statement("stmt", ParamValue::from(params))
        .unwrap();
    let args = config.bind_arguments(&bound).unwrap();
    (bound.sql().to_string(), args)
}

#[test]
fn optional_where_clause_present() {
    let (sql, args) = compile(
        r#"<where><if test="name != null">name = #{name}</if></where>"#,
        json!({"name": "Alice"}),
    );
    assert_eq!(sql, "WHERE name = ?");
    assert_eq!(args, vec![SqlArgument::Text("Alice".to_string())]);
}

#[test]
fn optional_where_clause_absent() {
    let (sql, args) = compile(
        r#"<where><if test="name != null">name = #{name}</if></where>"#,
        json!({"name": null}),
    );
    assert_eq!(sql, "");
    assert!(args.is_empty());
}

#[test]
fn foreach_in_list() {
    let (sql, args) = compile(
        r#"<foreach collection="ids" item="id" open="(" close=")" separator=",">#{id}</foreach>"#,
        json!({"ids": [1, 2, 3]}),
    );
    assert_eq!(sql, "(?,?,?)");
    assert_eq!(
        args,
        vec![
            SqlArgument::Int(1),
            SqlArgument::Int(2),
            SqlArgument::Int(3)
        ]
    );
}

#[test]
fn foreach_over_empty_list_leaves_no_tokens() {
    let (sql, args) = compile(
        r#"SELECT * FROM t<foreach collection="ids" item="id" open=" WHERE id IN (" close=")" separator=",">#{id}</foreach>"#,
        json!({"ids": []}),
    );
    assert_eq!(sql, "SELECT * FROM t");
    assert!(args.is_empty());
}

#[test]
fn reordered_cache_key_components_differ() {
    let mut a = CacheKey::new();
    a.update_all([
        ParamValue::from("stmt1"),
        ParamValue::from("SELECT * FROM t"),
        ParamValue::Int(1),
        ParamValue::Int(2),
    ]);
    let mut b = CacheKey::new();
    b.update_all([
        ParamValue::from("stmt1"),
        ParamValue::from("SELECT * FROM t"),
        ParamValue::Int(2),
        ParamValue::Int(1),
    ]);
    assert_ne!(a, b);
}

#[test]
fn full_select_with_conditions_and_loop() {
    let template = r#"SELECT * FROM orders
        <where>
            <if test="customer != null">customer = #{customer}</if>
            <if test="statuses != null and statuses">AND status IN
                <foreach collection="statuses" item="s" open="(" close=")" separator=",">#{s}</foreach>
            </if>
        </where>
        ORDER BY id"#;
    let (sql, args) = compile(
        template,
        json!({"customer": "acme", "statuses": ["open", "held"]}),
    );
    assert_eq!(
        sql,
        "SELECT * FROM orders WHERE customer = ? AND status IN (?,?) ORDER BY id"
    );
    assert_eq!(
        args,
        vec![
            SqlArgument::Text("acme".to_string()),
            SqlArgument::Text("open".to_string()),
            SqlArgument::Text("held".to_string())
        ]
    );
}

#[test]
fn update_with_set_accumulator() {
    let template = r#"UPDATE users
        <set>
            <if test="name != null">name = #{name},</if>
            <if test="email != null">email = #{email},</if>
        </set>
        WHERE id = #{id}"#;
    let (sql, args) = compile(template, json!({"name": "Ada", "email": null, "id": 3}));
    assert_eq!(sql, "UPDATE users SET name = ? WHERE id = ?");
    assert_eq!(
        args,
        vec![SqlArgument::Text("Ada".to_string()), SqlArgument::Int(3)]
    );
}

#[test]
fn choose_picks_first_true_branch_end_to_end() {
    let template = r#"SELECT * FROM t
        <where>
            <choose>
                <when test="id != null">id = #{id}</when>
                <when test="name != null">name = #{name}</when>
                <otherwise>1 = 1</otherwise>
            </choose>
        </where>"#;
    let (sql, args) = compile(template, json!({"id": 5, "name": "x"}));
    assert_eq!(sql, "SELECT * FROM t WHERE id = ?");
    assert_eq!(args, vec![SqlArgument::Int(5)]);

    let (sql, args) = compile(template, json!({}));
    assert_eq!(sql, "SELECT * FROM t WHERE 1 = 1");
    assert!(args.is_empty());
}

#[test]
fn bind_value_feeds_a_placeholder() {
    let template =
        r#"<bind name="pattern" value="name"/>SELECT * FROM t WHERE name LIKE #{pattern}"#;
    let (sql, args) = compile(template, json!({"name": "Ali%"}));
    assert_eq!(sql, "SELECT * FROM t WHERE name LIKE ?");
    assert_eq!(args, vec![SqlArgument::Text("Ali%".to_string())]);
}

#[test]
fn dollar_substitution_is_text_not_a_parameter() {
    let (sql, args) = compile(
        r#"SELECT * FROM t ORDER BY ${column} DESC"#,
        json!({"column": "created_at"}),
    );
    assert_eq!(sql, "SELECT * FROM t ORDER BY created_at DESC");
    assert!(args.is_empty());
}

#[test]
fn escaped_tokens_reach_the_driver_verbatim() {
    let (sql, args) = compile(r"SELECT '\#{literal}', '\${literal}' FROM t", json!({}));
    assert_eq!(sql, "SELECT '#{literal}', '${literal}' FROM t");
    assert!(args.is_empty());
}

#[test]
fn raw_path_sql_is_identical_across_calls() {
    let config = select("SELECT * FROM t WHERE id = #{id}");
    let first = config
        .compile_statement("stmt", ParamValue::from(json!({"id": 1})))
        .unwrap();
    let second = config
        .compile_statement("stmt", ParamValue::from(json!({"id": 2})))
        .unwrap();
    assert_eq!(first.sql(), second.sql());
    assert!(config.statement("stmt").unwrap().sql_source.is_raw());
}

#[test]
fn dynamic_path_recompiles_per_call() {
    let template = r#"<foreach collection="ids" item="id" open="(" close=")" separator=",">#{id}</foreach>"#;
    let config = select(template);
    let two = config
        .compile_statement("stmt", ParamValue::from(json!({"ids": [1, 2]})))
        .unwrap();
    let three = config
        .compile_statement("stmt", ParamValue::from(json!({"ids": [1, 2, 3]})))
        .unwrap();
    assert_eq!(two.sql(), "(?,?)");
    assert_eq!(three.sql(), "(?,?,?)");
}

#[test]
fn nested_parameter_paths_resolve() {
    let (sql, args) = compile(
        "SELECT * FROM t WHERE city = #{user.address.city} AND tag = #{user.tags[1]}",
        json!({"user": {"address": {"city": "Oslo"}, "tags": ["a", "b"]}}),
    );
    assert_eq!(sql, "SELECT * FROM t WHERE city = ? AND tag = ?");
    assert_eq!(
        args,
        vec![
            SqlArgument::Text("Oslo".to_string()),
            SqlArgument::Text("b".to_string())
        ]
    );
}

#[test]
fn unresolvable_expression_is_a_binding_error_naming_the_statement() {
    let config = select("SELECT * FROM t WHERE id = #{missing}");
    let err = config
        .compile_statement("stmt", ParamValue::from(json!({"id": 1})))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("stmt"), "message: {}", message);
    assert!(message.contains("missing"), "message: {}", message);
}

#[derive(Debug)]
struct Filter {
    status: String,
    min_total: i64,
}

lazy_static::lazy_static! {
    static ref FILTER_TABLE: AccessorTable<Filter> = AccessorTable::new("Filter")
        .getter("getStatus", |f: &Filter| ParamValue::from(f.status.clone()))
        .getter("getMinTotal", |f| ParamValue::Int(f.min_total));
}

impl Record for Filter {
    fn accessor_table() -> &'static AccessorTable<Self> {
        &FILTER_TABLE
    }
}

#[test]
fn record_backed_parameter_object() {
    let config = select(
        r#"SELECT * FROM orders <where>
            <if test="status != null">status = #{status}</if>
            <if test="minTotal > 0">AND total >= #{minTotal}</if>
        </where>"#,
    );
    let param = RecordCell::value(Filter {
        status: "open".to_string(),
        min_total: 250,
    });
    let bound = config.compile_statement("stmt", param).unwrap();
    let args = config.bind_arguments(&bound).unwrap();
    assert_eq!(
        bound.sql(),
        "SELECT * FROM orders WHERE status = ? AND total >= ?"
    );
    assert_eq!(
        args,
        vec![SqlArgument::Text("open".to_string()), SqlArgument::Int(250)]
    );
}

#[test]
fn cache_keys_depend_on_row_bounds() {
    let config = select("SELECT * FROM t WHERE id = #{id}");
    let bound = config
        .compile_statement("stmt", ParamValue::from(json!({"id": 1})))
        .unwrap();
    let args = config.bind_arguments(&bound).unwrap();
    let unbounded = config.build_cache_key("stmt", &bound, &args, RowBounds::default());
    let paged = config.build_cache_key("stmt", &bound, &args, RowBounds::new(10, 20));
    assert_ne!(unbounded, paged);
    let again = config.build_cache_key("stmt", &bound, &args, RowBounds::default());
    assert_eq!(unbounded, again);
}
