//! Interception layer behavior through the configuration facade.

use std::sync::{Arc, Mutex};

use serde_json::json;

use sqlweave::config::EngineConfig;
use sqlweave::engine::{Configuration, SqlCommandType};
use sqlweave::interceptor::{
    Executor, ExecutorError, Interceptor, InterceptorError, Invocation, ReturnValue, Signature,
};
use sqlweave::param_object::ParamValue;
use sqlweave::statement_compiler::BoundStatement;
use sqlweave::type_registry::SqlArgument;

struct CountingExecutor {
    queries: Arc<Mutex<Vec<String>>>,
}

impl Executor for CountingExecutor {
    fn query(
        &self,
        statement: &BoundStatement,
        _args: &[SqlArgument],
    ) -> Result<Vec<ParamValue>, ExecutorError> {
        self.queries.lock().unwrap().push(statement.sql().to_string());
        Ok(vec![])
    }

    fn update(
        &self,
        _statement: &BoundStatement,
        _args: &[SqlArgument],
    ) -> Result<u64, ExecutorError> {
        Ok(0)
    }
}

/// Observes query executions and records the SQL it saw.
struct SqlLogInterceptor {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for SqlLogInterceptor {
    fn signatures(&self) -> &[Signature] {
        &[Signature::QUERY]
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<ReturnValue, InterceptorError> {
        self.seen
            .lock()
            .unwrap()
            .push(invocation.statement().sql().to_string());
        invocation.proceed()
    }
}

/// Rewrites every bound text argument to uppercase.
struct UppercasingBinderInterceptor;

impl Interceptor for UppercasingBinderInterceptor {
    fn signatures(&self) -> &[Signature] {
        &[Signature::BIND]
    }

    fn intercept(&self, invocation: Invocation<'_>) -> Result<ReturnValue, InterceptorError> {
        match invocation.proceed()? {
            ReturnValue::Arguments(args) => Ok(ReturnValue::Arguments(
                args.into_iter()
                    .map(|arg| match arg {
                        SqlArgument::Text(s) => SqlArgument::Text(s.to_uppercase()),
                        other => other,
                    })
                    .collect(),
            )),
            other => Ok(other),
        }
    }
}

#[test]
fn binder_interception_can_transform_arguments() {
    let mut config = Configuration::new(EngineConfig::default());
    config.register_interceptor(Arc::new(UppercasingBinderInterceptor));
    config
        .add_statement(
            "find",
            SqlCommandType::Select,
            "SELECT * FROM t WHERE name = #{name}",
        )
        .unwrap();

    let bound = config
        .compile_statement("find", ParamValue::from(json!({"name": "alice"})))
        .unwrap();
    let args = config.bind_arguments(&bound).unwrap();
    assert_eq!(args, vec![SqlArgument::Text("ALICE".to_string())]);
}

#[test]
fn executor_interception_observes_the_final_sql() {
    let mut config = Configuration::new(EngineConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    config.register_interceptor(Arc::new(SqlLogInterceptor { seen: seen.clone() }));
    config
        .add_statement("find", SqlCommandType::Select, "SELECT * FROM t WHERE id = #{id}")
        .unwrap();

    let bound = config
        .compile_statement("find", ParamValue::from(json!({"id": 9})))
        .unwrap();
    let args = config.bind_arguments(&bound).unwrap();

    let queries = Arc::new(Mutex::new(Vec::new()));
    let executor = config.wrap_executor(Arc::new(CountingExecutor {
        queries: queries.clone(),
    }));
    executor.query(&bound, &args).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["SELECT * FROM t WHERE id = ?".to_string()]
    );
    assert_eq!(
        *queries.lock().unwrap(),
        vec!["SELECT * FROM t WHERE id = ?".to_string()]
    );
}

#[test]
fn executor_without_matching_signature_is_not_proxied() {
    let mut config = Configuration::new(EngineConfig::default());
    config.register_interceptor(Arc::new(UppercasingBinderInterceptor));

    let executor: Arc<dyn Executor> = Arc::new(CountingExecutor {
        queries: Arc::new(Mutex::new(Vec::new())),
    });
    let wrapped = config.wrap_executor(executor.clone());
    assert!(Arc::ptr_eq(&executor, &wrapped));
}

#[test]
fn binder_interception_composes_with_side_bindings() {
    let mut config = Configuration::new(EngineConfig::default());
    config.register_interceptor(Arc::new(UppercasingBinderInterceptor));
    config
        .add_statement(
            "find",
            SqlCommandType::Select,
            r#"SELECT * FROM t WHERE name IN <foreach collection="names" item="n" open="(" close=")" separator=",">#{n}</foreach>"#,
        )
        .unwrap();

    let bound = config
        .compile_statement("find", ParamValue::from(json!({"names": ["a", "b"]})))
        .unwrap();
    let args = config.bind_arguments(&bound).unwrap();
    assert_eq!(
        args,
        vec![
            SqlArgument::Text("A".to_string()),
            SqlArgument::Text("B".to_string())
        ]
    );
}
