//! Interception layer.
//!
//! A generic decorator mechanism: interceptors declare, out of band, the
//! signature set of methods they want to observe; wrapping a target produces
//! a layered decorator only for the seams some interceptor actually matches.
//! If nothing matches, the original target is returned untouched - no
//! needless indirection. The first-registered interceptor ends up outermost:
//! its pre/post logic runs first and last.
//!
//! The interceptable seams are the crate's own object-safe traits: the
//! parameter binder and the (external) execution boundary.

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::param_object::ParamValue;
use crate::statement_compiler::{bind_arguments, BoundStatement, CompileError};
use crate::type_registry::{ConverterRegistry, SqlArgument};

/// Binds a compiled statement's parameters into ordered arguments.
pub trait ParameterBinder: Send + Sync {
    fn bind(
        &self,
        statement: &BoundStatement,
        registry: &ConverterRegistry,
    ) -> Result<Vec<SqlArgument>, CompileError>;
}

/// The opaque synchronous execution boundary. The crate ships no real
/// implementation; callers supply one backed by their driver.
pub trait Executor: Send + Sync {
    fn query(
        &self,
        statement: &BoundStatement,
        args: &[SqlArgument],
    ) -> Result<Vec<ParamValue>, ExecutorError>;

    fn update(
        &self,
        statement: &BoundStatement,
        args: &[SqlArgument],
    ) -> Result<u64, ExecutorError>;
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("execution failed: {0}")]
pub struct ExecutorError(pub String);

/// Default binder: straight delegation to the compiler's binding pass.
pub struct DefaultParameterBinder;

impl ParameterBinder for DefaultParameterBinder {
    fn bind(
        &self,
        statement: &BoundStatement,
        registry: &ConverterRegistry,
    ) -> Result<Vec<SqlArgument>, CompileError> {
        bind_arguments(statement, registry)
    }
}

/// The interceptable interfaces, as a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    ParameterBinder,
    Executor,
}

/// One (interface, method, argument types) triple an interceptor observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub interface: InterfaceKind,
    pub method: &'static str,
    pub args: &'static [&'static str],
}

impl Signature {
    pub const BIND: Signature = Signature {
        interface: InterfaceKind::ParameterBinder,
        method: "bind",
        args: &["BoundStatement", "ConverterRegistry"],
    };

    pub const QUERY: Signature = Signature {
        interface: InterfaceKind::Executor,
        method: "query",
        args: &["BoundStatement", "[SqlArgument]"],
    };

    pub const UPDATE: Signature = Signature {
        interface: InterfaceKind::Executor,
        method: "update",
        args: &["BoundStatement", "[SqlArgument]"],
    };

    fn matches(&self, invocation: &Invocation<'_>) -> bool {
        self.interface == invocation.interface()
            && self.method == invocation.method()
            && self.args == invocation.arg_types()
    }
}

/// A reified method call crossing the interception layer. `proceed()`
/// performs the real call on the wrapped target.
pub enum Invocation<'a> {
    Bind {
        target: &'a dyn ParameterBinder,
        statement: &'a BoundStatement,
        registry: &'a ConverterRegistry,
    },
    Query {
        target: &'a dyn Executor,
        statement: &'a BoundStatement,
        args: &'a [SqlArgument],
    },
    Update {
        target: &'a dyn Executor,
        statement: &'a BoundStatement,
        args: &'a [SqlArgument],
    },
}

/// What an intercepted method returned, reified.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Arguments(Vec<SqlArgument>),
    Rows(Vec<ParamValue>),
    Affected(u64),
}

#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error(transparent)]
    Bind(#[from] CompileError),

    #[error(transparent)]
    Execute(#[from] ExecutorError),

    #[error("{0}")]
    Custom(String),
}

impl Invocation<'_> {
    pub fn interface(&self) -> InterfaceKind {
        match self {
            Invocation::Bind { .. } => InterfaceKind::ParameterBinder,
            Invocation::Query { .. } | Invocation::Update { .. } => InterfaceKind::Executor,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Invocation::Bind { .. } => "bind",
            Invocation::Query { .. } => "query",
            Invocation::Update { .. } => "update",
        }
    }

    pub fn arg_types(&self) -> &'static [&'static str] {
        match self {
            Invocation::Bind { .. } => Signature::BIND.args,
            Invocation::Query { .. } => Signature::QUERY.args,
            Invocation::Update { .. } => Signature::UPDATE.args,
        }
    }

    pub fn statement(&self) -> &BoundStatement {
        match self {
            Invocation::Bind { statement, .. }
            | Invocation::Query { statement, .. }
            | Invocation::Update { statement, .. } => statement,
        }
    }

    /// Perform the real call.
    pub fn proceed(&self) -> Result<ReturnValue, InterceptorError> {
        match self {
            Invocation::Bind {
                target,
                statement,
                registry,
            } => Ok(ReturnValue::Arguments(target.bind(statement, registry)?)),
            Invocation::Query {
                target,
                statement,
                args,
            } => Ok(ReturnValue::Rows(target.query(statement, args)?)),
            Invocation::Update {
                target,
                statement,
                args,
            } => Ok(ReturnValue::Affected(target.update(statement, args)?)),
        }
    }
}

/// Cross-cutting behavior attached by signature, without modifying the
/// intercepted code.
pub trait Interceptor: Send + Sync {
    fn signatures(&self) -> &[Signature];

    fn intercept(&self, invocation: Invocation<'_>) -> Result<ReturnValue, InterceptorError>;
}

/// Registration-ordered interceptor chain, owned by the configuration - not
/// process-global state.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap a binder. Folding in reverse registration order leaves the
    /// first-registered interceptor outermost.
    pub fn wrap_binder(&self, target: Arc<dyn ParameterBinder>) -> Arc<dyn ParameterBinder> {
        let mut wrapped = target;
        for interceptor in self.interceptors.iter().rev() {
            if observes(interceptor.as_ref(), InterfaceKind::ParameterBinder) {
                debug!("wrapping parameter binder with interceptor");
                wrapped = Arc::new(BinderDecorator {
                    inner: wrapped,
                    interceptor: interceptor.clone(),
                });
            }
        }
        wrapped
    }

    /// Wrap an executor; same ordering rule as [`Self::wrap_binder`].
    pub fn wrap_executor(&self, target: Arc<dyn Executor>) -> Arc<dyn Executor> {
        let mut wrapped = target;
        for interceptor in self.interceptors.iter().rev() {
            if observes(interceptor.as_ref(), InterfaceKind::Executor) {
                debug!("wrapping executor with interceptor");
                wrapped = Arc::new(ExecutorDecorator {
                    inner: wrapped,
                    interceptor: interceptor.clone(),
                });
            }
        }
        wrapped
    }
}

fn observes(interceptor: &dyn Interceptor, interface: InterfaceKind) -> bool {
    interceptor
        .signatures()
        .iter()
        .any(|s| s.interface == interface)
}

struct BinderDecorator {
    inner: Arc<dyn ParameterBinder>,
    interceptor: Arc<dyn Interceptor>,
}

impl ParameterBinder for BinderDecorator {
    fn bind(
        &self,
        statement: &BoundStatement,
        registry: &ConverterRegistry,
    ) -> Result<Vec<SqlArgument>, CompileError> {
        let invocation = Invocation::Bind {
            target: self.inner.as_ref(),
            statement,
            registry,
        };
        if !signature_matches(self.interceptor.as_ref(), &invocation) {
            return self.inner.bind(statement, registry);
        }
        match self.interceptor.intercept(invocation) {
            Ok(ReturnValue::Arguments(args)) => Ok(args),
            Ok(other) => Err(CompileError::Interceptor(format!(
                "interceptor returned {:?} from bind()",
                other
            ))),
            Err(InterceptorError::Bind(e)) => Err(e),
            Err(other) => Err(CompileError::Interceptor(other.to_string())),
        }
    }
}

struct ExecutorDecorator {
    inner: Arc<dyn Executor>,
    interceptor: Arc<dyn Interceptor>,
}

impl Executor for ExecutorDecorator {
    fn query(
        &self,
        statement: &BoundStatement,
        args: &[SqlArgument],
    ) -> Result<Vec<ParamValue>, ExecutorError> {
        let invocation = Invocation::Query {
            target: self.inner.as_ref(),
            statement,
            args,
        };
        if !signature_matches(self.interceptor.as_ref(), &invocation) {
            return self.inner.query(statement, args);
        }
        match self.interceptor.intercept(invocation) {
            Ok(ReturnValue::Rows(rows)) => Ok(rows),
            Ok(other) => Err(ExecutorError(format!(
                "interceptor returned {:?} from query()",
                other
            ))),
            Err(InterceptorError::Execute(e)) => Err(e),
            Err(other) => Err(ExecutorError(other.to_string())),
        }
    }

    fn update(
        &self,
        statement: &BoundStatement,
        args: &[SqlArgument],
    ) -> Result<u64, ExecutorError> {
        let invocation = Invocation::Update {
            target: self.inner.as_ref(),
            statement,
            args,
        };
        if !signature_matches(self.interceptor.as_ref(), &invocation) {
            return self.inner.update(statement, args);
        }
        match self.interceptor.intercept(invocation) {
            Ok(ReturnValue::Affected(n)) => Ok(n),
            Ok(other) => Err(ExecutorError(format!(
                "interceptor returned {:?} from update()",
                other
            ))),
            Err(InterceptorError::Execute(e)) => Err(e),
            Err(other) => Err(ExecutorError(other.to_string())),
        }
    }
}

fn signature_matches(interceptor: &dyn Interceptor, invocation: &Invocation<'_>) -> bool {
    interceptor
        .signatures()
        .iter()
        .any(|s| s.matches(invocation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn empty_statement() -> BoundStatement {
        BoundStatement::new(
            "stmt",
            "SELECT 1".to_string(),
            vec![],
            Arc::new(ParamValue::Null),
            BTreeMap::new(),
        )
    }

    struct RecordingExecutor;

    impl Executor for RecordingExecutor {
        fn query(
            &self,
            _statement: &BoundStatement,
            _args: &[SqlArgument],
        ) -> Result<Vec<ParamValue>, ExecutorError> {
            Ok(vec![ParamValue::Int(1)])
        }

        fn update(
            &self,
            _statement: &BoundStatement,
            _args: &[SqlArgument],
        ) -> Result<u64, ExecutorError> {
            Ok(7)
        }
    }

    /// Appends its tag to a shared trace around `proceed()`.
    struct TracingInterceptor {
        tag: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for TracingInterceptor {
        fn signatures(&self) -> &[Signature] {
            &[Signature::QUERY]
        }

        fn intercept(&self, invocation: Invocation<'_>) -> Result<ReturnValue, InterceptorError> {
            self.trace
                .lock()
                .unwrap()
                .push(format!("{}:before", self.tag));
            let result = invocation.proceed();
            self.trace
                .lock()
                .unwrap()
                .push(format!("{}:after", self.tag));
            result
        }
    }

    struct BinderOnlyInterceptor;

    impl Interceptor for BinderOnlyInterceptor {
        fn signatures(&self) -> &[Signature] {
            &[Signature::BIND]
        }

        fn intercept(&self, invocation: Invocation<'_>) -> Result<ReturnValue, InterceptorError> {
            invocation.proceed()
        }
    }

    #[test]
    fn unmatched_target_is_returned_unwrapped() {
        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(BinderOnlyInterceptor));

        let executor: Arc<dyn Executor> = Arc::new(RecordingExecutor);
        let wrapped = chain.wrap_executor(executor.clone());
        // Pointer identity: no needless indirection.
        assert!(Arc::ptr_eq(&executor, &wrapped));
    }

    #[test]
    fn empty_chain_never_wraps() {
        let chain = InterceptorChain::new();
        let binder: Arc<dyn ParameterBinder> = Arc::new(DefaultParameterBinder);
        let wrapped = chain.wrap_binder(binder.clone());
        assert!(Arc::ptr_eq(&binder, &wrapped));
    }

    #[test]
    fn first_registered_interceptor_is_outermost() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(TracingInterceptor {
            tag: "first",
            trace: trace.clone(),
        }));
        chain.register(Arc::new(TracingInterceptor {
            tag: "second",
            trace: trace.clone(),
        }));

        let wrapped = chain.wrap_executor(Arc::new(RecordingExecutor));
        let rows = wrapped.query(&empty_statement(), &[]).unwrap();
        assert_eq!(rows, vec![ParamValue::Int(1)]);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["first:before", "second:before", "second:after", "first:after"]
        );
    }

    #[test]
    fn unobserved_method_passes_straight_through() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(TracingInterceptor {
            tag: "q",
            trace: trace.clone(),
        }));

        let wrapped = chain.wrap_executor(Arc::new(RecordingExecutor));
        // update() is not in the signature set; the call must not be traced.
        let affected = wrapped.update(&empty_statement(), &[]).unwrap();
        assert_eq!(affected, 7);
        assert!(trace.lock().unwrap().is_empty());
    }

    #[test]
    fn interceptor_can_replace_the_result() {
        struct ShortCircuit;

        impl Interceptor for ShortCircuit {
            fn signatures(&self) -> &[Signature] {
                &[Signature::QUERY]
            }

            fn intercept(
                &self,
                _invocation: Invocation<'_>,
            ) -> Result<ReturnValue, InterceptorError> {
                Ok(ReturnValue::Rows(vec![]))
            }
        }

        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(ShortCircuit));
        let wrapped = chain.wrap_executor(Arc::new(RecordingExecutor));
        assert_eq!(wrapped.query(&empty_statement(), &[]).unwrap(), vec![]);
    }

    #[test]
    fn mismatched_return_kind_is_an_error() {
        struct WrongKind;

        impl Interceptor for WrongKind {
            fn signatures(&self) -> &[Signature] {
                &[Signature::QUERY]
            }

            fn intercept(
                &self,
                _invocation: Invocation<'_>,
            ) -> Result<ReturnValue, InterceptorError> {
                Ok(ReturnValue::Affected(1))
            }
        }

        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(WrongKind));
        let wrapped = chain.wrap_executor(Arc::new(RecordingExecutor));
        assert!(wrapped.query(&empty_statement(), &[]).is_err());
    }
}
