//! The engine configuration: the explicit owner of every registry the
//! mapping pipeline consults.
//!
//! One [`Configuration`] holds settings, the converter registry, the
//! interceptor chain, the fragment/statement registries, the parsed-template
//! cache and the pending-statement worklist - state that is process-global
//! in ancestry but owned and passed by reference here, with its lifetime
//! tied to this object.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cache_key::CacheKey;
use crate::config::EngineConfig;
use crate::interceptor::{
    DefaultParameterBinder, Executor, Interceptor, InterceptorChain, ParameterBinder,
};
use crate::param_object::ParamValue;
use crate::sql_composer::ComposeError;
use crate::statement_compiler::{BoundStatement, CompileError, SourceError, SqlSource};
use crate::template_parser::{parse_template, TemplateError, TemplateNode};
use crate::type_registry::{Converter, ConverterRegistry, SqlArgument};

pub mod incomplete;

use incomplete::{resolve_includes, PendingStatement, ResolveError};

/// The SQL verb a mapped statement carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCommandType {
    Select,
    Insert,
    Update,
    Delete,
}

impl FromStr for SqlCommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "select" => Ok(SqlCommandType::Select),
            "insert" => Ok(SqlCommandType::Insert),
            "update" => Ok(SqlCommandType::Update),
            "delete" => Ok(SqlCommandType::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// Offset/limit window participating in execution identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: u64,
    pub limit: u64,
}

impl RowBounds {
    pub fn new(offset: u64, limit: u64) -> Self {
        RowBounds { offset, limit }
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        RowBounds {
            offset: 0,
            limit: u64::MAX,
        }
    }
}

/// A registered statement: id, verb, and its compilation strategy.
pub struct MappedStatement {
    pub id: String,
    pub command_type: SqlCommandType,
    pub sql_source: SqlSource,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("statement '{id}': {source}")]
    Template {
        id: String,
        source: TemplateError,
    },

    #[error("statement '{id}': {source}")]
    Build { id: String, source: ResolveError },

    #[error("statement '{id}': {source}")]
    Compose { id: String, source: ComposeError },

    #[error("statement '{id}': {source}")]
    Compile { id: String, source: CompileError },

    #[error("unknown statement id '{0}'")]
    UnknownStatement(String),

    #[error("statement '{0}' is still pending an unresolved <include> reference")]
    Pending(String),

    #[error("duplicate statement id '{0}'")]
    DuplicateStatement(String),

    #[error("duplicate fragment id '{0}'")]
    DuplicateFragment(String),

    #[error("unresolvable references remain after draining pending statements: {0:?}")]
    UnresolvedReferences(Vec<String>),
}

impl EngineError {
    fn from_source(id: &str, source: SourceError) -> Self {
        match source {
            SourceError::Compose(e) => EngineError::Compose {
                id: id.to_string(),
                source: e,
            },
            SourceError::Compile(e) => EngineError::Compile {
                id: id.to_string(),
                source: e,
            },
        }
    }
}

pub struct Configuration {
    config: EngineConfig,
    converters: ConverterRegistry,
    interceptors: InterceptorChain,
    fragments: Mutex<HashMap<String, Arc<TemplateNode>>>,
    statements: Mutex<HashMap<String, Arc<MappedStatement>>>,
    template_cache: Mutex<HashMap<String, Arc<TemplateNode>>>,
    pending: Mutex<Vec<PendingStatement>>,
}

impl Configuration {
    pub fn new(config: EngineConfig) -> Self {
        Configuration {
            config,
            converters: ConverterRegistry::with_defaults(),
            interceptors: InterceptorChain::new(),
            fragments: Mutex::new(HashMap::new()),
            statements: Mutex::new(HashMap::new()),
            template_cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Replace or extend the converter set. Setup-phase only: the
    /// configuration is not shared yet while registration runs.
    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) {
        self.converters.register(converter);
    }

    /// Append an interceptor; registration order is wrapping order,
    /// outermost-first.
    pub fn register_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.register(interceptor);
    }

    /// Register a reusable `<sql>` fragment under an id, then retry any
    /// statements that were waiting on it.
    pub fn add_fragment(&self, id: &str, template_text: &str) -> Result<(), EngineError> {
        let parsed = self.parse_cached(id, template_text)?;
        {
            let mut fragments = lock(&self.fragments);
            if fragments.contains_key(id) {
                return Err(EngineError::DuplicateFragment(id.to_string()));
            }
            fragments.insert(id.to_string(), parsed);
        }
        info!("registered fragment '{}'", id);
        self.drain_pending(false)?;
        Ok(())
    }

    /// Register a statement template. If it references a fragment that has
    /// not arrived yet, it is queued on the worklist instead of failing.
    pub fn add_statement(
        &self,
        id: &str,
        command_type: SqlCommandType,
        template_text: &str,
    ) -> Result<(), EngineError> {
        {
            let statements = lock(&self.statements);
            if statements.contains_key(id) {
                return Err(EngineError::DuplicateStatement(id.to_string()));
            }
        }
        let parsed = self.parse_cached(id, template_text)?;

        match self.build_statement(id, command_type, &parsed) {
            Ok(statement) => {
                lock(&self.statements).insert(id.to_string(), Arc::new(statement));
                info!("registered statement '{}'", id);
                self.drain_pending(false)?;
                Ok(())
            }
            Err(err) if err.is_retryable() => {
                debug!("statement '{}' queued: {}", id, err);
                lock(&self.pending).push(PendingStatement {
                    id: id.to_string(),
                    command_type,
                    root: parsed,
                });
                Ok(())
            }
            Err(source) => Err(EngineError::Build {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Drain the worklist until it is empty, failing loudly if a full pass
    /// makes no progress.
    pub fn resolve_pending(&self) -> Result<(), EngineError> {
        self.drain_pending(true)
    }

    /// Ids of statements still waiting on a fragment.
    pub fn pending_ids(&self) -> Vec<String> {
        lock(&self.pending).iter().map(|p| p.id.clone()).collect()
    }

    /// Evaluate a registered statement's template against a parameter object
    /// and compile the result.
    pub fn compile_statement(
        &self,
        id: &str,
        parameter: ParamValue,
    ) -> Result<BoundStatement, EngineError> {
        let statement = lock(&self.statements).get(id).cloned();
        match statement {
            Some(statement) => statement
                .sql_source
                .bound(id, parameter, &self.converters, &self.config)
                .map_err(|e| EngineError::from_source(id, e)),
            None => {
                if lock(&self.pending).iter().any(|p| p.id == id) {
                    Err(EngineError::Pending(id.to_string()))
                } else {
                    Err(EngineError::UnknownStatement(id.to_string()))
                }
            }
        }
    }

    /// Metadata of a registered statement.
    pub fn statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        lock(&self.statements).get(id).cloned()
    }

    /// Bind a compiled statement's parameters through the (possibly
    /// intercepted) binder seam.
    pub fn bind_arguments(&self, bound: &BoundStatement) -> Result<Vec<SqlArgument>, EngineError> {
        let binder: Arc<dyn ParameterBinder> = self
            .interceptors
            .wrap_binder(Arc::new(DefaultParameterBinder));
        binder
            .bind(bound, &self.converters)
            .map_err(|source| EngineError::Compile {
                id: bound.statement_id().to_string(),
                source,
            })
    }

    /// Wrap a caller-supplied executor with the registered interceptors.
    /// Returns the same handle when nothing matches.
    pub fn wrap_executor(&self, executor: Arc<dyn Executor>) -> Arc<dyn Executor> {
        self.interceptors.wrap_executor(executor)
    }

    /// Composite execution identity: statement id, row bounds, final SQL and
    /// every argument, in that fixed order.
    pub fn build_cache_key(
        &self,
        id: &str,
        bound: &BoundStatement,
        args: &[SqlArgument],
        row_bounds: RowBounds,
    ) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(id);
        key.update(row_bounds.offset);
        key.update(row_bounds.limit);
        key.update(bound.sql());
        for arg in args {
            key.update(ParamValue::from(arg));
        }
        key
    }

    /// Parse template text, reusing the cached tree when the identical text
    /// was parsed before. Identity is the SHA-256 digest of the text.
    fn parse_cached(&self, id: &str, text: &str) -> Result<Arc<TemplateNode>, EngineError> {
        let wrap = |source| EngineError::Template {
            id: id.to_string(),
            source,
        };
        if !self.config.template_cache_enabled {
            return parse_template(text).map(Arc::new).map_err(wrap);
        }
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        let mut cache = lock(&self.template_cache);
        if let Some(hit) = cache.get(&digest) {
            debug!("template cache hit for '{}'", id);
            return Ok(hit.clone());
        }
        let parsed = Arc::new(parse_template(text).map_err(wrap)?);
        cache.insert(digest, parsed.clone());
        Ok(parsed)
    }

    /// Number of distinct parsed templates currently cached.
    pub fn cached_template_count(&self) -> usize {
        lock(&self.template_cache).len()
    }

    fn build_statement(
        &self,
        id: &str,
        command_type: SqlCommandType,
        root: &Arc<TemplateNode>,
    ) -> Result<MappedStatement, ResolveError> {
        let resolved = if root.has_unresolved_includes() {
            let fragments = lock(&self.fragments);
            Arc::new(resolve_includes(root, &fragments)?)
        } else {
            root.clone()
        };
        let sql_source = SqlSource::build(resolved, id, &self.converters, &self.config)?;
        Ok(MappedStatement {
            id: id.to_string(),
            command_type,
            sql_source,
        })
    }

    /// One or more passes over the worklist. An entry is removed only after
    /// it fully resolves; retryable failures leave it in place. With
    /// `escalate`, a pass that makes no progress while entries remain turns
    /// into a hard error listing them.
    fn drain_pending(&self, escalate: bool) -> Result<(), EngineError> {
        loop {
            let mut pending = lock(&self.pending);
            if pending.is_empty() {
                return Ok(());
            }

            let mut progressed = false;
            let mut index = 0;
            while index < pending.len() {
                let entry = &pending[index];
                match self.build_statement(&entry.id, entry.command_type, &entry.root) {
                    Ok(statement) => {
                        lock(&self.statements)
                            .insert(entry.id.clone(), Arc::new(statement));
                        info!("resolved pending statement '{}'", entry.id);
                        pending.remove(index);
                        progressed = true;
                    }
                    Err(err) if err.is_retryable() => {
                        index += 1;
                    }
                    Err(source) => {
                        let id = entry.id.clone();
                        // A hard defect surfaced by late resolution is never
                        // retried.
                        pending.remove(index);
                        return Err(EngineError::Build { id, source });
                    }
                }
            }

            if pending.is_empty() {
                return Ok(());
            }
            if !progressed {
                if escalate {
                    let ids: Vec<String> = pending.iter().map(|p| p.id.clone()).collect();
                    return Err(EngineError::UnresolvedReferences(ids));
                }
                warn!(
                    "{} statement(s) still pending unresolved fragments",
                    pending.len()
                );
                return Ok(());
            }
        }
    }
}

/// Mutex poisoning only happens after a panic elsewhere; recover the guard
/// rather than poisoning the whole engine.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
