use crate::analysis::{self, ValidationResult};
use crate::ast::Block;
use crate::cache::{split_lines, CompileCache};
use crate::collect::count_nodes;
use crate::convert::{Converter, ConverterRegistry};
use crate::error::{ErrorKind, ScriptError};
use crate::eval::Evaluator;
use crate::options::Options;
use crate::parser::Parser;
use crate::registry::{Function, FunctionRegistry};
use crate::value::Value;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Severity of a script-emitted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warn,
    Error,
}

/// A structured log record emitted by `msg` or a failed `assert`.
#[derive(Clone, Debug)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

/// Failure details carried by [`ExecutionResult`] and
/// [`ValidationResult`].
#[derive(Clone, Debug)]
pub struct ErrorReport {
    /// Stable integer code, see [`ErrorKind::code`].
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
    /// Full text of the offending source line, when known.
    pub snippet: Option<String>,
}

impl ErrorReport {
    pub(crate) fn from_error(e: &ScriptError) -> Self {
        Self {
            code: e.code(),
            kind: e.kind,
            message: e.message.clone(),
            line: e.line,
            column: e.column,
            snippet: None,
        }
    }
}

/// Outcome of one `execute` call: the variables the script assigned, the
/// messages it emitted, and the failure (if any) with its position and
/// source snippet. Assignments and messages made before a failure are
/// preserved.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub assignments: HashMap<String, Value>,
    pub messages: Vec<Message>,
    pub elapsed: Duration,
    pub end_line: u32,
    pub end_column: u32,
    pub error: Option<ErrorReport>,
}

impl ExecutionResult {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Case-insensitive assignment lookup.
    pub fn assignment(&self, name: &str) -> Option<&Value> {
        self.assignments.get(name).or_else(|| {
            self.assignments
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
}

/// The expression engine facade.
///
/// A `Regula` bundles the options, the converter and function
/// registries, and the compilation cache. Registration happens before
/// the first execution (`&mut self`); afterwards the engine can be
/// shared freely across threads, with the cache as the only mutable
/// shared state.
///
/// # Examples
///
/// ```
/// use regula::{Regula, Value};
/// use std::collections::HashMap;
///
/// let engine = Regula::new();
/// let mut inputs = HashMap::new();
/// inputs.insert("price".to_string(), Value::from(120));
///
/// let result = engine.execute("{ set(total, [price] * 2) }", &inputs);
/// assert!(!result.has_error());
/// assert_eq!(result.assignment("total"), Some(&Value::from(240)));
/// ```
pub struct Regula {
    options: Options,
    converters: ConverterRegistry,
    functions: FunctionRegistry,
    cache: CompileCache,
}

impl Default for Regula {
    fn default() -> Self {
        Self::new()
    }
}

impl Regula {
    /// An engine with default options and the built-in converters and
    /// functions.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// An engine with custom options and the built-in converters and
    /// functions.
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            converters: ConverterRegistry::with_builtins(),
            functions: FunctionRegistry::with_builtins(),
            cache: CompileCache::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registers (or overwrites) a callable function. Registration is
    /// only possible before the engine is shared, which keeps the
    /// registries immutable during execution.
    pub fn register_function(&mut self, function: Arc<dyn Function>) {
        self.functions.register(function);
    }

    /// Registers a converter ahead of all built-ins (last registered
    /// wins).
    pub fn register_converter(&mut self, converter: Arc<dyn Converter>) {
        self.converters.register(converter);
    }

    /// Compiles a script to a reusable [`Block`], going through the
    /// cache unless it is disabled.
    ///
    /// # Errors
    /// Returns a parse error, or `ScriptTooLarge` when the node count
    /// exceeds `Options.max_nodes`.
    pub fn compile(&self, script: &str) -> Result<Arc<Block>, ScriptError> {
        if self.options.enable_compilation_cache {
            if let Some(block) = self.cache.get_block(script) {
                return Ok(block);
            }
        }
        let block = self.compile_uncached(script)?;
        let block = Arc::new(block);
        if self.options.enable_compilation_cache {
            self.cache.insert_block(script, block.clone());
            self.cache.lines_for(script);
        }
        Ok(block)
    }

    fn compile_uncached(&self, script: &str) -> Result<Block, ScriptError> {
        let block = Parser::new(script, self.options.enable_comments)?.parse()?;
        let nodes = count_nodes(&block);
        debug!("compiled script: {} nodes", nodes);
        if nodes > self.options.max_nodes {
            return Err(ScriptError::new(
                ErrorKind::ScriptTooLarge,
                format!(
                    "script has {} nodes, exceeding the limit of {}",
                    nodes, self.options.max_nodes
                ),
                1,
                1,
            ));
        }
        Ok(block)
    }

    /// Compiles (or fetches from cache) and runs a script. Never
    /// panics or returns `Err`: every failure, compile-time included,
    /// lands in the result with position and snippet.
    pub fn execute(&self, script: &str, inputs: &HashMap<String, Value>) -> ExecutionResult {
        let block = match self.compile(script) {
            Ok(block) => block,
            Err(e) => return self.compile_failure_result(&e, script),
        };
        let mut result = self.execute_block(&block, inputs);
        if let Some(report) = &mut result.error {
            if report.line > 0 && report.snippet.is_none() {
                report.snippet = self.snippet_for(script, report.line);
            }
        }
        result
    }

    /// Runs a pre-compiled block. No source text is available on this
    /// path, so error reports carry no snippet.
    pub fn execute_block(&self, block: &Block, inputs: &HashMap<String, Value>) -> ExecutionResult {
        Evaluator::new(&self.options, &self.converters, &self.functions, inputs).run(block)
    }

    /// Compiles a script and runs the read-only analyzer over it.
    /// Unknown function calls come back as warnings, not failures.
    pub fn validate(&self, script: &str) -> ValidationResult {
        let block = match self.compile(script) {
            Ok(block) => block,
            Err(e) => {
                let mut report = ErrorReport::from_error(&e);
                if e.line > 0 {
                    report.snippet = self.snippet_for(script, e.line);
                }
                return ValidationResult::failed(report);
            }
        };
        analysis::analyze(&block, &self.functions)
    }

    /// Drops every cached compilation and line table.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// A compile failure shaped like an execution result. The snippet
    /// goes through the same lazily-populated line table as the success
    /// path, so repeated failures reuse the cached split.
    fn compile_failure_result(&self, e: &ScriptError, script: &str) -> ExecutionResult {
        let mut report = ErrorReport::from_error(e);
        if e.line > 0 {
            report.snippet = self.snippet_for(script, e.line);
        }
        ExecutionResult {
            assignments: HashMap::new(),
            messages: Vec::new(),
            elapsed: Duration::ZERO,
            end_line: e.line,
            end_column: e.column,
            error: Some(report),
        }
    }

    fn snippet_for(&self, script: &str, line: u32) -> Option<String> {
        let index = line as usize - 1;
        if self.options.enable_compilation_cache {
            self.cache.lines_for(script).get(index).cloned()
        } else {
            split_lines(script).get(index).cloned()
        }
    }
}
