//! The embedded script sandbox.
//!
//! Each run builds a fresh allow-listed engine on a blocking worker thread.
//! The worker stops itself at the deadline through the engine's progress
//! hook; the async side additionally waits with a grace period and, if the
//! worker still has not returned, flags it for cancellation and reports a
//! timeout without waiting further.

use super::capabilities::{build_engine, StopCause, Tripwire};
use super::config::SandboxConfig;
use super::console::{self, Console, LogBuffer, SharedLogs, CONSOLE};
use super::outcome::{ExecutionOutcome, FailureKind};
use super::traits::{Sandbox, SandboxFuture};
use rhai::{Dynamic, EvalAltResult, LexError, ParseErrorType, Scope};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Extra time the async side waits past the budget before giving up on the worker.
const GRACE: Duration = Duration::from_millis(250);

/// Sandbox backed by an embedded interpreter with a step budget.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    /// Creates a sandbox with the given limits.
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Runs a script and waits for its outcome.
    pub async fn run(&self, source: &str) -> ExecutionOutcome {
        run_script(self.config.clone(), source.to_string()).await
    }
}

impl Sandbox for ScriptSandbox {
    fn execute(&self, source: &str) -> SandboxFuture {
        Box::pin(run_script(self.config.clone(), source.to_string()))
    }
}

async fn run_script(config: SandboxConfig, source: String) -> ExecutionOutcome {
    let started = Instant::now();
    let budget = config.timeout();
    let logs: SharedLogs = Arc::new(Mutex::new(LogBuffer::new(
        config.max_log_lines,
        config.max_log_line_len,
    )));
    let cancel = Arc::new(AtomicBool::new(false));

    if source.len() > config.max_source_len {
        return ExecutionOutcome::failed(
            FailureKind::RuntimeFault,
            format!(
                "script is {} bytes; the limit is {}",
                source.len(),
                config.max_source_len
            ),
            source,
            Vec::new(),
            0,
            started.elapsed(),
        );
    }

    let worker = {
        let logs = Arc::clone(&logs);
        let cancel = Arc::clone(&cancel);
        let source = source.clone();
        let deadline = started + budget;
        tokio::task::spawn_blocking(move || evaluate(&config, &source, &logs, deadline, cancel))
    };

    let result = match tokio::time::timeout(budget + GRACE, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            warn!(error = %join_error, "script worker panicked");
            Err((
                FailureKind::RuntimeFault,
                format!("interpreter fault: {join_error}"),
            ))
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            warn!(
                budget_ms = budget.as_millis() as u64,
                "script worker missed its deadline; cancelled"
            );
            Err((
                FailureKind::Timeout,
                format!("execution exceeded {} ms", budget.as_millis()),
            ))
        }
    };

    let (lines, dropped) = console::drain(&logs);
    let elapsed = started.elapsed();

    match result {
        Ok(value) => {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "script completed");
            ExecutionOutcome::completed(value, lines, dropped, elapsed)
        }
        Err((kind, reason)) => {
            debug!(%kind, %reason, "script failed");
            ExecutionOutcome::failed(kind, reason, source, lines, dropped, elapsed)
        }
    }
}

type Evaluation = Result<Value, (FailureKind, String)>;

fn evaluate(
    config: &SandboxConfig,
    source: &str,
    logs: &SharedLogs,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
) -> Evaluation {
    let tripwire = Arc::new(Tripwire::new());
    let engine = build_engine(config, logs, deadline, cancel, Arc::clone(&tripwire));

    let mut scope = Scope::new();
    scope.push_constant(CONSOLE, Console::new(Arc::clone(logs)));

    let ast = engine
        .compile_with_scope(&scope, source)
        .map_err(|err| (classify_parse(err.err_type()), format!("syntax error: {err}")))?;

    let result = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);

    // A stop can be swallowed by the interpreter, so the tripwire wins over Ok.
    if let Some(cause) = tripwire.cause() {
        let reason = match cause {
            StopCause::Deadline => format!("execution exceeded {} ms", config.timeout_ms),
            StopCause::OperationBudget => {
                format!("execution exceeded {} operations", config.max_operations)
            }
        };
        return Err((FailureKind::Timeout, reason));
    }

    let value = result.map_err(|err| (classify(&err), err.to_string()))?;

    if value.is_unit() {
        return Ok(Value::Null);
    }

    rhai::serde::from_dynamic::<Value>(&value).map_err(|err| {
        (
            FailureKind::RuntimeFault,
            format!(
                "result of type '{}' cannot be returned: {err}",
                value.type_name()
            ),
        )
    })
}

/// Maps a compile error to a failure classification.
///
/// Reserved or disabled keywords and a bare `this` outside a function are
/// disallowed constructs; any other syntax error is a fault in the script.
fn classify_parse(err: &ParseErrorType) -> FailureKind {
    match err {
        ParseErrorType::Reserved(_) => FailureKind::DisallowedConstruct,
        ParseErrorType::BadInput(LexError::ImproperSymbol(symbol, message))
            if symbol == "this" || message.ends_with("is disabled") =>
        {
            FailureKind::DisallowedConstruct
        }
        _ => FailureKind::RuntimeFault,
    }
}

/// Maps an interpreter error to a failure classification.
fn classify(err: &EvalAltResult) -> FailureKind {
    match err.unwrap_inner() {
        EvalAltResult::ErrorTerminated(..) | EvalAltResult::ErrorTooManyOperations(..) => {
            FailureKind::Timeout
        }
        EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorPropertyNotFound(..)
        | EvalAltResult::ErrorModuleNotFound(..)
        | EvalAltResult::ErrorUnboundThis(..)
        | EvalAltResult::ErrorDotExpr(..)
        | EvalAltResult::ErrorIndexingType(..) => FailureKind::DisallowedConstruct,
        EvalAltResult::ErrorParsing(err, ..) => classify_parse(err),
        _ => FailureKind::RuntimeFault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sandbox() -> ScriptSandbox {
        ScriptSandbox::new(SandboxConfig::default())
    }

    #[tokio::test]
    async fn returns_value() {
        let outcome = sandbox().run("return 2 + 2;").await;
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.value, json!(4));
        assert!(outcome.logs.is_empty());
    }

    #[tokio::test]
    async fn final_expression_is_the_value() {
        let outcome = sandbox().run("let a = [1, 2, 3]; a.len() * 10").await;
        assert_eq!(outcome.value, json!(30));
    }

    #[tokio::test]
    async fn maps_become_json_objects() {
        let outcome = sandbox().run(r#"#{ name: "x", items: [1, 2] }"#).await;
        assert_eq!(outcome.value, json!({"name": "x", "items": [1, 2]}));
    }

    #[tokio::test]
    async fn console_lines_are_captured_in_order() {
        let outcome = sandbox()
            .run(r#"console.log("a"); console.warn("b", 2); print("c");"#)
            .await;
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.value, Value::Null);
        assert_eq!(outcome.logs, vec!["[LOG] a", "[WARN] b 2", "[LOG] c"]);
    }

    #[tokio::test]
    async fn console_takes_four_arguments() {
        let outcome = sandbox().run(r#"console.log("a", "b", "c", "d");"#).await;
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.logs, vec!["[LOG] a b c d"]);
    }

    #[tokio::test]
    async fn debug_statement_is_captured() {
        let outcome = sandbox().run(r#"debug("x");"#).await;
        assert_eq!(outcome.logs.len(), 1);
        assert!(outcome.logs[0].starts_with("[DEBUG]"));
    }

    #[tokio::test]
    async fn log_overflow_is_counted() {
        let sandbox = ScriptSandbox::new(SandboxConfig::new().with_max_log_lines(3));
        let outcome = sandbox
            .run("for i in 0..10 { console.log(i); }")
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.logs.len(), 3);
        assert_eq!(outcome.dropped_log_lines, 7);
    }

    #[tokio::test]
    async fn thrown_error_is_runtime_fault() {
        let outcome = sandbox().run(r#"console.log("before"); throw "bad";"#).await;
        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RuntimeFault));
        assert_eq!(outcome.logs, vec!["[LOG] before"]);
        assert!(outcome.source.unwrap().contains("throw"));
    }

    #[tokio::test]
    async fn syntax_error_is_runtime_fault() {
        let outcome = sandbox().run("let = ;").await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RuntimeFault));
    }

    #[tokio::test]
    async fn infinite_loop_times_out() {
        let sandbox =
            ScriptSandbox::new(SandboxConfig::new().with_timeout(Duration::from_millis(200)));
        let started = Instant::now();
        let outcome = sandbox
            .run("let x = 0; loop { x = (x + 1) % 1000; }")
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn operation_budget_is_timeout() {
        let sandbox = ScriptSandbox::new(SandboxConfig::new().with_max_operations(1_000));
        let outcome = sandbox.run("let x = 0; while true { x += 1; }").await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn stuck_sort_comparator_hits_the_deadline() {
        let sandbox =
            ScriptSandbox::new(SandboxConfig::new().with_timeout(Duration::from_millis(200)));
        let started = Instant::now();
        let outcome = sandbox
            .run("let a = [3, 1, 2]; a.sort(|x, y| { loop {} }); a")
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout), "{outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn stuck_sort_comparator_hits_the_operation_budget() {
        let sandbox = ScriptSandbox::new(SandboxConfig::new().with_max_operations(10_000));
        let outcome = sandbox
            .run("let a = [3, 1, 2]; a.sort(|x, y| { loop {} }); 7")
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        assert!(outcome.failure.unwrap().reason.contains("10000 operations"));
    }

    #[tokio::test]
    async fn unknown_function_is_disallowed() {
        let outcome = sandbox().run(r#"fetch("https://example.com")"#).await;
        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::DisallowedConstruct)
        );
    }

    #[tokio::test]
    async fn unknown_global_is_disallowed() {
        let outcome = sandbox().run("globalThis").await;
        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::DisallowedConstruct)
        );
    }

    #[tokio::test]
    async fn eval_is_disallowed() {
        let outcome = sandbox().run(r#"eval("40 + 2")"#).await;
        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::DisallowedConstruct)
        );
    }

    #[tokio::test]
    async fn top_level_this_is_disallowed() {
        for source in ["this", "this.constructor", "this.x = 1;"] {
            let outcome = sandbox().run(source).await;
            assert_eq!(
                outcome.failure_kind(),
                Some(FailureKind::DisallowedConstruct),
                "{source}: {outcome:?}"
            );
        }
    }

    #[tokio::test]
    async fn import_is_disallowed() {
        let outcome = sandbox().run(r#"import "fs" as fs; fs::read("x")"#).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn function_pointer_to_missing_host_fn_fails() {
        let outcome = sandbox().run(r#"let f = Fn("open"); f.call("/etc/passwd")"#).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn console_object_cannot_be_returned() {
        let outcome = sandbox().run("console").await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RuntimeFault));
    }

    #[tokio::test]
    async fn oversized_source_is_rejected() {
        let sandbox = ScriptSandbox::new(SandboxConfig::new().with_max_source_len(8));
        let outcome = sandbox.run("let value = 1;").await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::RuntimeFault));
    }

    #[tokio::test]
    async fn runs_are_isolated() {
        let sandbox = sandbox();
        let first = sandbox.run("let shared = 5; shared").await;
        assert!(first.success);
        let second = sandbox.run("shared").await;
        assert_eq!(
            second.failure_kind(),
            Some(FailureKind::DisallowedConstruct)
        );
    }
}
