//! Sandbox trait definitions.

use super::outcome::ExecutionOutcome;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// The result type for sandbox execution futures.
pub type SandboxFuture = Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'static>>;

/// Runs untrusted script source in isolation.
///
/// Execution never fails outward: every failure, including a panic inside
/// the interpreter, is reported as a classified [`ExecutionOutcome`].
///
/// # Thread Safety
///
/// Sandboxes must be `Send + Sync` so one instance can serve concurrent tool
/// calls. Each call gets a fresh interpreter; nothing carries over between runs.
pub trait Sandbox: Send + Sync + Debug {
    /// Executes `source` and reports what happened.
    fn execute(&self, source: &str) -> SandboxFuture;
}
