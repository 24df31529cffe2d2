//! Sandboxed script execution.
//!
//! Runs untrusted snippets produced by the model. The defense is an
//! allow-list: the interpreter is created with nothing in it, and only pure
//! computation, a captured `console` and a handful of helpers are added back.
//! There is no file, network, process or module access to filter out.
//!
//! ## Budgets
//!
//! - a wall-clock budget checked from inside the interpreter every 256 operations
//! - a hard operation count
//! - call depth, expression depth, string, array and map size limits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentloop::tools::sandbox::{SandboxConfig, ScriptSandbox};
//!
//! let sandbox = ScriptSandbox::new(SandboxConfig::default());
//! let outcome = sandbox.run("console.log(\"hi\"); 40 + 2").await;
//! assert_eq!(outcome.value, serde_json::json!(42));
//! assert_eq!(outcome.logs, vec!["[LOG] hi"]);
//! ```

mod capabilities;
mod config;
mod console;
mod engine;
mod outcome;
mod traits;

pub use capabilities::HELPERS;
pub use config::SandboxConfig;
pub use engine::ScriptSandbox;
pub use outcome::{ExecutionFailure, ExecutionOutcome, FailureKind};
pub use traits::{Sandbox, SandboxFuture};
