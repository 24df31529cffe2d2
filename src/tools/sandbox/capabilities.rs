//! The capability surface granted to scripts.
//!
//! The engine starts from [`Engine::new_raw`], which has no functions, no
//! packages and no module resolver. Everything a script can call is added
//! here explicitly; anything not listed does not exist inside the sandbox.

use super::config::SandboxConfig;
use super::console::{self, SharedLogs};
use chrono::DateTime;
use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage,
    BasicMathPackage, BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult, FLOAT, INT};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How often (in operations) the progress hook checks the clock.
const PROGRESS_CHECK_INTERVAL: u64 = 256;

/// Names of the helper functions scripts may call besides the packages.
pub const HELPERS: &[&str] = &[
    "json_encode",
    "json_decode",
    "format_timestamp",
    "format_number",
];

/// Why the progress hook stopped a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The wall-clock deadline passed or the run was cancelled.
    Deadline,
    /// The script used up its operation budget.
    OperationBudget,
}

/// Latches the first reason the progress hook fired.
///
/// Some interpreter paths (array sort comparators among them) swallow the
/// error the hook raises, so a script can run to completion after being
/// stopped. The caller checks the tripwire after evaluation instead of
/// trusting the result alone.
#[derive(Debug, Default)]
pub struct Tripwire {
    state: AtomicU8,
}

impl Tripwire {
    const CLEAR: u8 = 0;
    const DEADLINE: u8 = 1;
    const OPERATIONS: u8 = 2;

    /// Creates a tripwire that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn trip(&self, cause: StopCause) {
        let code = match cause {
            StopCause::Deadline => Self::DEADLINE,
            StopCause::OperationBudget => Self::OPERATIONS,
        };
        let _ = self
            .state
            .compare_exchange(Self::CLEAR, code, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// Returns why the script was stopped, if it was.
    #[must_use]
    pub fn cause(&self) -> Option<StopCause> {
        match self.state.load(Ordering::Relaxed) {
            Self::DEADLINE => Some(StopCause::Deadline),
            Self::OPERATIONS => Some(StopCause::OperationBudget),
            _ => None,
        }
    }
}

/// Builds an engine that only exposes the allow-listed surface.
///
/// The operation budget is enforced by the progress hook rather than the
/// engine's own counter so that every stop is recorded on `tripwire`. The
/// hook also fires at the first check after `deadline` passes or `cancel` is
/// set. Once tripped, every later operation is refused.
#[must_use]
pub fn build_engine(
    config: &SandboxConfig,
    logs: &SharedLogs,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
    tripwire: Arc<Tripwire>,
) -> Engine {
    let mut engine = Engine::new_raw();

    engine.register_global_module(ArithmeticPackage::new().as_shared_module());
    engine.register_global_module(LogicPackage::new().as_shared_module());
    engine.register_global_module(BasicStringPackage::new().as_shared_module());
    engine.register_global_module(MoreStringPackage::new().as_shared_module());
    engine.register_global_module(BasicMathPackage::new().as_shared_module());
    engine.register_global_module(BasicArrayPackage::new().as_shared_module());
    engine.register_global_module(BasicMapPackage::new().as_shared_module());
    engine.register_global_module(BasicIteratorPackage::new().as_shared_module());

    console::register(&mut engine, logs);
    register_helpers(&mut engine);

    engine.disable_symbol("eval");

    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_map_size);

    let max_operations = config.max_operations;
    engine.on_progress(move |ops| {
        if tripwire.cause().is_some() {
            return Some(Dynamic::UNIT);
        }
        let cause = if ops > max_operations {
            Some(StopCause::OperationBudget)
        } else if ops % PROGRESS_CHECK_INTERVAL == 0
            && (cancel.load(Ordering::Relaxed) || Instant::now() >= deadline)
        {
            Some(StopCause::Deadline)
        } else {
            None
        };
        cause.map(|cause| {
            tripwire.trip(cause);
            Dynamic::UNIT
        })
    });

    engine
}

fn script_error(message: impl Into<String>) -> Box<EvalAltResult> {
    message.into().into()
}

fn register_helpers(engine: &mut Engine) {
    engine.register_fn(
        "json_encode",
        |value: Dynamic| -> Result<String, Box<EvalAltResult>> {
            let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
            serde_json::to_string(&json).map_err(|e| script_error(e.to_string()))
        },
    );

    engine.register_fn(
        "json_decode",
        |text: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let json: serde_json::Value =
                serde_json::from_str(text).map_err(|e| script_error(format!("invalid JSON: {e}")))?;
            rhai::serde::to_dynamic(json)
        },
    );

    engine.register_fn(
        "format_timestamp",
        |seconds: INT| -> Result<String, Box<EvalAltResult>> {
            DateTime::from_timestamp(seconds, 0)
                .map(|t| t.to_rfc3339())
                .ok_or_else(|| script_error(format!("timestamp {seconds} is out of range")))
        },
    );

    engine.register_fn("format_number", |value: FLOAT, decimals: INT| {
        format_decimal(value, decimals)
    });
    engine.register_fn("format_number", |value: INT, decimals: INT| {
        format_decimal(value as FLOAT, decimals)
    });
}

fn format_decimal(value: FLOAT, decimals: INT) -> String {
    let places = usize::try_from(decimals.clamp(0, 20)).unwrap_or(0);
    format!("{value:.places$}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::sandbox::console::LogBuffer;
    use std::sync::Mutex;
    use std::time::Duration;

    fn logs() -> SharedLogs {
        Arc::new(Mutex::new(LogBuffer::new(100, 1000)))
    }

    fn engine() -> Engine {
        build_engine(
            &SandboxConfig::default(),
            &logs(),
            Instant::now() + Duration::from_secs(5),
            Arc::new(AtomicBool::new(false)),
            Arc::new(Tripwire::new()),
        )
    }

    #[test]
    fn arithmetic_and_strings_available() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>("2 + 2").unwrap(), 4);
        assert_eq!(
            engine.eval::<String>(r#""abc".to_upper()"#).unwrap(),
            "ABC"
        );
    }

    #[test]
    fn arrays_and_maps_available() {
        let engine = engine();
        assert_eq!(engine.eval::<INT>("[1, 2, 3].len()").unwrap(), 3);
        assert_eq!(engine.eval::<INT>("#{a: 1}.a").unwrap(), 1);
    }

    #[test]
    fn json_helpers_roundtrip() {
        let engine = engine();
        let text = engine
            .eval::<String>(r#"json_encode(#{n: 1})"#)
            .unwrap();
        assert_eq!(text, r#"{"n":1}"#);
        assert_eq!(
            engine.eval::<INT>(r#"json_decode("{\"n\": 7}").n"#).unwrap(),
            7
        );
    }

    #[test]
    fn invalid_json_is_a_script_error() {
        assert!(engine().eval::<Dynamic>(r#"json_decode("{")"#).is_err());
    }

    #[test]
    fn format_timestamp_is_rfc3339() {
        let text = engine().eval::<String>("format_timestamp(0)").unwrap();
        assert!(text.starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn format_number_rounds() {
        let engine = engine();
        assert_eq!(
            engine.eval::<String>("format_number(3.14159, 2)").unwrap(),
            "3.14"
        );
        assert_eq!(engine.eval::<String>("format_number(5, 1)").unwrap(), "5.0");
    }

    #[test]
    fn unknown_functions_do_not_exist() {
        let err = engine().eval::<Dynamic>("open(\"/etc/passwd\")").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorFunctionNotFound(..)));
    }

    #[test]
    fn progress_hook_stops_after_deadline() {
        let tripwire = Arc::new(Tripwire::new());
        let engine = build_engine(
            &SandboxConfig::default(),
            &logs(),
            Instant::now(),
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&tripwire),
        );
        let err = engine.eval::<Dynamic>("let x = 0; loop { x = (x + 1) % 1000; }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTerminated(..)));
        assert_eq!(tripwire.cause(), Some(StopCause::Deadline));
    }

    #[test]
    fn cancel_flag_stops_script() {
        let tripwire = Arc::new(Tripwire::new());
        let engine = build_engine(
            &SandboxConfig::default(),
            &logs(),
            Instant::now() + Duration::from_secs(60),
            Arc::new(AtomicBool::new(true)),
            Arc::clone(&tripwire),
        );
        let err = engine.eval::<Dynamic>("let x = 0; loop { x = (x + 1) % 1000; }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTerminated(..)));
        assert_eq!(tripwire.cause(), Some(StopCause::Deadline));
    }

    #[test]
    fn operation_budget_is_enforced_by_the_hook() {
        let tripwire = Arc::new(Tripwire::new());
        let engine = build_engine(
            &SandboxConfig::new().with_max_operations(500),
            &logs(),
            Instant::now() + Duration::from_secs(60),
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&tripwire),
        );
        let err = engine.eval::<Dynamic>("let x = 0; loop { x += 1; }").unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorTerminated(..)));
        assert_eq!(tripwire.cause(), Some(StopCause::OperationBudget));
    }

    #[test]
    fn tripwire_records_stop_inside_sort_comparator() {
        let tripwire = Arc::new(Tripwire::new());
        let engine = build_engine(
            &SandboxConfig::new().with_max_operations(2_000),
            &logs(),
            Instant::now() + Duration::from_secs(60),
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&tripwire),
        );
        // Whether or not the sort surfaces the error, the stop is latched.
        let _ = engine.eval::<Dynamic>("let a = [3, 1, 2]; a.sort(|x, y| { loop {} }); a");
        assert_eq!(tripwire.cause(), Some(StopCause::OperationBudget));
    }

    #[test]
    fn tripwire_keeps_first_cause() {
        let tripwire = Tripwire::new();
        assert_eq!(tripwire.cause(), None);
        tripwire.trip(StopCause::OperationBudget);
        tripwire.trip(StopCause::Deadline);
        assert_eq!(tripwire.cause(), Some(StopCause::OperationBudget));
    }
}
