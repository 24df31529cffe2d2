//! Captured script output.
//!
//! Scripts see a `console` object with `log`, `info`, `warn` and `error`
//! methods taking up to four arguments, plus the `print` and `debug` statements. All of them write into a
//! bounded [`LogBuffer`]; nothing reaches a host stream.

use rhai::{Dynamic, Engine};
use std::sync::{Arc, Mutex, PoisonError};

/// Name of the console constant inside scripts.
pub const CONSOLE: &str = "console";

/// Bounded, ordered log capture.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Vec<String>,
    dropped: usize,
    max_lines: usize,
    max_line_len: usize,
}

impl LogBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(max_lines: usize, max_line_len: usize) -> Self {
        Self {
            lines: Vec::new(),
            dropped: 0,
            max_lines,
            max_line_len,
        }
    }

    /// Appends one line, truncating or dropping it when limits are reached.
    pub fn push(&mut self, mut line: String) {
        if self.lines.len() >= self.max_lines {
            self.dropped += 1;
            return;
        }
        if line.len() > self.max_line_len {
            let mut cut = self.max_line_len;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
            line.push_str("...");
        }
        self.lines.push(line);
    }

    /// Returns the captured lines and the number dropped.
    #[must_use]
    pub fn take(&mut self) -> (Vec<String>, usize) {
        (std::mem::take(&mut self.lines), self.dropped)
    }
}

/// Shared handle to a [`LogBuffer`].
pub type SharedLogs = Arc<Mutex<LogBuffer>>;

/// Appends a line to shared logs, surviving a poisoned lock.
pub fn push_line(logs: &SharedLogs, line: String) {
    logs.lock().unwrap_or_else(PoisonError::into_inner).push(line);
}

/// Drains shared logs.
#[must_use]
pub fn drain(logs: &SharedLogs) -> (Vec<String>, usize) {
    logs.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// The script-visible console object.
#[derive(Debug, Clone)]
pub struct Console {
    logs: SharedLogs,
}

impl Console {
    /// Creates a console writing into `logs`.
    #[must_use]
    pub fn new(logs: SharedLogs) -> Self {
        Self { logs }
    }

    fn write(&self, tag: &str, args: &[Dynamic]) {
        let mut line = format!("[{tag}]");
        for arg in args {
            line.push(' ');
            line.push_str(&render(arg));
        }
        push_line(&self.logs, line);
    }
}

/// Renders a script value for a log line.
///
/// Strings print as-is; everything else prints as JSON when it can be
/// represented, otherwise with the interpreter's own formatting.
#[must_use]
pub fn render(value: &Dynamic) -> String {
    if value.is_string() {
        return value.to_string();
    }
    match rhai::serde::from_dynamic::<serde_json::Value>(value) {
        Ok(json) => json.to_string(),
        Err(_) => value.to_string(),
    }
}

/// Registers the console type, its methods and the print/debug hooks.
pub fn register(engine: &mut Engine, logs: &SharedLogs) {
    engine.register_type_with_name::<Console>("Console");

    for (method, tag) in [
        ("log", "LOG"),
        ("info", "INFO"),
        ("warn", "WARN"),
        ("error", "ERROR"),
    ] {
        engine.register_fn(method, move |c: Console| c.write(tag, &[]));
        engine.register_fn(method, move |c: Console, a: Dynamic| c.write(tag, &[a]));
        engine.register_fn(method, move |c: Console, a: Dynamic, b: Dynamic| {
            c.write(tag, &[a, b]);
        });
        engine.register_fn(
            method,
            move |c: Console, a: Dynamic, b: Dynamic, d: Dynamic| c.write(tag, &[a, b, d]),
        );
        engine.register_fn(
            method,
            move |c: Console, a: Dynamic, b: Dynamic, d: Dynamic, e: Dynamic| {
                c.write(tag, &[a, b, d, e]);
            },
        );
    }

    let print_logs = Arc::clone(logs);
    engine.on_print(move |text| push_line(&print_logs, format!("[LOG] {text}")));

    let debug_logs = Arc::clone(logs);
    engine.on_debug(move |text, _source, _pos| {
        push_line(&debug_logs, format!("[DEBUG] {text}"));
    });
}
