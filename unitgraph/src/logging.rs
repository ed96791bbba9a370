//! Env-controlled diagnostics.
//!
//! `UNITGRAPH_TRACE=1` enables compile/cycle traces and errors,
//! `UNITGRAPH_TRACE=full` adds per-unit dispatch detail and warnings.
//! Critical messages are always printed. Lines go to stderr as
//! `HH:MM:SS.mmm [KIND] thread -- message`.
use std::env;
use std::fmt::Arguments;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TraceLevel {
    Off,
    Basic,
    Full,
}

impl TraceLevel {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "basic" => TraceLevel::Basic,
            "full" => TraceLevel::Full,
            _ => TraceLevel::Off,
        }
    }

    fn current() -> Self {
        static LEVEL: OnceLock<TraceLevel> = OnceLock::new();
        *LEVEL.get_or_init(|| {
            env::var("UNITGRAPH_TRACE")
                .map(|value| TraceLevel::parse(&value))
                .unwrap_or(TraceLevel::Off)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Trace,
    Detail,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Trace | Severity::Detail => "TRACE",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Severity::Critical => "31",
            Severity::Error => "91",
            Severity::Warning => "33",
            Severity::Trace => "34",
            Severity::Detail => "36",
        }
    }

    fn required(self) -> TraceLevel {
        match self {
            Severity::Critical => TraceLevel::Off,
            Severity::Error | Severity::Trace => TraceLevel::Basic,
            Severity::Warning | Severity::Detail => TraceLevel::Full,
        }
    }

    fn allowed_at(self, level: TraceLevel) -> bool {
        level >= self.required()
    }
}

pub fn enabled(severity: Severity) -> bool {
    severity.allowed_at(TraceLevel::current())
}

fn timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
        now.subsec_millis()
    )
}

/// Print one line if `severity` is enabled.
pub fn emit(severity: Severity, args: Arguments) {
    if !enabled(severity) {
        return;
    }
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("main");
    eprintln!(
        "{} [\u{001b}[{}m{}\u{001b}[0m] {} -- {}",
        timestamp(),
        severity.color(),
        severity.tag(),
        name,
        args
    );
}

#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Severity::Critical, format_args!($($arg)*))
    };
}

/// Named `fault` so it cannot shadow thiserror's `#[error]` attribute.
#[macro_export]
macro_rules! fault {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Severity::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Severity::Warning, format_args!($($arg)*))
    };
}

/// Compile steps and cycle boundaries.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Severity::Trace, format_args!($($arg)*))
    };
}

/// Per-unit and per-task scheduling detail.
#[macro_export]
macro_rules! detail {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Severity::Detail, format_args!($($arg)*))
    };
}
