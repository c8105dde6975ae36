//! Small helpers for logging and error piping, used mostly by the CLI.

use log::{error, LevelFilter};

/// Initialize the global logger at the given level.
///
/// Meant to be called once, early in `main`, with the level coming from the
/// CLI verbosity flags.
pub fn activate_logging(log_level: LevelFilter) {
    env_logger::Builder::new().filter_level(log_level).init();
}

/// Log the error (if there is one) and pass the result through.
pub trait LogOnErr {
    fn log_on_err(self) -> Self;
}

impl<T, E: std::fmt::Display> LogOnErr for Result<T, E> {
    fn log_on_err(self) -> Self {
        if let Err(err) = &self {
            error!("{}", err);
        }
        self
    }
}

/// Log the error (if there is one) then unwrap.
///
/// Panicking is acceptable here because this is only used at the CLI
/// boundary, where the logged message is the user-facing report.
pub trait LogOnErrUnwrap<T> {
    fn log_on_err_unwrap(self) -> T;
}

impl<T, E: std::fmt::Display + std::fmt::Debug> LogOnErrUnwrap<T> for Result<T, E> {
    fn log_on_err_unwrap(self) -> T {
        self.log_on_err().unwrap()
    }
}

/// Consume the value inside an [Option], doing nothing for [None].
pub trait Consume<T> {
    fn consume<F: FnOnce(T)>(self, f: F);
}

impl<T> Consume<T> for Option<T> {
    fn consume<F: FnOnce(T)>(self, f: F) {
        if let Some(value) = self {
            f(value)
        }
    }
}

/// Run a side effect if the [Option] is [None], passing the option through.
pub trait IfNoneThen {
    fn if_none_then<F: FnOnce()>(self, f: F) -> Self;
}

impl<T> IfNoneThen for Option<T> {
    fn if_none_then<F: FnOnce()>(self, f: F) -> Self {
        if self.is_none() {
            f()
        }
        self
    }
}

// -------------------------------------------------------------------------------------------------
// Unit tests.
