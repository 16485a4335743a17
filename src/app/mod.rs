//! Binary-side wiring: logging setup, the run itself, and the exit code.

pub(crate) mod exit_handler;
pub(crate) mod runtime;
pub(crate) mod terminal;
