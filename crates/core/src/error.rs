//! Error types for the RepCRec simulator.
//!
//! `Blocked` and `DeadlockVictim` are *not* represented here — they are
//! ordinary control-flow outcomes returned from lock and read/write attempts,
//! not exceptional conditions. `RepcrecError` covers only the cases a script
//! driver needs to report and, in the `ParseError`/`UnknownCommand` cases,
//! halt the run over.

use thiserror::Error;

/// Result type alias for RepCRec operations.
pub type RepcrecResult<T> = std::result::Result<T, RepcrecError>;

/// Error types for the RepCRec simulator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepcrecError {
    /// A command referenced a transaction id that was never begun, or that
    /// has already ended.
    ///
    /// This is the *NoSuchTransaction* condition: callers should log it and
    /// drop the offending operation rather than treat it as fatal.
    #[error("no such transaction: {0}")]
    UnknownTransaction(String),

    /// `fail`/`recover` named a site id outside the configured range.
    #[error("no such site: {0}")]
    UnknownSite(u8),

    /// `R`/`W` named a variable outside the configured range.
    #[error("no such variable: {0}")]
    UnknownVariable(String),

    /// `begin`/`beginRO` reused a transaction id that is still live.
    #[error("transaction already active: {0}")]
    DuplicateTransaction(String),

    /// The script contained a line that could not be parsed as a command.
    #[error("line {line}: {message}")]
    ParseError {
        /// 1-based line number within the script.
        line: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The script contained a well-formed but unrecognized command name.
    ///
    /// Per the external interface contract, an unknown command terminates
    /// the run rather than being skipped.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl RepcrecError {
    /// Whether this error should be ignored (diagnostic only, operation
    /// dropped) rather than terminating the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RepcrecError::UnknownTransaction(_) | RepcrecError::UnknownVariable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_transaction_is_recoverable() {
        let err = RepcrecError::UnknownTransaction("T9".into());
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "no such transaction: T9");
    }

    #[test]
    fn parse_error_is_not_recoverable() {
        let err = RepcrecError::ParseError {
            line: 3,
            message: "missing closing paren".into(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "line 3: missing closing paren");
    }
}
