//! Exit code logic for the mediacrawl process.
//!
//! Single responsibility: map the run summary to the process exit outcome.

use std::process::ExitCode;

use mediacrawl_core::run::RunSummary;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Nothing failed.
    Success,
    /// Some artifacts or targets failed, but something was saved.
    Partial,
    /// Failures and nothing saved.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => Self::SUCCESS,
            ProcessExit::Partial => Self::from(2),
            ProcessExit::Failure => Self::FAILURE,
        }
    }
}

/// Determines the process exit outcome from saved and failed counts.
pub(crate) fn determine_exit_outcome(saved: u64, failed: u64) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if saved > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome for a finished run. Abandoned targets count as failures.
pub(crate) fn exit_for_summary(summary: &RunSummary) -> ProcessExit {
    let failed = summary.totals.failed + summary.failed_targets.len() as u64;
    determine_exit_outcome(summary.totals.saved, failed)
}

#[cfg(test)]
mod tests {
    use super::determine_exit_outcome;
    use super::ProcessExit;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_nothing_happened() {
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }
}
