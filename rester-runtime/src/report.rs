use rester_engine::{Call, CallState};
use std::fmt::Display;

/// Exit statuses wrap modulo 256.
const MAX_EXIT_CODE: usize = 255;

/// Outcome of a whole run: every recorded call plus the errors that aborted
/// a file before or outside of a call.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub calls: Vec<Call>,
    pub errors: Vec<String>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error<T: Into<String>>(&mut self, error: T) {
        self.errors.push(error.into());
    }

    pub fn failed_calls(&self) -> usize {
        self.calls.iter().filter(|call| call.is_failed()).count()
    }

    pub fn ran_calls(&self) -> usize {
        self.calls.iter().filter(|call| call.has_run()).count()
    }

    /// 0 when every call passed, the number of failed calls (at most 255)
    /// otherwise, and 1 when nothing ran or an error stopped a file without
    /// failing a call.
    pub fn exit_code(&self) -> i32 {
        let failed = self.failed_calls();

        if failed > 0 {
            failed.min(MAX_EXIT_CODE) as i32
        } else if self.ran_calls() == 0 || !self.errors.is_empty() {
            1
        } else {
            0
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for call in self.calls.iter() {
            writeln!(
                f,
                "{} {}: {} passed, {} failed, {} skipped",
                call.script,
                call.state,
                call.passed.len(),
                call.failed.len(),
                call.skipped.len()
            )?;

            if let (Some(method), Some(uri)) = (&call.method, &call.uri) {
                match call.status {
                    Some(status) => writeln!(f, "  {} {} -> {}", method, uri, status)?,
                    None => writeln!(f, "  {} {}", method, uri)?,
                }
            }

            for outcome in call.failed.iter() {
                writeln!(f, "  failed {}", outcome)?;
            }
            if let Some(error) = &call.error {
                writeln!(f, "  error {}", error)?;
            }
        }

        for error in self.errors.iter() {
            writeln!(f, "error {}", error)?;
        }

        let count = |state: CallState| self.calls.iter().filter(|call| call.state == state).count();
        write!(
            f,
            "{} calls: {} passed, {} failed, {} errors, {} skipped, {} cancelled",
            self.calls.len(),
            count(CallState::Passed),
            count(CallState::Failed),
            count(CallState::Error),
            count(CallState::Skipped),
            count(CallState::Cancelled)
        )
    }
}
