use std::fmt;
use std::time::Duration;

/// One message reported by the compiler, with a source location when it had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic that carries no location.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            file: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => {
                write!(f, "{}({},{}): {}", file, line, column, self.message)
            }
            (Some(file), _, _) => write!(f, "{}: {}", file, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Result of compiling one file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationOutcome {
    pub file: String,
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

impl CompilationOutcome {
    pub fn succeeded(file: impl Into<String>, duration: Duration) -> Self {
        Self {
            file: file.into(),
            success: true,
            diagnostics: Vec::new(),
            duration,
        }
    }

    pub fn failed(file: impl Into<String>, diagnostics: Vec<Diagnostic>, duration: Duration) -> Self {
        Self {
            file: file.into(),
            success: false,
            diagnostics,
            duration,
        }
    }
}

/// Aggregate result of one orchestration run.
///
/// `succeeded + failed` always equals the number of files that were claimed by a
/// worker. Files left unclaimed because the run was cancelled are counted in
/// `not_attempted` and are in neither list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,

    /// Failed files in input order.
    pub failed_files: Vec<String>,

    /// Every recorded outcome in input order.
    pub outcomes: Vec<CompilationOutcome>,

    pub workers: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CompilationReport {
    /// Report for a run that had nothing to compile.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.not_attempted == 0 && !self.cancelled
    }

    /// "X succeeded, Y failed", plus the skipped count when there is one.
    pub fn summary(&self) -> String {
        if self.not_attempted > 0 {
            format!(
                "{} succeeded, {} failed, {} not attempted",
                self.succeeded, self.failed, self.not_attempted
            )
        } else {
            format!("{} succeeded, {} failed", self.succeeded, self.failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_with_location() {
        let diagnostic = Diagnostic {
            file: Some("C:\\src\\Foo.psc".to_string()),
            line: Some(12),
            column: Some(4),
            message: "variable bar is undefined".to_string(),
        };

        assert_eq!(
            diagnostic.to_string(),
            "C:\\src\\Foo.psc(12,4): variable bar is undefined"
        );
    }

    #[test]
    fn test_diagnostic_display_without_location() {
        let diagnostic = Diagnostic::message("No output generated");
        assert_eq!(diagnostic.to_string(), "No output generated");
    }

    #[test]
    fn test_report_summary() {
        let report = CompilationReport {
            total: 3,
            succeeded: 2,
            failed: 1,
            failed_files: vec!["b.psc".to_string()],
            ..Default::default()
        };

        assert_eq!(report.summary(), "2 succeeded, 1 failed");
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_summary_with_unattempted_files() {
        let report = CompilationReport {
            total: 5,
            succeeded: 1,
            failed: 1,
            not_attempted: 3,
            cancelled: true,
            ..Default::default()
        };

        assert_eq!(report.summary(), "1 succeeded, 1 failed, 3 not attempted");
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = CompilationReport::empty();
        assert_eq!(report.total, 0);
        assert!(report.is_success());
    }
}
