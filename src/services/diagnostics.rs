use crate::models::Diagnostic;
use camino::Utf8Path;
use regex::Regex;

/// Parses Papyrus compiler error lines.
///
/// The compiler reports errors as `<file>(<line>,<column>): <message>`, for example
/// `C:\Mod\src\Foo.psc(12,4): variable bar is undefined`. Anything else is kept as
/// a location-less diagnostic.
#[derive(Debug, Clone)]
pub struct DiagnosticParser {
    location_pattern: Regex,
}

impl DiagnosticParser {
    pub fn new() -> Self {
        Self {
            location_pattern: Regex::new(r"^\s*(?P<file>.+?)\((?P<line>\d+),(?P<column>\d+)\):\s*(?P<message>.*)$")
                .expect("Invalid diagnostic regex"),
        }
    }

    pub fn parse(&self, line: &str) -> Diagnostic {
        match self.location_pattern.captures(line) {
            Some(caps) => Diagnostic {
                file: Some(caps["file"].trim().to_string()),
                line: caps["line"].parse().ok(),
                column: caps["column"].parse().ok(),
                message: caps["message"].trim().to_string(),
            },
            None => Diagnostic::message(line.trim()),
        }
    }

    /// Whether `diagnostic` points at the script `script`.
    ///
    /// Compares file stems case-insensitively, since the compiler may echo either
    /// the full path or just the script name.
    pub fn refers_to(diagnostic: &Diagnostic, script: &Utf8Path) -> bool {
        let Some(file) = diagnostic.file.as_deref() else {
            return false;
        };
        let Some(script_stem) = script.file_stem() else {
            return false;
        };

        // Backslashes are not separators on every platform camino runs on
        let file_name = file.rsplit(['\\', '/']).next().unwrap_or(file);
        let file_stem = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem);

        file_stem.eq_ignore_ascii_case(script_stem)
    }
}

impl Default for DiagnosticParser {
    fn default() -> Self {
        Self::new()
    }
}
