//! Shared helpers for the integration tests.
#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use skyrim_compile_helper::logging::{LogEntry, LogSink, Severity};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Keeps every entry written to it.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogSink for RecordingSink {
    fn write(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, event_id: i32) -> usize {
        self.entries().iter().filter(|e| e.event_id == event_id).count()
    }

    pub fn warnings(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }
}

pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

/// Create empty script files `names` inside `dir`.
pub fn write_scripts(dir: &Utf8Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), "Scriptname Test\n").unwrap();
    }
}

/// Shell stand-in for `PapyrusCompiler.exe`.
///
/// Writes `<output>/<stem>.pex` for every script it compiles, except:
/// - `*Broken*` prints `<file>(1,1): script is broken` to stderr
/// - `*Silent*` prints nothing and writes nothing
/// - `*Hang*` sleeps for 30 seconds
#[cfg(unix)]
pub const FAKE_COMPILER: &str = r#"#!/bin/sh
target="$1"
out=""
all=0
for arg in "$@"; do
  case "$arg" in
    -output=*) out="${arg#-output=}" ;;
    -all) all=1 ;;
  esac
done

compile() {
  name=$(basename "$1" .psc)
  case "$name" in
    *Broken*) echo "$1(1,1): script is broken" >&2; return ;;
    *Silent*) return ;;
    *Hang*) exec sleep 30 ;;
  esac
  echo "Compiling \"$name\"..."
  mkdir -p "$out"
  : > "$out/$name.pex"
}

if [ "$all" = 1 ]; then
  for f in "$target"/*.psc; do compile "$f"; done
else
  compile "$target"
fi
"#;

/// Install the fake compiler under `<root>/Papyrus Compiler/PapyrusCompiler.exe`.
#[cfg(unix)]
pub fn install_fake_compiler(root: &Utf8Path) {
    use std::os::unix::fs::PermissionsExt;

    let executable = skyrim_compile_helper::models::job::compiler_executable(root);
    fs::create_dir_all(executable.parent().unwrap()).unwrap();
    fs::write(&executable, FAKE_COMPILER).unwrap();
    fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
}
