//! A concrete `BuildBackendInvoker` that runs PEP 517 hooks in a plain
//! subprocess of the target interpreter (spec.md §4.8's "external build
//! resolver").
//!
//! This workspace does not bootstrap isolated build environments for a
//! backend's `requires` (that's creating a foreign executable runtime, out
//! of scope per spec.md's Non-goals) — it assumes the interpreter passed to
//! [`SubprocessBuildInvoker::new`] already has the backend importable,
//! exactly as pex's own non-isolated build path does. The hook is driven
//! through a tiny, fixed driver script rather than `python -c`, so neither
//! the backend spec nor any path ever needs shell quoting.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use px_build::build_system::BuildSystemSpec;
use px_build::invoker::{BuildBackendInvoker, BuildHook, HookOutcome, InvokerError, EX_TEMPFAIL};

/// Drives a single PEP 517 hook: imports `backend_spec` (a `module:attr` or
/// bare `module` string), calls the named hook with `dest_dir`, and writes
/// its returned path into `result_file`. Exits [`EX_TEMPFAIL`] when the
/// backend has no such hook or raises `NotImplementedError`, matching the
/// convention `pex`'s own subprocess wrapper uses for optional hooks.
const HOOK_DRIVER: &str = r#"
import importlib
import os
import sys

def main():
    backend_spec, hook_name, source_dir, dest_dir, result_file = sys.argv[1:6]

    sys.path.insert(0, source_dir)
    module_name, _, obj_name = backend_spec.partition(":")
    module = importlib.import_module(module_name)
    backend = getattr(module, obj_name) if obj_name else module

    hook = getattr(backend, hook_name, None)
    if hook is None:
        sys.exit(75)

    os.chdir(source_dir)
    try:
        produced = hook(dest_dir)
    except NotImplementedError:
        sys.exit(75)

    with open(result_file, "w", encoding="utf-8") as fh:
        fh.write(produced)

if __name__ == "__main__":
    main()
"#;

/// Shells out to `interpreter_path` for every hook invocation.
pub struct SubprocessBuildInvoker {
    interpreter_path: String,
}

impl SubprocessBuildInvoker {
    #[must_use]
    pub fn new(interpreter_path: impl Into<String>) -> Self {
        Self {
            interpreter_path: interpreter_path.into(),
        }
    }
}

impl BuildBackendInvoker for SubprocessBuildInvoker {
    fn invoke(
        &self,
        build_system: &BuildSystemSpec,
        hook: BuildHook,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<HookOutcome, InvokerError> {
        let driver_path = dest_dir.join("_px_hook_driver.py");
        std::fs::File::create(&driver_path)
            .and_then(|mut f| f.write_all(HOOK_DRIVER.as_bytes()))
            .map_err(InvokerError::Io)?;
        let result_path = dest_dir.join("_px_hook_result.txt");

        let output = Command::new(&self.interpreter_path)
            .arg(&driver_path)
            .arg(&build_system.build_backend)
            .arg(hook.name())
            .arg(source_dir)
            .arg(dest_dir)
            .arg(&result_path)
            .output()
            .map_err(InvokerError::Io)?;

        let _ = std::fs::remove_file(&driver_path);

        if output.status.code() == Some(EX_TEMPFAIL) {
            let _ = std::fs::remove_file(&result_path);
            return Ok(HookOutcome::NotImplemented);
        }
        if !output.status.success() {
            return Err(InvokerError::Failed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let relative = std::fs::read_to_string(&result_path).map_err(|_| InvokerError::MissingResult)?;
        let _ = std::fs::remove_file(&result_path);
        Ok(HookOutcome::Produced(relative.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_driver_script_parses_as_a_python_module_shape() {
        assert!(HOOK_DRIVER.contains("def main():"));
        assert!(HOOK_DRIVER.contains("sys.exit(75)"));
    }
}
