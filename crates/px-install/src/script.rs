//! Launcher script generation and shebang handling (spec.md §4.9).

use std::path::Path;

/// Builds a `#!{interpreter}` shebang line for the target interpreter.
#[must_use]
pub fn get_shebang(interpreter_path: &str) -> String {
    format!("#!{interpreter_path}")
}

/// Generates a console/gui-script launcher's source, in pip's own
/// generated-launcher shape: a thin `from {module} import {entry}` plus a
/// `sys.exit(...)` call, with `sys.argv[0]` normalized so tracebacks name
/// the script, not the `-script.py` stem some installers historically used.
#[must_use]
pub fn get_script_launcher(module: &str, function: &str, shebang: &str) -> String {
    let import_name = function.split('.').next().unwrap_or(function);
    format!(
        "{shebang}\n\
         import re\n\
         import sys\n\
         from {module} import {import_name}\n\
         \n\
         if __name__ == \"__main__\":\n\
         \u{20}\u{20}\u{20}\u{20}sys.argv[0] = re.sub(r\"(-script\\.pyw?|\\.exe)?$\", \"\", sys.argv[0])\n\
         \u{20}\u{20}\u{20}\u{20}sys.exit({function}())\n"
    )
}

/// A bare module with no `:function` in its entry-point string runs as
/// `python -m module`, mirroring how `runpy`-backed launchers behave.
#[must_use]
pub fn get_module_launcher(module: &str, shebang: &str) -> String {
    format!(
        "{shebang}\n\
         import runpy\n\
         \n\
         if __name__ == \"__main__\":\n\
         \u{20}\u{20}\u{20}\u{20}runpy.run_module(\"{module}\", run_name=\"__main__\")\n"
    )
}

/// Rewrites a generated launcher's first line (its shebang) to point at
/// `interpreter_path`, used during the post-install fixup pass once the
/// real install prefix is known (spec.md §4.9 "rewrite script shebangs").
#[must_use]
pub fn rewrite_shebang(script_source: &str, interpreter_path: &str) -> String {
    let mut lines = script_source.splitn(2, '\n');
    let _old_shebang = lines.next();
    let rest = lines.next().unwrap_or_default();
    format!("{}\n{rest}", get_shebang(interpreter_path))
}

/// Marks `path` executable on Unix; a no-op everywhere else, since the
/// installed-distribution layout this pipeline produces is Unix-shaped.
pub fn mark_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
