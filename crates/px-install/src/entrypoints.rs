//! `entry_points.txt` parsing (spec.md §4.9): a wheel's `console_scripts`
//! and `gui_scripts` sections name the launchers the installer must
//! generate. The format is a plain INI file, and the only two sections
//! that matter here are small enough that pulling in a general-purpose INI
//! parser isn't worth it — this hand-rolls the same handful of rules the
//! marker grammar in the resolver crate hand-rolls rather than reaching for
//! a full PEP 508 implementation.

/// Which launcher category an entry point belongs to: determines whether
/// the generated script needs a console or a windowed shebang (Unix
/// installs don't distinguish the two at the shebang level, but the
/// category still selects which directory conventions apply upstream).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptKind {
    Console,
    Gui,
}

/// One `name = module[.submodule]:function` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub module: String,
    pub function: Option<String>,
    pub kind: ScriptKind,
}

/// Parses `entry_points.txt` content, returning every `console_scripts` and
/// `gui_scripts` entry. Sections this installer doesn't care about
/// (`distutils.commands`, plugin registries, etc.) are skipped.
#[must_use]
pub fn parse_entry_points(contents: &str) -> Vec<EntryPoint> {
    let mut section: Option<ScriptKind> = None;
    let mut entries = Vec::new();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "console_scripts" => Some(ScriptKind::Console),
                "gui_scripts" => Some(ScriptKind::Gui),
                _ => None,
            };
            continue;
        }
        let Some(kind) = section else { continue };
        let Some((name, target)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let target = strip_extras(target.trim());
        let (module, function) = match target.split_once(':') {
            Some((module, function)) => (module.trim().to_string(), Some(function.trim().to_string())),
            None => (target.to_string(), None),
        };
        entries.push(EntryPoint {
            name,
            module,
            function,
            kind,
        });
    }
    entries
}

/// Strips a trailing `[extra1,extra2]` qualifier, which this installer
/// ignores — extras only affect what a full resolver would have pulled in
/// transitively, and that's already settled by the time a lock exists.
fn strip_extras(target: &str) -> &str {
    match target.find('[') {
        Some(idx) => target[..idx].trim(),
        None => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_and_gui_sections() {
        let contents = "\
[console_scripts]
pip = pip._internal.cli.main:main

[gui_scripts]
pipx-gui = pipx.gui:run
";
        let entries = parse_entry_points(contents);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "pip");
        assert_eq!(entries[0].module, "pip._internal.cli.main");
        assert_eq!(entries[0].function.as_deref(), Some("main"));
        assert_eq!(entries[0].kind, ScriptKind::Console);
        assert_eq!(entries[1].kind, ScriptKind::Gui);
    }

    #[test]
    fn ignores_unrelated_sections() {
        let contents = "\
[distutils.commands]
build_ext = setuptools.command.build_ext:build_ext

[console_scripts]
tool = pkg.cli:main
";
        let entries = parse_entry_points(contents);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "tool");
    }

    #[test]
    fn strips_extras_qualifier() {
        let contents = "[console_scripts]\ntool = pkg.cli:main [extra1,extra2]\n";
        let entries = parse_entry_points(contents);
        assert_eq!(entries[0].module, "pkg.cli");
    }

    #[test]
    fn entry_point_with_no_function_is_a_bare_module() {
        let contents = "[console_scripts]\ntool = pkg.cli\n";
        let entries = parse_entry_points(contents);
        assert_eq!(entries[0].module, "pkg.cli");
        assert_eq!(entries[0].function, None);
    }
}
