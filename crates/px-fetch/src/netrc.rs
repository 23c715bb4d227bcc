//! `.netrc`-seeded password database (spec.md §6, supplemented per
//! SPEC_FULL.md §C from pex's `PasswordDatabase`/`PasswordEntry`).
//!
//! The File downloader's basic-auth credentials come from two sources: the
//! ambient `~/.netrc` file, read once at startup, and explicit `(host, user,
//! password)` entries passed in via configuration. Explicit entries win on a
//! host collision — a caller who bothered to specify a password for a host
//! means it, regardless of what `.netrc` says.

use std::fs;
use std::path::{Path, PathBuf};

/// One `(host, username, password)` credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordEntry {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// An ordered collection of credentials, queried by host. Explicit entries
/// appended via `append` shadow any `.netrc`-sourced entry for the same
/// host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasswordDatabase {
    entries: Vec<PasswordEntry>,
}

impl PasswordDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `~/.netrc` if present; an absent file is not an error (most
    /// hosts never need authenticated package indexes).
    #[must_use]
    pub fn from_netrc() -> Self {
        let Some(home) = dirs_next::home_dir() else {
            return Self::default();
        };
        Self::from_netrc_path(&home.join(".netrc"))
    }

    /// Parses a specific `.netrc`-formatted file. Absent or unreadable files
    /// yield an empty database rather than an error, matching how most HTTP
    /// clients treat a missing `.netrc`.
    #[must_use]
    pub fn from_netrc_path(path: &Path) -> Self {
        let Ok(contents) = fs::read_to_string(path) else {
            return Self::default();
        };
        Self {
            entries: parse_netrc(&contents),
        }
    }

    /// Layers `explicit` entries on top of `self`, with `explicit` winning on
    /// host collision (spec.md §6: "ambient `.netrc`-equivalent file plus
    /// explicit entries").
    #[must_use]
    pub fn append(mut self, explicit: Vec<PasswordEntry>) -> Self {
        for entry in explicit {
            self.entries.retain(|existing| existing.host != entry.host);
            self.entries.push(entry);
        }
        self
    }

    #[must_use]
    pub fn find(&self, host: &str) -> Option<&PasswordEntry> {
        self.entries.iter().find(|entry| entry.host == host)
    }

    #[must_use]
    pub fn entries(&self) -> &[PasswordEntry] {
        &self.entries
    }
}

/// Minimal `.netrc` grammar: whitespace-separated tokens, `machine`/`login`/
/// `password` keywords, entries terminated by the next `machine` or EOF.
/// `default` entries and `macdef` blocks are not supported (no ambient tool
/// in this workspace needs them).
fn parse_netrc(contents: &str) -> Vec<PasswordEntry> {
    let tokens: Vec<&str> = contents.split_whitespace().collect();
    let mut entries = Vec::new();
    let mut i = 0;
    let mut host: Option<String> = None;
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;

    let flush = |host: &mut Option<String>, username: &mut Option<String>, password: &mut Option<String>, out: &mut Vec<PasswordEntry>| {
        if let (Some(h), Some(u), Some(p)) = (host.take(), username.take(), password.take()) {
            out.push(PasswordEntry {
                host: h,
                username: u,
                password: p,
            });
        } else {
            *host = None;
            *username = None;
            *password = None;
        }
    };

    while i < tokens.len() {
        match tokens[i] {
            "machine" if i + 1 < tokens.len() => {
                flush(&mut host, &mut username, &mut password, &mut entries);
                host = Some(tokens[i + 1].to_string());
                i += 2;
            }
            "login" if i + 1 < tokens.len() => {
                username = Some(tokens[i + 1].to_string());
                i += 2;
            }
            "password" if i + 1 < tokens.len() => {
                password = Some(tokens[i + 1].to_string());
                i += 2;
            }
            _ => i += 1,
        }
    }
    flush(&mut host, &mut username, &mut password, &mut entries);
    entries
}
