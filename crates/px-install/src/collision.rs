//! Install-set collision detection (spec.md §7, `CollisionError`): two
//! installed distributions contributing divergent bytes to the same
//! site-packages-relative path. Non-fatal by default — a shared,
//! byte-identical file (a common namespace-package `__init__.py`, say)
//! is normal and not reported.

use std::collections::HashMap;

use px_domain::InstalledDistribution;

use crate::record::{read_record, RecordEntry};

/// A single detected collision: two distributions both wrote `path`, with
/// different content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub path: String,
    pub first_owner: String,
    pub second_owner: String,
}

/// Compares every installed distribution's `RECORD` manifest against every
/// other's, reporting each site-packages-relative path two distributions
/// disagree on the content of. Distributions that never installed to the
/// same relative path, or that installed identical bytes to it, produce no
/// finding.
#[must_use]
pub fn detect_collisions(distributions: &[InstalledDistribution]) -> Vec<Collision> {
    let mut owners: HashMap<String, (String, String)> = HashMap::new();
    let mut collisions = Vec::new();

    for distribution in distributions {
        let owner = distribution.pin.to_string();
        let Ok(entries) = read_record(&distribution.record_path) else {
            continue;
        };
        for entry in entries {
            let Some(hash) = relative_path_and_hash(&entry) else {
                continue;
            };
            let (path, hash) = hash;
            match owners.get(&path) {
                Some((existing_owner, existing_hash)) => {
                    if existing_hash != &hash {
                        collisions.push(Collision {
                            path: path.clone(),
                            first_owner: existing_owner.clone(),
                            second_owner: owner.clone(),
                        });
                    }
                }
                None => {
                    owners.insert(path, (owner.clone(), hash));
                }
            }
        }
    }
    collisions
}

fn relative_path_and_hash(entry: &RecordEntry) -> Option<(String, String)> {
    let hash = entry.hash.clone()?;
    let relative = entry.path.strip_prefix("site-packages/").unwrap_or(&entry.path);
    Some((relative.to_string(), hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use px_domain::Pin;

    fn write_record(dir: &std::path::Path, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join("RECORD");
        let contents: String = entries
            .iter()
            .map(|(p, h)| format!("{p},{h},1\n"))
            .collect();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn flags_two_distributions_writing_different_content_to_the_same_path() {
        let dir_a = tempfile::tempdir().unwrap();
        let record_a = write_record(dir_a.path(), &[("site-packages/shared/mod.py", "sha256=aaa")]);
        let dir_b = tempfile::tempdir().unwrap();
        let record_b = write_record(dir_b.path(), &[("site-packages/shared/mod.py", "sha256=bbb")]);

        let distributions = vec![
            InstalledDistribution {
                pin: Pin::new("pkg-a", "1.0"),
                distribution_dir: dir_a.path().to_path_buf(),
                installed_files: vec![],
                record_path: record_a,
            },
            InstalledDistribution {
                pin: Pin::new("pkg-b", "1.0"),
                distribution_dir: dir_b.path().to_path_buf(),
                installed_files: vec![],
                record_path: record_b,
            },
        ];

        let collisions = detect_collisions(&distributions);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].path, "shared/mod.py");
    }

    #[test]
    fn identical_shared_content_is_not_a_collision() {
        let dir_a = tempfile::tempdir().unwrap();
        let record_a = write_record(dir_a.path(), &[("site-packages/shared/mod.py", "sha256=same")]);
        let dir_b = tempfile::tempdir().unwrap();
        let record_b = write_record(dir_b.path(), &[("site-packages/shared/mod.py", "sha256=same")]);

        let distributions = vec![
            InstalledDistribution {
                pin: Pin::new("pkg-a", "1.0"),
                distribution_dir: dir_a.path().to_path_buf(),
                installed_files: vec![],
                record_path: record_a,
            },
            InstalledDistribution {
                pin: Pin::new("pkg-b", "1.0"),
                distribution_dir: dir_b.path().to_path_buf(),
                installed_files: vec![],
                record_path: record_b,
            },
        ];

        assert!(detect_collisions(&distributions).is_empty());
    }
}
