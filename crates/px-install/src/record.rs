//! PEP 376 `RECORD` manifest (spec.md §4.9): one CSV row per installed
//! file, `path,hash,size`, with the `RECORD` entry itself (and a couple of
//! signature files some wheels carry) recorded with blank hash/size.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("I/O error at `{path}`: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed RECORD: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of a `RECORD` file: `{path},{hash},{size}`. `hash`/`size` are
/// absent for the `RECORD` file's own entry and for signature files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    pub path: String,
    pub hash: Option<String>,
    pub size: Option<u64>,
}

/// Reads a `RECORD` file's rows from its already-extracted path on disk.
pub fn read_record(path: &Path) -> Result<Vec<RecordEntry>, RecordError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_record_str(&contents)
}

/// Parses a `RECORD` file's rows from string content, used both for files
/// already unpacked to disk and for a `RECORD` read directly out of a
/// wheel's zip archive.
pub fn read_record_str(contents: &str) -> Result<Vec<RecordEntry>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents.as_bytes());
    let mut entries = Vec::new();
    for result in reader.records() {
        let row = result?;
        let path = row.get(0).unwrap_or_default().to_string();
        if path.is_empty() {
            continue;
        }
        let hash = row.get(1).filter(|s| !s.is_empty()).map(str::to_string);
        let size = row.get(2).and_then(|s| s.parse::<u64>().ok());
        entries.push(RecordEntry { path, hash, size });
    }
    Ok(entries)
}

/// Writes `entries` out as a `RECORD` file at `path`, in the order given.
pub fn write_record(path: &Path, entries: &[RecordEntry]) -> Result<(), RecordError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(path)
        .map_err(|source| RecordError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
        })?;
    for entry in entries {
        writer.write_record([
            entry.path.as_str(),
            entry.hash.as_deref().unwrap_or(""),
            entry
                .size
                .map(|s| s.to_string())
                .unwrap_or_default()
                .as_str(),
        ])?;
    }
    writer.flush().map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("RECORD");
        let entries = vec![
            RecordEntry {
                path: "tqdm/cli.py".into(),
                hash: Some("sha256=x_c8nmc4Huc-lKEsAXj78ZiyqSJ9hJ71j7vltY67icw".into()),
                size: Some(10509),
            },
            RecordEntry {
                path: "tqdm-4.62.3.dist-info/RECORD".into(),
                hash: None,
                size: None,
            },
        ];
        write_record(&path, &entries).unwrap();
        let read_back = read_record(&path).unwrap();
        assert_eq!(read_back, entries);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let entries = read_record_str("a.py,sha256=abc,10\n\nb.py,,\n").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].hash, None);
    }
}
