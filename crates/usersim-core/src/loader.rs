//! Reading facts documents from files, directories and streams.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::UsersimError;
use crate::schema::FactsDocument;
use crate::Result;

/// A validated facts document and the scenario name it judges under.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFacts {
    /// `path` from the document, else the file stem.
    pub scenario: String,
    pub document: FactsDocument,
    pub source: Option<PathBuf>,
}

/// Reads and validates one facts file.
pub fn read_facts_file(path: &Path) -> Result<LoadedFacts> {
    let text = std::fs::read_to_string(path).map_err(|e| UsersimError::io(path, e))?;
    let origin = format!("facts document {}", path.display());
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| UsersimError::validation(&origin, e.to_string()))?;
    let document = FactsDocument::from_value(value, &origin)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(LoadedFacts {
        scenario: document.scenario_or(&stem).to_string(),
        document,
        source: Some(path.to_path_buf()),
    })
}

/// Reads and validates a facts document from a stream (usually stdin).
pub fn read_facts<R: Read>(reader: R, origin: &str) -> Result<LoadedFacts> {
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| UsersimError::validation(origin, e.to_string()))?;
    let document = FactsDocument::from_value(value, origin)?;
    Ok(LoadedFacts {
        scenario: document.scenario_or("unknown").to_string(),
        document,
        source: None,
    })
}

/// Every `*.json` file directly inside `dir`, sorted by file name.
pub fn facts_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(UsersimError::validation(
            "facts directory",
            format!("{} is not a directory", dir.display()),
        ));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            UsersimError::io(dir, source)
        })?;
        let path = entry.into_path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads every facts document in `dir`. All are validated before any is
/// returned, so a single malformed file fails the whole directory.
pub fn read_facts_dir(dir: &Path) -> Result<Vec<LoadedFacts>> {
    let loaded = facts_files(dir)?
        .iter()
        .map(|path| read_facts_file(path))
        .collect::<Result<Vec<_>>>()?;
    debug!("Loaded {} facts document(s) from {}", loaded.len(), dir.display());
    Ok(loaded)
}

/// Sanitized fact names across every document in `dir`.
pub fn known_fact_names(dir: &Path) -> Result<BTreeSet<String>> {
    Ok(read_facts_dir(dir)?
        .iter()
        .flat_map(|loaded| loaded.document.fact_names())
        .collect())
}
