//! Loading rule and config text from paths or base64 arguments.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One rule document to translate, as read from disk or decoded from an
/// argument. A failed read is kept so the batch can report it and move on.
#[derive(Debug)]
pub struct RuleSource {
    pub name: String,
    pub content: Result<String, InputError>,
}

/// Read a rule file, or every `.yml`/`.yaml` file below a directory in
/// sorted path order.
pub fn read_rule_sources(path: &Path) -> Result<Vec<RuleSource>, InputError> {
    let files = if path.is_dir() {
        let mut files = Vec::new();
        collect_rule_files(path, &mut files)?;
        files
    } else {
        vec![path.to_path_buf()]
    };

    Ok(files
        .into_iter()
        .map(|file| RuleSource {
            name: file.display().to_string(),
            content: std::fs::read_to_string(&file).map_err(InputError::from),
        })
        .collect())
}

fn collect_rule_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), InputError> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_rule_files(&path, files)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml" | "yaml")
        ) {
            files.push(path);
        }
    }
    Ok(())
}

/// Decode `--filecontent`: a single base64 document, or one per line.
pub fn decode_rule_sources(encoded: &str) -> Vec<RuleSource> {
    let lines: Vec<&str> = encoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() <= 1 {
        return vec![RuleSource {
            name: "filecontent".to_string(),
            content: decode_base64(encoded),
        }];
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| RuleSource {
            name: format!("filecontent line {}", i + 1),
            content: decode_base64(line),
        })
        .collect()
}

/// Decode standard base64 into UTF-8 text.
pub fn decode_base64(encoded: &str) -> Result<String, InputError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}
