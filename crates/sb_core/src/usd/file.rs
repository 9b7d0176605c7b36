//! Scene file boundary: supported extensions, reading and writing layers, search paths.

use std::path::{Path, PathBuf};

use super::layer::Layer;
use super::stage::{StageError, StageResult};

/// Extensions recognised as scene files (case-sensitive).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["usd", "usda", "usdc"];

/// Magic bytes at the start of binary crate files.
const CRATE_MAGIC: &[u8] = b"PXR-USDC";

/// True if the file has a supported extension.
pub fn is_supported_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e))
}

/// Return a filename with a supported extension, lower-casing the extension if that is
/// what it takes. `None` if the file cannot be made supported.
pub fn normalize_extension(filename: &str) -> Option<String> {
    if is_supported_file(filename) {
        return Some(filename.to_string());
    }
    let path = Path::new(filename);
    let ext = path.extension()?.to_str()?;
    let lower = ext.to_ascii_lowercase();
    if !SUPPORTED_EXTENSIONS.contains(&lower.as_str()) {
        return None;
    }
    let normalized = path.with_extension(&lower).to_string_lossy().into_owned();
    log::warn!(
        "Scene file extension '{}' is not lower case, writing '{}' instead",
        ext,
        normalized
    );
    Some(normalized)
}

/// Read a scene file into a layer.
pub fn read_layer(path: &Path) -> StageResult<Layer> {
    let display = path.display().to_string();
    if !is_supported_file(path) {
        return Err(StageError::UnsupportedFormat(display));
    }
    let bytes = std::fs::read(path).map_err(|source| StageError::Io {
        path: display.clone(),
        source,
    })?;
    if bytes.starts_with(CRATE_MAGIC) {
        return Err(StageError::BinaryFormat(display));
    }
    let text = String::from_utf8(bytes).map_err(|_| StageError::UnsupportedFormat(display.clone()))?;
    Layer::parse(&text).map_err(|source| StageError::Parse {
        path: display,
        source,
    })
}

/// Write a layer as USDA. `.usdc` targets are rejected.
pub fn write_layer(layer: &Layer, path: &Path) -> StageResult<()> {
    let display = path.display().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("usd") | Some("usda") => {}
        Some("usdc") => return Err(StageError::BinaryFormat(display)),
        _ => return Err(StageError::UnsupportedFormat(display)),
    }
    std::fs::write(path, layer.to_usda()).map_err(|source| StageError::Io {
        path: display.clone(),
        source,
    })?;
    log::info!("Saved stage {}", display);
    Ok(())
}

/// Expand `[VAR]`, `$VAR` and `${VAR}` references. Unset variables are left verbatim.
pub fn expand_env_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find(['[', '$']) {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        let (name, consumed) = if let Some(inner) = tail.strip_prefix('[') {
            match inner.find(']') {
                Some(end) => (&inner[..end], end + 2),
                None => ("", 0),
            }
        } else if let Some(inner) = tail.strip_prefix("${") {
            match inner.find('}') {
                Some(end) => (&inner[..end], end + 3),
                None => ("", 0),
            }
        } else {
            let inner = &tail[1..];
            let end = inner
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(inner.len());
            (&inner[..end], end + 1)
        };

        match (!name.is_empty()).then(|| std::env::var(name).ok()).flatten() {
            Some(value) => out.push_str(&value),
            None if consumed > 0 => out.push_str(&tail[..consumed]),
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
                continue;
            }
        }
        rest = &tail[consumed.max(1)..];
    }
    out.push_str(rest);
    out
}

/// Split a search path on `;` and `:`. A `:` right after a single drive letter (`C:`) is
/// kept as part of the entry.
pub fn split_search_path(search_path: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    for c in search_path.chars() {
        let is_drive = c == ':' && current.len() == 1 && current.chars().all(|d| d.is_ascii_alphabetic());
        if (c == ';' || c == ':') && !is_drive {
            if !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}

/// Resolve a relative filename against a search path; the first existing candidate wins.
/// Absolute or unresolvable filenames come back unchanged.
pub fn resolve_search_path(filename: &str, search_path: &str) -> String {
    if filename.is_empty() || Path::new(filename).is_absolute() || search_path.is_empty() {
        return filename.to_string();
    }
    for dir in split_search_path(&expand_env_vars(search_path)) {
        let candidate: PathBuf = Path::new(&dir).join(filename);
        if candidate.exists() {
            log::debug!("Resolved {} to {}", filename, candidate.display());
            return candidate.to_string_lossy().into_owned();
        }
    }
    filename.to_string()
}
