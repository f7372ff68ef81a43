use crate::config::DecodePolicy;
use crate::error::{Result, SrcdumpError};
use std::fs;
use std::io;
use std::path::{Component, Path};

/// Path of `path` relative to `root`, with components joined by `/`
/// regardless of the host separator.
///
/// # Errors
///
/// Returns `SrcdumpError::RelativePath` if `path` does not live under `root`
/// or contains a component that cannot be expressed relatively.
pub fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let relative_err = || SrcdumpError::RelativePath {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let stripped = path.strip_prefix(root).map_err(|_| relative_err())?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(relative_err());
            }
        }
    }

    Ok(parts.join("/"))
}

/// Reads a whole file and decodes it as UTF-8 using `policy` for invalid
/// byte sequences. The content is otherwise returned unchanged.
///
/// # Errors
///
/// Returns the underlying `io::Error` if the file cannot be opened or read.
pub fn read_lossy(path: &Path, policy: DecodePolicy) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode(&bytes, policy))
}

/// Decodes `bytes` as UTF-8, dropping or replacing invalid sequences
#[must_use]
pub fn decode(bytes: &[u8], policy: DecodePolicy) -> String {
    match policy {
        DecodePolicy::Replace => String::from_utf8_lossy(bytes).into_owned(),
        DecodePolicy::Skip => {
            let mut text = String::with_capacity(bytes.len());
            for chunk in bytes.utf8_chunks() {
                text.push_str(chunk.valid());
            }
            text
        }
    }
}
