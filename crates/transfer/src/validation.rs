use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a folder name names exactly one entry inside the base
/// directory.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`) and `.`
/// - Path separators of either platform
pub fn validate_folder_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(TransferError::InvalidName(format!(
            "absolute path not allowed: {name}"
        )));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidName(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        _ => Err(TransferError::InvalidName(format!(
            "not a plain folder name: {name}"
        ))),
    }
}
