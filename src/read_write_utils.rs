//! Helpers for handling serialization file paths.

use std::ffi::OsString;
use std::path::PathBuf;

/// Parse `path` as one that points to a serialized file with the given
/// extension.
///
/// `path` can be either of the following:
/// 1. Existing directory: a default file name is appended to `path`.
/// 2. Non-existing directory: all dirs in the path are created, and a
///    default file name is appended.
/// 3. File in existing dir: the extension is checked, then `path` is
///    returned.
/// 4. File in non-existing dir: dirs in the path are created and the file
///    extension is checked.
///
/// The default file name is `<file_prefix>tree.<extension>`.
pub fn parse_serialization_path(
    mut path: PathBuf,
    extension: &str,
    file_prefix: &str,
) -> Result<PathBuf, ReadWriteError> {
    match path.extension() {
        Some(ext) => {
            if ext != extension {
                return Err(ReadWriteError::UnsupportedFileExtension {
                    expected: extension.to_owned(),
                    actual: ext.to_os_string(),
                });
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Ok(path)
        }
        None => {
            std::fs::create_dir_all(&path)?;
            path.push(format!("{}tree.{}", file_prefix, extension));
            Ok(path)
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when handling read/write paths.
#[derive(thiserror::Error, Debug)]
pub enum ReadWriteError {
    #[error("Expected file extension {expected:?} but got {actual:?}")]
    UnsupportedFileExtension { expected: String, actual: OsString },
    #[error("Expected a file, not a directory: {0:?}")]
    NotAFile(OsString),
    #[error("Unable to create directories on the serialization path")]
    IoError(#[from] std::io::Error),
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_with_expected_extension_passes_through() {
        let dir = std::env::temp_dir();
        let path = dir.join("some_tree.pol");
        let parsed = parse_serialization_path(path.clone(), "pol", "liabilities_").unwrap();
        assert_eq!(parsed, path);
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let path = std::env::temp_dir().join("some_tree.txt");
        assert!(matches!(
            parse_serialization_path(path, "pol", "liabilities_"),
            Err(ReadWriteError::UnsupportedFileExtension { .. })
        ));
    }

    #[test]
    fn directory_gets_a_default_file_name() {
        let dir = std::env::temp_dir().join(format!("polmst_test_{}", std::process::id()));
        let parsed = parse_serialization_path(dir.clone(), "pol", "liabilities_").unwrap();
        assert_eq!(parsed, dir.join("liabilities_tree.pol"));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
