//! Input validation for account ids, job handles and filesystem paths
//!
//! Every check here is pure: nothing touches the network or the filesystem,
//! so callers can reject bad input before any side effect happens.

use crate::error::ValidationError;
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static HANDLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("handle pattern is a valid regex")
});

/// Check that an account id is strictly positive
///
/// # Examples
///
/// ```
/// use imperva_export::validation::validate_account_id;
///
/// assert!(validate_account_id(123456).is_ok());
/// assert!(validate_account_id(0).is_err());
/// ```
pub fn validate_account_id(account_id: i64) -> Result<(), ValidationError> {
    if account_id <= 0 {
        return Err(ValidationError::AccountId(account_id));
    }
    Ok(())
}

/// Check that a job handle is a lowercase 8-4-4-4-12 UUID, ignoring
/// surrounding whitespace
///
/// Returns the trimmed handle on success.
///
/// # Examples
///
/// ```
/// use imperva_export::validation::validate_handle;
///
/// let handle = validate_handle(" 28c5f5af-bd9e-423f-99a7-d2a8c440db7e ").unwrap();
/// assert_eq!(handle, "28c5f5af-bd9e-423f-99a7-d2a8c440db7e");
/// assert!(validate_handle("invalid-handler").is_err());
/// ```
pub fn validate_handle(handle: &str) -> Result<&str, ValidationError> {
    let trimmed = handle.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyHandle);
    }
    if !HANDLE_PATTERN.is_match(trimmed) {
        return Err(ValidationError::Handle(trimmed.to_string()));
    }
    Ok(trimmed)
}

/// Check that an output directory has no `..` segment
///
/// An empty string is accepted; it stands for the current directory.
pub fn validate_output_dir(dir: &Path) -> Result<(), ValidationError> {
    if has_parent_segment(dir) {
        return Err(ValidationError::OutputDir(dir.display().to_string()));
    }
    Ok(())
}

/// Check that a file path is safe to write
///
/// The path must not contain `..`, an absolute path must live under the
/// system temp directory, and its parent must pass [`validate_output_dir`].
pub fn validate_file_path(path: &Path) -> Result<(), ValidationError> {
    if has_parent_segment(path) {
        return Err(ValidationError::FilePath(path.display().to_string()));
    }

    if path.is_absolute() && !path.starts_with(std::env::temp_dir()) {
        return Err(ValidationError::AbsolutePath(path.display().to_string()));
    }

    if let Some(parent) = path.parent() {
        if validate_output_dir(parent).is_err() {
            return Err(ValidationError::ParentDir(parent.display().to_string()));
        }
    }

    Ok(())
}

fn has_parent_segment(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_must_be_positive() {
        for id in [1, 123_456, i64::MAX] {
            assert!(validate_account_id(id).is_ok(), "{id} should pass");
        }
        for id in [0, -1, i64::MIN] {
            assert_eq!(
                validate_account_id(id),
                Err(ValidationError::AccountId(id)),
                "{id} should fail"
            );
        }
    }

    #[test]
    fn handle_accepts_canonical_uuid() {
        let cases = [
            "28c5f5af-bd9e-423f-99a7-d2a8c440db7e",
            "12345678-1234-1234-1234-1234567890ab",
            " 28c5f5af-bd9e-423f-99a7-d2a8c440db7e ",
            "\t28c5f5af-bd9e-423f-99a7-d2a8c440db7e\n",
        ];
        for handle in cases {
            assert!(validate_handle(handle).is_ok(), "{handle:?} should pass");
        }
    }

    #[test]
    fn handle_rejects_other_shapes() {
        let cases = [
            "invalid-handler",
            "1234567-1234-1234-1234-1234567890ab",
            "28C5F5AF-BD9E-423F-99A7-D2A8C440DB7E",
            "28c5f5afbd9e423f99a7d2a8c440db7e",
            "28c5f5af-bd9e-423f-99a7-d2a8c440db7e0",
            "g8c5f5af-bd9e-423f-99a7-d2a8c440db7e",
            "28c5f5af-bd9e-423f-99a7-d2a8c440db7e/../x",
        ];
        for handle in cases {
            assert!(
                matches!(validate_handle(handle), Err(ValidationError::Handle(_))),
                "{handle:?} should fail"
            );
        }
    }

    #[test]
    fn blank_handle_is_required() {
        assert_eq!(validate_handle(""), Err(ValidationError::EmptyHandle));
        assert_eq!(validate_handle("   "), Err(ValidationError::EmptyHandle));
    }

    #[test]
    fn output_dir_rejects_traversal() {
        for dir in ["./valid_dir", "/absolute/path/to/tempdir", "", ".", "a..b"] {
            assert!(
                validate_output_dir(Path::new(dir)).is_ok(),
                "{dir:?} should pass"
            );
        }
        for dir in ["../invalid_dir", "./another/../invalid", "exports/.."] {
            assert!(
                validate_output_dir(Path::new(dir)).is_err(),
                "{dir:?} should fail"
            );
        }
    }

    #[test]
    fn file_path_rules() {
        let temp = std::env::temp_dir();

        for path in [
            Path::new("./valid_file.zip").to_path_buf(),
            Path::new("exports/valid_file.zip.tmp").to_path_buf(),
            temp.join("valid_file.zip"),
            temp.join("nested").join("valid_file.zip"),
        ] {
            assert!(validate_file_path(&path).is_ok(), "{path:?} should pass");
        }

        assert!(matches!(
            validate_file_path(Path::new("../invalid_file.zip")),
            Err(ValidationError::FilePath(_))
        ));
        assert!(matches!(
            validate_file_path(Path::new("./another/../invalid_file.zip")),
            Err(ValidationError::FilePath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_path_outside_temp_is_rejected() {
        let err = validate_file_path(Path::new("/etc/passwd")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "absolute paths are only allowed in the system temp directory: /etc/passwd"
        );
    }

    #[test]
    fn errors_name_the_offending_value() {
        let err = validate_output_dir(Path::new("../secrets")).unwrap_err();
        assert!(err.to_string().contains("../secrets"));

        let err = validate_handle("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
