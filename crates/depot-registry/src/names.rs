//! Validation for image and directory names.
//!
//! Names are slash-separated paths without a leading slash, e.g.
//! `users/alice/test-image`. The same component rules apply to images and
//! directories; an image name must additionally not be empty, since the
//! empty name is the replication stream's end-of-list sentinel.

use crate::error::{RegistryError, RegistryResult};

fn invalid(name: &str, reason: &str) -> RegistryError {
    RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_components(name: &str) -> RegistryResult<()> {
    if name.starts_with('/') {
        return Err(invalid(name, "leading slash"));
    }
    if name.ends_with('/') {
        return Err(invalid(name, "trailing slash"));
    }
    for component in name.split('/') {
        match component {
            "" => return Err(invalid(name, "empty path component")),
            "." | ".." => return Err(invalid(name, "relative path component")),
            _ => {}
        }
        if component.chars().any(char::is_control) {
            return Err(invalid(name, "control character in component"));
        }
    }
    Ok(())
}

/// Validate an image name.
pub fn validate_image_name(name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty name"));
    }
    validate_components(name)
}

/// Validate a directory name.
pub fn validate_directory_name(name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "empty name"));
    }
    validate_components(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_nested_names() {
        assert!(validate_image_name("ubuntu").is_ok());
        assert!(validate_image_name("users/alice/test-image").is_ok());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_image_name("").is_err());
    }

    #[test]
    fn rejects_leading_and_trailing_slash() {
        assert!(validate_image_name("/abs").is_err());
        assert!(validate_image_name("dir/").is_err());
    }

    #[test]
    fn rejects_doubled_slash() {
        assert!(validate_image_name("a//b").is_err());
    }

    #[test]
    fn rejects_relative_components() {
        assert!(validate_image_name("a/./b").is_err());
        assert!(validate_image_name("a/../b").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_image_name("bad\nname").is_err());
    }
}
