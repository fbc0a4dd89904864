//! Validation functions for job description values.

use crate::backup::path_matcher::PathMatcher;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::{Path, PathBuf};

pub fn validate_valid_archive_base_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.is_empty() || !is_sanitized(name) {
        return Err(ValidationError::new("InvalidArchiveBaseName").with_message(
            format!("Invalid file name {:?}, try sanitizing like {:?}", name, sanitize(name)).into(),
        ));
    }

    Ok(())
}

pub fn validate_absolute_paths(paths: &[PathBuf]) -> Result<(), ValidationError> {
    match paths.iter().find(|p| !p.is_absolute()) {
        Some(p) => Err(ValidationError::new("RelativePath")
            .with_message(format!("{:?} is not an absolute path", p).into())),
        None => Ok(()),
    }
}

pub fn validate_exclude_patterns(patterns: &[String]) -> Result<(), ValidationError> {
    PathMatcher::new(patterns).map(|_| ()).map_err(|e| {
        ValidationError::new("InvalidExcludePattern").with_message(e.to_string().into())
    })
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_base_name() {
        assert!(validate_valid_archive_base_name("2023-06-01-12-00-00-ftp").is_ok());
        assert!(validate_valid_archive_base_name("a/b").is_err());
        assert!(validate_valid_archive_base_name("").is_err());
    }

    #[test]
    fn test_absolute_paths() {
        assert!(validate_absolute_paths(&[PathBuf::from("/srv/app")]).is_ok());
        assert!(validate_absolute_paths(&[PathBuf::from("/srv"), PathBuf::from("app")]).is_err());
    }

    #[test]
    fn test_exclude_patterns() {
        assert!(validate_exclude_patterns(&["*/vendor/*".to_string(), "/srv/a".to_string()]).is_ok());
        assert!(validate_exclude_patterns(&["*[".to_string()]).is_err());
    }

    #[test]
    fn test_dir_exist() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_dir_exist(temp_dir.path()).is_ok());
        assert!(validate_dir_exist(temp_dir.path().join("missing")).is_err());
        let file = temp_dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(validate_dir_exist(file).is_err());
    }
}
