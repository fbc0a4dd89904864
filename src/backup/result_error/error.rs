use crate::backup::result_error::{WithFnName, WithMsg};
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Globset(#[from] globset::Error),
    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    LiblzmaStream(#[from] liblzma::stream::Error),
    #[error(transparent)]
    ValidationErrors(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    EmailBuild(#[from] lettre::error::Error),
    #[error(transparent)]
    SmtpTransport(#[from] lettre::transport::smtp::Error),
    #[error("{0}")]
    SmtpSendError(String),
    #[error("Manifest entry {0:?} contains a line break")]
    InvalidManifestEntry(String),
    #[error("Unsupported storage driver {0:?}")]
    UnsupportedStorageDriver(String),
    #[error("Storage config is missing {0:?}")]
    MissingStorageOption(String),
    #[error("Invalid storage object name {0:?}")]
    InvalidObjectName(String),
    #[error("Path {0:?} is not valid UTF-8")]
    NonUtf8Path(PathBuf),
    #[construct(skip)]
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[construct(skip)]
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFunctionName { fn_name: String, error: Box<Error> },
    #[construct(skip)]
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> WithFnName<S> for Error {
    fn with_fn_name(self, fn_name: S) -> Self {
        Self::WithFunctionName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(Error::into_iter).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(msg: &str) -> Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, msg.to_string()).into()
    }

    #[test]
    fn test_error_from_io_error() {
        match not_found("file not found") {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_with_msg_wraps_and_indents() {
        let error = not_found("file not found").with_msg("Opening manifest failed");
        match &error {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Opening manifest failed"),
            _ => panic!("Expected WithMsg error"),
        }
        let error_str = error.to_string();
        assert!(error_str.starts_with("Opening manifest failed:\n"));
        assert!(error_str.contains("  file not found"));
    }

    #[test]
    fn test_with_fn_name() {
        let error = not_found("gone").with_fn_name("select_path");
        let error_str = error.to_string();
        assert!(error_str.starts_with("select_path failed:"));
        assert!(error_str.contains("gone"));
    }

    #[test]
    fn test_constructors() {
        let error = Error::invalid_manifest_entry("/a\nb");
        assert!(error.to_string().contains("line break"));
        let error = Error::unsupported_storage_driver("ftp");
        assert_eq!(error.to_string(), "Unsupported storage driver \"ftp\"");
    }

    #[test]
    fn test_error_from_vec_flattens() {
        let nested = Error::from(vec![not_found("1"), not_found("2")]);
        let combined = Error::from(vec![nested, not_found("3")]);
        match combined {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 3),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let _error = Error::from(Vec::<Error>::new());
    }

    #[test]
    fn test_error_chain() {
        let chained = not_found("error1").chain(not_found("error2"));
        assert_eq!(chained.to_string(), "error1\n\nerror2");
        assert_eq!(chained.into_iter().count(), 2);
    }
}
