use crate::backup::compress::CompressorConfig;
use crate::backup::redacted::RedactedString;
use crate::backup::report::ReportConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::storage::StorageConfig;
use crate::backup::validate::{
    validate_absolute_paths, validate_exclude_patterns, validate_valid_archive_base_name,
};
use bon::Builder;
use chrono::Utc;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::Validate;

static TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Everything one backup run needs to know: what to dump, what to select,
/// where to store the archive and how to report back.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupJob {
    /// Base name of the stored archive, without extension.
    #[serde(default = "default_name")]
    #[builder(default = default_name(), into)]
    #[validate(custom(function = validate_valid_archive_base_name))]
    name: String,
    #[serde(default)]
    #[builder(default, into)]
    databases: Vec<String>,
    #[builder(into)]
    database_password: Option<RedactedString>,
    #[serde(default)]
    #[builder(default, into)]
    #[validate(custom(function = validate_absolute_paths))]
    include_files: Vec<PathBuf>,
    #[serde(default)]
    #[builder(default, into)]
    #[validate(custom(function = validate_exclude_patterns))]
    exclude_files: Vec<String>,
    #[builder(into)]
    disk: StorageConfig,
    #[serde(default)]
    #[builder(default, into)]
    #[validate(nested)]
    compressor: CompressorConfig,
    #[serde(default)]
    #[builder(default)]
    #[validate(nested)]
    report: ReportConfig,
}

fn default_name() -> String {
    format!("backup-{}", Utc::now().format(TIME_FORMAT))
}

impl BackupJob {
    /// Reads a job from a YAML (or JSON) file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let job: BackupJob = File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader(f).map_err(Error::from))
            .with_msg(format!("Parsing job {:?} failed", path))?;
        job.validate()
            .map_err(Error::from)
            .with_msg(format!("Validating job {:?} failed", path))?;
        Ok(job)
    }
}
