//! End of run reporting.
//!
//! A run sends back whether it was error free, the newline-joined error text
//! and the archive size, and gets back the names of older backups to prune.

use crate::backup::function_path;
use crate::backup::notifications::{Notification, NotificationConfig};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use bon::Builder;
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use validator::Validate;

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub success: bool,
    pub error: String,
    pub size: Option<u64>,
}

impl RunReport {
    pub fn completed(error: String, size: u64) -> Self {
        Self {
            success: error.is_empty(),
            error,
            size: Some(size),
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            error,
            size: None,
        }
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.success, self.size) {
            (true, Some(size)) => write!(f, "Backup complete, archive size {size} bytes"),
            (false, Some(size)) => write!(
                f,
                "Backup complete with errors, archive size {size} bytes:\n{}",
                self.error
            ),
            (_, None) => write!(f, "Backup failed:\n{}", self.error),
        }
    }
}

/// Receives the report of a finished run and answers with the names of
/// older backups to delete from storage.
pub trait Reporter {
    fn report(&self, job_name: &str, report: &RunReport) -> Result<Vec<String>>;
}

/// Reports by logging, and optionally by writing the report as JSON and by
/// email. Pruning follows the job's `backups_to_delete` list.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct ReportConfig {
    #[builder(into)]
    report_path: Option<PathBuf>,
    #[validate(nested)]
    notification: Option<NotificationConfig>,
    #[serde(default)]
    #[builder(default, into)]
    backups_to_delete: Vec<String>,
}

impl ReportConfig {
    #[named]
    fn write_report(&self, report: &RunReport) -> Result<()> {
        let Some(report_path) = &self.report_path else {
            return Ok(());
        };
        File::create(report_path)
            .map(BufWriter::new)
            .map_err(Error::from)
            .and_then(|mut w| {
                serde_json::to_writer_pretty(&mut w, report)?;
                w.flush()?;
                Ok(())
            })
            .with_msg(format!("Writing report to {:?} failed", report_path))
            .with_fn_name(function_path!())
    }
}

impl Reporter for ReportConfig {
    fn report(&self, job_name: &str, report: &RunReport) -> Result<Vec<String>> {
        if report.success {
            tracing::info!("{report}");
        } else {
            tracing::error!("{report}");
        }

        self.write_report(report)?;

        if let Some(notification) = &self.notification {
            let topic = match (report.success, report.size) {
                (true, _) => format!("Backup {job_name} complete"),
                (false, Some(_)) => format!("Backup {job_name} complete with errors"),
                (false, None) => format!("Backup {job_name} failed"),
            };
            notification.send(topic, report)?;
        }

        Ok(self.backups_to_delete.clone())
    }
}
