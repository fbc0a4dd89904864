//! One backup run, start to finish.
//!
//! Dump databases, select files, build the archive, upload it, clean up,
//! report and prune. Dump, selection, upload and prune failures are recorded
//! and the run goes on. Anything else aborts the run and is reported along
//! with what was recorded so far.

use crate::backup::archiver::Archiver;
use crate::backup::dump::DatabaseDumper;
use crate::backup::function_path;
use crate::backup::job::BackupJob;
use crate::backup::manifest::{manifest_entry, Manifest};
use crate::backup::path_matcher::PathMatcher;
use crate::backup::report::{Reporter, RunReport};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use crate::backup::run_errors::{RunErrors, UNKNOWN_ERROR};
use crate::backup::selector::Selector;
use crate::backup::storage::{Storage, StorageProvider};
use function_name::named;
use itertools::Itertools;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

static MANIFEST_FILE_NAME: &str = "manifest.txt";
static ARCHIVE_BASE_NAME: &str = "backup";

/// Temporary directory owning the manifest, the database dumps and the
/// archive of a run. Removed on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    manifest: Manifest,
    archive_path: PathBuf,
}

impl Workspace {
    #[named]
    pub fn create(archive_ext: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("run_backup-")
            .tempdir()
            .map_err(Error::from)
            .with_msg("Creating workspace failed")
            .with_fn_name(function_path!())?;
        let manifest = Manifest::create(dir.path().join(MANIFEST_FILE_NAME))?;
        let archive_path = dir
            .path()
            .join(format!("{ARCHIVE_BASE_NAME}.{archive_ext}"));
        Ok(Self {
            dir,
            manifest,
            archive_path,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Removes the workspace, surfacing what a silent drop would swallow.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(Error::from)
            .with_msg(format!("Removing workspace {:?} failed", path))
    }
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The report handed to the reporter.
    pub report: RunReport,
    /// Message of the failure that aborted the run.
    pub fatal: Option<String>,
    pub errors: RunErrors,
    /// Storage objects deleted after reporting.
    pub pruned: Vec<String>,
}

impl RunOutcome {
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }
}

pub struct BackupRun<'a> {
    job: &'a BackupJob,
    dumper: &'a dyn DatabaseDumper,
    storage_provider: &'a dyn StorageProvider,
    reporter: &'a dyn Reporter,
}

impl<'a> BackupRun<'a> {
    pub fn new(
        job: &'a BackupJob,
        dumper: &'a dyn DatabaseDumper,
        storage_provider: &'a dyn StorageProvider,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            job,
            dumper,
            storage_provider,
            reporter,
        }
    }

    pub fn run(&self) -> RunOutcome {
        let mut errors = RunErrors::new();
        let mut pruned = Vec::new();
        match self.run_to_report(&mut errors, &mut pruned) {
            Ok(report) => RunOutcome {
                report,
                fatal: None,
                errors,
                pruned,
            },
            Err(e) => {
                let fatal = match e.to_string() {
                    msg if msg.trim().is_empty() => UNKNOWN_ERROR.to_string(),
                    msg => msg,
                };
                tracing::error!("Backup {:?} aborted: {fatal}", self.job.name());
                let report = RunReport::failed(
                    std::iter::once(fatal.as_str())
                        .chain(errors.messages().iter().map(String::as_str))
                        .join("\n"),
                );
                if let Err(e) = self.reporter.report(self.job.name(), &report) {
                    tracing::error!("Reporting failure of backup {:?} failed: {e}", self.job.name());
                }
                RunOutcome {
                    report,
                    fatal: Some(fatal),
                    errors,
                    pruned,
                }
            }
        }
    }

    fn run_to_report(&self, errors: &mut RunErrors, pruned: &mut Vec<String>) -> Result<RunReport> {
        let name = self.job.name();
        let archiver = Archiver::new(self.job.compressor().clone());
        let archive_ext = archiver.archive_ext();
        let workspace = Workspace::create(&archive_ext)?;
        tracing::info!("Starting backup {:?} in {:?}", name, workspace.path());

        let dumped = self.dump_databases(&workspace, errors);
        tracing::info!("Dumped {} of {} databases", dumped, self.job.databases().len());

        let selector = Selector::new(PathMatcher::new(self.job.exclude_files())?);
        let selected = selector.select(self.job.include_files(), workspace.manifest(), errors);
        tracing::info!("Selected {} entries", selected);

        let stats = archiver.build_archive(workspace.manifest(), workspace.archive_path())?;
        tracing::debug!("Archive holds {} entries", stats.entries());
        stats.unreadable.iter().for_each(|message| errors.record(message));
        let size = std::fs::metadata(workspace.archive_path())
            .map_err(Error::from)
            .with_msg(format!("Reading size of {:?} failed", workspace.archive_path()))?
            .len();

        let object_name = format!("{name}.{archive_ext}");
        let storage = errors.rescue(|| self.storage_provider.storage(self.job.disk()));
        if let Some(storage) = &storage {
            let mut archive = File::open(workspace.archive_path())
                .map_err(Error::from)
                .with_msg(format!("Opening archive {:?} failed", workspace.archive_path()))?;
            errors.rescue(|| {
                storage
                    .write_stream(&object_name, &mut archive)
                    .with_msg(format!("Uploading {:?} failed", object_name))
            });
        }

        workspace.close()?;

        let report = RunReport::completed(errors.joined(), size);
        let to_delete = self.reporter.report(name, &report)?;

        if let Some(storage) = &storage {
            pruned.extend(prune(storage.as_ref(), &to_delete, &archive_ext, errors));
        } else if !to_delete.is_empty() {
            tracing::warn!("No storage available, keeping {} old backups", to_delete.len());
        }
        Ok(report)
    }

    /// Dumps every database into the workspace and appends the dump to the
    /// manifest. Returns how many succeeded.
    #[named]
    fn dump_databases(&self, workspace: &Workspace, errors: &mut RunErrors) -> usize {
        let credential = self.job.database_password().as_ref();
        self.job
            .databases()
            .iter()
            .filter_map(|database| {
                errors.rescue(|| {
                    let dump = self
                        .dumper
                        .dump(database, credential, workspace.path())
                        .with_msg(format!("Dumping database {:?} failed", database))
                        .with_fn_name(function_path!())?;
                    workspace.manifest().add_file(manifest_entry(&dump)?)?;
                    Ok(())
                })
            })
            .count()
    }
}

fn prune(
    storage: &dyn Storage,
    backups: &[String],
    archive_ext: &str,
    errors: &mut RunErrors,
) -> Vec<String> {
    backups
        .iter()
        .map(|backup| format!("{backup}.{archive_ext}"))
        .filter(|object_name| {
            errors
                .rescue(|| {
                    storage
                        .delete(object_name)
                        .with_msg(format!("Deleting old backup {:?} failed", object_name))
                })
                .is_some()
        })
        .collect()
}
