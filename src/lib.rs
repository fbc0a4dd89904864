//! # run_backup
//!
//! Builds a point-in-time backup archive from a job description.
//!
//! ## Features
//!
//! - **Selection**: include paths walked recursively, pruned by literal and wildcard exclusions
//! - **Databases**: SQLite snapshots through the online backup API
//! - **Archive**: tar, optionally XZ (LZMA) compressed
//! - **Storage**: pluggable drivers, local directory shipped
//! - **Reporting**: JSON report file and SMTP notification, old backups pruned afterwards
//! - **Partial failures**: dump, selection, upload and prune errors are reported without aborting the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use run_backup::backup::dump::sqlite::SqliteDumper;
//! use run_backup::backup::job::BackupJob;
//! use run_backup::backup::run::BackupRun;
//! use run_backup::backup::storage::DefaultStorageProvider;
//!
//! let job = BackupJob::load("job.yml")?;
//! let dumper = SqliteDumper::default();
//! let outcome = BackupRun::new(&job, &dumper, &DefaultStorageProvider, job.report()).run();
//! println!("{}", outcome.report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
