use clap::Parser;
use run_backup::backup::dump::sqlite::SqliteDumper;
use run_backup::backup::job::BackupJob;
use run_backup::backup::run::BackupRun;
use run_backup::backup::storage::DefaultStorageProvider;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Run one backup job: dump, archive, upload, report and prune
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of the job description (YAML or JSON)
    #[arg(short, long)]
    job: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let job = match BackupJob::load(&args.job) {
        Ok(job) => job,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let dumper = SqliteDumper::default();
    let outcome = BackupRun::new(&job, &dumper, &DefaultStorageProvider, job.report()).run();

    if outcome.is_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
