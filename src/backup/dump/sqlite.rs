use crate::backup::compress::xz::XzConfig;
use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::dump::{create_unique_file, slug, DatabaseDumper};
use crate::backup::file_ext::FileExtProvider;
use crate::backup::finish::Finish;
use crate::backup::function_path;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use bon::Builder;
use function_name::named;
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use std::io::{BufWriter, IntoInnerError, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

static PAGES_PER_STEP: i32 = 256;

/// Dumps SQLite databases with the online backup API, so the snapshot is
/// consistent even while other processes write to the database. The database
/// identifier is the path of the database file.
#[derive(Clone, Debug, Builder)]
pub struct SqliteDumper {
    #[builder(default = default_compressor(), into)]
    compressor: CompressorConfig,
}

fn default_compressor() -> CompressorConfig {
    CompressorConfig::Xz(XzConfig::default())
}

impl Default for SqliteDumper {
    fn default() -> Self {
        Self {
            compressor: default_compressor(),
        }
    }
}

impl SqliteDumper {
    pub fn dump_file_name(&self, database: &str) -> String {
        format!("{}.{}", slug(database), self.dump_file_ext())
    }

    fn dump_file_ext(&self) -> String {
        std::iter::once("sqlite")
            .chain(self.compressor.file_ext())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl DatabaseDumper for SqliteDumper {
    #[named]
    fn dump(
        &self,
        database: &str,
        credential: Option<&RedactedString>,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        if credential.is_some() {
            tracing::debug!("SQLite has no authentication, ignoring database credential");
        }
        tracing::info!("Dumping database {:?}", database);

        let src = Connection::open_with_flags(
            database,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(Error::from)
        .with_msg(format!("Opening database {:?} failed", database))
        .with_fn_name(function_path!())?;

        let snapshot = tempfile::Builder::new()
            .prefix(".snapshot-")
            .suffix(".sqlite")
            .tempfile_in(out_dir)?;
        {
            let mut dst = Connection::open(snapshot.path())?;
            let backup = Backup::new(&src, &mut dst)?;
            backup
                .run_to_completion(PAGES_PER_STEP, Duration::from_millis(10), None)
                .map_err(Error::from)
                .with_msg(format!("Backing up database {:?} failed", database))
                .with_fn_name(function_path!())?;
        }

        let (dump_path, file) = create_unique_file(out_dir, &slug(database), &self.dump_file_ext())
            .with_fn_name(function_path!())?;
        let mut writer = self
            .compressor
            .build_compressor(BufWriter::new(file))
            .map(BufWriter::new)?;
        std::io::copy(&mut snapshot.reopen()?, &mut writer)?;
        writer
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .flush()?;

        tracing::info!("Dumped database {:?} to {:?}", database, dump_path);
        Ok(dump_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;

    fn create_database(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE sites (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO sites (name) VALUES ('example.com'), ('eddy.test');",
        )
        .unwrap();
    }

    #[test]
    fn test_dump_file_name() {
        assert_eq!(
            SqliteDumper::default().dump_file_name("/srv/app.db"),
            "srv-app-db.sqlite.xz"
        );
        let plain = SqliteDumper::builder().compressor(CompressorConfig::None).build();
        assert_eq!(plain.dump_file_name("app"), "app.sqlite");
    }

    #[test]
    fn test_dump_produces_restorable_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("app.db");
        create_database(&db_path);
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let dumper = SqliteDumper::default();
        let dump_path = dumper
            .dump(db_path.to_str().unwrap(), Some(&"secret".into()), &out_dir)
            .unwrap();

        assert_eq!(dump_path.parent().unwrap(), out_dir.as_path());
        assert!(dump_path.to_string_lossy().ends_with(".sqlite.xz"));
        // the intermediate snapshot is gone
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 1);

        let mut restored = Vec::new();
        liblzma::read::XzDecoder::new(File::open(&dump_path).unwrap())
            .read_to_end(&mut restored)
            .unwrap();
        let restored_path = temp_dir.path().join("restored.db");
        std::fs::write(&restored_path, restored).unwrap();

        let conn = Connection::open(&restored_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_colliding_slugs_get_distinct_dumps() {
        let temp_dir = TempDir::new().unwrap();
        let upper = temp_dir.path().join("App.db");
        let lower = temp_dir.path().join("app_db");
        create_database(&upper);
        create_database(&lower);
        let out_dir = temp_dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let dumper = SqliteDumper::builder().compressor(CompressorConfig::None).build();
        let first = dumper.dump(upper.to_str().unwrap(), None, &out_dir).unwrap();
        let second = dumper.dump(lower.to_str().unwrap(), None, &out_dir).unwrap();

        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().ends_with("-app-db.sqlite"));
        assert!(second.file_name().unwrap().to_string_lossy().ends_with("-app-db-2.sqlite"));
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 2);
    }

    #[test]
    fn test_missing_database_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = SqliteDumper::default().dump(
            temp_dir.path().join("missing.db").to_str().unwrap(),
            None,
            temp_dir.path(),
        );
        assert!(result.is_err());
    }
}
