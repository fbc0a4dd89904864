pub mod sqlite;

use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Produces a compressed dump of one database.
///
/// Invoked once per database of a job. The returned file lives in `out_dir`
/// and is appended to the run's manifest like any selected file.
pub trait DatabaseDumper {
    fn dump(
        &self,
        database: &str,
        credential: Option<&RedactedString>,
        out_dir: &Path,
    ) -> Result<PathBuf>;
}

/// File name safe slug of a database identifier: lowercase ASCII letters and
/// digits, every other run of characters collapsed into a single `-`.
pub fn slug(database: &str) -> String {
    let mut slug = String::with_capacity(database.len());
    for c in database.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "database".to_string()
    } else {
        slug.to_string()
    }
}

/// Creates a new file `<stem>.<ext>` in `out_dir`, or `<stem>-2.<ext>`,
/// `<stem>-3.<ext>` and so on when the name is taken. Two databases whose
/// slugs collide therefore never overwrite each other's dump.
pub fn create_unique_file(out_dir: &Path, stem: &str, ext: &str) -> Result<(PathBuf, File)> {
    let mut n = 1usize;
    loop {
        let name = if n == 1 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem}-{n}.{ext}")
        };
        let path = out_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => {
                return Err(Error::from(e)).with_msg(format!("Creating dump {:?} failed", path))
            }
        }
    }
}
