//! Durable, append-only list of paths slated for the archive.
//!
//! Entries are written one per line to a text file as soon as they are added
//! and replayed lazily from that file, so a large selection never has to be
//! held in memory.

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use function_name::named;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    /// Creates the backing file right away, so readers can always open it.
    #[named]
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::from)
            .with_msg(format!("Creating manifest {:?} failed", path))
            .with_fn_name(function_path!())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_file<S: AsRef<str>>(&self, file_path: S) -> Result<&Self> {
        self.add_files(std::iter::once(file_path))
    }

    /// Appends every non-empty path in order. Empty paths are dropped.
    ///
    /// The batch is checked before anything is written: one path with a line
    /// break rejects the whole batch and leaves the file untouched.
    #[named]
    pub fn add_files<I, S>(&self, file_paths: I) -> Result<&Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let file_paths = file_paths
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .collect::<Vec<_>>();
        if let Some(bad) = file_paths.iter().find(|p| p.as_ref().contains(['\n', '\r'])) {
            return Err(Error::invalid_manifest_entry(bad.as_ref())).with_fn_name(function_path!());
        }
        if file_paths.is_empty() {
            return Ok(self);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(Error::from)
            .with_msg(format!("Opening manifest {:?} failed", self.path))
            .with_fn_name(function_path!())?;
        let mut writer = BufWriter::new(file);
        for file_path in &file_paths {
            writeln!(writer, "{}", file_path.as_ref())?;
        }
        writer.flush()?;
        Ok(self)
    }

    /// Replays the manifest from the start. Every call opens a fresh reader.
    #[named]
    pub fn entries(&self) -> Result<ManifestEntries> {
        let file = File::open(&self.path)
            .map_err(Error::from)
            .with_msg(format!("Reading manifest {:?} failed", self.path))
            .with_fn_name(function_path!())?;
        Ok(ManifestEntries {
            lines: BufReader::new(file).lines(),
        })
    }
}

/// Manifest form of `path`. Entries are lines of text, so a path that is not
/// valid UTF-8 cannot be recorded faithfully and is refused.
pub fn manifest_entry(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| Error::non_utf8_path(path))
}

/// Lazy iterator over the non-empty lines of a manifest file.
pub struct ManifestEntries {
    lines: Lines<BufReader<File>>,
}

impl Iterator for ManifestEntries {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(Ok(line)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
