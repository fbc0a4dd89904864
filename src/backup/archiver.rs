//! Packs the entries of a [`Manifest`] into a single tar archive.
//!
//! Entries nested under the archive's own directory are stored relative to
//! it, so a workspace holding both the archive and its sources gets a compact
//! layout. Any other entry keeps its full path.

use crate::backup::compress::{CompressorBuilder, CompressorConfig};
use crate::backup::file_ext::FileExtProvider;
use crate::backup::finish::Finish;
use crate::backup::function_path;
use crate::backup::manifest::Manifest;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use bon::Builder;
use function_name::named;
use getset::Getters;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, IntoInnerError, Write};
use std::path::{Path, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

pub static TAR_FILE_EXT: &str = "tar";

/// Counts of what went into an archive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
    /// Files left out because they could not be opened, one message each.
    pub unreadable: Vec<String>,
}

impl ArchiveStats {
    pub fn entries(&self) -> usize {
        self.files + self.directories
    }
}

#[derive(Clone, Debug, Default, Builder, Getters)]
#[getset(get = "pub")]
pub struct Archiver {
    #[builder(default, into)]
    compressor: CompressorConfig,
}

impl FileExtProvider for Archiver {
    fn file_ext(&self) -> Option<&'static str> {
        Some(TAR_FILE_EXT)
    }
}

impl Archiver {
    pub fn new(compressor: CompressorConfig) -> Self {
        Self { compressor }
    }

    /// Full extension of the archives this archiver writes, e.g. `tar.xz`.
    pub fn archive_ext(&self) -> String {
        std::iter::once(TAR_FILE_EXT)
            .chain(self.compressor.file_ext())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Creates (or truncates) `archive_path` and writes every manifest entry
    /// into it, in manifest order.
    ///
    /// Directories become empty directory entries and regular files keep
    /// their content. An entry that no longer exists is skipped, and a file
    /// that cannot be opened is skipped and listed in
    /// [`ArchiveStats::unreadable`]. Failing to write the archive itself is
    /// fatal.
    #[named]
    pub fn build_archive<P: AsRef<Path>>(
        &self,
        manifest: &Manifest,
        archive_path: P,
    ) -> Result<ArchiveStats> {
        let archive_path = archive_path.as_ref();
        let mut builder = File::create(archive_path)
            .map_err(Error::from)
            .with_msg(format!("Creating archive {:?} failed", archive_path))
            .map(BufWriter::new)
            .and_then(|f| self.compressor.build_compressor(f))
            .map(BufWriter::new)
            .map(tar::Builder::new)
            .with_fn_name(function_path!())?;
        builder.follow_symlinks(true);

        let mut stats = ArchiveStats::default();
        for entry in manifest.entries()? {
            let entry = entry?;
            let name = name_in_archive(&entry, archive_path);
            let member = name.trim_start_matches(MAIN_SEPARATOR);
            let source = Path::new(&entry);

            if member.is_empty() {
                tracing::debug!("Skipping {:?}, no name left in archive", source);
                stats.skipped += 1;
            } else if source.is_dir() {
                tracing::trace!("Adding directory {:?} as {:?}", source, member);
                builder
                    .append_dir(member, source)
                    .map_err(Error::from)
                    .with_msg(format!("Adding directory {:?} failed", source))?;
                stats.directories += 1;
            } else if source.is_file() {
                // Opened before any header is written, so a refusal leaves
                // the archive untouched.
                match File::open(source) {
                    Ok(mut file) => {
                        tracing::trace!("Adding file {:?} as {:?}", source, member);
                        builder
                            .append_file(member, &mut file)
                            .map_err(Error::from)
                            .with_msg(format!("Adding file {:?} failed", source))?;
                        stats.files += 1;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        tracing::debug!("Skipping {:?}, removed before it was read", source);
                        stats.skipped += 1;
                    }
                    Err(e) => {
                        let message = Error::from(e)
                            .with_msg(format!("Reading file {:?} failed", source))
                            .to_string();
                        tracing::warn!("Skipping {:?}: {}", source, message);
                        stats.unreadable.push(message);
                    }
                }
            } else {
                tracing::debug!("Skipping {:?}, no longer a file or directory", source);
                stats.skipped += 1;
            }
        }

        let mut file = builder
            .into_inner()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .finish()?
            .into_inner()
            .map_err(IntoInnerError::into_error)?;
        file.flush()?;
        file.sync_all()?;

        tracing::info!(
            "Archived {} files and {} directories into {:?}, skipped {}, unreadable {}",
            stats.files,
            stats.directories,
            archive_path,
            stats.skipped,
            stats.unreadable.len()
        );
        Ok(stats)
    }
}

/// Name of `entry` inside the archive at `archive_path`: relative to the
/// archive's directory when the entry lives under it, otherwise the entry
/// path unchanged.
pub fn name_in_archive<P: AsRef<Path>>(entry: &str, archive_path: P) -> String {
    let entry_dir = with_trailing_separator(parent_str(Path::new(entry)));
    let archive_dir = with_trailing_separator(parent_str(archive_path.as_ref()));

    if entry_dir.starts_with(&archive_dir) {
        if let Some(relative) = entry.strip_prefix(archive_dir.as_str()) {
            return relative.to_string();
        }
    }
    entry.to_string()
}

fn parent_str(path: &Path) -> String {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        Some(_) => ".".to_string(),
        None => path.to_string_lossy().into_owned(),
    }
}

fn with_trailing_separator(dir: String) -> String {
    if dir.ends_with(MAIN_SEPARATOR) {
        dir
    } else {
        dir + MAIN_SEPARATOR_STR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::compress::xz::XzConfig;
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn read_tar<R: Read>(reader: R) -> BTreeMap<String, Option<String>> {
        let mut archive = tar::Archive::new(reader);
        archive
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().to_string_lossy().into_owned();
                if e.header().entry_type().is_dir() {
                    (name.trim_end_matches('/').to_string(), None)
                } else {
                    let mut content = String::new();
                    e.read_to_string(&mut content).unwrap();
                    (name, Some(content))
                }
            })
            .collect()
    }

    fn workspace() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = std::fs::canonicalize(temp_dir.path()).unwrap();
        (temp_dir, root)
    }

    #[test]
    fn test_name_in_archive() {
        assert_eq!(
            name_in_archive("/tmp/run1/example.com/a.txt", "/tmp/run1/backup.zip"),
            "example.com/a.txt"
        );
        assert_eq!(
            name_in_archive("/tmp/run1/db.sqlite.xz", "/tmp/run1/backup.zip"),
            "db.sqlite.xz"
        );
        assert_eq!(
            name_in_archive("/etc/other/b.txt", "/tmp/run1/backup.zip"),
            "/etc/other/b.txt"
        );
        assert_eq!(
            name_in_archive("/tmp/run10/a.txt", "/tmp/run1/backup.zip"),
            "/tmp/run10/a.txt"
        );
        assert_eq!(name_in_archive("/tmp/run1", "/tmp/run1/backup.zip"), "/tmp/run1");
    }

    #[test]
    fn test_empty_manifest_gives_valid_empty_archive() {
        let (_guard, root) = workspace();
        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        let archive_path = root.join("backup.tar");

        let stats = Archiver::default().build_archive(&manifest, &archive_path).unwrap();

        assert_eq!(stats, ArchiveStats::default());
        assert!(read_tar(File::open(&archive_path).unwrap()).is_empty());
    }

    #[test]
    fn test_relative_and_absolute_names() {
        let (_guard, root) = workspace();
        let (_outside_guard, outside) = workspace();
        std::fs::create_dir_all(root.join("example.com/app")).unwrap();
        std::fs::write(root.join("example.com/a.txt"), "nested").unwrap();
        std::fs::write(outside.join("b.txt"), "elsewhere").unwrap();

        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        manifest
            .add_files([
                root.join("example.com/app").to_string_lossy(),
                root.join("example.com/a.txt").to_string_lossy(),
                outside.join("b.txt").to_string_lossy(),
            ])
            .unwrap();

        let archive_path = root.join("backup.tar");
        let stats = Archiver::default().build_archive(&manifest, &archive_path).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.entries(), 3);

        let outside_name = outside
            .join("b.txt")
            .to_string_lossy()
            .trim_start_matches('/')
            .to_string();
        let expected = BTreeMap::from([
            ("example.com/app".to_string(), None),
            ("example.com/a.txt".to_string(), Some("nested".to_string())),
            (outside_name, Some("elsewhere".to_string())),
        ]);
        assert_eq!(read_tar(File::open(&archive_path).unwrap()), expected);
    }

    #[test]
    fn test_vanished_entries_are_skipped() {
        let (_guard, root) = workspace();
        std::fs::write(root.join("kept.txt"), "kept").unwrap();
        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        manifest
            .add_files([
                root.join("gone.txt").to_string_lossy(),
                root.join("kept.txt").to_string_lossy(),
            ])
            .unwrap();

        let archive_path = root.join("backup.tar");
        let stats = Archiver::default().build_archive(&manifest, &archive_path).unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(
            read_tar(File::open(&archive_path).unwrap()),
            BTreeMap::from([("kept.txt".to_string(), Some("kept".to_string()))])
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let (_guard, root) = workspace();
        std::fs::write(root.join("a.txt"), "first").unwrap();
        std::fs::write(root.join("locked.txt"), "secret").unwrap();
        std::fs::write(root.join("z.txt"), "last").unwrap();
        std::fs::set_permissions(root.join("locked.txt"), std::fs::Permissions::from_mode(0o000))
            .unwrap();
        if File::open(root.join("locked.txt")).is_ok() {
            // Permission bits do not bind this user (root).
            return;
        }

        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        manifest
            .add_files([
                root.join("a.txt").to_string_lossy(),
                root.join("locked.txt").to_string_lossy(),
                root.join("z.txt").to_string_lossy(),
            ])
            .unwrap();

        let archive_path = root.join("backup.tar");
        let stats = Archiver::default().build_archive(&manifest, &archive_path).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.unreadable.len(), 1);
        assert!(stats.unreadable[0].contains("locked.txt"));
        assert_eq!(
            read_tar(File::open(&archive_path).unwrap()),
            BTreeMap::from([
                ("a.txt".to_string(), Some("first".to_string())),
                ("z.txt".to_string(), Some("last".to_string())),
            ])
        );
    }

    #[test]
    fn test_existing_archive_is_truncated() {
        let (_guard, root) = workspace();
        let archive_path = root.join("backup.tar");
        std::fs::write(&archive_path, vec![7u8; 64 * 1024]).unwrap();
        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();

        Archiver::default().build_archive(&manifest, &archive_path).unwrap();

        assert!(std::fs::metadata(&archive_path).unwrap().len() < 64 * 1024);
        assert!(read_tar(File::open(&archive_path).unwrap()).is_empty());
    }

    #[test]
    fn test_xz_compressed_archive() {
        let (_guard, root) = workspace();
        std::fs::write(root.join("a.txt"), "compressed").unwrap();
        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        manifest.add_file(root.join("a.txt").to_string_lossy()).unwrap();

        let archiver = Archiver::builder()
            .compressor(XzConfig::builder().level(1).thread(1).build())
            .build();
        assert_eq!(archiver.archive_ext(), "tar.xz");
        let archive_path = root.join(format!("backup.{}", archiver.archive_ext()));
        archiver.build_archive(&manifest, &archive_path).unwrap();

        let decoder = liblzma::read::XzDecoder::new(File::open(&archive_path).unwrap());
        assert_eq!(
            read_tar(decoder),
            BTreeMap::from([("a.txt".to_string(), Some("compressed".to_string()))])
        );
    }

    #[test]
    fn test_archive_ext() {
        assert_eq!(Archiver::default().archive_ext(), "tar");
        assert_eq!(Archiver::default().file_ext(), Some("tar"));
    }

    #[test]
    fn test_unwritable_archive_path_fails() {
        let (_guard, root) = workspace();
        let manifest = Manifest::create(root.join("manifest.txt")).unwrap();
        let result = Archiver::default().build_archive(&manifest, root.join("missing/backup.tar"));
        assert!(result.is_err());
    }
}
