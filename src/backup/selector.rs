use crate::backup::function_path;
use crate::backup::manifest::{manifest_entry, Manifest};
use crate::backup::path_matcher::PathMatcher;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};
use crate::backup::run_errors::RunErrors;

use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

/// Feeds the include paths of a job into a [`Manifest`], pruning every
/// candidate the [`PathMatcher`] excludes.
///
/// Directories are walked recursively without any implicit filtering: dot
/// files and VCS metadata are selected like everything else, and directories
/// themselves are selected along with their content.
#[derive(Debug)]
pub struct Selector {
    matcher: PathMatcher,
}

impl Selector {
    pub fn new(matcher: PathMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    /// Selects every include path in order. A failing include path is
    /// recorded in `errors` and does not stop the others. Paths the manifest
    /// cannot hold are recorded one by one.
    ///
    /// Returns the number of entries appended to the manifest.
    pub fn select<I, P>(&self, include_paths: I, manifest: &Manifest, errors: &mut RunErrors) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut unrecordable = Vec::new();
        let count: usize = include_paths
            .into_iter()
            .filter_map(|path| {
                let res = errors.rescue(|| self.walk(path.as_ref(), manifest, &mut unrecordable));
                unrecordable.drain(..).for_each(|e| errors.record(e));
                res
            })
            .sum();
        count
    }

    /// Selects a single include path. Paths that are neither a file nor a
    /// directory are skipped without error. Candidates that cannot be written
    /// to the manifest do not stop the walk; they are returned together as
    /// the error once it is over.
    pub fn select_path(&self, include_path: &Path, manifest: &Manifest) -> Result<usize> {
        let mut unrecordable = Vec::new();
        let count = self.walk(include_path, manifest, &mut unrecordable)?;
        if unrecordable.is_empty() {
            Ok(count)
        } else {
            Err(Error::from(unrecordable))
        }
    }

    #[named]
    fn walk(
        &self,
        include_path: &Path,
        manifest: &Manifest,
        unrecordable: &mut Vec<Error>,
    ) -> Result<usize> {
        tracing::info!("Selecting files from {:?}", include_path);
        let mut count = 0;
        for candidate in candidates(include_path) {
            let candidate = candidate
                .with_msg(format!("Walking {:?} failed", include_path))
                .with_fn_name(function_path!())?;
            if self.matcher.is_excluded(&candidate) {
                continue;
            }
            match manifest_entry(&candidate) {
                Ok(entry) => {
                    tracing::trace!("Including {:?}", candidate);
                    manifest.add_file(entry)?;
                    count += 1;
                }
                Err(e) => {
                    tracing::warn!("Cannot select {:?}: {e}", candidate);
                    unrecordable.push(e);
                }
            }
        }
        tracing::debug!("Selected {} entries from {:?}", count, include_path);
        Ok(count)
    }
}

fn candidates(include_path: &Path) -> DynIter<'static, Result<PathBuf>> {
    if include_path.is_file() {
        std::iter::once(Ok(include_path.to_path_buf())).into_dyn_iter()
    } else if include_path.is_dir() {
        WalkDir::new(include_path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|res| res.map(walkdir::DirEntry::into_path).map_err(Error::from))
            .into_dyn_iter()
    } else {
        tracing::debug!("Skipping {:?}, neither a file nor a directory", include_path);
        std::iter::empty().into_dyn_iter()
    }
}
