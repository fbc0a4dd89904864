//! Exclusion matching for backup candidates.
//!
//! A pattern containing `*` is a glob matched against the whole candidate
//! path, anything else is a plain string prefix. Candidates and literal
//! patterns naming an existing directory are normalized to end with a single
//! `/`, so that directory `/a/b` never claims `/a/bc`.

use crate::backup::result_error::result::Result;
use globset::{GlobBuilder, GlobMatcher};
use std::fmt::{Debug, Formatter};
use std::path::{Path, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

pub static WILDCARD: char = '*';

enum ExclusionPattern {
    Glob(GlobMatcher),
    Literal(String),
}

impl Debug for ExclusionPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionPattern::Glob(m) => write!(f, "Glob({:?})", m.glob().glob()),
            ExclusionPattern::Literal(s) => write!(f, "Literal({s:?})"),
        }
    }
}

impl ExclusionPattern {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.contains(WILDCARD) {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()?;
            Ok(Self::Glob(glob.compile_matcher()))
        } else {
            Ok(Self::Literal(pattern.to_string()))
        }
    }

    fn excludes(&self, candidate: &str) -> bool {
        match self {
            ExclusionPattern::Glob(matcher) => matcher.is_match(candidate),
            ExclusionPattern::Literal(pattern) => {
                let pattern = normalize_path(pattern);
                if !candidate.starts_with(&pattern) {
                    return false;
                }
                // a file cannot contain other paths
                candidate == pattern || !Path::new(&pattern).is_file()
            }
        }
    }
}

/// Ordered set of exclusion patterns. Any match excludes.
#[derive(Debug)]
pub struct PathMatcher {
    patterns: Vec<ExclusionPattern>,
}

impl PathMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter(|p| !p.as_ref().is_empty())
            .map(|p| ExclusionPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded<P: AsRef<Path>>(&self, candidate: P) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let candidate = candidate.as_ref();
        let resolved = std::fs::canonicalize(candidate)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| candidate.to_string_lossy().into_owned());
        let candidate = normalize_path(&resolved);

        match self.patterns.iter().find(|p| p.excludes(&candidate)) {
            Some(pattern) => {
                tracing::trace!("Excluding {:?}, matched {:?}", candidate, pattern);
                true
            }
            None => false,
        }
    }
}

/// One-shot form of [`PathMatcher::is_excluded`].
pub fn is_excluded<P, I, S>(candidate: P, patterns: I) -> Result<bool>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(PathMatcher::new(patterns)?.is_excluded(candidate))
}

/// Gives a path naming an existing directory exactly one trailing separator.
/// Any other path is returned unchanged.
pub fn normalize_path(path: &str) -> String {
    if !Path::new(path).is_dir() {
        return path.to_string();
    }
    let trimmed = path.trim_end_matches(MAIN_SEPARATOR);
    format!("{trimmed}{MAIN_SEPARATOR_STR}")
}
