//! Listing/copy specification models and the crate error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Default exclusion rule: base names starting with a dot.
pub const C_PATTERN_EXCLUSION_DEFAULT: &str = r"^\.";

/// Default copy include pattern: any path containing a word character.
pub const C_PATTERN_COPY_INCLUDE_DEFAULT: &str = r"\w";

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pattern matching mode for include/exclude filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPatternMode {
    /// Unanchored regular expression search.
    #[default]
    Regex,
    /// Shell-like wildcards matched against the whole path.
    Glob,
    /// Substring match.
    Literal,
}

/// Symlink handling policy during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSymlinkStrategy {
    /// Neither list nor descend into symlinks.
    #[default]
    Skip,
    /// Classify links by their target; linked directories are walked once.
    Follow,
}

/// Existing destination file policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCopyFileConflictStrategy {
    /// Always replace the destination file.
    #[default]
    Overwrite,
    /// Replace only when the source is strictly newer than the destination.
    OverwriteIfNewer,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Include/exclude pattern pair applied to full file paths.
///
/// A single pattern converts into an include-only filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecFileFilter {
    /// Pattern a path must match. `None` keeps everything.
    pub pattern_include: Option<String>,
    /// Pattern a path must not match.
    pub pattern_exclude: Option<String>,
    /// Pattern interpretation mode for both sides.
    pub rule_pattern: EnumPatternMode,
}

impl SpecFileFilter {
    /// Include-only regex filter.
    pub fn include(pattern: impl Into<String>) -> Self {
        Self {
            pattern_include: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.pattern_exclude = Some(pattern.into());
        self
    }

    pub fn with_mode(mut self, rule_pattern: EnumPatternMode) -> Self {
        self.rule_pattern = rule_pattern;
        self
    }
}

impl From<&str> for SpecFileFilter {
    fn from(pattern: &str) -> Self {
        Self::include(pattern)
    }
}

impl From<String> for SpecFileFilter {
    fn from(pattern: String) -> Self {
        Self::include(pattern)
    }
}

/// Input options for `list_files` / `walk_files`.
#[derive(Debug, Clone)]
pub struct SpecListOptions {
    /// Path filter.
    pub filter: SpecFileFilter,
    /// Regex applied to every file and directory base name; matches are
    /// dropped (directories are pruned with their contents). `None` disables.
    pub pattern_exclusion_name: Option<String>,
    /// Convert `\` separators to `/` in returned paths.
    pub if_unix_paths: bool,
    /// Symlink handling behavior.
    pub rule_symlink: EnumSymlinkStrategy,
}

impl Default for SpecListOptions {
    fn default() -> Self {
        Self {
            filter: SpecFileFilter::default(),
            pattern_exclusion_name: Some(C_PATTERN_EXCLUSION_DEFAULT.to_string()),
            if_unix_paths: false,
            rule_symlink: EnumSymlinkStrategy::Skip,
        }
    }
}

/// Input options for `copy_tree`.
#[derive(Debug, Clone)]
pub struct SpecCopyOptions {
    /// Source path filter. Defaults to an include of `\w`.
    pub filter: SpecFileFilter,
    /// See [`SpecListOptions::pattern_exclusion_name`].
    pub pattern_exclusion_name: Option<String>,
    /// Conflict behavior for destination files.
    pub rule_conflict_file: EnumCopyFileConflictStrategy,
    /// Symlink handling behavior on the source side.
    pub rule_symlink: EnumSymlinkStrategy,
    /// Copy permissions, timestamps and (Linux) xattrs.
    pub if_keep_metadata: bool,
    /// Maximum worker threads for the file-copy stage. `None` picks from CPU count.
    pub num_workers_max: Option<usize>,
}

impl Default for SpecCopyOptions {
    fn default() -> Self {
        Self {
            filter: SpecFileFilter::include(C_PATTERN_COPY_INCLUDE_DEFAULT),
            pattern_exclusion_name: Some(C_PATTERN_EXCLUSION_DEFAULT.to_string()),
            rule_conflict_file: EnumCopyFileConflictStrategy::Overwrite,
            rule_symlink: EnumSymlinkStrategy::Skip,
            if_keep_metadata: false,
            num_workers_max: Some(1),
        }
    }
}

impl SpecCopyOptions {
    /// Listing options used to enumerate the copy sources.
    pub(crate) fn to_list_options(&self) -> SpecListOptions {
        SpecListOptions {
            filter: self.filter.clone(),
            pattern_exclusion_name: self.pattern_exclusion_name.clone(),
            if_unix_paths: true,
            rule_symlink: self.rule_symlink,
        }
    }
}

/// Errors raised by every operation in this crate.
#[derive(Debug, Error)]
pub enum FsError {
    /// Underlying platform error, passed through verbatim.
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Failed to copy {} -> {}: {source}", .path_src.display(), .path_dst.display())]
    Copy {
        path_src: PathBuf,
        path_dst: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not create directory: {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown encoding label: `{0}`")]
    UnknownEncoding(String),

    /// `content` holds characters the target encoding has no bytes for.
    #[error("Cannot encode text for {} as {encoding}", .path.display())]
    Unencodable { path: PathBuf, encoding: String },

    #[error("Invalid file name: `{0}`")]
    InvalidName(String),

    /// `dst` is `src` or lies below it.
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        .path_dir_src.display(),
        .path_dir_dst.display()
    )]
    SourceDestinationOverlap {
        path_dir_src: PathBuf,
        path_dir_dst: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, FsError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
