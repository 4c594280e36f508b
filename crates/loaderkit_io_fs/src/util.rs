use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumPatternMode, FsError, Result, SpecListOptions};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypePatternMatcher {
    Literal(String),
    Glob(GlobMatcher),
    Regex(Regex),
}

impl TypePatternMatcher {
    pub(crate) fn compile(pattern: &str, rule_pattern: EnumPatternMode) -> Result<Self> {
        match rule_pattern {
            EnumPatternMode::Literal => Ok(Self::Literal(pattern.to_string())),
            EnumPatternMode::Glob => {
                let matcher = Glob::new(pattern)
                    .map_err(|e| FsError::InvalidPattern(format!("`{pattern}`: {e}")))?
                    .compile_matcher();
                Ok(Self::Glob(matcher))
            }
            EnumPatternMode::Regex => Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| FsError::InvalidPattern(format!("`{pattern}`: {e}"))),
        }
    }

    pub(crate) fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(p) => value.contains(p.as_str()),
            Self::Glob(p) => p.is_match(value),
            Self::Regex(p) => p.is_match(value),
        }
    }
}

/// Compiled form of the listing filter and the name exclusion rule.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecPathMatchers {
    pattern_include: Option<TypePatternMatcher>,
    pattern_exclude: Option<TypePatternMatcher>,
    pattern_exclusion_name: Option<Regex>,
}

impl SpecPathMatchers {
    pub(crate) fn from_options(spec_ls_options: &SpecListOptions) -> Result<Self> {
        let spec_filter = &spec_ls_options.filter;
        let compile = |pattern: Option<&String>| {
            pattern
                .map(|p| TypePatternMatcher::compile(p, spec_filter.rule_pattern))
                .transpose()
        };
        let pattern_exclusion_name = spec_ls_options
            .pattern_exclusion_name
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| FsError::InvalidPattern(format!("`{p}`: {e}")))
            })
            .transpose()?;

        Ok(Self {
            pattern_include: compile(spec_filter.pattern_include.as_ref())?,
            pattern_exclude: compile(spec_filter.pattern_exclude.as_ref())?,
            pattern_exclusion_name,
        })
    }

    /// Exclusion rule on a bare file or directory name.
    pub(crate) fn is_excluded_name(&self, name: &str) -> bool {
        self.pattern_exclusion_name
            .as_ref()
            .is_some_and(|p| p.is_match(name))
    }

    /// Include/exclude test on a full path.
    pub(crate) fn is_path_kept(&self, path: &str) -> bool {
        let b_included = self
            .pattern_include
            .as_ref()
            .is_none_or(|p| p.is_match(path));
        let b_excluded = self
            .pattern_exclude
            .as_ref()
            .is_some_and(|p| p.is_match(path));
        b_included && !b_excluded
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Replace every `\` with `/`.
pub fn front_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Forward-slash form of a listed path.
///
/// Paths that already contain `/` are returned as-is, so Unix names holding a
/// literal backslash survive.
pub(crate) fn to_unix_path(path: &Path) -> PathBuf {
    let c_path = path.to_string_lossy();
    if c_path.contains('/') {
        return path.to_path_buf();
    }
    PathBuf::from(front_slash(&c_path))
}

fn _absolutize_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Canonical form of `path`, resolving the deepest existing ancestor when the
/// path itself does not exist yet.
fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    let path_abs = _absolutize_path(path);
    match (path_abs.parent(), path_abs.file_name()) {
        (Some(path_parent), Some(name)) => _normalize_path(path_parent).join(name),
        _ => path_abs,
    }
}

/// `true` when `dst` is `src` itself or lies below it.
///
/// A source below the destination is fine: the listing is complete before the
/// first write.
pub(crate) fn is_destination_inside_source(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved)
}

/// Re-root `path_src` from `path_dir_src` under `path_dir_dst`.
///
/// Returns `None` when `path_src` is not below `path_dir_src`.
pub(crate) fn derive_destination_path(
    path_src: &Path,
    path_dir_src: &Path,
    path_dir_dst: &Path,
) -> Option<PathBuf> {
    path_src
        .strip_prefix(path_dir_src)
        .ok()
        .map(|path_rel| path_dir_dst.join(path_rel))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CopyPrimitives

/// `true` when `path_dst` exists and is at least as new as `path_src`.
pub(crate) fn is_destination_up_to_date(path_src: &Path, path_dst: &Path) -> io::Result<bool> {
    let stat_dst = match fs::metadata(path_dst) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let stat_src = fs::metadata(path_src)?;
    Ok(FileTime::from_last_modification_time(&stat_dst)
        >= FileTime::from_last_modification_time(&stat_src))
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
    if_keep_metadata: bool,
) -> io::Result<()> {
    fs::copy(path_file_src, path_file_dst)?;
    if if_keep_metadata {
        apply_metadata(path_file_src, path_file_dst)?;
    }
    Ok(())
}

fn apply_metadata(path_file_src: &Path, path_file_dst: &Path) -> io::Result<()> {
    use filetime::set_file_times;

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(path = ?path_file_dst, ?name, error = %e, "xattr not copied");
        }
    }
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
