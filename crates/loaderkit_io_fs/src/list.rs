//! Filtered recursive file listing.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::report::ReportWalk;
use crate::spec::{EnumSymlinkStrategy, Result, SpecListOptions};
use crate::util::{SpecPathMatchers, to_unix_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumEntryKind {
    File,
    Dir,
}

#[derive(Debug)]
struct SpecWalkContext {
    spec_pats: SpecPathMatchers,
    if_unix_paths: bool,
    rule_symlink: EnumSymlinkStrategy,
    set_visited_dirs: HashSet<(u64, u64)>,
    report_walk: ReportWalk,
}

impl SpecWalkContext {
    fn add_warning(&mut self, warning: String) {
        warn!("{warning}");
        self.report_walk.warnings.push(warning);
    }
}

/// List regular files under `start_dir` that pass the options' filter.
///
/// Files of a directory come before the results of its subdirectories; beyond
/// that the order is whatever the filesystem enumerates. A missing
/// `start_dir` yields an empty list.
pub fn list_files<P: AsRef<Path>>(
    start_dir: P,
    spec_ls_options: &SpecListOptions,
) -> Result<Vec<PathBuf>> {
    Ok(walk_files(start_dir, spec_ls_options)?.paths)
}

/// Same as [`list_files`] but keeps the scan counters and warnings.
///
/// Returns an error for invalid patterns or when `start_dir` exists but cannot
/// be read. Unreadable subdirectories only produce warnings.
pub fn walk_files<P: AsRef<Path>>(
    start_dir: P,
    spec_ls_options: &SpecListOptions,
) -> Result<ReportWalk> {
    let spec_pats = SpecPathMatchers::from_options(spec_ls_options)?;
    let path_root = start_dir.as_ref();

    match fs::metadata(path_root) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = ?path_root, "start directory missing, nothing to list");
            return Ok(ReportWalk::default());
        }
        Err(e) => return Err(e.into()),
    }

    let mut spec_walk_ctx = SpecWalkContext {
        spec_pats,
        if_unix_paths: spec_ls_options.if_unix_paths,
        rule_symlink: spec_ls_options.rule_symlink,
        set_visited_dirs: HashSet::new(),
        report_walk: ReportWalk::default(),
    };

    let iter_entries = fs::read_dir(path_root)?;
    is_first_visit(path_root, &mut spec_walk_ctx);
    walk_entries(path_root, iter_entries, &mut spec_walk_ctx);

    debug!(
        path = ?path_root,
        matched = spec_walk_ctx.report_walk.paths.len(),
        scanned = spec_walk_ctx.report_walk.cnt_scanned,
        "listed files"
    );
    Ok(spec_walk_ctx.report_walk)
}

fn walk_directory(path_dir: &Path, spec_walk_ctx: &mut SpecWalkContext) {
    if !is_first_visit(path_dir, spec_walk_ctx) {
        spec_walk_ctx.add_warning(format!("Symlink loop detected: {}", path_dir.display()));
        return;
    }

    match fs::read_dir(path_dir) {
        Ok(iter_entries) => walk_entries(path_dir, iter_entries, spec_walk_ctx),
        Err(e) => spec_walk_ctx.add_warning(format!(
            "Failed to read directory {} ({e})",
            path_dir.display()
        )),
    }
}

fn walk_entries(path_dir: &Path, iter_entries: fs::ReadDir, spec_walk_ctx: &mut SpecWalkContext) {
    let mut l_dirs: Vec<PathBuf> = Vec::new();

    for entry_res in iter_entries {
        let entry = match entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_walk_ctx.add_warning(format!(
                    "Failed to read directory entry under {} ({e})",
                    path_dir.display()
                ));
                continue;
            }
        };

        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().into_owned();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_walk_ctx
                    .add_warning(format!("Failed to inspect {} ({e})", path_entry.display()));
                continue;
            }
        };

        let Some(enum_kind) = classify_entry(&path_entry, cfg_file_type, spec_walk_ctx) else {
            continue;
        };
        match enum_kind {
            EnumEntryKind::File => handle_file_entry(path_entry, &c_name, spec_walk_ctx),
            EnumEntryKind::Dir => {
                if !spec_walk_ctx.spec_pats.is_excluded_name(&c_name) {
                    l_dirs.push(path_entry);
                }
            }
        }
    }

    for path_dir_sub in l_dirs {
        walk_directory(&path_dir_sub, spec_walk_ctx);
    }
}

fn classify_entry(
    path_entry: &Path,
    cfg_file_type: fs::FileType,
    spec_walk_ctx: &mut SpecWalkContext,
) -> Option<EnumEntryKind> {
    if cfg_file_type.is_symlink() {
        if spec_walk_ctx.rule_symlink == EnumSymlinkStrategy::Skip {
            spec_walk_ctx.add_warning(format!("Symlink skipped: {}", path_entry.display()));
            return None;
        }
        return match fs::metadata(path_entry) {
            Ok(meta_target) if meta_target.is_file() => Some(EnumEntryKind::File),
            Ok(meta_target) if meta_target.is_dir() => Some(EnumEntryKind::Dir),
            Ok(_) => {
                spec_walk_ctx.add_warning(format!(
                    "Special file target skipped: {}",
                    path_entry.display()
                ));
                None
            }
            Err(_) => {
                spec_walk_ctx.add_warning(format!("Broken symlink: {}", path_entry.display()));
                None
            }
        };
    }

    if cfg_file_type.is_file() {
        Some(EnumEntryKind::File)
    } else if cfg_file_type.is_dir() {
        Some(EnumEntryKind::Dir)
    } else {
        spec_walk_ctx.add_warning(format!("Special file skipped: {}", path_entry.display()));
        None
    }
}

fn handle_file_entry(path_entry: PathBuf, c_name: &str, spec_walk_ctx: &mut SpecWalkContext) {
    spec_walk_ctx.report_walk.cnt_scanned += 1;

    if spec_walk_ctx.spec_pats.is_excluded_name(c_name) {
        return;
    }

    let path_file = if spec_walk_ctx.if_unix_paths {
        to_unix_path(&path_entry)
    } else {
        path_entry
    };
    if spec_walk_ctx
        .spec_pats
        .is_path_kept(&path_file.to_string_lossy())
    {
        spec_walk_ctx.report_walk.paths.push(path_file);
    }
}

/// Records the directory identity when following symlinks; `false` on a revisit.
fn is_first_visit(path_dir: &Path, spec_walk_ctx: &mut SpecWalkContext) -> bool {
    if spec_walk_ctx.rule_symlink != EnumSymlinkStrategy::Follow {
        return true;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        if let Ok(stat_dir) = fs::metadata(path_dir) {
            return spec_walk_ctx
                .set_visited_dirs
                .insert((stat_dir.dev(), stat_dir.ino()));
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path_dir;
    }
    true
}
