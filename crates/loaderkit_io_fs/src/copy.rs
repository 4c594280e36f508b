//! Filtered tree copy built on the file lister.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::debug;

use crate::list::walk_files;
use crate::report::{ReportCopy, ReportCopyBuilder};
use crate::spec::{EnumCopyFileConflictStrategy, FsError, Result, SpecCopyOptions};
use crate::util::{
    calculate_worker_limit, copy_file_with_metadata, derive_destination_path,
    is_destination_inside_source, is_destination_up_to_date,
};

#[derive(Debug, Clone)]
struct SpecCopyTaskFile {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

/// Copy every file under `dir_source` that passes the options' filter into
/// `dir_destination`, keeping relative layout.
///
/// This function performs:
/// 1. Rejection of a destination at or below the source.
/// 2. File listing via [`crate::walk_files`] with forward-slash paths.
/// 3. File copy, serial or on a rayon pool, in listing order.
///
/// A missing `dir_source` gives an empty report. The first failing file
/// aborts the run with [`FsError::Copy`] or [`FsError::CreateDir`]; files
/// copied before that point stay in place.
pub fn copy_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_cp_options: SpecCopyOptions,
) -> Result<ReportCopy>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref();
    let path_dir_dst = dir_destination.as_ref();

    if path_dir_src.exists() && is_destination_inside_source(path_dir_src, path_dir_dst) {
        return Err(FsError::SourceDestinationOverlap {
            path_dir_src: path_dir_src.to_path_buf(),
            path_dir_dst: path_dir_dst.to_path_buf(),
        });
    }

    let report_walk = walk_files(path_dir_src, &spec_cp_options.to_list_options())?;
    let mut builder_cp_report = ReportCopyBuilder::from_walk(&report_walk);

    let l_tasks_file_copy = report_walk
        .paths
        .into_iter()
        .map(|path_file_src| -> Result<SpecCopyTaskFile> {
            let path_file_dst = derive_destination_path(&path_file_src, path_dir_src, path_dir_dst)
                .ok_or_else(|| FsError::Copy {
                    path_src: path_file_src.clone(),
                    path_dst: path_dir_dst.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "listed path is outside the source directory",
                    ),
                })?;
            Ok(SpecCopyTaskFile {
                path_file_src,
                path_file_dst,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let l_results = run_copy_tasks(l_tasks_file_copy, &spec_cp_options, &mut builder_cp_report)?;
    for (path_file_dst, b_copied) in l_results {
        if b_copied {
            builder_cp_report.add_copied(path_file_dst);
        } else {
            builder_cp_report.add_skipped();
        }
    }

    let report_copy = builder_cp_report.build();
    debug!(
        src = ?path_dir_src,
        dst = ?path_dir_dst,
        copied = report_copy.cnt_copied,
        skipped = report_copy.cnt_skipped,
        "copied tree"
    );
    Ok(report_copy)
}

fn run_copy_tasks(
    l_tasks_file_copy: Vec<SpecCopyTaskFile>,
    spec_cp_options: &SpecCopyOptions,
    builder_cp_report: &mut ReportCopyBuilder,
) -> Result<Vec<(PathBuf, bool)>> {
    let rule_conflict_file = spec_cp_options.rule_conflict_file;
    let if_keep_metadata = spec_cp_options.if_keep_metadata;
    let run_one = |spec_task: SpecCopyTaskFile| -> Result<(PathBuf, bool)> {
        let b_copied = copy_file(
            &spec_task.path_file_src,
            &spec_task.path_file_dst,
            rule_conflict_file,
            if_keep_metadata,
        )?;
        Ok((spec_task.path_file_dst, b_copied))
    };

    let n_workers_max = calculate_worker_limit(spec_cp_options.num_workers_max);
    if n_workers_max <= 1 || l_tasks_file_copy.len() <= 1 {
        return l_tasks_file_copy.into_iter().map(run_one).collect();
    }

    let Ok(thread_pool) = ThreadPoolBuilder::new().num_threads(n_workers_max).build() else {
        builder_cp_report.add_warning(format!(
            "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial copy."
        ));
        return l_tasks_file_copy.into_iter().map(run_one).collect();
    };

    thread_pool.install(|| l_tasks_file_copy.into_par_iter().map(run_one).collect())
}

/// Copy one file, creating the destination's parent directories.
///
/// Returns `false` when `rule_conflict_file` left an up-to-date destination
/// alone, `true` when bytes were written.
pub fn copy_file<P, Q>(
    path_file_src: P,
    path_file_dst: Q,
    rule_conflict_file: EnumCopyFileConflictStrategy,
    if_keep_metadata: bool,
) -> Result<bool>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_file_src = path_file_src.as_ref();
    let path_file_dst = path_file_dst.as_ref();
    let map_copy_err = |source: io::Error| FsError::Copy {
        path_src: path_file_src.to_path_buf(),
        path_dst: path_file_dst.to_path_buf(),
        source,
    };

    if rule_conflict_file == EnumCopyFileConflictStrategy::OverwriteIfNewer
        && is_destination_up_to_date(path_file_src, path_file_dst).map_err(map_copy_err)?
    {
        debug!(src = ?path_file_src, dst = ?path_file_dst, "destination up to date");
        return Ok(false);
    }

    if let Some(path_parent_dst) = path_file_dst.parent()
        && !path_parent_dst.as_os_str().is_empty()
        && !path_parent_dst.is_dir()
    {
        fs::create_dir_all(path_parent_dst).map_err(|source| FsError::CreateDir {
            path: path_parent_dst.to_path_buf(),
            source,
        })?;
    }

    copy_file_with_metadata(path_file_src, path_file_dst, if_keep_metadata)
        .map_err(map_copy_err)?;
    debug!(src = ?path_file_src, dst = ?path_file_dst, "copied file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use filetime::{FileTime, set_file_mtime};
    use tempfile::TempDir;

    use super::{copy_file, copy_tree};
    use crate::list::list_files;
    use crate::spec::{
        EnumCopyFileConflictStrategy, FsError, SpecCopyOptions, SpecFileFilter, SpecListOptions,
    };

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, txt).expect("write text");
    }

    fn read_text(path: &Path) -> String {
        fs::read_to_string(path).expect("read text")
    }

    fn txt_options() -> SpecCopyOptions {
        SpecCopyOptions {
            filter: SpecFileFilter::include(r"\.txt$"),
            ..SpecCopyOptions::default()
        }
    }

    #[test]
    fn copy_tree_skips_hidden_and_keeps_layout() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dest");
        write_text(&src.join("a.txt"), "hi");
        write_text(&src.join(".hidden/x.txt"), "x");
        write_text(&src.join("sub/b.txt"), "yo");

        let report = copy_tree(&src, &dst, txt_options()).expect("copy tree");

        assert_eq!(read_text(&dst.join("a.txt")), "hi");
        assert_eq!(read_text(&dst.join("sub/b.txt")), "yo");
        assert!(!dst.join(".hidden").exists());
        assert_eq!(report.cnt_copied, 2);
        assert_eq!(report.paths_copied.len(), 2);
        assert!(report.paths_copied.contains(&dst.join("a.txt")));
        assert!(report.paths_copied.contains(&dst.join("sub/b.txt")));
    }

    #[test]
    fn copy_tree_mirrors_every_listed_file_and_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("one.js"), "1");
        write_text(&src.join("lib/two.js"), "2");
        write_text(&src.join("lib/deep/three.css"), "3");

        let first = copy_tree(&src, &dst, SpecCopyOptions::default()).expect("first copy");
        let second = copy_tree(&src, &dst, SpecCopyOptions::default()).expect("second copy");
        assert_eq!(first.cnt_copied, 3);
        assert_eq!(second.cnt_copied, 3);

        for path_src in list_files(&src, &SpecListOptions::default()).expect("list") {
            let path_rel = path_src.strip_prefix(&src).expect("under src");
            assert_eq!(
                fs::read(&path_src).expect("src bytes"),
                fs::read(dst.join(path_rel)).expect("dst bytes")
            );
        }
    }

    #[test]
    fn copy_tree_source_name_repeated_in_path_is_not_rewritten() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out");
        write_text(&src.join("src/inner.txt"), "in");

        copy_tree(&src, &dst, txt_options()).expect("copy tree");
        assert_eq!(read_text(&dst.join("src/inner.txt")), "in");
    }

    #[test]
    fn copy_tree_no_match_returns_empty_report() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("a.md"), "a");

        let report = copy_tree(&src, &dst, txt_options()).expect("copy tree");
        assert!(report.is_empty());
        assert_eq!(report.cnt_scanned, 1);
        assert!(!dst.exists());
    }

    #[test]
    fn copy_tree_missing_source_returns_empty_report() {
        let tmp = TempDir::new().expect("tempdir");
        let report = copy_tree(
            tmp.path().join("missing"),
            tmp.path().join("dst"),
            SpecCopyOptions::default(),
        )
        .expect("missing source is not an error");
        assert!(report.is_empty());
    }

    #[test]
    fn copy_tree_overlap_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        write_text(&src.join("a.txt"), "a");

        let err = copy_tree(&src, src.join("nested"), SpecCopyOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, FsError::SourceDestinationOverlap { .. }));
    }

    #[test]
    fn copy_tree_source_nested_in_destination_is_allowed() {
        let tmp = TempDir::new().expect("tempdir");
        let dst = tmp.path().join("out");
        let src = dst.join("staging");
        write_text(&src.join("sub/b.txt"), "b");

        let report = copy_tree(&src, &dst, txt_options()).expect("copy tree");

        assert_eq!(report.paths_copied, vec![dst.join("sub/b.txt")]);
        assert_eq!(read_text(&dst.join("sub/b.txt")), "b");
        assert_eq!(read_text(&src.join("sub/b.txt")), "b");
    }

    #[test]
    fn copy_tree_aborts_when_destination_parent_is_a_file() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("sub/a.txt"), "a");
        write_text(&dst.join("sub"), "i am a file");

        let err = copy_tree(&src, &dst, txt_options()).expect_err("must fail");
        assert!(matches!(err, FsError::CreateDir { .. }));
    }

    #[test]
    fn copy_tree_with_worker_pool_keeps_listing_order() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        for n_idx in 0..16 {
            write_text(&src.join(format!("d{}/f{n_idx}.txt", n_idx % 4)), "x");
        }

        let spec_cp_options = SpecCopyOptions {
            num_workers_max: None,
            ..txt_options()
        };
        let l_paths_src = list_files(&src, &spec_cp_options.to_list_options()).expect("list");
        let report = copy_tree(&src, &dst, spec_cp_options).expect("copy tree");

        let l_paths_expected = l_paths_src
            .iter()
            .map(|p| dst.join(p.strip_prefix(&src).expect("under src")))
            .collect::<Vec<_>>();
        assert_eq!(report.paths_copied, l_paths_expected);
    }

    #[test]
    fn copy_file_overwrite_if_newer_skips_fresh_destination() {
        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("a.txt");
        let path_dst = tmp.path().join("out/a.txt");
        write_text(&path_src, "old");
        write_text(&path_dst, "kept");

        let file_time_now = FileTime::now();
        let file_time_later =
            FileTime::from_unix_time(file_time_now.unix_seconds() + 3600, 0);
        set_file_mtime(&path_src, file_time_now).expect("set src mtime");
        set_file_mtime(&path_dst, file_time_later).expect("set dst mtime");

        let b_copied = copy_file(
            &path_src,
            &path_dst,
            EnumCopyFileConflictStrategy::OverwriteIfNewer,
            false,
        )
        .expect("copy file");
        assert!(!b_copied);
        assert_eq!(read_text(&path_dst), "kept");

        let file_time_latest =
            FileTime::from_unix_time(file_time_now.unix_seconds() + 7200, 0);
        set_file_mtime(&path_src, file_time_latest).expect("bump src mtime");
        let b_copied = copy_file(
            &path_src,
            &path_dst,
            EnumCopyFileConflictStrategy::OverwriteIfNewer,
            false,
        )
        .expect("copy file");
        assert!(b_copied);
        assert_eq!(read_text(&path_dst), "old");
    }

    #[test]
    fn copy_tree_overwrite_if_newer_counts_skips() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_text(&src.join("a.txt"), "a");
        write_text(&src.join("b.txt"), "b");

        copy_tree(&src, &dst, txt_options()).expect("first copy");
        let spec_cp_options = SpecCopyOptions {
            rule_conflict_file: EnumCopyFileConflictStrategy::OverwriteIfNewer,
            ..txt_options()
        };
        let report = copy_tree(&src, &dst, spec_cp_options).expect("second copy");

        assert_eq!(report.cnt_copied, 0);
        assert_eq!(report.cnt_skipped, 2);
        assert!(report.is_empty());
    }

    #[test]
    fn copy_file_missing_source_is_copy_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = copy_file(
            tmp.path().join("gone.txt"),
            tmp.path().join("out/gone.txt"),
            EnumCopyFileConflictStrategy::Overwrite,
            false,
        )
        .expect_err("source vanished");
        assert!(matches!(err, FsError::Copy { .. }));
    }

    #[test]
    fn copy_file_keeps_mtime_when_requested() {
        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("meta.txt");
        let path_dst = tmp.path().join("copy/meta.txt");
        write_text(&path_src, "meta");
        let file_time_old = FileTime::from_unix_time(1_700_000_020, 0);
        set_file_mtime(&path_src, file_time_old).expect("set mtime");

        copy_file(&path_src, &path_dst, EnumCopyFileConflictStrategy::Overwrite, true)
            .expect("copy file");

        let stat_dst = fs::metadata(&path_dst).expect("dst metadata");
        assert_eq!(FileTime::from_last_modification_time(&stat_dst), file_time_old);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn copy_file_keeps_permissions_and_xattrs_on_linux() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let path_src = tmp.path().join("meta.txt");
        let path_dst = tmp.path().join("copy/meta.txt");
        write_text(&path_src, "meta");
        fs::set_permissions(&path_src, fs::Permissions::from_mode(0o640))
            .expect("set permissions");

        let c_xattr_name = "user.loaderkit_fs_test";
        let b_if_has_xattr = xattr::set(&path_src, c_xattr_name, b"meta_value").is_ok();

        copy_file(&path_src, &path_dst, EnumCopyFileConflictStrategy::Overwrite, true)
            .expect("copy file");

        let stat_dst = fs::metadata(&path_dst).expect("dst metadata");
        assert_eq!(stat_dst.permissions().mode() & 0o777, 0o640);
        if b_if_has_xattr {
            let raw_value_dst = xattr::get(&path_dst, c_xattr_name)
                .expect("get dst xattr")
                .expect("xattr exists");
            assert_eq!(raw_value_dst, b"meta_value");
        }
    }
}
