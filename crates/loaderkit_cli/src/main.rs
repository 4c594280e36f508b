//! loaderkit: command-line access to the build tooling's filesystem layer.

mod exit;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use loaderkit_io_fs::{
    C_PATTERN_COPY_INCLUDE_DEFAULT, C_PATTERN_EXCLUSION_DEFAULT, EnumCopyFileConflictStrategy,
    EnumPatternMode, EnumSymlinkStrategy, SpecCopyOptions, SpecFileFilter, SpecListOptions,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::exit::{N_EXIT_FAILURE, N_EXIT_SUCCESS, status_for_predicate, to_exit_code};

const C_ENV_LOG: &str = "LOADERKIT_LOG";

#[derive(Parser)]
#[command(name = "loaderkit")]
#[command(author, version, about = "Filesystem helpers for the module loader build", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Pattern a file path must match
    #[arg(long)]
    include: Option<String>,

    /// Pattern a file path must not match
    #[arg(long)]
    exclude: Option<String>,

    /// How to interpret --include/--exclude
    #[arg(long, default_value = "regex", value_parser = parse_rule_pattern)]
    mode: EnumPatternMode,

    /// Regex on base names; matching files and directories are skipped
    #[arg(long, default_value = C_PATTERN_EXCLUSION_DEFAULT, conflicts_with = "no_exclusion_rule")]
    exclusion_rule: String,

    /// Do not skip any names
    #[arg(long)]
    no_exclusion_rule: bool,

    /// Follow symbolic links instead of skipping them
    #[arg(long)]
    follow_symlinks: bool,
}

impl FilterArgs {
    fn to_filter(&self, pattern_include_default: Option<&str>) -> SpecFileFilter {
        SpecFileFilter {
            pattern_include: self
                .include
                .clone()
                .or_else(|| pattern_include_default.map(str::to_string)),
            pattern_exclude: self.exclude.clone(),
            rule_pattern: self.mode,
        }
    }

    fn pattern_exclusion_name(&self) -> Option<String> {
        (!self.no_exclusion_rule).then(|| self.exclusion_rule.clone())
    }

    fn rule_symlink(&self) -> EnumSymlinkStrategy {
        if self.follow_symlinks {
            EnumSymlinkStrategy::Follow
        } else {
            EnumSymlinkStrategy::Skip
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List files under a directory
    List {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print paths with forward slashes
        #[arg(long)]
        unix_paths: bool,
    },

    /// Copy matching files from one tree into another
    Copy {
        #[arg(value_name = "SRC")]
        src: PathBuf,

        #[arg(value_name = "DEST")]
        dest: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Skip files whose destination is at least as new as the source
        #[arg(long)]
        only_newer: bool,

        /// Copy permissions, timestamps and extended attributes
        #[arg(long)]
        keep_metadata: bool,

        /// Worker threads for the copy stage
        #[arg(long, default_value = "1")]
        workers: usize,
    },

    /// Print a file decoded with the given encoding
    Cat {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        encoding: Option<String>,
    },

    /// Write stdin to a file, creating parent directories
    Write {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        encoding: Option<String>,
    },

    /// Delete a file or directory tree
    Rm {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Remove empty directories under a directory
    Prune {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Rename a file within its directory
    Rename {
        #[arg(value_name = "FROM")]
        from: PathBuf,

        #[arg(value_name = "TO")]
        to: String,
    },

    /// Exit 0 if the predicate holds, 1 otherwise
    Test {
        #[arg(value_enum)]
        kind: TestKind,

        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TestKind {
    /// Path exists
    Exists,
    /// Path is a regular file
    File,
    /// Path is a directory
    Dir,
}

fn parse_rule_pattern(value: &str) -> Result<EnumPatternMode, String> {
    match value {
        "regex" => Ok(EnumPatternMode::Regex),
        "glob" => Ok(EnumPatternMode::Glob),
        "literal" => Ok(EnumPatternMode::Literal),
        _ => Err(format!(
            "Invalid pattern mode: `{value}`. Expected one of: ['regex', 'glob', 'literal']"
        )),
    }
}

fn init_tracing(verbose: bool) {
    let c_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_env(C_ENV_LOG).unwrap_or_else(|_| EnvFilter::new(c_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands, out: &mut impl Write) -> Result<u8> {
    match command {
        Commands::List {
            dir,
            filter,
            unix_paths,
        } => {
            let spec_ls_options = SpecListOptions {
                filter: filter.to_filter(None),
                pattern_exclusion_name: filter.pattern_exclusion_name(),
                if_unix_paths: unix_paths,
                rule_symlink: filter.rule_symlink(),
            };
            let l_paths = loaderkit_io_fs::list_files(&dir, &spec_ls_options)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            for path in l_paths {
                writeln!(out, "{}", path.display())?;
            }
        }
        Commands::Copy {
            src,
            dest,
            filter,
            only_newer,
            keep_metadata,
            workers,
        } => {
            let spec_cp_options = SpecCopyOptions {
                filter: filter.to_filter(Some(C_PATTERN_COPY_INCLUDE_DEFAULT)),
                pattern_exclusion_name: filter.pattern_exclusion_name(),
                rule_conflict_file: if only_newer {
                    EnumCopyFileConflictStrategy::OverwriteIfNewer
                } else {
                    EnumCopyFileConflictStrategy::Overwrite
                },
                rule_symlink: filter.rule_symlink(),
                if_keep_metadata: keep_metadata,
                num_workers_max: Some(workers),
            };
            let report_copy = loaderkit_io_fs::copy_tree(&src, &dest, spec_cp_options)
                .with_context(|| {
                    format!("Failed to copy {} -> {}", src.display(), dest.display())
                })?;
            for path in &report_copy.paths_copied {
                writeln!(out, "{}", path.display())?;
            }
            debug!("{report_copy}");
        }
        Commands::Cat { file, encoding } => {
            let txt = loaderkit_io_fs::read_file(&file, encoding.as_deref())
                .with_context(|| format!("Failed to read {}", file.display()))?;
            out.write_all(txt.as_bytes())?;
        }
        Commands::Write { file, encoding } => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            loaderkit_io_fs::save_file(&file, &content, encoding.as_deref())
                .with_context(|| format!("Failed to write {}", file.display()))?;
        }
        Commands::Rm { path } => {
            loaderkit_io_fs::delete_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        Commands::Prune { dir } => {
            loaderkit_io_fs::delete_empty_dirs(&dir)
                .with_context(|| format!("Failed to prune {}", dir.display()))?;
        }
        Commands::Rename { from, to } => {
            let path_to = loaderkit_io_fs::rename_file(&from, &to)
                .with_context(|| format!("Failed to rename {} to {to}", from.display()))?;
            writeln!(out, "{}", path_to.display())?;
        }
        Commands::Test { kind, path } => {
            let b_holds = match kind {
                TestKind::Exists => loaderkit_io_fs::exists(&path),
                TestKind::File => loaderkit_io_fs::is_file(&path),
                TestKind::Dir => loaderkit_io_fs::is_directory(&path),
            };
            return Ok(status_for_predicate(b_holds));
        }
    }
    Ok(N_EXIT_SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command, &mut io::stdout().lock()) {
        Ok(n_status) => to_exit_code(i32::from(n_status)),
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            to_exit_code(i32::from(N_EXIT_FAILURE))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use tempfile::TempDir;

    use super::{Cli, run};
    use crate::exit::{N_EXIT_FALSE, N_EXIT_SUCCESS};
    use loaderkit_io_fs::EnumPatternMode;

    fn run_args(l_args: &[&str]) -> (u8, String) {
        let cli = Cli::try_parse_from(l_args).expect("parse args");
        let mut out = Vec::new();
        let n_status = run(cli.command, &mut out).expect("run");
        (n_status, String::from_utf8(out).expect("utf8 output"))
    }

    #[test]
    fn parse_rule_pattern_rejects_unknown_mode() {
        assert_eq!(
            super::parse_rule_pattern("glob").expect("glob"),
            EnumPatternMode::Glob
        );
        assert!(super::parse_rule_pattern("fuzzy").is_err());
    }

    #[test]
    fn exclusion_flags_conflict() {
        let res = Cli::try_parse_from([
            "loaderkit",
            "list",
            "dir",
            "--exclusion-rule",
            "^_",
            "--no-exclusion-rule",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn list_and_copy_commands() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("sub")).expect("mkdir");
        fs::write(src.join("a.js"), "a").expect("write");
        fs::write(src.join("sub/b.js"), "b").expect("write");
        fs::write(src.join("sub/c.css"), "c").expect("write");

        let c_src = src.to_string_lossy().into_owned();
        let c_dst = dst.to_string_lossy().into_owned();

        let (n_status, txt) = run_args(&["loaderkit", "list", &c_src, "--include", r"\.js$"]);
        assert_eq!(n_status, N_EXIT_SUCCESS);
        assert_eq!(txt.lines().count(), 2);

        let (n_status, txt) = run_args(&["loaderkit", "copy", &c_src, &c_dst, "--include", r"\.js$"]);
        assert_eq!(n_status, N_EXIT_SUCCESS);
        assert_eq!(txt.lines().count(), 2);
        assert_eq!(fs::read_to_string(dst.join("sub/b.js")).expect("read"), "b");
        assert!(!dst.join("sub/c.css").exists());
    }

    #[test]
    fn test_command_reports_predicate_status() {
        let tmp = TempDir::new().expect("tempdir");
        let c_dir = tmp.path().to_string_lossy().into_owned();
        let c_missing = tmp.path().join("missing").to_string_lossy().into_owned();

        assert_eq!(run_args(&["loaderkit", "test", "dir", &c_dir]).0, N_EXIT_SUCCESS);
        assert_eq!(run_args(&["loaderkit", "test", "file", &c_dir]).0, N_EXIT_FALSE);
        assert_eq!(
            run_args(&["loaderkit", "test", "exists", &c_missing]).0,
            N_EXIT_FALSE
        );
    }

    #[test]
    fn rename_rm_and_prune_commands() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join("empty/deeper")).expect("mkdir");
        fs::write(root.join("old.txt"), "x").expect("write");

        let c_old = root.join("old.txt").to_string_lossy().into_owned();
        let (_, txt) = run_args(&["loaderkit", "rename", &c_old, "ignored/new.txt"]);
        assert_eq!(txt.trim(), root.join("new.txt").to_string_lossy());

        let c_root = root.to_string_lossy().into_owned();
        run_args(&["loaderkit", "prune", &c_root]);
        assert!(!root.join("empty").exists());
        assert!(root.join("new.txt").exists());

        run_args(&["loaderkit", "rm", &c_root]);
        assert!(!root.exists());
    }

    #[test]
    fn cat_decodes_with_encoding() {
        let tmp = TempDir::new().expect("tempdir");
        let path_file = tmp.path().join("latin.txt");
        fs::write(&path_file, b"caf\xe9").expect("write");

        let c_file = path_file.to_string_lossy().into_owned();
        let (_, txt) = run_args(&["loaderkit", "cat", &c_file, "--encoding", "latin1"]);
        assert_eq!(txt, "café");
    }
}
