//! `loaderkit_io_fs`:
//! filesystem layer for the module loader build tooling.
//!
//! Modules:
//! - `list`   : filtered recursive file listing
//! - `copy`   : filtered tree copy and single-file copy
//! - `file`   : predicates, text read/write, delete, prune, rename
//! - `spec`   : enums/options/errors
//! - `report` : walk/copy report models
//! - `util`   : shared helper functions

pub mod copy;
pub mod file;
pub mod list;
pub mod report;
pub mod spec;
mod util;

pub use copy::{copy_file, copy_tree};
pub use file::{
    abs_path, delete_empty_dirs, delete_file, exists, is_directory, is_file, normalize, parent,
    read_file, read_file_async, rename_file, save_file, save_utf8_file,
};
pub use list::{list_files, walk_files};
pub use report::{ReportCopy, ReportCopyBuilder, ReportWalk};
pub use spec::{
    C_PATTERN_COPY_INCLUDE_DEFAULT, C_PATTERN_EXCLUSION_DEFAULT, EnumCopyFileConflictStrategy,
    EnumPatternMode, EnumSymlinkStrategy, FsError, Result, SpecCopyOptions, SpecFileFilter,
    SpecListOptions,
};
pub use util::front_slash;
