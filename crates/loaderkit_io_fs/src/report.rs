//! Walk/copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Result of one tree listing: matched paths plus diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ReportWalk {
    /// Matched regular-file paths, in traversal order.
    pub paths: Vec<PathBuf>,
    /// Total regular files seen (matched or not).
    pub cnt_scanned: u64,
    /// Entries skipped without error (symlinks, special files, unreadable dirs).
    pub warnings: Vec<String>,
}

/// Aggregate counters and diagnostics for one `copy_tree` run.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Destination paths written, in listing order.
    pub paths_copied: Vec<PathBuf>,
    /// Total regular files seen under the source.
    pub cnt_scanned: u64,
    /// Number of files that passed the filter.
    pub cnt_matched: u64,
    /// Number of files written.
    pub cnt_copied: u64,
    /// Number of files left alone by the conflict strategy.
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during traversal.
    pub warnings: Vec<String>,
}

impl ReportCopy {
    /// `true` when nothing was written.
    pub fn is_empty(&self) -> bool {
        self.paths_copied.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} scanned={} matched={} copied={} skipped={} warnings={}",
            self.cnt_scanned,
            self.cnt_matched,
            self.cnt_copied,
            self.cnt_skipped,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    paths_copied: Vec<PathBuf>,
    cnt_scanned: u64,
    cnt_matched: u64,
    cnt_skipped: u64,
    warnings: Vec<String>,
}

impl ReportCopyBuilder {
    /// Seed the builder with the listing stage results.
    pub fn from_walk(report_walk: &ReportWalk) -> Self {
        Self {
            cnt_scanned: report_walk.cnt_scanned,
            cnt_matched: report_walk.paths.len() as u64,
            warnings: report_walk.warnings.clone(),
            ..Self::default()
        }
    }

    pub fn add_copied(&mut self, path_dst: PathBuf) {
        self.paths_copied.push(path_dst);
    }

    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportCopy {
        ReportCopy {
            cnt_copied: self.paths_copied.len() as u64,
            paths_copied: self.paths_copied,
            cnt_scanned: self.cnt_scanned,
            cnt_matched: self.cnt_matched,
            cnt_skipped: self.cnt_skipped,
            warnings: self.warnings,
        }
    }
}
