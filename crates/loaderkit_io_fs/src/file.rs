//! Single-path helpers: predicates, text read/write, delete, prune, rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::spec::{FsError, Result};
use crate::util::to_unix_path;

////////////////////////////////////////////////////////////////////////////////
// #region Predicates

pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

pub fn is_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

pub fn is_directory<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_dir()
}

pub fn parent<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    path.as_ref().parent().map(Path::to_path_buf)
}

/// Absolute form of `path` with forward-slash separators. Does not touch the
/// filesystem, so `..` and symlinks are left unresolved.
pub fn abs_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path_abs = std::path::absolute(path.as_ref())?;
    Ok(to_unix_path(&path_abs))
}

/// Alias of [`abs_path`].
pub fn normalize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    abs_path(path)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextIO

fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    let Some(label) = label else {
        return Ok(UTF_8);
    };
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| FsError::UnknownEncoding(label.to_string()))
}

fn decode_bytes(raw: &[u8], encoding: &'static Encoding) -> String {
    // A leading BOM wins over `encoding` and is stripped.
    let (txt, _, _) = encoding.decode(raw);
    txt.into_owned()
}

/// Read a whole file as text.
///
/// `encoding` is a WHATWG label (`"utf-8"`, `"latin1"`, `"utf-16le"`, ...),
/// defaulting to UTF-8. Malformed sequences decode to U+FFFD rather than
/// failing.
pub fn read_file<P: AsRef<Path>>(path: P, encoding: Option<&str>) -> Result<String> {
    let encoding = resolve_encoding(encoding)?;
    let raw = fs::read(path.as_ref())?;
    Ok(decode_bytes(&raw, encoding))
}

/// Async variant of [`read_file`]; resolves once with the content or the error.
pub async fn read_file_async<P: AsRef<Path>>(path: P, encoding: Option<&str>) -> Result<String> {
    let encoding = resolve_encoding(encoding)?;
    let raw = tokio::fs::read(path.as_ref()).await?;
    Ok(decode_bytes(&raw, encoding))
}

/// Write `content` to `path`, creating parents and replacing an existing file.
///
/// UTF-16 labels are written as UTF-8, since `encoding_rs` only encodes to
/// ASCII-compatible encodings. Text the encoding cannot represent fails with
/// [`FsError::Unencodable`] and nothing is written.
pub fn save_file<P: AsRef<Path>>(path: P, content: &str, encoding: Option<&str>) -> Result<()> {
    let path = path.as_ref();
    let encoding = resolve_encoding(encoding)?;

    let (raw, encoding_out, b_unmappable) = encoding.encode(content);
    if b_unmappable {
        return Err(FsError::Unencodable {
            path: path.to_path_buf(),
            encoding: encoding_out.name().to_string(),
        });
    }

    if let Some(path_parent) = path.parent()
        && !path_parent.as_os_str().is_empty()
        && !path_parent.is_dir()
    {
        fs::create_dir_all(path_parent).map_err(|source| FsError::CreateDir {
            path: path_parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, &raw)?;
    debug!(path = ?path, size = raw.len(), encoding = encoding_out.name(), "saved file");
    Ok(())
}

pub fn save_utf8_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    save_file(path, content, Some("utf-8"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TreeMutation

/// Delete a file or a whole directory tree. Missing paths are a no-op.
///
/// Symlinks are removed, never followed.
pub fn delete_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let meta_path = match fs::symlink_metadata(path) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if meta_path.is_dir() {
        for entry_res in fs::read_dir(path)? {
            delete_file(entry_res?.path())?;
        }
        fs::remove_dir(path)?;
    } else if cfg!(windows) && meta_path.file_type().is_symlink() && path.is_dir() {
        fs::remove_dir(path)?;
    } else {
        fs::remove_file(path)?;
    }
    debug!(path = ?path, "deleted");
    Ok(())
}

/// Remove every empty directory under `start_dir`, bottom-up, including
/// `start_dir` itself once it ends up empty.
///
/// Directories that still hold anything are left alone without error.
pub fn delete_empty_dirs<P: AsRef<Path>>(start_dir: P) -> Result<()> {
    let path_dir = start_dir.as_ref();
    match fs::symlink_metadata(path_dir) {
        Ok(meta_dir) if meta_dir.is_dir() => prune_dir(path_dir),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn prune_dir(path_dir: &Path) -> Result<()> {
    for entry_res in fs::read_dir(path_dir)? {
        let entry = entry_res?;
        if entry.file_type()?.is_dir() {
            prune_dir(&entry.path())?;
        }
    }

    match fs::remove_dir(path_dir) {
        Ok(()) => {
            debug!(path = ?path_dir, "removed empty directory");
            Ok(())
        }
        // Some platforms report ENOTEMPTY as EEXIST.
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::AlreadyExists
            ) =>
        {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Rename `from` within its own directory.
///
/// Only the last segment of `to` is used, so `"nested/new.txt"` renames to
/// `new.txt` next to `from`. Fails if that name is already taken.
pub fn rename_file<P: AsRef<Path>>(from: P, to: &str) -> Result<PathBuf> {
    let path_from = from.as_ref();
    let c_name = to.rsplit(std::path::is_separator).next().unwrap_or(to);
    if c_name.is_empty() || c_name == "." || c_name == ".." {
        return Err(FsError::InvalidName(to.to_string()));
    }

    let path_to = path_from
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(c_name);
    if fs::symlink_metadata(&path_to).is_ok() {
        return Err(FsError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Rename target exists: {}", path_to.display()),
        )));
    }

    fs::rename(path_from, &path_to)?;
    debug!(from = ?path_from, to = ?path_to, "renamed");
    Ok(path_to)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
