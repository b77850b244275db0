// src/readers/helpers.rs

//! Miscellaneous helper functions for paths of nodes.

use std::time::UNIX_EPOCH;

use crate::common::{FPath, SUBPATH_SEP};

#[allow(unused_imports)]
use ::si_trace_print::{defn, defx};

/// Return the basename of an `FPath`: the last component after a
/// [`SUBPATH_SEP`] or, for a plain file path, after the last path separator.
pub fn basename(path: &str) -> FPath {
    if let Some((_, name)) = path.rsplit_once(SUBPATH_SEP) {
        return FPath::from(name);
    }
    let mut riter = path.rsplit(std::path::MAIN_SEPARATOR);

    FPath::from(riter.next().unwrap_or(""))
}

/// The `FPath` of a node embedded in the node at `parent`.
pub fn child_fpath(parent: &str, name: &str) -> FPath {
    let mut path = FPath::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent);
    path.push(SUBPATH_SEP);
    path.push_str(name);

    path
}

/// Lower-case extension of a node name, e.g. `"gz"` for `"a.tar.gz"`.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}

/// Helper function for a slightly annoying set of calls.
pub fn path_to_fpath(path: &std::path::Path) -> FPath {
    // `PathBuf` to `String` https://stackoverflow.com/q/37388107/471376
    (*(path.to_string_lossy())).to_string()
}

/// Helper function for completeness.
pub fn fpath_to_path(path: &FPath) -> &std::path::Path {
    std::path::Path::new(path)
}

/// Modification time of the file at `path` in seconds since the Unix epoch,
/// `0` when unavailable.
pub fn path_mtime(path: &std::path::Path) -> u64 {
    defn!("({:?})", path);
    let mtime: u64 = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    defx!("return {}", mtime);

    mtime
}
