//! Filesystem primitives for the staging and swap protocol.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::{fs, os::unix::fs as unix_fs};

fn to_cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Atomically exchange two paths.
///
/// Both paths resolve to valid trees throughout; a reader racing with the
/// exchange sees either the old or the new tree, never a mixture. Both
/// paths must exist and live on the same filesystem.
pub fn exchange_paths(a: &Path, b: &Path) -> io::Result<()> {
    let c_a = to_cstring(a)?;
    let c_b = to_cstring(b)?;
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            c_a.as_ptr(),
            libc::AT_FDCWD,
            c_b.as_ptr(),
            libc::RENAME_EXCHANGE,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Recursively copy a directory tree.
///
/// Symbolic links are recreated as links rather than followed, so dangling
/// links in the source are tolerated and carried over verbatim.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            unix_fs::symlink(link, &target)?;
        } else if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
