//! Recursive directory copy.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use walkdir::WalkDir;

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Copies the tree rooted at `src` into `dst`, depth first.
///
/// Directories are created as needed and symlinks are recreated, not
/// followed. The first failing entry aborts the copy and its error,
/// annotated with the path, is returned. Returns the number of regular
/// files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<u64> {
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_symlink() {
            copy_link(entry.path(), &target).map_err(|e| {
                io::Error::new(e.kind(), format!("{}: {}", entry.path().display(), e))
            })?;
        } else {
            copy_file(entry.path(), &target).map_err(|e| {
                io::Error::new(e.kind(), format!("{}: {}", entry.path().display(), e))
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_link(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)
}

#[cfg(not(unix))]
fn copy_link(src: &Path, _dst: &Path) -> io::Result<()> {
    tracing::debug!("Skipping symlink {}", src.display());
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, File::open(src)?);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, File::create(dst)?);
    let bytes = io::copy(&mut reader, &mut writer)?;
    // BufWriter discards errors on drop.
    writer.flush()?;
    Ok(bytes)
}
