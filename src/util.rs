//! Filesystem helpers shared by the page, index, and build steps.

use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    log::debug!("writing {}", path.display());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Copies `src` to `dst` byte-for-byte, creating parent directories as
/// needed.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    log::debug!("copying {} to {}", src.display(), dst.display());
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst).map(|_| ())
}

/// Removes `dir` and everything in it. A missing directory is not an error.
pub fn rmdir(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Recursively copies the contents of `src` into `dst`, creating `dst`.
pub fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for result in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = result?;
        // strip_prefix shouldn't fail since `src` is always an ancestor of
        // the entries it yields
        let target = match entry.path().strip_prefix(src) {
            Ok(relative) => dst.join(relative),
            Err(_) => continue,
        };
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir() -> io::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("static");
        std::fs::create_dir_all(src.join("css"))?;
        std::fs::write(src.join("favicon.ico"), [0u8, 1, 2])?;
        std::fs::write(src.join("css").join("site.css"), "body {}")?;

        let dst = dir.path().join("_site");
        copy_dir(&src, &dst)?;
        assert_eq!(vec![0u8, 1, 2], std::fs::read(dst.join("favicon.ico"))?);
        assert_eq!("body {}", std::fs::read_to_string(dst.join("css/site.css"))?);
        Ok(())
    }

    #[test]
    fn test_rmdir_missing_is_ok() -> io::Result<()> {
        let dir = TempDir::new()?;
        rmdir(&dir.path().join("nope"))?;
        let full = dir.path().join("full");
        write_file(&full.join("a/b.txt"), "x")?;
        rmdir(&full)?;
        assert!(!full.exists());
        Ok(())
    }
}
