//! File loading and atomic save
//!
//! Clean UTF-8/LF files are memory-mapped and served directly as the
//! original blob; anything else is decoded into owned bytes. Saving writes a
//! sibling temp file, fsyncs it, renames over the symlink-resolved target,
//! then fsyncs the directory, so a failed save never touches the original.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use nix::unistd::{Gid, Uid};

use crate::encoding::{self, FileFormat};
use crate::error::{Result, ZeError};

use super::Buffer;

/// Identity and on-disk format of a loaded file
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Path as given by the user
    pub path: PathBuf,
    /// Symlink-resolved target; writes go here so the target keeps its identity
    pub real_path: PathBuf,
    pub format: FileFormat,
    /// mtime recorded at load/save, used to detect outside modification
    pub mtime: Option<SystemTime>,
    pub readonly: bool,
}

impl FileInfo {
    /// Info for a path that does not exist on disk yet
    pub fn new_for_path(path: &Path, readonly: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            real_path: path.to_path_buf(),
            format: FileFormat::default(),
            mtime: None,
            readonly,
        }
    }
}

/// Load a file, sniffing encoding and line endings
pub fn open(path: &Path, readonly: bool) -> std::io::Result<(Buffer, FileInfo)> {
    let real_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let file = File::open(&real_path)?;
    let meta = file.metadata()?;
    let mtime = meta.modified().ok();
    let readonly = readonly || meta.permissions().readonly();

    if meta.len() == 0 {
        tracing::debug!(path = %real_path.display(), "opened empty file");
        return Ok((
            Buffer::new(),
            FileInfo {
                path: path.to_path_buf(),
                real_path,
                format: FileFormat::default(),
                mtime,
                readonly,
            },
        ));
    }

    // SAFETY: mapped read-only; the map keeps the file alive
    let map = unsafe { memmap2::Mmap::map(&file)? };
    if encoding::is_clean_utf8_lf(&map) {
        tracing::debug!(path = %real_path.display(), bytes = map.len(), "mmap load");
        return Ok((
            Buffer::from_mmap(map),
            FileInfo {
                path: path.to_path_buf(),
                real_path,
                format: FileFormat::default(),
                mtime,
                readonly,
            },
        ));
    }

    let decoded = encoding::decode(&map);
    tracing::debug!(
        path = %real_path.display(),
        encoding = decoded.format.encoding.name(),
        "transcoded load"
    );
    Ok((
        Buffer::from_bytes(decoded.text),
        FileInfo {
            path: path.to_path_buf(),
            real_path,
            format: decoded.format,
            mtime,
            readonly,
        },
    ))
}

/// Atomically write the buffer back in its recorded on-disk format
pub fn save(buffer: &Buffer, info: &mut FileInfo, force: bool) -> Result<()> {
    if info.readonly {
        return Err(ZeError::ReadOnly);
    }
    if !force {
        if let (Some(recorded), Ok(meta)) = (info.mtime, fs::metadata(&info.real_path)) {
            if meta.modified().ok() != Some(recorded) {
                return Err(ZeError::FileChangedOnDisk);
            }
        }
    }

    let encoded = encoding::encode(&buffer.to_bytes(), &info.format);

    // Re-resolve so a symlinked target keeps its identity across the rename
    let target = fs::canonicalize(&info.path).unwrap_or_else(|_| info.path.clone());
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ZeError::SaveFailed("no file name".into()))?;
    let tmp = dir.join(format!("{}.tmp.{}", file_name, std::process::id()));

    let written = (|| -> std::io::Result<()> {
        let mut f = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        f.write_all(&encoded)?;
        f.sync_all()?;
        Ok(())
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(ZeError::SaveFailed(err.to_string()));
    }

    // Best-effort preservation of the original's mode and ownership
    if let Ok(meta) = fs::metadata(&target) {
        use std::os::unix::fs::MetadataExt;
        let _ = fs::set_permissions(&tmp, meta.permissions());
        if let Err(err) = nix::unistd::chown(
            &tmp,
            Some(Uid::from_raw(meta.uid())),
            Some(Gid::from_raw(meta.gid())),
        ) {
            tracing::warn!(path = %target.display(), %err, "could not preserve ownership");
        }
    }

    if let Err(err) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(ZeError::SaveFailed(err.to_string()));
    }
    if let Ok(d) = File::open(&dir) {
        let _ = d.sync_all();
    }

    info.real_path = target;
    info.mtime = fs::metadata(&info.real_path)
        .ok()
        .and_then(|m| m.modified().ok());
    tracing::info!(path = %info.real_path.display(), bytes = encoded.len(), "saved");
    Ok(())
}
