//! `/`-separated path handling: segmentation, parent/name splitting, and
//! resolution against a volume's directory tree.
//!
//! A leading slash is tolerated and ignored, as are repeated separators.
//! The empty path names the root; callers that need a terminal file name
//! reject it before getting here.

use crate::bitmap::BlockKind;
use crate::error::{FsError, Result};
use crate::layout::{BlockId, DirBlock, MAX_NAME_LENGTH, ROOT_BLOCK_ID, name_matches};
use crate::volume::Volume;

/// Remaining path segments during a walk.
#[derive(Debug, Clone)]
pub(crate) struct Segments<'a>(&'a str);

impl<'a> Segments<'a> {
    pub(crate) fn new(path: &'a str) -> Self {
        Self(path)
    }

    /// Returns (next segment, rest), trimming separator runs.
    /// `None` once the path is exhausted.
    pub(crate) fn next_segment(&self) -> Option<(&'a str, Segments<'a>)> {
        let s = self.0.trim_start_matches('/');
        if s.is_empty() {
            return None;
        }
        match s.find('/') {
            Some(i) => Some((&s[..i], Segments(&s[i..]))),
            None => Some((s, Segments(""))),
        }
    }
}

/// Rejects names that cannot be stored: empty, or too long to leave room
/// for the NUL terminator.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_NAME_LENGTH {
        return Err(FsError::InvalidArgument);
    }
    Ok(())
}

/// Splits a pathname at its last separator: `(parent path, name)`.
/// A bare name (with or without a leading slash) has no parent.
pub(crate) fn split_path(pathname: &str) -> Result<(Option<&str>, &str)> {
    let trimmed = pathname.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(FsError::InvalidArgument);
    }
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => {
            if name.is_empty() {
                return Err(FsError::InvalidArgument);
            }
            Ok((Some(parent), name))
        }
        None => Ok((None, trimmed)),
    }
}

/// Walks `path` segment by segment from `start`, which must be a
/// directory. Every intermediate and terminal segment must resolve to a
/// directory; a segment naming a file is `NotDirectory`.
pub(crate) fn find_dir(vol: &Volume, start: BlockId, path: &str) -> Result<BlockId> {
    let mut dir = start;
    let mut rest = Segments::new(path);

    while let Some((segment, tail)) = rest.next_segment() {
        if segment.len() >= MAX_NAME_LENGTH {
            return Err(FsError::InvalidArgument);
        }
        let block = vol.read_dir_block(dir)?;
        dir = descend(vol, &block, segment)?;
        rest = tail;
    }

    Ok(dir)
}

/// One step of the walk: matches `segment` against the children of
/// `block`.
fn descend(vol: &Volume, block: &DirBlock, segment: &str) -> Result<BlockId> {
    for entry in block.live_entries() {
        match vol.bitmap.get(entry.block_id) {
            Some(BlockKind::Dir) => {
                let child = vol.read_dir_block(entry.block_id)?;
                if name_matches(&child.name, segment) {
                    return Ok(entry.block_id);
                }
            }
            Some(BlockKind::File) => {
                let child = vol.read_file_block(entry.block_id)?;
                let name = child
                    .filenames
                    .get(entry.fileindex as usize)
                    .ok_or(FsError::NotVolume)?;
                if name_matches(name, segment) {
                    return Err(FsError::NotDirectory);
                }
            }
            _ => return Err(FsError::NotVolume),
        }
    }
    Err(FsError::NotFound)
}

/// Scans `dir` for a file entry whose current name is `name`.
/// A directory of that name is `NotFile`.
pub(crate) fn find_file(vol: &Volume, dir: BlockId, name: &str) -> Result<BlockId> {
    let block = vol.read_dir_block(dir)?;

    for entry in block.live_entries() {
        match vol.bitmap.get(entry.block_id) {
            Some(BlockKind::File) => {
                let child = vol.read_file_block(entry.block_id)?;
                let stored = child
                    .filenames
                    .get(entry.fileindex as usize)
                    .ok_or(FsError::NotVolume)?;
                if name_matches(stored, name) {
                    return Ok(entry.block_id);
                }
            }
            Some(BlockKind::Dir) => {
                let child = vol.read_dir_block(entry.block_id)?;
                if name_matches(&child.name, name) {
                    return Err(FsError::NotFile);
                }
            }
            _ => return Err(FsError::NotVolume),
        }
    }
    Err(FsError::NotFound)
}

/// Splits a pathname and resolves its parent directory, validating the
/// terminal name. The workhorse of every file-path operation.
pub(crate) fn resolve_parent<'a>(vol: &Volume, pathname: &'a str) -> Result<(BlockId, &'a str)> {
    let (parent, name) = split_path(pathname)?;
    check_name(name)?;
    let dir = match parent {
        Some(p) => find_dir(vol, ROOT_BLOCK_ID, p)?,
        None => ROOT_BLOCK_ID,
    };
    Ok((dir, name))
}
