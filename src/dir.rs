//! Directory operations: `mkdir`, `rmdir`, `dirinfo`.

use log::debug;

use crate::bitmap::BlockKind;
use crate::error::{FsError, Result};
use crate::layout::{DirBlock, MAX_ENTRIES, ROOT_BLOCK_ID, name_matches};
use crate::path::{find_dir, resolve_parent, split_path};
use crate::volume::{Volume, unix_now};

/// A directory listing: one displayed name per entry, in entry order.
#[derive(Debug, Clone)]
pub struct DirInfo {
    pub entries: Vec<String>,
    pub modtime: i64,
}

/// True when any entry of `block` displays `name`, whether it is a child
/// directory's own name or a file block's name at the entry's slot.
pub(crate) fn contains_name(vol: &Volume, block: &DirBlock, name: &str) -> Result<bool> {
    for entry in block.live_entries() {
        match vol.bitmap.get(entry.block_id) {
            Some(BlockKind::Dir) => {
                let child = vol.read_dir_block(entry.block_id)?;
                if name_matches(&child.name, name) {
                    return Ok(true);
                }
            }
            Some(BlockKind::File) => {
                let child = vol.read_file_block(entry.block_id)?;
                let stored = child
                    .filenames
                    .get(entry.fileindex as usize)
                    .ok_or(FsError::NotVolume)?;
                if name_matches(stored, name) {
                    return Ok(true);
                }
            }
            _ => return Err(FsError::NotVolume),
        }
    }
    Ok(false)
}

impl Volume {
    /// Creates an empty directory at `dirname`.
    pub fn mkdir(&mut self, dirname: &str) -> Result<()> {
        let (parent_id, name) = resolve_parent(self, dirname)?;
        let mut parent = self.read_dir_block(parent_id)?;

        if parent.nentries as usize == MAX_ENTRIES {
            return Err(FsError::MaxEntries);
        }
        if contains_name(self, &parent, name)? {
            return Err(FsError::Exists);
        }

        let child_id = self.bitmap.first_unused().ok_or(FsError::NoSpace)?;
        let now = unix_now();

        self.bitmap.set(child_id, BlockKind::Dir);
        self.write_bitmap()?;

        self.write_dir_block(child_id, &DirBlock::new(name, now))?;

        parent.push_entry(child_id, 0, now);
        self.write_dir_block(parent_id, &parent)?;

        debug!("mkdir {:?}: block {} under {}", dirname, child_id, parent_id);
        Ok(())
    }

    /// Removes the empty directory at `dirname`.
    pub fn rmdir(&mut self, dirname: &str) -> Result<()> {
        // Validates the path shape before walking; also keeps the root
        // itself out of reach.
        let (parent_path, _) = split_path(dirname)?;

        let child_id = find_dir(self, ROOT_BLOCK_ID, dirname)?;
        let child = self.read_dir_block(child_id)?;
        if child.nentries != 0 {
            return Err(FsError::NotEmpty);
        }

        let parent_id = match parent_path {
            Some(p) => find_dir(self, ROOT_BLOCK_ID, p)?,
            None => ROOT_BLOCK_ID,
        };
        let mut parent = self.read_dir_block(parent_id)?;
        let index = parent
            .live_entries()
            .iter()
            .position(|e| e.block_id == child_id)
            .ok_or(FsError::NotVolume)?;

        self.bitmap.set(child_id, BlockKind::Unused);
        self.write_bitmap()?;
        self.zero_block(child_id)?;

        parent.remove_entry(index, unix_now());
        self.write_dir_block(parent_id, &parent)?;

        debug!("rmdir {:?}: freed block {}", dirname, child_id);
        Ok(())
    }

    /// Lists a directory. The empty path (or a bare "/") names the root.
    pub fn dirinfo(&self, pathname: &str) -> Result<DirInfo> {
        let dir = if pathname.trim_start_matches('/').is_empty() {
            ROOT_BLOCK_ID
        } else {
            find_dir(self, ROOT_BLOCK_ID, pathname)?
        };
        let block = self.read_dir_block(dir)?;

        let mut entries = Vec::with_capacity(block.nentries as usize);
        for entry in block.live_entries() {
            match self.bitmap.get(entry.block_id) {
                Some(BlockKind::Dir) => {
                    entries.push(self.read_dir_block(entry.block_id)?.name());
                }
                Some(BlockKind::File) => {
                    let child = self.read_file_block(entry.block_id)?;
                    if entry.fileindex >= child.nfiles {
                        return Err(FsError::NotVolume);
                    }
                    entries.push(child.filename(entry.fileindex));
                }
                _ => return Err(FsError::NotVolume),
            }
        }

        Ok(DirInfo {
            entries,
            modtime: block.modtime,
        })
    }
}
