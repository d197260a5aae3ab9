//! File operations: `writefile`, `readfile`, `fileinfo`, `rmfile`.
//!
//! Writes deduplicate whole payloads: a file block stores the content
//! digest, and a second write of identical bytes anywhere in the tree
//! links a new name onto the existing block instead of allocating.

use log::debug;
use md5::{Digest, Md5};

use bytemuck::Zeroable;

use crate::bitmap::BlockKind;
use crate::dir::contains_name;
use crate::error::{FsError, Result};
use crate::layout::{BlockId, DIGEST_BYTELEN, FileBlock, MAX_ENTRIES, name_matches};
use crate::path::{find_file, resolve_parent};
use crate::volume::{Volume, unix_now};

/// Metadata of one file, as reported to callers.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo {
    pub length: u64,
    pub modtime: i64,
}

fn content_digest(data: &[u8]) -> [u8; DIGEST_BYTELEN] {
    Md5::digest(data).into()
}

/// Scans every file block for one whose payload digest matches.
fn find_by_digest(vol: &Volume, digest: &[u8; DIGEST_BYTELEN]) -> Result<Option<BlockId>> {
    for id in 0..vol.nblocks() {
        if vol.bitmap.get(id) != Some(BlockKind::File) {
            continue;
        }
        let block = vol.read_file_block(id)?;
        if block.digest == *digest {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

impl Volume {
    /// Stores `data` under `pathname`.
    ///
    /// If an existing file block holds the same payload, the new name is
    /// attached to it and no data is written. Otherwise the metadata
    /// block goes to the first free cell and the data run to the first
    /// fit strictly after it.
    pub fn writefile(&mut self, pathname: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(FsError::InvalidArgument);
        }

        let (parent_id, name) = resolve_parent(self, pathname)?;
        let mut parent = self.read_dir_block(parent_id)?;

        if parent.nentries as usize == MAX_ENTRIES {
            return Err(FsError::MaxEntries);
        }
        if contains_name(self, &parent, name)? {
            return Err(FsError::Exists);
        }

        let digest = content_digest(data);
        let now = unix_now();

        if let Some(file_id) = find_by_digest(self, &digest)? {
            // Reuse: link one more name onto the shared block.
            let mut file = self.read_file_block(file_id)?;
            if file.nfiles as usize == MAX_ENTRIES {
                return Err(FsError::MaxEntries);
            }
            let fileindex = file.nfiles;
            file.push_name(name);
            parent.push_entry(file_id, fileindex, now);

            self.write_file_block(file_id, &file)?;
            self.write_dir_block(parent_id, &parent)?;

            debug!(
                "writefile {:?}: dedup onto block {} (nfiles={})",
                pathname, file_id, file.nfiles
            );
            return Ok(());
        }

        // Fresh: metadata cell first, data run strictly after it.
        let length = u32::try_from(data.len()).map_err(|_| FsError::NoSpace)?;
        let file_id = self.bitmap.first_unused().ok_or(FsError::NoSpace)?;
        let ndata = length.div_ceil(self.blocksize());
        let run_start = self
            .bitmap
            .find_run(file_id + 1, ndata)
            .ok_or(FsError::NoSpace)?;

        self.bitmap.set(file_id, BlockKind::File);
        for id in run_start..run_start + ndata {
            self.bitmap.set(id, BlockKind::Data);
        }
        self.write_bitmap()?;

        self.write_payload(run_start, data)?;

        let mut file = FileBlock::zeroed();
        file.modtime = now;
        file.length = length;
        file.digest = digest;
        file.firstblock_id = run_start;
        file.push_name(name);
        self.write_file_block(file_id, &file)?;

        parent.push_entry(file_id, 0, now);
        self.write_dir_block(parent_id, &parent)?;

        debug!(
            "writefile {:?}: block {}, {} data blocks at {}",
            pathname, file_id, ndata, run_start
        );
        Ok(())
    }

    /// Returns the payload stored under `pathname`.
    pub fn readfile(&self, pathname: &str) -> Result<Vec<u8>> {
        let (parent_id, name) = resolve_parent(self, pathname)?;
        let file_id = find_file(self, parent_id, name)?;
        let file = self.read_file_block(file_id)?;
        self.read_payload(file.firstblock_id, file.length as usize)
    }

    /// Returns length and modification time of the file at `pathname`.
    pub fn fileinfo(&self, pathname: &str) -> Result<FileInfo> {
        let (parent_id, name) = resolve_parent(self, pathname)?;
        let file_id = find_file(self, parent_id, name)?;
        let file = self.read_file_block(file_id)?;
        Ok(FileInfo {
            length: file.length as u64,
            modtime: file.modtime,
        })
    }

    /// Removes the name at `pathname`. The file block and its data run
    /// are freed only when this was the last name referencing them.
    pub fn rmfile(&mut self, pathname: &str) -> Result<()> {
        let (parent_id, name) = resolve_parent(self, pathname)?;
        let mut parent = self.read_dir_block(parent_id)?;

        let mut found = None;
        for (index, entry) in parent.live_entries().iter().enumerate() {
            match self.bitmap.get(entry.block_id) {
                Some(BlockKind::File) => {
                    let file = self.read_file_block(entry.block_id)?;
                    let stored = file
                        .filenames
                        .get(entry.fileindex as usize)
                        .ok_or(FsError::NotVolume)?;
                    if name_matches(stored, name) {
                        found = Some((index, entry.block_id, entry.fileindex));
                        break;
                    }
                }
                Some(BlockKind::Dir) => {
                    let child = self.read_dir_block(entry.block_id)?;
                    if name_matches(&child.name, name) {
                        return Err(FsError::NotFile);
                    }
                }
                _ => return Err(FsError::NotVolume),
            }
        }
        let (index, file_id, fileindex) = found.ok_or(FsError::NotFound)?;

        let mut file = self.read_file_block(file_id)?;
        let now = unix_now();

        if file.nfiles == 1 {
            // Last reference: free the metadata cell and the data run.
            // Payload bytes stay behind; the bitmap is the authority.
            let run = file.firstblock_id..file.firstblock_id + file.data_blocks(self.blocksize());
            self.bitmap.set(file_id, BlockKind::Unused);
            for id in run {
                self.bitmap.set(id, BlockKind::Unused);
            }
            self.write_bitmap()?;

            parent.remove_entry(index, now);
            self.write_dir_block(parent_id, &parent)?;

            debug!("rmfile {:?}: freed block {}", pathname, file_id);
            return Ok(());
        }

        // Shared block: drop this name, then renumber every other entry
        // whose slot index sat above it.
        file.remove_name(fileindex);
        self.write_file_block(file_id, &file)?;

        parent.remove_entry(index, now);
        self.write_dir_block(parent_id, &parent)?;

        let remaining = file.nfiles;
        let mut processed = 0u32;
        for id in 0..self.nblocks() {
            if processed >= remaining {
                break;
            }
            if self.bitmap.get(id) != Some(BlockKind::Dir) {
                continue;
            }
            let mut block = self.read_dir_block(id)?;
            let mut changed = false;
            for entry in &mut block.entries[..block.nentries as usize] {
                if entry.block_id == file_id {
                    processed += 1;
                    if entry.fileindex > fileindex {
                        entry.fileindex -= 1;
                        changed = true;
                    }
                }
            }
            if changed {
                self.write_dir_block(id, &block)?;
            }
        }

        debug!(
            "rmfile {:?}: unlinked from block {} (nfiles={})",
            pathname, file_id, remaining
        );
        Ok(())
    }
}
