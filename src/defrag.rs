//! In-place compaction.
//!
//! A single left-to-right walk over the bitmap counts the hole of unused
//! cells behind the cursor and relocates every live block backwards by
//! that amount, rewriting whatever points at it. Consecutive blocks of a
//! data run shift by equal amounts, so runs stay contiguous and the
//! relative order of live blocks never changes.

use log::{info, trace};

use crate::bitmap::BlockKind;
use crate::error::Result;
use crate::layout::BlockId;
use crate::volume::Volume;

impl Volume {
    /// Packs all live blocks toward the front of the volume.
    pub fn defrag(&mut self) -> Result<()> {
        let max_index = self.bitmap.highest_used();
        let mut hole = 0u32;
        let mut moved = 0u32;

        for id in 0..=max_index {
            match self.bitmap.get(id) {
                Some(BlockKind::Unused) => hole += 1,
                Some(kind) if hole > 0 => {
                    match kind {
                        BlockKind::Dir => self.shift_dir(id, hole)?,
                        BlockKind::File => self.shift_file(id, hole)?,
                        BlockKind::Data => self.shift_data(id, hole)?,
                        BlockKind::Unused => unreachable!(),
                    }
                    moved += 1;
                }
                _ => {}
            }
        }

        info!("defrag: relocated {} blocks", moved);
        Ok(())
    }

    /// Moves the directory at `id` back by `hole` cells, repointing the
    /// single parent entry that references it. The root sits at block 0
    /// and can never move.
    fn shift_dir(&mut self, id: BlockId, hole: u32) -> Result<()> {
        let target = id - hole;

        'parents: for pid in 0..self.nblocks() {
            if self.bitmap.get(pid) != Some(BlockKind::Dir) {
                continue;
            }
            let mut parent = self.read_dir_block(pid)?;
            for entry in &mut parent.entries[..parent.nentries as usize] {
                if entry.block_id == id {
                    entry.block_id = target;
                    self.write_dir_block(pid, &parent)?;
                    break 'parents;
                }
            }
        }

        let block = self.read_dir_block(id)?;
        self.bitmap.set(id, BlockKind::Unused);
        self.bitmap.set(target, BlockKind::Dir);
        self.write_bitmap()?;
        self.write_dir_block(target, &block)?;

        trace!("defrag: dir {} -> {}", id, target);
        Ok(())
    }

    /// Moves the file block at `id` back by `hole` cells, repointing
    /// every directory entry that references it (up to `nfiles`, spread
    /// over any number of directories).
    fn shift_file(&mut self, id: BlockId, hole: u32) -> Result<()> {
        let target = id - hole;
        let file = self.read_file_block(id)?;

        let mut processed = 0u32;
        for pid in 0..self.nblocks() {
            if processed >= file.nfiles {
                break;
            }
            if self.bitmap.get(pid) != Some(BlockKind::Dir) {
                continue;
            }
            let mut parent = self.read_dir_block(pid)?;
            let mut changed = false;
            for entry in &mut parent.entries[..parent.nentries as usize] {
                if entry.block_id == id {
                    entry.block_id = target;
                    processed += 1;
                    changed = true;
                }
            }
            if changed {
                self.write_dir_block(pid, &parent)?;
            }
        }

        self.bitmap.set(id, BlockKind::Unused);
        self.bitmap.set(target, BlockKind::File);
        self.write_bitmap()?;
        self.write_file_block(target, &file)?;

        trace!("defrag: file {} -> {}", id, target);
        Ok(())
    }

    /// Moves the data block at `id` back by `hole` cells. Only the first
    /// block of a run updates its owner's `firstblock_id`; the rest of
    /// the run follows on later iterations of the same walk.
    fn shift_data(&mut self, id: BlockId, hole: u32) -> Result<()> {
        let target = id - hole;

        for fid in 0..self.nblocks() {
            if self.bitmap.get(fid) != Some(BlockKind::File) {
                continue;
            }
            let mut file = self.read_file_block(fid)?;
            if file.firstblock_id == id {
                file.firstblock_id = target;
                self.write_file_block(fid, &file)?;
                break;
            }
        }

        let mut block = vec![0u8; self.blocksize() as usize];
        self.read_raw_block(id, &mut block)?;
        self.bitmap.set(id, BlockKind::Unused);
        self.bitmap.set(target, BlockKind::Data);
        self.write_bitmap()?;
        self.write_raw_block(target, &block)?;

        trace!("defrag: data {} -> {}", id, target);
        Ok(())
    }
}
