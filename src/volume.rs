//! Volume handle and positioned block I/O.
//!
//! Byte offsets inside the volume file:
//!
//! ```text
//! header:    0
//! bitmap:    VolumeHeader::SIZE
//! block(id): VolumeHeader::SIZE + nblocks + id * blocksize
//! ```

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::bitmap::{Bitmap, BlockKind};
use crate::error::{FsError, Result};
use crate::layout::{BlockId, DirBlock, FileBlock, MIN_BLOCKSIZE, ROOT_BLOCK_ID, VolumeHeader};

/// An open volume: the backing file plus in-memory copies of the header
/// and bitmap. Mutating operations update the bitmap here first and
/// persist it wholesale.
pub struct Volume {
    pub(crate) file: File,
    pub(crate) header: VolumeHeader,
    pub(crate) bitmap: Bitmap,
}

impl Volume {
    /// Creates (or truncates) a volume file with an empty root directory.
    pub fn create(path: impl AsRef<Path>, blocksize: u32, nblocks: u32) -> Result<Self> {
        if blocksize < MIN_BLOCKSIZE || nblocks == 0 {
            return Err(FsError::InvalidArgument);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(FsError::NoVolume)?;

        let header = VolumeHeader { blocksize, nblocks };
        file.set_len(volume_len(&header))?;
        file.write_all_at(bytemuck::bytes_of(&header), 0)?;

        let bitmap = Bitmap::new(nblocks);
        let mut volume = Self {
            file,
            header,
            bitmap,
        };
        volume.write_bitmap()?;

        let root = DirBlock::new("", unix_now());
        volume.write_dir_block(ROOT_BLOCK_ID, &root)?;

        info!(
            "created volume {:?}: blocksize={} nblocks={}",
            path.as_ref(),
            blocksize,
            nblocks
        );
        Ok(volume)
    }

    /// Opens a volume read-write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Opens a volume for query operations only.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, false)
    }

    fn open_with(path: impl AsRef<Path>, write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(write)
            .open(path)
            .map_err(FsError::NoVolume)?;

        let mut header_buf = [0u8; VolumeHeader::SIZE];
        file.read_exact_at(&mut header_buf, 0)
            .map_err(|_| FsError::NotVolume)?;
        let header = bytemuck::pod_read_unaligned::<VolumeHeader>(&header_buf);

        if header.blocksize < MIN_BLOCKSIZE || header.nblocks == 0 {
            return Err(FsError::NotVolume);
        }
        if file.metadata()?.len() != volume_len(&header) {
            return Err(FsError::NotVolume);
        }

        let mut bitmap_buf = vec![0u8; header.nblocks as usize];
        file.read_exact_at(&mut bitmap_buf, VolumeHeader::SIZE as u64)
            .map_err(|_| FsError::NotVolume)?;
        let bitmap = Bitmap::parse(&bitmap_buf).ok_or(FsError::NotVolume)?;

        Ok(Self {
            file,
            header,
            bitmap,
        })
    }

    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Snapshot of the bitmap, one kind per block slot.
    pub fn kinds(&self) -> &[BlockKind] {
        self.bitmap.kinds()
    }

    pub(crate) fn blocksize(&self) -> u32 {
        self.header.blocksize
    }

    pub(crate) fn nblocks(&self) -> u32 {
        self.header.nblocks
    }

    fn block_off(&self, id: BlockId) -> u64 {
        VolumeHeader::SIZE as u64
            + self.header.nblocks as u64
            + id as u64 * self.header.blocksize as u64
    }

    /// Fails with `NotVolume` unless the bitmap marks `id` as `kind`.
    pub(crate) fn expect_kind(&self, id: BlockId, kind: BlockKind) -> Result<()> {
        if self.bitmap.get(id) == Some(kind) {
            Ok(())
        } else {
            Err(FsError::NotVolume)
        }
    }

    /// Persists the whole in-memory bitmap.
    pub(crate) fn write_bitmap(&mut self) -> Result<()> {
        self.file
            .write_all_at(&self.bitmap.as_bytes(), VolumeHeader::SIZE as u64)?;
        Ok(())
    }

    pub fn read_dir_block(&self, id: BlockId) -> Result<DirBlock> {
        self.expect_kind(id, BlockKind::Dir)?;
        let mut buf = [0u8; DirBlock::SIZE];
        self.file.read_exact_at(&mut buf, self.block_off(id))?;
        Ok(bytemuck::pod_read_unaligned::<DirBlock>(&buf))
    }

    pub(crate) fn write_dir_block(&mut self, id: BlockId, block: &DirBlock) -> Result<()> {
        self.expect_kind(id, BlockKind::Dir)?;
        self.file
            .write_all_at(bytemuck::bytes_of(block), self.block_off(id))?;
        Ok(())
    }

    pub fn read_file_block(&self, id: BlockId) -> Result<FileBlock> {
        self.expect_kind(id, BlockKind::File)?;
        let mut buf = [0u8; FileBlock::SIZE];
        self.file.read_exact_at(&mut buf, self.block_off(id))?;
        Ok(bytemuck::pod_read_unaligned::<FileBlock>(&buf))
    }

    pub(crate) fn write_file_block(&mut self, id: BlockId, block: &FileBlock) -> Result<()> {
        self.expect_kind(id, BlockKind::File)?;
        self.file
            .write_all_at(bytemuck::bytes_of(block), self.block_off(id))?;
        Ok(())
    }

    /// Reads one raw block slot, `blocksize` bytes.
    pub(crate) fn read_raw_block(&self, id: BlockId, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buf, self.block_off(id))?;
        Ok(())
    }

    /// Writes one raw block slot, `blocksize` bytes.
    pub(crate) fn write_raw_block(&mut self, id: BlockId, buf: &[u8]) -> Result<()> {
        self.file.write_all_at(buf, self.block_off(id))?;
        Ok(())
    }

    /// Zeroes one block slot.
    pub(crate) fn zero_block(&mut self, id: BlockId) -> Result<()> {
        let zeros = vec![0u8; self.blocksize() as usize];
        self.write_raw_block(id, &zeros)
    }

    /// Writes a file payload at the start of its data run. The run was
    /// sized to hold it, so the slack in the last block stays untouched.
    pub(crate) fn write_payload(&mut self, first: BlockId, data: &[u8]) -> Result<()> {
        self.file.write_all_at(data, self.block_off(first))?;
        Ok(())
    }

    /// Reads `length` payload bytes from a contiguous data run.
    pub(crate) fn read_payload(&self, first: BlockId, length: usize) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        data.try_reserve_exact(length)
            .map_err(|_| FsError::OutOfMemory)?;
        data.resize(length, 0);
        self.file.read_exact_at(&mut data, self.block_off(first))?;
        debug!("read {} payload bytes from block {}", length, first);
        Ok(data)
    }
}

fn volume_len(header: &VolumeHeader) -> u64 {
    VolumeHeader::SIZE as u64
        + header.nblocks as u64
        + header.nblocks as u64 * header.blocksize as u64
}

/// Seconds since the epoch, the resolution of on-disk modtimes.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
