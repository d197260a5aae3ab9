//! `volfs` — a single-file block-addressed volume filesystem.
//!
//! A volume is one host file laid out as a fixed header, a one-byte-per-
//! block allocation bitmap, and a homogeneous array of block slots
//! holding directory blocks, file-metadata blocks, and raw data blocks:
//!
//! ```text
//! [ header ][ bitmap: nblocks bytes ][ nblocks slots of blocksize bytes ]
//! ```
//!
//! Identical payloads are stored once: each file block carries a content
//! digest, and writing the same bytes under a second name links that name
//! onto the existing block. [`Volume::defrag`] compacts all live blocks
//! toward the front of the volume in place, rewriting every reference.
//!
//! The functions at the crate root open the volume, perform one
//! operation, and close it; [`Volume`] is the session handle they
//! delegate to.
//!
//! ```no_run
//! # fn main() -> volfs::Result<()> {
//! volfs::mkvolume("vol", 1024, 64)?;
//! volfs::mkdir("vol", "docs")?;
//! volfs::writefile("vol", "docs/hello", b"hello world")?;
//! assert_eq!(volfs::readfile("vol", "docs/hello")?, b"hello world");
//! # Ok(())
//! # }
//! ```

mod bitmap;
mod defrag;
mod dir;
mod error;
mod file;
mod layout;
mod path;
mod volume;

use std::path::Path;

pub use bitmap::BlockKind;
pub use dir::DirInfo;
pub use error::{FsError, Result};
pub use file::FileInfo;
pub use layout::{
    BlockId, DIGEST_BYTELEN, DirBlock, DirEntry, FileBlock, MAX_ENTRIES, MAX_NAME_LENGTH,
    MIN_BLOCKSIZE, ROOT_BLOCK_ID, VolumeHeader,
};
pub use volume::Volume;

/// Creates (or truncates) the volume file `volume` with an empty root
/// directory.
pub fn mkvolume(volume: impl AsRef<Path>, blocksize: u32, nblocks: u32) -> Result<()> {
    Volume::create(volume, blocksize, nblocks).map(|_| ())
}

/// Creates an empty directory at `dirname`.
pub fn mkdir(volume: impl AsRef<Path>, dirname: &str) -> Result<()> {
    Volume::open(volume)?.mkdir(dirname)
}

/// Removes the empty directory at `dirname`.
pub fn rmdir(volume: impl AsRef<Path>, dirname: &str) -> Result<()> {
    Volume::open(volume)?.rmdir(dirname)
}

/// Stores `data` under `pathname`, deduplicating identical payloads.
pub fn writefile(volume: impl AsRef<Path>, pathname: &str, data: &[u8]) -> Result<()> {
    Volume::open(volume)?.writefile(pathname, data)
}

/// Returns the payload stored under `pathname`.
pub fn readfile(volume: impl AsRef<Path>, pathname: &str) -> Result<Vec<u8>> {
    Volume::open_readonly(volume)?.readfile(pathname)
}

/// Removes the name at `pathname`, freeing the file's blocks when it was
/// the last name.
pub fn rmfile(volume: impl AsRef<Path>, pathname: &str) -> Result<()> {
    Volume::open(volume)?.rmfile(pathname)
}

/// Lists the directory at `pathname`; the empty path names the root.
pub fn dirinfo(volume: impl AsRef<Path>, pathname: &str) -> Result<DirInfo> {
    Volume::open_readonly(volume)?.dirinfo(pathname)
}

/// Returns length and modification time of the file at `pathname`.
pub fn fileinfo(volume: impl AsRef<Path>, pathname: &str) -> Result<FileInfo> {
    Volume::open_readonly(volume)?.fileinfo(pathname)
}

/// Packs all live blocks toward the front of the volume.
pub fn defrag(volume: impl AsRef<Path>) -> Result<()> {
    Volume::open(volume)?.defrag()
}
