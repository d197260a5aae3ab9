//! Shared fixtures: temp-backed volumes and a whole-volume invariant
//! checker run after every interesting step.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tempfile::TempDir;
use volfs::{BlockKind, ROOT_BLOCK_ID, Volume};

/// Creates a fresh volume inside a temp dir. Keep the `TempDir` alive for
/// as long as the volume is used.
pub fn new_volume(blocksize: u32, nblocks: u32) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vol");
    volfs::mkvolume(&path, blocksize, nblocks).unwrap();
    (dir, path)
}

/// Asserts the global structural invariants of a volume:
///
/// 1. every bitmap cell holds a valid kind and the root cell is a
///    directory (guaranteed at open, re-checked here);
/// 2. every file block is referenced by exactly `nfiles` directory
///    entries whose `fileindex` values form `{0, .., nfiles-1}`;
/// 3. every non-root directory is referenced by exactly one entry;
/// 4. every file's data run is all `DATABLOCK` and every data cell is
///    owned by exactly one file;
/// 5. file digests are pairwise distinct;
/// 6. displayed names within one directory are pairwise distinct.
pub fn check_invariants(vol: &Volume) {
    let kinds = vol.kinds().to_vec();
    assert_eq!(kinds[ROOT_BLOCK_ID as usize], BlockKind::Dir);

    let mut dir_refs: HashMap<u32, u32> = HashMap::new();
    let mut file_refs: HashMap<u32, Vec<u32>> = HashMap::new();

    for (id, &kind) in kinds.iter().enumerate() {
        if kind != BlockKind::Dir {
            continue;
        }
        let block = vol.read_dir_block(id as u32).unwrap();
        let entries = &block.entries[..block.nentries as usize];

        let mut names = Vec::new();
        for entry in entries {
            match kinds[entry.block_id as usize] {
                BlockKind::Dir => {
                    *dir_refs.entry(entry.block_id).or_default() += 1;
                    names.push(vol.read_dir_block(entry.block_id).unwrap().name());
                }
                BlockKind::File => {
                    file_refs.entry(entry.block_id).or_default().push(entry.fileindex);
                    names.push(
                        vol.read_file_block(entry.block_id)
                            .unwrap()
                            .filename(entry.fileindex),
                    );
                }
                other => panic!("dir {id} references {} of kind {other:?}", entry.block_id),
            }
        }

        let unique = names.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), names.len(), "duplicate names in dir {id}");
    }

    for (id, &kind) in kinds.iter().enumerate() {
        if kind == BlockKind::Dir {
            let expected = u32::from(id as u32 != ROOT_BLOCK_ID);
            let actual = dir_refs.get(&(id as u32)).copied().unwrap_or(0);
            assert_eq!(actual, expected, "dir {id} reference count");
        }
    }

    let mut digests = HashSet::new();
    let mut data_owners = vec![0u32; kinds.len()];

    for (id, &kind) in kinds.iter().enumerate() {
        if kind != BlockKind::File {
            continue;
        }
        let file = vol.read_file_block(id as u32).unwrap();

        let mut indexes = file_refs.remove(&(id as u32)).unwrap_or_default();
        indexes.sort_unstable();
        assert_eq!(
            indexes,
            (0..file.nfiles).collect::<Vec<_>>(),
            "file {id} fileindex permutation"
        );

        assert!(digests.insert(file.digest), "file {id} duplicates a digest");

        let run = file.firstblock_id..file.firstblock_id + file.data_blocks(vol.header().blocksize);
        for cell in run {
            assert_eq!(kinds[cell as usize], BlockKind::Data, "cell {cell} of file {id}");
            data_owners[cell as usize] += 1;
        }
    }

    for (id, &kind) in kinds.iter().enumerate() {
        if kind == BlockKind::Data {
            assert_eq!(data_owners[id], 1, "data cell {id} owner count");
        }
    }
}

/// Asserts the live blocks form a prefix of the bitmap.
pub fn check_compacted(vol: &Volume) {
    let kinds = vol.kinds();
    let boundary = kinds
        .iter()
        .position(|&k| k == BlockKind::Unused)
        .unwrap_or(kinds.len());
    assert!(
        kinds[boundary..].iter().all(|&k| k == BlockKind::Unused),
        "hole inside the live prefix: {:?}",
        kinds
    );
}
