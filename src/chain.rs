//! Cluster-chain walker
//!
//! A FAT file is a singly-linked list: each FAT entry names the next
//! cluster, and an entry at or above the variant's EOF mark ends the
//! chain. Reads at arbitrary offsets walk the chain to the right link;
//! the cursor remembers the last `(logical index, cluster)` pair so
//! sequential and forward reads resume instead of re-walking from the
//! start. The FAT12/16 root directory is not chained at all and is served
//! from its fixed sector range.

use crate::disk::{notify_observer, Disk, ReadObserver, SECTOR_BITS, SECTOR_SIZE};
use crate::error::{FatError, Result};
use crate::volume::{Cursor, FatType, Start, Volume};

/// Read up to `buf.len()` bytes at `offset` from the file `cursor` refers
/// to.
///
/// Returns the number of bytes read. Hitting the chain's EOF mark yields a
/// short read, not an error; a chain entry outside `[2, num_clusters)`
/// that is below the EOF mark is corruption and fails with
/// `BadFilesystem`. `observer`, when present, is invoked per physical
/// sector of each data read (never for FAT lookups).
pub fn read_data<D: Disk + ?Sized>(
    disk: &mut D,
    volume: &Volume,
    cursor: &mut Cursor,
    offset: u64,
    buf: &mut [u8],
    mut observer: Option<ReadObserver<'_>>,
) -> Result<usize> {
    let start_cluster = match cursor.start {
        Start::Cluster(c) => c,
        Start::FixedRoot => {
            // FAT12/16 root directory: one contiguous, chainless range.
            let root_bytes = (volume.num_root_sectors as u64) << SECTOR_BITS;
            if offset >= root_bytes {
                return Ok(0);
            }
            let size = core::cmp::min(root_bytes - offset, buf.len() as u64) as usize;
            disk.read_bytes(volume.root_start_sector as u64, offset, &mut buf[..size])?;
            return Ok(size);
        }
    };

    let cluster_shift = volume.cluster_bits + volume.logical_sector_bits + SECTOR_BITS;
    let cluster_bytes = volume.cluster_bytes();
    let mut logical_cluster = (offset >> cluster_shift) as u32;
    let mut in_cluster = (offset & (cluster_bytes - 1)) as usize;

    // Resume from the cached position unless the read starts before it;
    // rewinding restarts from the head of the chain.
    let (mut cur_index, mut cur_cluster) = match cursor.cached {
        Some((index, cluster)) if index <= logical_cluster => (index, cluster),
        _ => (0, start_cluster),
    };

    let mut total = 0;
    while total < buf.len() {
        while logical_cluster > cur_index {
            match next_cluster(disk, volume, cur_cluster)? {
                Some(next) => {
                    cur_cluster = next;
                    cur_index += 1;
                }
                None => {
                    cursor.cached = Some((cur_index, cur_cluster));
                    return Ok(total);
                }
            }
        }

        let sector = volume.cluster_region_start_sector as u64
            + ((cur_cluster.wrapping_sub(2) as u64)
                << (volume.cluster_bits + volume.logical_sector_bits));
        let size = core::cmp::min(cluster_bytes as usize - in_cluster, buf.len() - total);

        let abs_sector = sector + (in_cluster as u64 >> SECTOR_BITS);
        let sector_offset = in_cluster & (SECTOR_SIZE - 1);
        disk.read(abs_sector, sector_offset, &mut buf[total..total + size])?;
        match observer.as_mut() {
            Some(obs) => notify_observer(Some(&mut **obs), abs_sector, sector_offset, size),
            None => notify_observer(None, abs_sector, sector_offset, size),
        }

        total += size;
        logical_cluster += 1;
        in_cluster = 0;
    }

    cursor.cached = Some((cur_index, cur_cluster));
    Ok(total)
}

/// Look up the FAT entry for `cluster` and decode the chain link.
///
/// `Ok(None)` means the chain ends here.
fn next_cluster<D: Disk + ?Sized>(
    disk: &mut D,
    volume: &Volume,
    cluster: u32,
) -> Result<Option<u32>> {
    // FAT12 packs two 12-bit entries into three bytes; entry N starts at
    // byte N + N/2 and odd entries occupy the high nibbles.
    let (fat_offset, width) = match volume.fat_type {
        FatType::Fat32 => ((cluster as u64) << 2, 4),
        FatType::Fat16 => ((cluster as u64) << 1, 2),
        FatType::Fat12 => (cluster as u64 + (cluster as u64 >> 1), 2),
    };

    let mut raw = [0u8; 4];
    disk.read_bytes(volume.fat_start_sector as u64, fat_offset, &mut raw[..width])?;
    let mut next = u32::from_le_bytes(raw);

    match volume.fat_type {
        FatType::Fat32 => next &= 0x0fffffff,
        FatType::Fat16 => next &= 0xffff,
        FatType::Fat12 => {
            if cluster & 1 != 0 {
                next >>= 4;
            }
            next &= 0x0fff;
        }
    }

    if next >= volume.cluster_eof_mark {
        return Ok(None);
    }

    if next < 2 || next >= volume.num_clusters {
        log::debug!("invalid cluster {} in chain after {}", next, cluster);
        return Err(FatError::BadFilesystem("invalid cluster"));
    }

    Ok(Some(next))
}
