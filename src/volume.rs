//! BPB decoding, validation and volume mount
//!
//! Sector 0 carries the BIOS Parameter Block describing the volume
//! geometry. Mounting reads it, validates every field before use, derives
//! the FAT / root-directory / cluster-region layout, classifies the
//! variant (FAT12, FAT16 or FAT32) and checks the media sentinel in the
//! first FAT entry. The resulting [`Volume`] is immutable.

use crate::dir::ATTR_DIRECTORY;
use crate::disk::{Disk, SECTOR_BITS};
use crate::error::{FatError, Result};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Directory entry size in bytes
pub(crate) const DIR_ENTRY_SIZE: u32 = 32;

/// Bytes of sector 0 consumed by the mount path
const BPB_READ_SIZE: usize = 90;

/// FAT Boot Parameter Block (BPB) - common fields
#[repr(C, packed)]
#[derive(FromBytes, Immutable, KnownLayout, Unaligned, Clone, Copy, Debug)]
struct BiosParameterBlock {
    /// Jump instruction (3 bytes)
    jmp_boot: [u8; 3],
    /// OEM name (8 bytes)
    oem_name: [u8; 8],
    /// Bytes per logical sector
    bytes_per_sector: u16,
    /// Sectors per cluster
    sectors_per_cluster: u8,
    /// Reserved sectors (before first FAT)
    num_reserved_sectors: u16,
    /// Number of FATs
    num_fats: u8,
    /// Root entry count (0 for FAT32)
    num_root_entries: u16,
    /// Total sectors (16-bit, 0 if over 65535)
    num_total_sectors_16: u16,
    /// Media type byte
    media: u8,
    /// Sectors per FAT (FAT12/16, 0 for FAT32)
    sectors_per_fat_16: u16,
    /// Sectors per track
    sectors_per_track: u16,
    /// Number of heads
    num_heads: u16,
    /// Hidden sectors
    num_hidden_sectors: u32,
    /// Total sectors (32-bit)
    num_total_sectors_32: u32,
}

/// FAT32 extension of the BPB at offsets 36..56
#[repr(C, packed)]
#[derive(FromBytes, Immutable, KnownLayout, Unaligned, Clone, Copy, Debug)]
struct Fat32Ext {
    /// Sectors per FAT (32-bit)
    sectors_per_fat_32: u32,
    /// Extended flags; bit 7 disables mirroring, low 4 bits name the active FAT
    extended_flags: u16,
    /// Filesystem version, must be 0
    fs_version: u16,
    /// Root directory first cluster
    root_cluster: u32,
    /// FSInfo sector
    fs_info: u16,
    /// Backup boot sector
    backup_boot_sector: u16,
}

/// FAT variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

/// Where a file's data begins
///
/// The FAT12/16 root directory is not part of the cluster region; it lives
/// in a fixed sector range and has no chain to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    /// The fixed FAT12/16 root directory
    FixedRoot,
    /// First cluster of an ordinary file or directory
    Cluster(u32),
}

/// Volume descriptor produced by [`mount`]; immutable thereafter.
///
/// All sector fields are in 512-byte physical sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    pub(crate) fat_type: FatType,
    /// log2(bytes per logical sector) - log2(bytes per physical sector)
    pub(crate) logical_sector_bits: u32,
    /// log2(sectors per cluster) + `logical_sector_bits`
    pub(crate) cluster_bits: u32,
    /// First sector of the active FAT
    pub(crate) fat_start_sector: u32,
    pub(crate) sectors_per_fat: u32,
    pub(crate) num_sectors: u32,
    /// Root directory start; `FixedRoot` on FAT12/16
    pub(crate) root_start: Start,
    /// Fixed root location, zero on FAT32
    pub(crate) root_start_sector: u32,
    pub(crate) num_root_sectors: u32,
    /// First sector of cluster #2
    pub(crate) cluster_region_start_sector: u32,
    /// Total clusters including the two reserved entries
    pub(crate) num_clusters: u32,
    /// FAT entries at or above this value terminate a chain
    pub(crate) cluster_eof_mark: u32,
}

impl Volume {
    /// The FAT variant this volume was classified as
    pub fn fat_type(&self) -> FatType {
        self.fat_type
    }

    /// Total cluster count, including the two reserved FAT entries
    pub fn num_clusters(&self) -> u32 {
        self.num_clusters
    }

    /// Bytes per cluster as addressed by the chain walker
    pub(crate) fn cluster_bytes(&self) -> u64 {
        1u64 << (self.cluster_bits + self.logical_sector_bits + SECTOR_BITS)
    }
}

/// Position of an open file or directory, with the chain-walk resumption
/// point.
///
/// `cached` holds `(logical cluster index, cluster number)` from the last
/// walk so forward reads skip re-traversal; `None` forces a fresh walk
/// from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub(crate) start: Start,
    pub(crate) attributes: u8,
    pub(crate) file_size: u32,
    pub(crate) cached: Option<(u32, u32)>,
}

impl Cursor {
    /// Cursor positioned at the root directory of `volume`
    pub(crate) fn root(volume: &Volume) -> Self {
        Self {
            start: volume.root_start,
            attributes: ATTR_DIRECTORY,
            file_size: 0,
            cached: None,
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }
}

/// log2 of an exact power of two
fn log2_exact(x: u32) -> Option<u32> {
    if x != 0 && x.is_power_of_two() {
        Some(x.trailing_zeros())
    } else {
        None
    }
}

fn bad(why: &'static str) -> FatError {
    FatError::BadFilesystem(why)
}

/// Mount a FAT volume from sector 0 of `disk`.
///
/// Returns the volume descriptor and a cursor positioned at the root
/// directory.
pub fn mount<D: Disk + ?Sized>(disk: &mut D) -> Result<(Volume, Cursor)> {
    let mut sector0 = [0u8; BPB_READ_SIZE];
    disk.read(0, 0, &mut sector0)?;

    let bpb = BiosParameterBlock::read_from_prefix(&sector0)
        .map_err(|_| bad("truncated bpb"))?
        .0;

    // Logical sector and cluster sizes must be powers of two; a logical
    // sector can never be smaller than the physical sector.
    let bytes_per_sector = u16::from_le(bpb.bytes_per_sector);
    let logical_sector_bits = log2_exact(bytes_per_sector as u32)
        .filter(|&bits| bits >= SECTOR_BITS)
        .ok_or_else(|| {
            log::debug!("invalid bytes_per_sector: {}", bytes_per_sector);
            bad("bad bytes per sector")
        })?
        - SECTOR_BITS;

    let cluster_bits = log2_exact(bpb.sectors_per_cluster as u32).ok_or_else(|| {
        log::debug!("invalid sectors_per_cluster: {}", bpb.sectors_per_cluster);
        bad("bad sectors per cluster")
    })? + logical_sector_bits;

    let fat_start_sector = (u16::from_le(bpb.num_reserved_sectors) as u32) << logical_sector_bits;
    if fat_start_sector == 0 {
        return Err(bad("no reserved sectors"));
    }

    let sectors_per_fat_16 = u16::from_le(bpb.sectors_per_fat_16);
    let ext = Fat32Ext::read_from_prefix(&sector0[36..])
        .map_err(|_| bad("truncated bpb"))?
        .0;

    let sectors_per_fat = if sectors_per_fat_16 != 0 {
        sectors_per_fat_16 as u32
    } else {
        u32::from_le(ext.sectors_per_fat_32)
    };
    let sectors_per_fat = sectors_per_fat << logical_sector_bits;
    if sectors_per_fat == 0 {
        return Err(bad("zero-length fat"));
    }

    let num_total_sectors_16 = u16::from_le(bpb.num_total_sectors_16);
    let num_sectors = if num_total_sectors_16 != 0 {
        num_total_sectors_16 as u32
    } else {
        u32::from_le(bpb.num_total_sectors_32)
    };
    let num_sectors = num_sectors << logical_sector_bits;
    if num_sectors == 0 {
        return Err(bad("zero total sectors"));
    }

    if bpb.num_fats == 0 {
        log::debug!("invalid num_fats: 0");
        return Err(bad("no fats"));
    }

    // Root directory and cluster region layout. The root region size is
    // rounded up to logical-sector granularity.
    let num_root_entries = u16::from_le(bpb.num_root_entries) as u32;
    let root_start_sector = fat_start_sector + bpb.num_fats as u32 * sectors_per_fat;
    let num_root_sectors = ((num_root_entries * DIR_ENTRY_SIZE + bytes_per_sector as u32 - 1)
        >> (logical_sector_bits + SECTOR_BITS))
        << logical_sector_bits;

    let cluster_region_start_sector = root_start_sector + num_root_sectors;
    let num_clusters = num_sectors
        .checked_sub(cluster_region_start_sector)
        .map(|data_sectors| (data_sectors >> (cluster_bits + logical_sector_bits)) + 2)
        .ok_or_else(|| bad("cluster region beyond volume"))?;

    if num_clusters <= 2 {
        return Err(bad("too few clusters"));
    }

    let mut fat_start_sector = fat_start_sector;
    let (fat_type, root_start, root_start_sector, num_root_sectors, cluster_eof_mark) =
        if sectors_per_fat_16 == 0 {
            // FAT32. The root directory is an ordinary cluster chain, and
            // bit 7 of the extended flags disables FAT mirroring in favor
            // of one active copy.
            let flags = u16::from_le(ext.extended_flags);
            if flags & 0x80 != 0 {
                let active_fat = (flags & 0xf) as u32;
                if active_fat > bpb.num_fats as u32 {
                    log::debug!("active fat {} out of range", active_fat);
                    return Err(bad("bad active fat"));
                }
                fat_start_sector += active_fat * sectors_per_fat;
            }

            if num_root_entries != 0 || u16::from_le(ext.fs_version) != 0 {
                return Err(bad("bad fat32 extension"));
            }

            let root_cluster = u32::from_le(ext.root_cluster);
            (
                FatType::Fat32,
                Start::Cluster(root_cluster),
                0,
                0,
                0x0ffffff8,
            )
        } else if num_clusters <= 4085 + 2 {
            (
                FatType::Fat12,
                Start::FixedRoot,
                root_start_sector,
                num_root_sectors,
                0x0ff8,
            )
        } else {
            (
                FatType::Fat16,
                Start::FixedRoot,
                root_start_sector,
                num_root_sectors,
                0xfff8,
            )
        };

    if num_sectors <= fat_start_sector {
        return Err(bad("fat beyond volume"));
    }

    // The first FAT entry, masked to the variant's width, must repeat the
    // media byte under an all-ones high mask.
    let mut first_fat_bytes = [0u8; 4];
    disk.read(fat_start_sector as u64, 0, &mut first_fat_bytes)?;
    let first_fat = u32::from_le_bytes(first_fat_bytes);

    let (first_fat, magic) = match fat_type {
        FatType::Fat32 => (first_fat & 0x0fffffff, 0x0fffff00),
        FatType::Fat16 => (first_fat & 0x0000ffff, 0xff00),
        FatType::Fat12 => (first_fat & 0x00000fff, 0x0f00),
    };

    if first_fat != (magic | bpb.media as u32) {
        log::debug!(
            "first fat entry {:#x} does not match media byte {:#x}",
            first_fat,
            bpb.media
        );
        return Err(bad("bad media sentinel"));
    }

    let volume = Volume {
        fat_type,
        logical_sector_bits,
        cluster_bits,
        fat_start_sector,
        sectors_per_fat,
        num_sectors,
        root_start,
        root_start_sector,
        num_root_sectors,
        cluster_region_start_sector,
        num_clusters,
        cluster_eof_mark,
    };

    log::info!(
        "mounted {:?} volume: {} clusters, {} bytes/cluster",
        fat_type,
        num_clusters,
        volume.cluster_bytes(),
    );
    log::debug!(
        "layout: fat_start={}, sectors_per_fat={}, root_start={}, cluster_region={}",
        fat_start_sector,
        sectors_per_fat,
        root_start_sector,
        cluster_region_start_sector,
    );

    Ok((volume, Cursor::root(&volume)))
}

#[cfg(test)]
mod tests {
    use super::log2_exact;

    #[test]
    fn log2_of_powers_of_two() {
        assert_eq!(log2_exact(1), Some(0));
        assert_eq!(log2_exact(512), Some(9));
        assert_eq!(log2_exact(4096), Some(12));
    }

    #[test]
    fn log2_rejects_non_powers() {
        assert_eq!(log2_exact(0), None);
        assert_eq!(log2_exact(3), None);
        assert_eq!(log2_exact(520), None);
    }
}
