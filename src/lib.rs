//! bootfat - a read-only FAT12/16/32 driver
//!
//! This crate reads files from FAT-formatted volumes the way a bootloader
//! needs to: mount a block device, resolve a path, read the file contents.
//! It decodes all three FAT variants (including FAT12's half-byte packed
//! table and FAT32's cluster-chain root directory), assembles long file
//! names from LFN entry runs, and validates every on-disk value before
//! trusting it.
//!
//! # Architecture
//!
//! The implementation is layered, leaves first:
//! 1. **Disk layer** (`disk`) - byte-range reads against a sector-addressed
//!    block device supplied by the host
//! 2. **Volume layer** (`volume`) - BPB decoding, geometry validation and
//!    variant classification
//! 3. **Chain layer** (`chain`) - random-access reads over FAT cluster
//!    chains with a resumable cursor
//! 4. **Directory layer** (`dir`) - 8.3 + long-name directory scanning
//! 5. **Facade** (`fs`) - `FatFilesystem`: mount, open, read, dir, label
//!
//! # Usage
//!
//! ```ignore
//! use bootfat::FatFilesystem;
//!
//! let mut fs = FatFilesystem::mount(&mut disk)?;
//! let mut file = fs.open("/boot/vmlinuz")?;
//! let n = fs.read(&mut file, 0, &mut buf)?;
//! ```
//!
//! Write support, cluster allocation and timestamp decoding are out of
//! scope; the driver never modifies the device.

#![no_std]

pub mod chain;
pub mod dir;
pub mod disk;
pub mod error;
pub mod fs;
pub mod volume;

pub use dir::DirHook;
pub use disk::{Disk, DiskError, ReadObserver, SECTOR_BITS, SECTOR_SIZE};
pub use error::{FatError, Result};
pub use fs::{FatFilesystem, File, Label};
pub use volume::{FatType, Start, Volume};
