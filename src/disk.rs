//! Block device abstraction
//!
//! The driver addresses storage in 512-byte physical sectors but reads
//! arbitrary byte ranges: a read names a starting sector, a byte offset
//! into it and a length. The host implements [`Disk`] over whatever medium
//! it has (AHCI, NVMe, USB, a RAM image); the driver never writes.

/// log2 of the physical sector size
pub const SECTOR_BITS: u32 = 9;

/// Physical sector size in bytes (512)
pub const SECTOR_SIZE: usize = 1 << SECTOR_BITS;

/// Error type for block operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// Generic device error
    DeviceError,
    /// Read beyond the end of the device
    OutOfRange,
    /// No media present (for removable devices)
    NoMedia,
}

impl core::fmt::Display for DiskError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DeviceError => write!(f, "device error"),
            Self::OutOfRange => write!(f, "read beyond end of device"),
            Self::NoMedia => write!(f, "no media"),
        }
    }
}

/// Callback observing the sectors touched by a data read.
///
/// Invoked once per underlying physical sector with the sector number, the
/// byte offset within that sector and the length read from it.
pub type ReadObserver<'a> = &'a mut dyn FnMut(u64, usize, usize);

/// Trait for read-only sector-addressed storage
///
/// `offset` is a byte offset within `sector` and is always below
/// [`SECTOR_SIZE`] when called through [`Disk::read_bytes`]. A single read
/// may span multiple sectors; the device delivers the whole range or fails.
pub trait Disk {
    /// Read `buf.len()` bytes starting `offset` bytes into `sector`
    fn read(&mut self, sector: u64, offset: usize, buf: &mut [u8]) -> Result<(), DiskError>;

    /// Read a byte range, normalizing an arbitrary byte offset
    ///
    /// Offsets of a sector or more carry into the sector number, so callers
    /// can address `(region_start, byte_offset_in_region)` directly.
    fn read_bytes(
        &mut self,
        sector: u64,
        byte_offset: u64,
        buf: &mut [u8],
    ) -> Result<(), DiskError> {
        let sector = sector + (byte_offset >> SECTOR_BITS);
        let offset = (byte_offset & (SECTOR_SIZE as u64 - 1)) as usize;
        self.read(sector, offset, buf)
    }
}

/// Report a completed read to an observer, one call per physical sector.
///
/// `offset` must already be normalized below [`SECTOR_SIZE`].
pub(crate) fn notify_observer(
    observer: Option<ReadObserver<'_>>,
    mut sector: u64,
    mut offset: usize,
    mut len: usize,
) {
    let Some(observer) = observer else {
        return;
    };
    while len > 0 {
        let chunk = core::cmp::min(SECTOR_SIZE - offset, len);
        observer(sector, offset, chunk);
        sector += 1;
        offset = 0;
        len -= chunk;
    }
}
