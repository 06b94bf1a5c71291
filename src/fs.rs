//! Filesystem facade
//!
//! [`FatFilesystem`] borrows the block device for its lifetime and
//! composes the volume, chain and directory layers into the operations a
//! host actually calls: `open`, `read`, `dir` and `label`.

use crate::chain;
use crate::dir::{self, DirEntry, DirHook, ATTR_VOLUME_ID};
use crate::disk::{Disk, ReadObserver};
use crate::error::{FatError, Result};
use crate::volume::{self, Cursor, FatType, Volume};

/// Volume label: 11 raw name bytes, spaces included
pub type Label = heapless::String<22>;

/// An open file: the resolved directory entry plus the chain-walk cursor.
///
/// Dropping the handle releases everything; there is no explicit close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    cursor: Cursor,
    size: u32,
}

impl File {
    /// File size in bytes, from the directory entry
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// A mounted FAT filesystem on a borrowed block device
pub struct FatFilesystem<'a, D: Disk + ?Sized> {
    disk: &'a mut D,
    volume: Volume,
}

impl<'a, D: Disk + ?Sized> FatFilesystem<'a, D> {
    /// Mount the FAT volume starting at sector 0 of `disk`
    pub fn mount(disk: &'a mut D) -> Result<Self> {
        let (volume, _root) = volume::mount(disk)?;
        Ok(Self { disk, volume })
    }

    /// The volume descriptor produced by the mount
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// The FAT variant (12, 16 or 32)
    pub fn fat_type(&self) -> FatType {
        self.volume.fat_type()
    }

    /// Open a file by `/`-delimited path
    pub fn open(&mut self, path: &str) -> Result<File> {
        let mut cursor = Cursor::root(&self.volume);

        let mut rest = Some(path);
        while let Some(p) = rest {
            rest = dir::resolve_component(self.disk, &self.volume, &mut cursor, p, None)?;
        }

        if cursor.is_dir() {
            return Err(FatError::BadFileType("not a file"));
        }

        let size = cursor.file_size;
        log::debug!("open '{}': {} bytes", path, size);
        Ok(File { cursor, size })
    }

    /// Read up to `buf.len()` bytes from `file` at the given byte offset.
    ///
    /// The offset is maintained by the caller. Returns the number of bytes
    /// read, clamped to the file size; reads at or past the end return 0.
    pub fn read(&mut self, file: &mut File, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_impl(file, offset, buf, None)
    }

    /// Like [`read`](Self::read), with a per-sector observer active for
    /// the duration of this call only
    pub fn read_with_observer(
        &mut self,
        file: &mut File,
        offset: u64,
        buf: &mut [u8],
        observer: ReadObserver<'_>,
    ) -> Result<usize> {
        self.read_impl(file, offset, buf, Some(observer))
    }

    fn read_impl(
        &mut self,
        file: &mut File,
        offset: u64,
        buf: &mut [u8],
        observer: Option<ReadObserver<'_>>,
    ) -> Result<usize> {
        let size = file.size as u64;
        if offset >= size {
            return Ok(0);
        }
        let len = core::cmp::min(buf.len() as u64, size - offset) as usize;
        chain::read_data(
            self.disk,
            &self.volume,
            &mut file.cursor,
            offset,
            &mut buf[..len],
            observer,
        )
    }

    /// Walk `path` and list the terminal directory through `hook`.
    ///
    /// The hook receives each entry's name (long name when a valid LFN run
    /// precedes it, lowercased 8.3 form otherwise) and whether it is a
    /// directory; returning `true` stops the listing.
    pub fn dir(&mut self, path: &str, hook: DirHook<'_>) -> Result<()> {
        let mut cursor = Cursor::root(&self.volume);

        let mut rest = Some(path);
        while let Some(p) = rest {
            rest =
                dir::resolve_component(self.disk, &self.volume, &mut cursor, p, Some(&mut *hook))?;
        }
        Ok(())
    }

    /// The volume label, from the root entry whose attribute byte is
    /// exactly `VOLUME_ID`.
    ///
    /// Scans raw root entries without long-name assembly; `None` when the
    /// root directory carries no label entry.
    pub fn label(&mut self) -> Result<Option<Label>> {
        let mut cursor = Cursor::root(&self.volume);
        let mut entry_buf = [0u8; 32];
        let mut offset = 0u64;

        loop {
            let n = chain::read_data(
                self.disk,
                &self.volume,
                &mut cursor,
                offset,
                &mut entry_buf,
                None,
            )?;
            offset += entry_buf.len() as u64;

            if n != entry_buf.len() || entry_buf[0] == 0 {
                return Ok(None);
            }

            let entry: DirEntry = zerocopy::transmute!(entry_buf);
            if entry.attr == ATTR_VOLUME_ID {
                let mut label = Label::new();
                for &b in &entry.name {
                    let _ = label.push(b as char);
                }
                return Ok(Some(label));
            }
        }
    }

    /// Open `path` and read it from offset 0 into `buf`, returning the
    /// byte count (the smaller of the file size and the buffer)
    pub fn read_to_buf(&mut self, path: &str, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.open(path)?;
        self.read(&mut file, 0, buf)
    }

    /// Size of the file at `path` without keeping it open
    pub fn size_of(&mut self, path: &str) -> Result<u32> {
        Ok(self.open(path)?.size())
    }
}
