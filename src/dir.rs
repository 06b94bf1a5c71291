//! Directory scanning and name assembly
//!
//! A FAT directory is a file of 32-byte entries. Plain entries carry a
//! space-padded 8.3 short name; long names are spread over a run of
//! special entries (attribute 0x0F) that precede their 8.3 entry in
//! reverse order, each carrying 13 UTF-16LE code units and a checksum of
//! the short name that ties the run to it. The scanner merges both forms,
//! verifies the checksum linkage and matches path components, or feeds
//! every entry to a listing hook.

use crate::chain;
use crate::disk::Disk;
use crate::error::{FatError, Result};
use crate::volume::{Cursor, Start, Volume};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Directory entry attributes
pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

/// A long-name entry reinterprets the record when the attribute byte is
/// exactly this value
pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

/// Attribute bits a plain entry may carry; anything outside is skipped
pub const ATTR_VALID: u8 =
    ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_DIRECTORY | ATTR_ARCHIVE;

/// Longest long-name run: 20 entries of 13 UTF-16 code units
const MAX_LONG_SLOTS: usize = 20;
const LONG_NAME_UNITS: usize = MAX_LONG_SLOTS * 13;

/// Synthesized name buffer; sized for a full long name in UTF-8
pub(crate) type NameBuf = heapless::String<780>;

/// Listing callback: receives each name and whether it is a directory;
/// returning `true` stops the listing
pub type DirHook<'a> = &'a mut dyn FnMut(&str, bool) -> bool;

/// FAT directory entry
#[repr(C, packed)]
#[derive(FromBytes, Immutable, KnownLayout, Unaligned, Clone, Copy, Debug)]
pub(crate) struct DirEntry {
    /// Short name, 8 name + 3 extension bytes, space padded
    pub(crate) name: [u8; 11],
    /// Attribute bits
    pub(crate) attr: u8,
    nt_reserved: u8,
    c_time_tenth: u8,
    c_time: u16,
    c_date: u16,
    a_date: u16,
    first_cluster_high: u16,
    w_time: u16,
    w_date: u16,
    first_cluster_low: u16,
    file_size: u32,
}

impl DirEntry {
    pub(crate) fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }

    fn first_cluster(&self) -> u32 {
        ((u16::from_le(self.first_cluster_high) as u32) << 16)
            | u16::from_le(self.first_cluster_low) as u32
    }
}

/// Long-name entry overlaying the same 32 bytes
#[repr(C, packed)]
#[derive(FromBytes, Immutable, KnownLayout, Unaligned, Clone, Copy, Debug)]
struct LongNameEntry {
    /// Slot ordinal; bit 6 marks the first (highest) entry of a run
    ord: u8,
    name1: [u16; 5],
    attr: u8,
    reserved: u8,
    /// Checksum of the 8.3 name this run belongs to
    checksum: u8,
    name2: [u16; 6],
    first_cluster: u16,
    name3: [u16; 2],
}

/// Rotate-right-and-add checksum over the 11 short-name bytes, as stored
/// in every entry of a long-name run
pub(crate) fn short_name_checksum(name: &[u8; 11]) -> u8 {
    name.iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// Decode UTF-16LE code units into `out`, stopping at the first NUL.
/// Unpaired surrogates become U+FFFD.
fn decode_long_name(units: &[u16], out: &mut NameBuf) {
    out.clear();
    let trimmed = units.iter().copied().take_while(|&u| u != 0);
    for c in char::decode_utf16(trimmed) {
        let _ = out.push(c.unwrap_or(char::REPLACEMENT_CHARACTER));
    }
}

/// Build the lowercased display form of an 8.3 name: `name.ext`, with the
/// dot dropped when there is no extension
fn synthesize_short_name(name: &[u8; 11], out: &mut NameBuf) {
    out.clear();
    for &b in &name[..8] {
        if b == 0 || b.is_ascii_whitespace() {
            break;
        }
        let _ = out.push(b.to_ascii_lowercase() as char);
    }

    let base_len = out.len();
    let _ = out.push('.');
    for &b in &name[8..11] {
        if b == 0 || b.is_ascii_whitespace() {
            break;
        }
        let _ = out.push(b.to_ascii_lowercase() as char);
    }

    if out.len() == base_len + 1 {
        out.truncate(base_len);
    }
}

/// Record a matched entry into the cursor
fn commit(cursor: &mut Cursor, entry: &DirEntry) {
    cursor.attributes = entry.attr;
    cursor.file_size = u32::from_le(entry.file_size);
    cursor.start = Start::Cluster(entry.first_cluster());
    cursor.cached = None;
}

/// Resolve the leading `/`-delimited component of `path` against the
/// directory `cursor` refers to.
///
/// On a match the cursor is updated to the matched entry and the path tail
/// after the component's trailing `/` is returned; `None` means the
/// component was terminal. With a `hook` and an empty terminal component
/// the scan runs in listing mode: every live entry is presented to the
/// hook, and a `true` return stops the listing at that entry.
pub fn resolve_component<'p, D: Disk + ?Sized>(
    disk: &mut D,
    volume: &Volume,
    cursor: &mut Cursor,
    path: &'p str,
    mut hook: Option<DirHook<'_>>,
) -> Result<Option<&'p str>> {
    if !cursor.is_dir() {
        return Err(FatError::BadFileType("not a directory"));
    }

    let path = path.trim_start_matches('/');
    let (component, rest) = match path.find('/') {
        Some(i) => (&path[..i], Some(&path[i + 1..])),
        None => (path, None),
    };

    let call_hook = rest.is_none() && hook.is_some();
    let listing = call_hook && component.is_empty();

    // Long-name assembly state: the run's total slot count, the next
    // ordinal expected (counting down to zero) and the checksum tying the
    // run to its 8.3 entry. A None checksum means no run is in progress.
    let mut unibuf = [0u16; LONG_NAME_UNITS];
    let mut slots = 0usize;
    let mut next_slot = 0usize;
    let mut checksum: Option<u8> = None;
    let mut name = NameBuf::new();

    let mut entry_buf = [0u8; 32];
    let mut offset = 0u64;

    loop {
        let n = chain::read_data(disk, volume, cursor, offset, &mut entry_buf, None)?;
        offset += entry_buf.len() as u64;

        if n != entry_buf.len() || entry_buf[0] == 0 {
            // End of directory: success for a completed listing, not-found
            // for a lookup.
            if listing {
                return Ok(None);
            }
            log::debug!("end of directory, '{}' not found", component);
            return Err(FatError::FileNotFound);
        }

        let entry: DirEntry = zerocopy::transmute!(entry_buf);

        if entry.attr == ATTR_LONG_NAME {
            let long: LongNameEntry = zerocopy::transmute!(entry_buf);
            let mut ord = long.ord as usize;

            if ord & 0x40 != 0 {
                ord &= 0x3f;
                if ord > MAX_LONG_SLOTS {
                    checksum = None;
                    continue;
                }
                slots = ord;
                next_slot = ord;
                checksum = Some(long.checksum);
            }

            // Out-of-sequence ordinal or checksum change breaks the run.
            let in_sequence =
                checksum == Some(long.checksum) && next_slot != 0 && ord == next_slot;
            if !in_sequence {
                checksum = None;
                continue;
            }

            next_slot -= 1;
            let base = next_slot * 13;
            // Copy out of the packed struct before iterating.
            let (name1, name2, name3) = (long.name1, long.name2, long.name3);
            for (i, unit) in name1.into_iter().enumerate() {
                unibuf[base + i] = u16::from_le(unit);
            }
            for (i, unit) in name2.into_iter().enumerate() {
                unibuf[base + 5 + i] = u16::from_le(unit);
            }
            for (i, unit) in name3.into_iter().enumerate() {
                unibuf[base + 11 + i] = u16::from_le(unit);
            }
            continue;
        }

        // Deleted entries and entries with attribute bits outside the
        // valid set (volume labels among them) are never matched by name.
        if entry.name[0] == 0xe5 || entry.attr & !ATTR_VALID != 0 {
            continue;
        }

        // 0x05 escapes a legitimate leading 0xe5 byte in the short name.
        let mut short = entry.name;
        if short[0] == 0x05 {
            short[0] = 0xe5;
        }

        // A complete long-name run whose checksum matches this entry
        // yields the long name; either way the run is spent.
        if checksum.is_some() && next_slot == 0 {
            if checksum == Some(short_name_checksum(&short)) {
                decode_long_name(&unibuf[..slots * 13], &mut name);

                if listing {
                    let stop = hook
                        .as_deref_mut()
                        .is_some_and(|h| h(&name, entry.is_dir()));
                    if stop {
                        commit(cursor, &entry);
                        return Ok(rest);
                    }
                    checksum = None;
                    continue;
                }

                if component.eq_ignore_ascii_case(&name) {
                    if let Some(h) = hook.as_deref_mut() {
                        h(&name, entry.is_dir());
                    }
                    commit(cursor, &entry);
                    return Ok(rest);
                }
            }
            checksum = None;
        }

        synthesize_short_name(&short, &mut name);

        if listing {
            let stop = hook
                .as_deref_mut()
                .is_some_and(|h| h(&name, entry.is_dir()));
            if stop {
                commit(cursor, &entry);
                return Ok(rest);
            }
        } else if component.eq_ignore_ascii_case(&name) {
            if let Some(h) = hook.as_deref_mut() {
                h(&name, entry.is_dir());
            }
            commit(cursor, &entry);
            return Ok(rest);
        }
    }
}
