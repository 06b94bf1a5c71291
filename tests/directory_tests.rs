//! Directory scanning, long-name assembly and path resolution tests

mod common;

use bootfat::{FatError, FatFilesystem};
use common::builder::{lfn_entries, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_VOLUME_ID};
use common::FatImageBuilder;

fn list_root(disk: &mut common::MemoryDisk) -> Vec<(String, bool)> {
    let mut fs = FatFilesystem::mount(disk).expect("mount");
    let mut names = Vec::new();
    fs.dir("/", &mut |name, is_dir| {
        names.push((name.to_string(), is_dir));
        false
    })
    .expect("dir");
    names
}

#[test]
fn lists_long_name_over_short_name() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_lfn("a-long-filename.txt", b"A~1     TXT");
    builder.add_root_entry(b"A~1     TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("a-long-filename.txt".to_string(), false)]);
}

#[test]
fn opens_by_long_name() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_lfn("a-long-filename.txt", b"A~1     TXT");
    builder.add_file(b"A~1     TXT", &[2], b"payload");
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    let mut file = fs.open("/a-long-filename.txt").expect("open");

    let mut buf = [0u8; 7];
    fs.read(&mut file, 0, &mut buf).expect("read");
    assert_eq!(&buf, b"payload");
}

#[test]
fn entry_with_long_name_still_matches_short_name() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_lfn("a-long-filename.txt", b"A~1     TXT");
    builder.add_file(b"A~1     TXT", &[2], b"payload");
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    assert!(fs.open("/a~1.txt").is_ok());
}

// A run whose checksum does not match the following 8.3 entry is
// discarded; the short name is presented instead.
#[test]
fn checksum_mismatch_falls_back_to_short_name() {
    let mut builder = FatImageBuilder::fat16();
    for mut entry in lfn_entries("a-long-filename.txt", b"A~1     TXT") {
        entry[13] = entry[13].wrapping_add(1);
        builder.push_root_raw(entry);
    }
    builder.add_root_entry(b"A~1     TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("a~1.txt".to_string(), false)]);
}

// An interrupted run (ordinal out of sequence) is discarded too.
#[test]
fn broken_run_falls_back_to_short_name() {
    let mut builder = FatImageBuilder::fat16();
    let run = lfn_entries("a-long-filename.txt", b"A~1     TXT");
    // Drop the second entry of the two-slot run.
    builder.push_root_raw(run[0]);
    builder.add_root_entry(b"A~1     TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("a~1.txt".to_string(), false)]);
}

#[test]
fn deleted_entries_are_skipped() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_entry(b"\xe5ONE    TXT", ATTR_ARCHIVE, 0, 0);
    builder.add_file(b"TWO     TXT", &[2], b"2");
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("two.txt".to_string(), false)]);
}

// 0x05 escapes a real leading 0xE5 byte: the entry is live, and its name
// begins with 0xE5.
#[test]
fn leading_x05_is_not_deleted() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_entry(b"\x05BC     TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("\u{e5}bc.txt".to_string(), false)]);
}

#[test]
fn volume_label_is_not_listed_or_matched() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_entry(b"MYVOLUME   ", ATTR_VOLUME_ID, 0, 0);
    builder.add_file(b"FILE    TXT", &[2], b"x");
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(names, vec![("file.txt".to_string(), false)]);

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    assert_eq!(fs.open("/myvolume"), Err(FatError::FileNotFound));
}

// Every live entry is presented exactly once, long name when its run is
// valid, 8.3 form otherwise.
#[test]
fn listing_is_complete_and_unique() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_entry(b"MYVOLUME   ", ATTR_VOLUME_ID, 0, 0);
    builder.add_root_lfn("readme.markdown", b"README  MD ");
    builder.add_root_entry(b"README  MD ", ATTR_ARCHIVE, 0, 0);
    builder.add_root_entry(b"\xe5GONE   TXT", ATTR_ARCHIVE, 0, 0);
    builder.add_root_entry(b"KERNEL  IMG", ATTR_ARCHIVE, 0, 0);
    builder.add_root_entry(b"BOOT       ", ATTR_DIRECTORY, 0, 0);
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(
        names,
        vec![
            ("readme.markdown".to_string(), false),
            ("kernel.img".to_string(), false),
            ("boot".to_string(), true),
        ]
    );
}

#[test]
fn hook_returning_true_stops_the_listing() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_root_entry(b"ONE     TXT", ATTR_ARCHIVE, 0, 0);
    builder.add_root_entry(b"TWO     TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    let mut seen = Vec::new();
    fs.dir("/", &mut |name, _| {
        seen.push(name.to_string());
        true
    })
    .expect("dir");
    assert_eq!(seen, vec!["one.txt".to_string()]);
}

#[test]
fn resolves_path_through_subdirectory() {
    let mut builder = FatImageBuilder::fat16();
    builder.chain(&[5]);
    builder.add_root_entry(b"SUB        ", ATTR_DIRECTORY, 5, 0);
    builder.write_entry_at(5, 0, b"FILE    TXT", ATTR_ARCHIVE, 6, 5);
    builder.chain(&[6]);
    builder.write_content(&[6], b"inner");
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    let mut file = fs.open("/SUB/FILE.TXT").expect("open");

    let mut buf = [0u8; 5];
    fs.read(&mut file, 0, &mut buf).expect("read");
    assert_eq!(&buf, b"inner");
}

#[test]
fn lists_subdirectory_with_trailing_slash() {
    let mut builder = FatImageBuilder::fat16();
    builder.chain(&[5]);
    builder.add_root_entry(b"SUB        ", ATTR_DIRECTORY, 5, 0);
    builder.write_entry_at(5, 0, b"FILE    TXT", ATTR_ARCHIVE, 0, 0);
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    let mut names = Vec::new();
    fs.dir("/sub/", &mut |name, is_dir| {
        names.push((name.to_string(), is_dir));
        false
    })
    .expect("dir");
    assert_eq!(names, vec![("file.txt".to_string(), false)]);
}

#[test]
fn open_on_directory_is_a_type_error() {
    let mut builder = FatImageBuilder::fat16();
    builder.chain(&[5]);
    builder.add_root_entry(b"SUB        ", ATTR_DIRECTORY, 5, 0);
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    assert_eq!(fs.open("/sub"), Err(FatError::BadFileType("not a file")));
}

#[test]
fn traversal_through_file_is_a_type_error() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_file(b"HELLO   TXT", &[2], b"hi");
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    assert_eq!(
        fs.open("/hello.txt/inner"),
        Err(FatError::BadFileType("not a directory"))
    );
}

#[test]
fn missing_file_is_not_found() {
    let mut builder = FatImageBuilder::fat16();
    builder.add_file(b"HELLO   TXT", &[2], b"hi");
    let mut disk = builder.build();

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    assert_eq!(fs.open("/nope.txt"), Err(FatError::FileNotFound));
}

// The FAT32 root directory is an ordinary cluster chain.
#[test]
fn lists_fat32_root_chain() {
    let mut builder = FatImageBuilder::fat32();
    builder.add_root_lfn("config.toml", b"CONFIG  TOM");
    builder.add_root_entry(b"CONFIG  TOM", ATTR_ARCHIVE, 0, 0);
    builder.add_file(b"IMAGE   BIN", &[3], b"bits");
    let mut disk = builder.build();

    let names = list_root(&mut disk);
    assert_eq!(
        names,
        vec![
            ("config.toml".to_string(), false),
            ("image.bin".to_string(), false),
        ]
    );

    let mut fs = FatFilesystem::mount(&mut disk).expect("mount");
    let mut buf = [0u8; 4];
    let mut file = fs.open("/image.bin").expect("open");
    fs.read(&mut file, 0, &mut buf).expect("read");
    assert_eq!(&buf, b"bits");
}
