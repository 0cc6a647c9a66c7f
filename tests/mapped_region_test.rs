//! MappedRegion + Storage integration test
//!
//! Round trip, visibility antar duplicate, persistence ke file, dan
//! unlink-after-map.

use std::fs;
use std::io::Write;

use memshare::{Access, Error, MappedRegion, Storage, StorageConfig};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_round_trip_lengths() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();

    for data in [vec![], vec![0x42], b"Hello, Hermes!".to_vec()] {
        let region = MappedRegion::from_bytes(&data, Some(dir.path())).unwrap();
        assert_eq!(unsafe { region.bytes() }, &data[..]);
        assert_eq!(region.len(), data.len());
        region.close().unwrap();
    }
}

#[test]
fn test_empty_input_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let region = MappedRegion::from_bytes(&[], Some(dir.path())).unwrap();
    assert_eq!(region.access(), Access::Empty);
    assert!(!region.is_released());
    assert_eq!(unsafe { region.bytes() }.len(), 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    region.close().unwrap();
    assert!(region.is_released());
}

#[test]
fn test_temp_file_unlinked_but_mapping_valid() {
    let dir = tempfile::tempdir().unwrap();

    let region = MappedRegion::from_bytes(&[1, 2, 3, 4], Some(dir.path())).unwrap();

    // Entry direktori sudah hilang, mapping tetap bisa dibaca dan ditulis
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(unsafe { region.bytes() }, &[1, 2, 3, 4]);
    unsafe { region.bytes_mut().unwrap()[3] = 9 };
    assert_eq!(region.to_vec().unwrap(), vec![1, 2, 3, 9]);
    region.flush().unwrap();
    region.close().unwrap();
}

#[test]
fn test_write_visible_through_duplicate() {
    let region = MappedRegion::from_bytes(&[0x1, 0x2, 0x3, 0x4], None).unwrap();
    let region2 = region.duplicate();

    unsafe { region.bytes_mut().unwrap()[0] = 0x42 };
    region.close().unwrap();

    assert!(region.is_released());
    assert!(!region2.is_released());
    assert_eq!(unsafe { region2.bytes()[0] }, 0x42);
    region2.close().unwrap();
}

#[test]
fn test_path_mutation_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    {
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[0x1, 0x2, 0x3, 0x4]).unwrap();
    }

    let region = MappedRegion::from_path(&path, false).unwrap();
    assert_eq!(region.access(), Access::ReadWrite);
    unsafe { region.bytes_mut().unwrap()[0] = 0x42 };
    assert_eq!(unsafe { region.bytes() }, &[0x42, 0x2, 0x3, 0x4]);
    region.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), vec![0x42, 0x2, 0x3, 0x4]);
}

#[test]
fn test_read_only_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.bin");
    fs::write(&path, b"read only").unwrap();

    let region = MappedRegion::from_path(&path, true).unwrap();
    let dup = region.duplicate();
    assert!(dup.is_read_only());
    assert!(unsafe { dup.bytes_mut() }.is_none());

    region.close().unwrap();
    assert_eq!(unsafe { dup.bytes() }, b"read only");
    dup.close().unwrap();
}

#[test]
fn test_open_file_descriptor_can_close_after_map() {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"fd closed").unwrap();

    let region = MappedRegion::from_open_file(&file, true).unwrap();
    drop(file);

    assert_eq!(region.to_vec().unwrap(), b"fd closed");
    region.close().unwrap();
}

#[test]
fn test_missing_path_reports_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.bin");

    let err = MappedRegion::from_path(&path, false).unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
    assert!(err.to_string().contains("missing.bin"));
}

#[test]
#[should_panic(expected = "released resource")]
fn test_to_vec_after_release_panics() {
    let region = MappedRegion::from_bytes(b"bye", None).unwrap();
    let alias = region.alias();
    alias.close().unwrap();
    let _ = region.to_vec();
}

#[test]
fn test_storage_add() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let storage =
        Storage::with_config(StorageConfig::default().directory(dir.path()).prefix("index_"))
            .unwrap();

    let region = storage.add(b"payload").unwrap();
    let empty = storage.add(&[]).unwrap();

    assert_eq!(region.to_vec().unwrap(), b"payload");
    assert!(empty.is_sentinel());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    region.close().unwrap();
    empty.close().unwrap();
}
