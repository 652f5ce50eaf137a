mod common;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use common::local_file;
use stowage::{LocalDisk, StorageBackend, StorageError, StorageKind, ValueStorage};

fn open_disk() -> (TempDir, LocalDisk) {
    let root = tempfile::tempdir().unwrap();
    let disk = LocalDisk::new(root.path().to_str().unwrap());
    assert!(disk.initialized());
    (root, disk)
}

#[test]
fn test_init() {
    assert!(!LocalDisk::new("/this/folder/does/not/exist").initialized());
    assert!(!LocalDisk::new("this/folder/does/not/exist").initialized());

    let (_root, disk) = open_disk();
    assert_eq!(disk.get_type().unwrap(), StorageKind::Disk);
    assert_eq!(disk.pwd().unwrap(), "/");
}

#[test]
fn test_uninitialized_operations_fail() {
    let mut disk = LocalDisk::new("/this/folder/does/not/exist");
    assert!(matches!(disk.get_type(), Err(StorageError::NotReady)));
    assert!(matches!(disk.pwd(), Err(StorageError::NotReady)));
    assert!(matches!(disk.navigate("/"), Err(StorageError::NotReady)));
    assert!(matches!(disk.make_dir("a"), Err(StorageError::NotReady)));
    assert!(matches!(disk.upload_value(&1u8, "v"), Err(StorageError::NotReady)));
}

#[test]
fn test_make_dir() {
    let (root, disk) = open_disk();
    let base = root.path().join("folder_1234");

    disk.make_dir("folder_1234").unwrap();
    assert!(base.is_dir());
    disk.make_dir("folder_1234/tmp1").unwrap();
    assert!(base.join("tmp1").is_dir());
    disk.make_dir("/folder_1234/tmp2").unwrap();
    assert!(base.join("tmp2").is_dir());
    assert_eq!(disk.list("folder_1234").unwrap(), vec!["tmp1", "tmp2"]);

    let mtime = fs::metadata(base.join("tmp2")).unwrap().modified().unwrap();
    assert!(disk.make_dir("folder_1234/tmp2").unwrap_err().is_already_exists());
    assert_eq!(
        fs::metadata(base.join("tmp2")).unwrap().modified().unwrap(),
        mtime
    );

    disk.make_dir("folder_1234/tmp/tmp3").unwrap();
    assert!(base.join("tmp/tmp3").is_dir());
}

#[test]
fn test_make_dir_sanitizes_name() {
    let (root, disk) = open_disk();
    disk.make_dir("we!rd fol$der").unwrap();
    assert!(root.path().join("weirdfolder").is_dir());
}

#[test]
fn test_navigate_pwd_and_value_roundtrip() {
    let (root, mut disk) = open_disk();

    disk.make_dir("level1/level2").unwrap();
    assert!(root.path().join("level1").is_dir());
    assert!(root.path().join("level1/level2").is_dir());

    disk.navigate("level1").unwrap();
    assert_eq!(disk.pwd().unwrap(), "/level1");

    disk.upload_value(&1102u32, "v1").unwrap();
    assert!(root.path().join("v1").is_file());
    assert_eq!(disk.download_value::<u32>("/v1").unwrap(), 1102);
}

#[test]
fn test_navigate_stays_inside_root() {
    let (_root, mut disk) = open_disk();
    disk.make_dir("/level1/level2/level3").unwrap();

    disk.navigate("/level1/level2/level3").unwrap();
    assert_eq!(disk.pwd().unwrap(), "/level1/level2/level3");
    disk.navigate("..").unwrap();
    assert_eq!(disk.pwd().unwrap(), "/level1/level2");
    disk.navigate("../..").unwrap();
    assert_eq!(disk.pwd().unwrap(), "/");

    assert!(matches!(disk.navigate("../.."), Err(StorageError::Path(_))));
    assert_eq!(disk.pwd().unwrap(), "/");

    assert!(disk.navigate("missing").unwrap_err().is_not_found());
    assert_eq!(disk.pwd().unwrap(), "/");
}

#[test]
fn test_upload_download() {
    let (_root, mut disk) = open_disk();
    let local = tempfile::tempdir().unwrap();
    let level0 = local_file(local.path(), "level0.txt", b"hello");
    let level1 = local_file(local.path(), "level1.txt", b"");

    disk.make_dir("uploaded").unwrap();
    disk.upload(&level0, "/uploaded/uploaded_level0.txt").unwrap();
    disk.upload(&level1, "uploaded/uploaded_level1.txt").unwrap();
    assert!(
        disk.upload(&level1, "uploaded/uploaded_level1.txt")
            .unwrap_err()
            .is_already_exists()
    );
    assert!(
        disk.upload(Path::new("/no/such/file"), "uploaded/x.txt")
            .unwrap_err()
            .is_not_found()
    );

    disk.navigate("uploaded").unwrap();
    assert_eq!(
        disk.list("").unwrap(),
        vec!["uploaded_level0.txt", "uploaded_level1.txt"]
    );

    let target = local.path().join("downloaded.txt");
    disk.download("/uploaded/uploaded_level0.txt", &target).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"hello");
    assert!(
        disk.download("/uploaded/uploaded_level0.txt", &target)
            .unwrap_err()
            .is_already_exists()
    );
}

#[test]
fn test_size_and_remove() {
    let (_root, disk) = open_disk();
    let local = tempfile::tempdir().unwrap();

    disk.make_dir("folder").unwrap();
    assert_eq!(disk.size("folder").unwrap(), 0);

    let text = local_file(local.path(), "text.txt", b"ciao");
    disk.upload(&text, "folder/text.txt").unwrap();
    assert_eq!(disk.size("/folder/text.txt").unwrap(), 4);
    assert_eq!(disk.size("folder").unwrap(), 4);

    disk.remove("folder/text.txt").unwrap();
    assert!(!disk.exists("folder/text.txt").unwrap());
    assert!(disk.remove("folder/text.txt").unwrap_err().is_not_found());
    assert!(disk.size("folder/text.txt").unwrap_err().is_not_found());

    disk.remove("folder").unwrap();
    assert!(!disk.exists("folder").unwrap());
    assert!(matches!(disk.remove(""), Err(StorageError::Path(_))));
}

#[test]
fn test_rename() {
    let (_root, mut disk) = open_disk();
    disk.make_dir("folder1/folder2").unwrap();
    disk.upload_bytes(b"ciao", "/ciao").unwrap();
    disk.upload_bytes(b"ciao", "/folder1/folder2/ciao2").unwrap();
    let before = disk.size("folder1").unwrap();

    disk.rename("ciao", "ciao_renamed").unwrap();
    assert!(disk.exists("ciao_renamed").unwrap());
    assert!(!disk.exists("ciao").unwrap());

    disk.rename("folder1", "folder1_renamed").unwrap();
    assert!(!disk.exists("folder1").unwrap());
    assert_eq!(disk.size("folder1_renamed").unwrap(), before);

    disk.rename("/folder1_renamed/folder2", "/folder1_renamed/folder2_renamed")
        .unwrap();
    assert!(disk.exists("/folder1_renamed/folder2_renamed/ciao2").unwrap());

    disk.navigate("folder1_renamed").unwrap();
    disk.rename("folder2_renamed", "/folder1_renamed/folder2_again")
        .unwrap();
    assert!(disk.exists("folder2_again/ciao2").unwrap());
}

#[test]
fn test_rename_across_folders() {
    let (_root, disk) = open_disk();
    disk.make_dir("a").unwrap();
    disk.make_dir("b").unwrap();
    disk.upload_bytes(b"x", "/a/f").unwrap();

    disk.rename("/a/f", "/b/g").unwrap();
    assert!(!disk.exists("/a/f").unwrap());
    assert_eq!(disk.download_bytes("/b/g").unwrap(), b"x");

    disk.rename("/b", "/a/b_renamed").unwrap();
    assert!(disk.exists("/a/b_renamed/g").unwrap());
    assert!(!disk.exists("/b").unwrap());
}

#[test]
fn test_move_and_copy() {
    let (_root, disk) = open_disk();
    disk.make_dir("folder1/folder2").unwrap();
    disk.make_dir("target").unwrap();
    disk.upload_bytes(b"ciao", "/folder1/ciao1").unwrap();
    disk.upload_bytes(b"ciao", "/folder1/folder2/ciao2").unwrap();
    let size = disk.size("folder1").unwrap();

    disk.copy("folder1", "/folder1_copied").unwrap();
    assert!(disk.exists("folder1").unwrap());
    assert_eq!(disk.size("folder1_copied").unwrap(), size);
    assert!(disk.copy("folder1", "/folder1_copied").unwrap_err().is_already_exists());
    assert!(matches!(
        disk.copy("folder1", "/folder1/folder2/inner"),
        Err(StorageError::Path(_))
    ));

    disk.move_path("folder1", "/target/folder1_moved").unwrap();
    assert!(!disk.exists("folder1").unwrap());
    assert_eq!(disk.size("target/folder1_moved").unwrap(), size);
    assert!(disk.exists("/target/folder1_moved/folder2/ciao2").unwrap());

    assert!(disk.move_path("missing", "/target/x").unwrap_err().is_not_found());
    assert!(matches!(disk.move_path("", "/x"), Err(StorageError::Path(_))));
}

#[test]
fn test_append() {
    let (_root, disk) = open_disk();
    disk.upload_bytes(b"ciao", "/c").unwrap();
    disk.append("/c", b"ciao").unwrap();
    disk.append("/c", b"ciao").unwrap();
    assert_eq!(disk.download_bytes("/c").unwrap(), b"ciaociaociao");

    assert!(disk.append("/nope", b"ciao").unwrap_err().is_not_found());
    assert!(!disk.exists("nope").unwrap());
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    id: u64,
    name: String,
    tags: Vec<String>,
}

#[test]
fn test_value_roundtrips() {
    let (_root, disk) = open_disk();

    disk.upload_value(&-42i64, "/int").unwrap();
    disk.upload_value(&"ciao".to_string(), "/text").unwrap();
    let sample = Sample {
        id: 7,
        name: "sample".into(),
        tags: vec!["a".into(), "b".into()],
    };
    disk.upload_value(&sample, "/sample").unwrap();

    assert_eq!(disk.download_value::<i64>("/int").unwrap(), -42);
    assert_eq!(disk.download_value::<String>("/text").unwrap(), "ciao");
    assert_eq!(disk.download_value::<Sample>("/sample").unwrap(), sample);

    assert!(disk.upload_value(&1u8, "/int").unwrap_err().is_already_exists());
    assert!(disk.download_value::<u8>("/missing").unwrap_err().is_not_found());
}

#[test]
fn test_paths_cannot_escape_root() {
    let (root, disk) = open_disk();
    let outside = root.path().parent().unwrap();

    assert!(matches!(disk.list("/.."), Err(StorageError::Path(_))));
    assert!(matches!(disk.exists("../.."), Err(StorageError::Path(_))));
    assert!(matches!(disk.size("/../.."), Err(StorageError::Path(_))));

    // dots in the folder part are stripped, so the file lands inside the root
    disk.upload_bytes(b"x", "../escaped").unwrap();
    assert!(root.path().join("escaped").is_file());
    assert!(!outside.join("escaped").exists());
}
