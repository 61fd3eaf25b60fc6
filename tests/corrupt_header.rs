//! Corrupt header blocks must fail decoding as a whole - a truncated block
//! yields `CorruptHeaderBlock` on reopen, never a differently-shaped list.

use std::path::Path;

use scenevault::archive::codec::{
    encode_object_headers, encode_property_headers, encode_time_samplings, MetaDataPool,
};
use scenevault::archive::ArchiveReader;
use scenevault::container::WArchive;
use scenevault::core::{ObjectHeader, PropertyHeader, TimeSampling};
use scenevault::util::{DataType, Error};

/// Assemble a minimal archive by hand: one root object whose property
/// compound holds one (sample-less) property, with the given bytes as the
/// compound's trailing header block.
fn write_with_property_block(path: &Path, block: &[u8]) {
    let archive = WArchive::create(path).unwrap();
    let root = archive.root();

    root.add_data(&1i32.to_le_bytes()).unwrap();
    root.add_data(&100i32.to_le_bytes()).unwrap();

    let object = root.add_group().unwrap();
    let props = object.add_group().unwrap();
    props.add_group().unwrap();
    props.add_data(block).unwrap();

    root.add_data(&[]).unwrap();
    root.add_data(&encode_time_samplings(&[TimeSampling::identity()], &[0]))
        .unwrap();
    root.add_data(&[]).unwrap();

    archive.freeze().unwrap();
}

/// Same shape, but with a child object and the given bytes as the root
/// object's trailing child-header block.
fn write_with_object_block(path: &Path, block: &[u8]) {
    let archive = WArchive::create(path).unwrap();
    let root = archive.root();

    root.add_data(&1i32.to_le_bytes()).unwrap();
    root.add_data(&100i32.to_le_bytes()).unwrap();

    let object = root.add_group().unwrap();
    object.add_group().unwrap(); // reserved property compound slot
    let child = object.add_group().unwrap();
    child.add_group().unwrap(); // the child's own reserved slot
    object.add_data(block).unwrap();

    root.add_data(&[]).unwrap();
    root.add_data(&encode_time_samplings(&[TimeSampling::identity()], &[0]))
        .unwrap();
    root.add_data(&[]).unwrap();

    archive.freeze().unwrap();
}

fn property_block() -> Vec<u8> {
    let header = PropertyHeader::scalar("P", DataType::FLOAT32);
    let mut pool = MetaDataPool::new();
    encode_property_headers(std::slice::from_ref(&header), &mut pool)
}

fn object_block() -> Vec<u8> {
    let header = ObjectHeader::new("child", "/child");
    let mut pool = MetaDataPool::new();
    encode_object_headers(std::slice::from_ref(&header), &mut pool)
}

#[test]
fn intact_property_block_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intact.sv");

    write_with_property_block(&path, &property_block());

    let reader = ArchiveReader::open(&path).unwrap();
    let props = reader.root().properties();
    assert_eq!(props.num_properties(), 1);
    assert_eq!(props.property_header(0).unwrap().name, "P");
}

#[test]
fn truncated_property_block_fails_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.sv");

    let block = property_block();
    write_with_property_block(&path, &block[..block.len() - 1]);

    let err = ArchiveReader::open(&path).unwrap_err();
    assert!(matches!(err, Error::CorruptHeaderBlock(_)), "got {err:?}");
}

#[test]
fn intact_object_block_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obj_intact.sv");

    write_with_object_block(&path, &object_block());

    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.root().num_children(), 1);
    assert_eq!(reader.root().child_header(0).unwrap().name, "child");
}

#[test]
fn truncated_object_block_fails_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("obj_truncated.sv");

    let block = object_block();
    write_with_object_block(&path, &block[..block.len() - 1]);

    let err = ArchiveReader::open(&path).unwrap_err();
    assert!(matches!(err, Error::CorruptHeaderBlock(_)), "got {err:?}");
}

#[test]
fn overclaiming_block_fails_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overclaim.sv");

    // Two property records but only one sub-group slot in the compound.
    let headers = vec![
        PropertyHeader::scalar("P", DataType::FLOAT32),
        PropertyHeader::scalar("Q", DataType::FLOAT32),
    ];
    let mut pool = MetaDataPool::new();
    let block = encode_property_headers(&headers, &mut pool);
    write_with_property_block(&path, &block);

    let err = ArchiveReader::open(&path).unwrap_err();
    assert!(matches!(err, Error::CorruptHeaderBlock(_)), "got {err:?}");
}
