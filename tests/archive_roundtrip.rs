//! End-to-end write -> reopen coverage of the persistence layer.

use std::path::PathBuf;
use std::sync::Arc;

use scenevault::archive::{ArchiveReader, ArchiveWriter};
use scenevault::core::{MetaData, TimeSampling};
use scenevault::util::{DataType, Error};

fn archive_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Route crate tracing to the test harness; RUST_LOG selects verbosity.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn single_scalar_property_scenario() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "scalar.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let props = writer.root().properties();
        let p = props
            .create_scalar_property("P", MetaData::new(), DataType::FLOAT32, 0)
            .unwrap();
        p.set_sample_value(&1.5f32).unwrap();
        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let root = reader.root();
    assert_eq!(root.num_children(), 0);

    let props = root.properties();
    assert_eq!(props.num_properties(), 1);

    let header = props.property_header(0).unwrap();
    assert_eq!(header.name, "P");
    assert_eq!(header.data_type, DataType::FLOAT32);
    assert_eq!(header.time_sampling_index, 0);
    assert_eq!(header.next_sample_index, 1);

    assert!(props.property_header_by_name("Q").is_none());
    assert!(props.get_property("Q").is_none());
    assert!(props.property_by_name("Q", 0).unwrap().is_none());

    let p = props.property_by_name("P", 0).unwrap().unwrap();
    let scalar = p.as_scalar().expect("P is scalar");
    assert_eq!(scalar.num_samples(), 1);
    assert_eq!(scalar.sample_value::<f32>(0).unwrap(), 1.5);
}

#[test]
fn creation_order_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "order.sv");

    let object_names = ["zebra", "alpha", "monkey", "bird"];
    let property_names = ["w", "a", "q", "b"];

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        for name in object_names {
            writer.root().create_child(name, MetaData::new()).unwrap();
        }
        let props = writer.root().properties();
        for name in property_names {
            props
                .create_scalar_property(name, MetaData::new(), DataType::INT32, 0)
                .unwrap();
        }
        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let root = reader.root();

    assert_eq!(root.num_children(), object_names.len());
    for (i, name) in object_names.iter().enumerate() {
        assert_eq!(root.child_header(i).unwrap().name, *name);
        assert_eq!(root.child(i, 0).unwrap().name(), *name);
    }

    let props = root.properties();
    assert_eq!(props.num_properties(), property_names.len());
    for (i, name) in property_names.iter().enumerate() {
        assert_eq!(props.property_header(i).unwrap().name, *name);
    }
}

#[test]
fn duplicate_names_rejected_first_child_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "dup.sv");

    let writer = ArchiveWriter::create(&path).unwrap();
    let root = writer.root();

    root.create_child("twin", MetaData::new()).unwrap();
    let err = root.create_child("twin", MetaData::new()).unwrap_err();
    assert!(matches!(err, Error::DuplicateName(name) if name == "twin"));
    assert_eq!(root.num_children(), 1);
    assert!(root.get_child("twin").is_some());

    let props = root.properties();
    props
        .create_scalar_property("p", MetaData::new(), DataType::FLOAT32, 0)
        .unwrap();
    let err = props
        .create_compound_property("p", MetaData::new())
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateName(_)));
    assert_eq!(props.num_properties(), 1);
    assert!(props.get_property("p").is_some());

    writer.close().unwrap();
}

#[test]
fn invalid_data_type_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "badtype.sv");

    let writer = ArchiveWriter::create(&path).unwrap();
    let props = writer.root().properties();

    let err = props
        .create_scalar_property("bad", MetaData::new(), DataType::UNKNOWN, 0)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDataType(_)));

    let zero_extent = DataType::new(scenevault::ElementKind::Float32, 0);
    let err = props
        .create_array_property("bad", MetaData::new(), zero_extent, 0)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDataType(_)));

    let err = props
        .create_scalar_property("orphan", MetaData::new(), DataType::FLOAT32, 42)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTimeSamplingIndex { index: 42, .. }));

    assert_eq!(props.num_properties(), 0);
    writer.close().unwrap();
}

#[test]
fn lazy_children_share_instances_while_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "lazy.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let child = writer.root().create_child("geo", MetaData::new()).unwrap();
        child
            .properties()
            .create_scalar_property("p", MetaData::new(), DataType::FLOAT32, 0)
            .unwrap();
        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let root = reader.root();

    let a = root.child_by_name("geo", 0).unwrap().unwrap();
    let b = root.child_by_name("geo", 0).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &root.child(0, 0).unwrap()));

    let header_before = a.header().clone();
    drop(a);
    drop(b);

    // With every handle released the cache entry is dead; the next access
    // rebuilds a node with identical decoded content.
    let fresh = root.child_by_name("geo", 0).unwrap().unwrap();
    assert_eq!(*fresh.header(), header_before);
    assert_eq!(fresh.properties().num_properties(), 1);

    // The top compound is cached the same way.
    let p1 = fresh.properties();
    let p2 = fresh.properties();
    assert!(Arc::ptr_eq(&p1, &p2));

    // And so are materialized property readers.
    let r1 = p1.property(0, 0).unwrap();
    let r2 = p1.property_by_name("p", 0).unwrap().unwrap();
    assert!(Arc::ptr_eq(&r1, &r2));
    assert!(Arc::ptr_eq(&r1, &p1.get_property("p").unwrap()));
    drop(r2);
    drop(r1);
    assert!(p1.get_property("p").is_none());
}

#[test]
fn header_index_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "bounds.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        writer.root().create_child("only", MetaData::new()).unwrap();
        writer
            .root()
            .properties()
            .create_scalar_property("single", MetaData::new(), DataType::FLOAT32, 0)
            .unwrap();
        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let root = reader.root();

    assert_eq!(root.child_header(0).unwrap().name, "only");
    assert!(matches!(
        root.child_header(1),
        Err(Error::OutOfRange { index: 1, count: 1 })
    ));
    assert!(matches!(root.child(1, 0), Err(Error::OutOfRange { .. })));

    let props = root.properties();
    assert_eq!(props.property_header(0).unwrap().name, "single");
    assert!(matches!(
        props.property_header(1),
        Err(Error::OutOfRange { index: 1, count: 1 })
    ));
}

#[test]
fn sample_bookkeeping_roundtrip() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "samples.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let props = writer.root().properties();

        // All samples identical: one stored payload, constant bookkeeping.
        let constant = props
            .create_scalar_property("constant", MetaData::new(), DataType::FLOAT64, 0)
            .unwrap();
        for _ in 0..5 {
            constant.set_sample_value(&2.25f64).unwrap();
        }

        // Interior repeat plus trailing repeat.
        let varying = props
            .create_scalar_property("varying", MetaData::new(), DataType::INT32, 0)
            .unwrap();
        for value in [10i32, 10, 20, 30, 30] {
            varying.set_sample_value(&value).unwrap();
        }

        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let props = reader.root().properties();

    let constant = props.property_by_name("constant", 0).unwrap().unwrap();
    let constant = constant.as_scalar().unwrap();
    assert_eq!(constant.num_samples(), 5);
    assert!(constant.is_constant());
    for i in 0..5 {
        assert_eq!(constant.sample_value::<f64>(i).unwrap(), 2.25);
    }
    assert!(matches!(
        constant.sample_value::<f64>(5),
        Err(Error::SampleOutOfBounds { index: 5, count: 5 })
    ));

    let varying = props.property_by_name("varying", 0).unwrap().unwrap();
    let varying = varying.as_scalar().unwrap();
    assert_eq!(varying.num_samples(), 5);
    assert!(!varying.is_constant());
    let header = varying.header();
    assert_eq!(header.first_changed_index, 2);
    assert_eq!(header.last_changed_index, 3);
    let read: Vec<i32> = (0..5)
        .map(|i| varying.sample_value::<i32>(i).unwrap())
        .collect();
    assert_eq!(read, vec![10, 10, 20, 30, 30]);
}

#[test]
fn array_samples_and_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "arrays.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let props = writer.root().properties();

        let lengths = props
            .create_array_property("lengths", MetaData::new(), DataType::FLOAT32, 0)
            .unwrap();
        lengths.set_sample_slice(&[1.0f32, 2.0, 3.0]).unwrap();
        lengths.set_sample_slice(&[4.0f32]).unwrap();

        let grid = props
            .create_array_property("grid", MetaData::new(), DataType::INT32, 0)
            .unwrap();
        let cells: Vec<i32> = (0..6).collect();
        grid.set_sample(bytemuck::cast_slice(&cells), &[2, 3]).unwrap();

        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let props = reader.root().properties();

    let lengths = props.property_by_name("lengths", 0).unwrap().unwrap();
    let lengths = lengths.as_array().unwrap();
    assert_eq!(lengths.num_samples(), 2);
    assert_eq!(lengths.sample_dimensions(0).unwrap(), vec![3]);
    assert_eq!(lengths.sample_len(1).unwrap(), 1);
    assert_eq!(lengths.sample_slice::<f32>(0).unwrap(), vec![1.0, 2.0, 3.0]);
    assert_eq!(lengths.sample_slice::<f32>(1).unwrap(), vec![4.0]);

    let header = lengths.header();
    assert!(!header.is_homogenous);
    assert!(!header.is_scalar_like);

    let grid = props.property_by_name("grid", 0).unwrap().unwrap();
    let grid = grid.as_array().unwrap();
    assert_eq!(grid.sample_dimensions(0).unwrap(), vec![2, 3]);
    assert_eq!(grid.sample_len(0).unwrap(), 6);
    assert_eq!(grid.sample_slice::<i32>(0).unwrap(), (0..6).collect::<Vec<_>>());
}

#[test]
fn nested_compounds_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "nested.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let shape = writer.root().create_child("shape", MetaData::new()).unwrap();

        let mut geom_meta = MetaData::new();
        geom_meta.set("interpretation", "geometry");
        let geom = shape
            .properties()
            .create_compound_property(".geom", geom_meta.clone())
            .unwrap();
        geom.create_scalar_property("extent", MetaData::new(), DataType::BOX3F, 0)
            .unwrap()
            .set_sample_value(&[0.0f32, 0.0, 0.0, 1.0, 1.0, 1.0])
            .unwrap();
        let empty = geom.create_compound_property(".user", MetaData::new()).unwrap();
        assert_eq!(empty.num_properties(), 0);

        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    let shape = reader.root().child_by_name("shape", 0).unwrap().unwrap();
    let props = shape.properties();
    assert_eq!(props.num_properties(), 1);

    let geom = props.property_by_name(".geom", 0).unwrap().unwrap();
    let geom = geom.as_compound().unwrap();
    assert_eq!(geom.header().meta_data.get("interpretation"), Some("geometry"));
    assert_eq!(geom.num_properties(), 2);

    let extent = geom.property(0, 0).unwrap();
    let extent = extent.as_scalar().unwrap();
    assert_eq!(
        extent.sample_value::<[f32; 6]>(0).unwrap(),
        [0.0, 0.0, 0.0, 1.0, 1.0, 1.0]
    );

    let user = geom.property_by_name(".user", 0).unwrap().unwrap();
    assert_eq!(user.as_compound().unwrap().num_properties(), 0);
}

#[test]
fn time_sampling_table_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "sampling.sv");

    let per_frame = TimeSampling::uniform(1.0 / 24.0, 0.0);
    let irregular = TimeSampling::acyclic(vec![0.0, 0.1, 0.7]);

    {
        let writer = ArchiveWriter::create(&path).unwrap();

        let frame_idx = writer.add_time_sampling(per_frame.clone());
        assert_eq!(frame_idx, 1);
        assert_eq!(writer.add_time_sampling(per_frame.clone()), 1);
        let irregular_idx = writer.add_time_sampling(irregular.clone());
        assert_eq!(irregular_idx, 2);

        let p = writer
            .root()
            .properties()
            .create_scalar_property("anim", MetaData::new(), DataType::FLOAT32, frame_idx)
            .unwrap();
        for i in 0..3 {
            p.set_sample_value(&(i as f32)).unwrap();
        }

        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.num_time_samplings(), 3);
    assert!(reader.time_sampling(0).unwrap().is_identity());
    assert_eq!(*reader.time_sampling(1).unwrap(), per_frame);
    assert_eq!(*reader.time_sampling(2).unwrap(), irregular);
    assert!(matches!(
        reader.time_sampling(3),
        Err(Error::UnknownTimeSamplingIndex { index: 3, count: 3 })
    ));
    assert_eq!(reader.max_num_samples_for(1), Some(3));

    let anim = reader
        .root()
        .properties()
        .property_by_name("anim", 0)
        .unwrap()
        .unwrap();
    let anim = anim.as_scalar().unwrap();
    assert_eq!(anim.header().time_sampling_index, 1);
    assert!((anim.time_sampling().sample_time(2) - 2.0 / 24.0).abs() < 1e-12);
}

#[test]
fn deep_paths_and_find_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "paths.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let a = writer.root().create_child("a", MetaData::new()).unwrap();
        let b = a.create_child("b", MetaData::new()).unwrap();
        b.create_child("c", MetaData::new()).unwrap();
        writer.close().unwrap();
    }

    let reader = ArchiveReader::open(&path).unwrap();

    let c = reader.find_object("/a/b/c", 0).unwrap().unwrap();
    assert_eq!(c.full_name(), "/a/b/c");
    assert_eq!(c.num_children(), 0);

    assert!(reader.find_object("/a/missing", 0).unwrap().is_none());
    assert_eq!(reader.find_object("/", 0).unwrap().unwrap().full_name(), "/");
}

#[test]
fn creation_after_finalize_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "frozen.sv");

    let writer = ArchiveWriter::create(&path).unwrap();
    let root = writer.root().clone();
    let props = root.properties();
    props
        .create_scalar_property("early", MetaData::new(), DataType::FLOAT32, 0)
        .unwrap();

    root.write_headers().unwrap();

    assert!(matches!(
        props.create_scalar_property("late", MetaData::new(), DataType::FLOAT32, 0),
        Err(Error::Frozen)
    ));
    assert!(matches!(
        root.create_child("late", MetaData::new()),
        Err(Error::Frozen)
    ));

    writer.close().unwrap();

    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.root().properties().num_properties(), 1);
}

#[test]
fn buffered_reads_honor_thread_hints() {
    let dir = tempfile::tempdir().unwrap();
    let path = archive_path(&dir, "hints.sv");

    {
        let writer = ArchiveWriter::create(&path).unwrap();
        let p = writer
            .root()
            .properties()
            .create_scalar_property("v", MetaData::new(), DataType::INT64, 0)
            .unwrap();
        for i in 0..4i64 {
            p.set_sample_value(&i).unwrap();
        }
        writer.close().unwrap();
    }

    // No mmap: every read routes through the pooled handles.
    let reader = ArchiveReader::open_opts(&path, false, 2).unwrap();
    let props = reader.root().properties();
    for hint in [0usize, 1, 7] {
        let v = props.property_by_name("v", hint).unwrap().unwrap();
        let v = v.as_scalar().unwrap();
        assert_eq!(v.sample_value::<i64>(3).unwrap(), 3);
    }
}
