use detdecode::{
    LabelCache, LabelNaming, LabelOrigin, LabelSource, LabelTable, Pipeline, PipelineConfig,
    TensorDescriptor, TensorShape,
};
use std::fs;
use std::path::PathBuf;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("detdecode-labels-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn plain_name_list() {
    let path = write_temp("list.json", r#"["cat", "dog", "hot dog"]"#);
    let table = LabelTable::from_json_file(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.resolve(2, LabelNaming::Dotted), "hot.dog");
    assert_eq!(table.resolve(3, LabelNaming::Dotted), "class.3");
}

#[test]
fn id_records_fill_gaps() {
    let path = write_temp(
        "records.json",
        r#"[{"id": 0, "label": "person"}, {"id": 2, "name": "car"}]"#,
    );
    let table = LabelTable::from_json_file(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0), Some("person"));
    assert_eq!(table.get(1), Some("unknown_class_1"));
    assert_eq!(table.get(2), Some("car"));
}

#[test]
fn wrapped_and_mapping_layouts() {
    let wrapped = write_temp("wrapped.json", r#"{"names": ["a", "b"]}"#);
    assert_eq!(LabelTable::from_json_file(&wrapped).unwrap().len(), 2);

    let mapping = write_temp("mapping.json", r#"{"0": "person", "5": "bus"}"#);
    let table = LabelTable::from_json_file(&mapping).unwrap();
    assert_eq!(table.len(), 80);
    assert_eq!(table.get(5), Some("bus"));
    assert_eq!(table.get(1), Some("class_1"));
}

#[test]
fn mapping_metadata_keys_are_ignored() {
    for (name, text) in [
        ("meta-version.json", r#"{"0": "widget", "1": "gadget", "version": "2"}"#),
        ("meta-count.json", r#"{"0": "widget", "nc": 1}"#),
    ] {
        let cache = LabelCache::new(LabelSource::Path(write_temp(name, text)));
        assert_eq!(cache.origin(), LabelOrigin::File, "{name}");
        assert_eq!(cache.resolve(0, LabelNaming::Raw), "widget", "{name}");
    }
}

#[test]
fn first_load_is_shared_across_threads() {
    let path = write_temp("threads.json", r#"["alpha", "beta"]"#);
    let cache = LabelCache::new(LabelSource::Path(path));
    assert!(!cache.is_loaded());

    let tables: Vec<(usize, LabelOrigin)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let table = cache.table();
                    (table as *const LabelTable as usize, cache.origin())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = tables[0];
    assert!(tables.iter().all(|&entry| entry == first));
    assert_eq!(first.1, LabelOrigin::File);
    assert_eq!(first.0, cache.table() as *const LabelTable as usize);
    assert_eq!(cache.resolve(1, LabelNaming::Raw), "beta");
}

#[test]
fn malformed_files_report_label_errors() {
    let path = write_temp("broken.json", "{ not json");
    let err = LabelTable::from_json_file(&path).unwrap_err();
    assert_eq!(err.kind(), detdecode::ErrorKind::LabelLoad);
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn cache_loads_file_once_and_reloads_after_invalidate() {
    let path = write_temp("reload.json", r#"["first"]"#);
    let mut cache = LabelCache::new(LabelSource::Path(path.clone()));
    assert_eq!(cache.resolve(0, LabelNaming::Raw), "first");
    assert_eq!(cache.origin(), LabelOrigin::File);

    fs::write(&path, r#"["second"]"#).unwrap();
    assert_eq!(cache.resolve(0, LabelNaming::Raw), "first");

    cache.invalidate();
    assert_eq!(cache.resolve(0, LabelNaming::Raw), "second");
}

#[test]
fn empty_file_falls_back_to_builtin() {
    let path = write_temp("empty.json", "[]");
    let cache = LabelCache::new(LabelSource::Path(path));
    assert_eq!(cache.origin(), LabelOrigin::Fallback);
    assert_eq!(cache.resolve(0, LabelNaming::Dotted), "person");
}

#[test]
fn pipeline_uses_configured_label_file() {
    let path = write_temp("pipeline.json", r#"["widget", "gadget"]"#);
    let cfg = PipelineConfig {
        label_source: LabelSource::Path(path),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(cfg).unwrap();
    assert_eq!(pipeline.labels().origin(), LabelOrigin::File);

    let mut data = vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1, 0.2, 0.95];
    data.extend_from_slice(&[0.5, 0.5, 0.2, 0.2, 0.0, 0.0, 0.0, 0.0]);
    let shape = TensorShape::new(1, 2, 8).unwrap();
    let record = pipeline.process(&TensorDescriptor::from_f32(&data, shape));
    let det = &record.detections()[0];
    assert_eq!(det.class_id, 2);
    assert_eq!(det.class_name, "class.2");
}
