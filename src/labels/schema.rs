//! JSON label file layouts.
//!
//! Accepted layouts, tried in order:
//! - `["person", "bicycle", ...]`
//! - `[{"id": 0, "label": "person"}, {"id": 1, "name": "bicycle"}, ...]`
//! - `{"labels": [...]}` or `{"names": [...]}`
//! - `{"0": "person", "1": "bicycle", ...}`

use serde::Deserialize;
use std::collections::BTreeMap;

/// Minimum table length produced from an index-keyed mapping.
pub(crate) const MAPPING_MIN_LEN: usize = 80;

/// Class ids at or above this bound are rejected as malformed.
pub(crate) const MAX_CLASS_ID: usize = 1 << 16;

#[derive(Debug, Deserialize)]
struct LabelRecord {
    id: Option<usize>,
    label: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Wrapped {
    #[serde(alias = "names")]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelFile {
    Names(Vec<String>),
    Records(Vec<LabelRecord>),
    Wrapped(Wrapped),
    Mapping(BTreeMap<String, serde_json::Value>),
}

/// Parses label file text into an ordered name list.
pub(crate) fn parse_labels(text: &str) -> Result<Vec<String>, String> {
    let file: LabelFile = serde_json::from_str(text)
        .map_err(|err| format!("unrecognized label layout: {err}"))?;
    let names = match file {
        LabelFile::Names(names) => names,
        LabelFile::Wrapped(wrapped) => wrapped.labels,
        LabelFile::Records(records) => from_records(records)?,
        LabelFile::Mapping(map) => from_mapping(map)?,
    };
    if names.is_empty() {
        return Err("label file holds no names".to_string());
    }
    Ok(names)
}

fn check_id(id: usize) -> Result<usize, String> {
    if id >= MAX_CLASS_ID {
        return Err(format!("class id {id} exceeds {MAX_CLASS_ID}"));
    }
    Ok(id)
}

fn from_records(records: Vec<LabelRecord>) -> Result<Vec<String>, String> {
    let mut slots: Vec<Option<String>> = Vec::with_capacity(records.len());
    for record in records {
        let id = check_id(record.id.unwrap_or(slots.len()))?;
        let name = record
            .label
            .or(record.name)
            .unwrap_or_else(|| format!("class_{id}"));
        if id >= slots.len() {
            slots.resize(id + 1, None);
        }
        slots[id] = Some(name);
    }
    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.unwrap_or_else(|| format!("unknown_class_{id}")))
        .collect())
}

fn from_mapping(map: BTreeMap<String, serde_json::Value>) -> Result<Vec<String>, String> {
    // Keys that are not class indices and non-string values are metadata.
    let mut by_index = BTreeMap::new();
    for (key, value) in map {
        let Ok(idx) = key.trim().parse::<usize>() else {
            continue;
        };
        if let serde_json::Value::String(name) = value {
            by_index.insert(check_id(idx)?, name);
        }
    }
    if by_index.is_empty() {
        return Err("label mapping has no index keys".to_string());
    }
    let len = by_index
        .keys()
        .next_back()
        .map_or(0, |max| max + 1)
        .max(MAPPING_MIN_LEN);
    Ok((0..len)
        .map(|idx| {
            by_index
                .remove(&idx)
                .unwrap_or_else(|| format!("class_{idx}"))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_list() {
        let names = parse_labels(r#"["person", "bicycle"]"#).unwrap();
        assert_eq!(names, vec!["person", "bicycle"]);
    }

    #[test]
    fn records_fill_sparse_ids() {
        let names = parse_labels(
            r#"[{"id": 0, "label": "person"}, {"id": 3, "name": "car"}, {"id": 1}]"#,
        )
        .unwrap();
        assert_eq!(names, vec!["person", "class_1", "unknown_class_2", "car"]);
    }

    #[test]
    fn records_without_ids_append() {
        let names = parse_labels(r#"[{"label": "a"}, {"name": "b"}]"#).unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn wrapped_lists() {
        assert_eq!(
            parse_labels(r#"{"names": ["x", "y"]}"#).unwrap(),
            vec!["x", "y"]
        );
        assert_eq!(parse_labels(r#"{"labels": ["z"]}"#).unwrap(), vec!["z"]);
    }

    #[test]
    fn mapping_pads_to_minimum_length() {
        let names = parse_labels(r#"{"0": "person", "2": "car"}"#).unwrap();
        assert_eq!(names.len(), MAPPING_MIN_LEN);
        assert_eq!(names[0], "person");
        assert_eq!(names[1], "class_1");
        assert_eq!(names[2], "car");

        let names = parse_labels(r#"{"90": "toothbrush"}"#).unwrap();
        assert_eq!(names.len(), 91);
    }

    #[test]
    fn mapping_skips_non_index_entries() {
        let names = parse_labels(r#"{"0": "widget", "1": "gadget", "version": "2"}"#).unwrap();
        assert_eq!(names[0], "widget");
        assert_eq!(names[1], "gadget");
        let names = parse_labels(r#"{"0": "widget", "nc": 1, "1": 7}"#).unwrap();
        assert_eq!(names[0], "widget");
        assert_eq!(names[1], "class_1");
    }

    #[test]
    fn malformed_inputs_are_errors() {
        assert!(parse_labels("not json").is_err());
        assert!(parse_labels("[]").is_err());
        assert!(parse_labels(r#"{"zero": "person"}"#).is_err());
        assert!(parse_labels(r#"{"0": 1, "nc": "x"}"#).is_err());
        assert!(parse_labels("42").is_err());
        assert!(parse_labels(r#"[{"id": 4294967295, "label": "huge"}]"#).is_err());
    }
}
