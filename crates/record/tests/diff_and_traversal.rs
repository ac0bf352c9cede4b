//! Integration tests for the record engine:
//! - Diff reflexivity and symmetry over nested records
//! - Async traversal order and control signals
//! - Batch writes through `write_paths`

use futures::executor::block_on;
use pretty_assertions::assert_eq;
use serde_json::json;

use record::{
    diff_paths, for_each_path, for_each_path_async, walk, walk_async, write_paths, Control,
    FieldPath, PathKey, Value, Visit,
};

fn profile() -> Value {
    Value::from(json!({
        "name": "Ada",
        "score": null,
        "tags": [{"id": 1, "label": "a"}, {"id": 2, "label": "b"}],
        "address": {"city": "Oslo", "zip": "0150"}
    }))
}

fn sorted(mut paths: Vec<FieldPath>) -> Vec<FieldPath> {
    paths.sort();
    paths
}

#[test]
fn diff_of_a_record_with_itself_is_empty() {
    let record = profile();
    assert!(diff_paths(&record, &record).is_empty());
    assert!(diff_paths(&record, &record.clone()).is_empty());

    let mut nan = Value::from(json!({"n": 1}));
    record::write_at(&mut nan, &FieldPath::parse("n"), Value::Number(f64::NAN));
    assert!(diff_paths(&nan, &nan.clone()).is_empty());
}

#[test]
fn diff_is_symmetric_as_a_set() {
    let old = profile();
    let new = Value::from(json!({
        "name": "Grace",
        "tags": [{"id": 1, "label": "a"}],
        "address": {"city": "Oslo", "zip": "0151", "street": "Main"}
    }));

    let forward = sorted(diff_paths(&new, &old));
    let backward = sorted(diff_paths(&old, &new));
    assert_eq!(forward, backward);
    assert_eq!(
        forward,
        sorted(vec![
            FieldPath::parse("name"),
            FieldPath::parse("score"),
            FieldPath::parse("tags.1.id"),
            FieldPath::parse("tags.1.label"),
            FieldPath::parse("address.zip"),
            FieldPath::parse("address.street"),
        ])
    );
}

#[test]
fn every_traversed_node_resolves_back_through_walk() {
    let record = profile();
    for_each_path(&record, |node| {
        let resolved = walk(&record, &node.path).expect("path resolves");
        assert_eq!(resolved.value, node.value);
        assert_eq!(resolved.key, node.key);
        Control::Continue
    });
}

#[test]
fn async_traversal_is_pre_order() {
    let record = profile();
    let mut seen = Vec::new();
    let result = block_on(for_each_path_async(&record, |node| {
        seen.push(node.path.to_string());
        async { Control::Continue }
    }));
    assert_eq!(result, Control::Continue);
    assert_eq!(
        seen,
        vec![
            "name",
            "score",
            "tags",
            "tags.0",
            "tags.0.id",
            "tags.0.label",
            "tags.1",
            "tags.1.id",
            "tags.1.label",
            "address",
            "address.city",
            "address.zip",
        ]
    );
}

#[test]
fn async_skip_prunes_only_the_subtree() {
    let record = profile();
    let mut seen = Vec::new();
    block_on(for_each_path_async(&record, |node| {
        seen.push(node.path.to_string());
        let skip = node.key == PathKey::from("tags");
        async move {
            if skip {
                Control::Skip
            } else {
                Control::Continue
            }
        }
    }));
    assert_eq!(
        seen,
        vec!["name", "score", "tags", "address", "address.city", "address.zip"]
    );
}

#[test]
fn async_abort_stops_the_traversal() {
    let record = profile();
    let mut visits = 0;
    let result = block_on(for_each_path_async(&record, |node| {
        visits += 1;
        let stop = node.path == FieldPath::parse("tags.0");
        async move {
            if stop {
                Control::Abort
            } else {
                Control::Continue
            }
        }
    }));
    assert_eq!(result, Control::Abort);
    assert_eq!(visits, 4);
}

#[test]
fn async_walk_creates_intermediates_on_request() {
    let mut record = Value::object();
    let path = FieldPath::parse("settings.theme.color");
    let node = block_on(walk_async(&mut record, &path, |_, existing| async move {
        match existing {
            Some(v) if v.is_container() => Visit::Descend,
            _ => Visit::Replace(Value::object()),
        }
    }))
    .expect("walk succeeds");
    assert!(node.set(Value::from("teal")));
    assert_eq!(
        record,
        Value::from(json!({"settings": {"theme": {"color": "teal"}}}))
    );
}

#[test]
fn write_paths_applies_a_value_per_path() {
    let mut record = profile();
    let targets = vec![FieldPath::parse("name"), FieldPath::parse("extra.flag")];
    let written = write_paths(&mut record, &targets, |path| Value::from(path.to_string()));
    assert_eq!(written, 2);
    assert_eq!(
        walk(&record, &FieldPath::parse("extra.flag")).and_then(|n| n.value.cloned()),
        Some(Value::from("extra.flag"))
    );
    assert_eq!(record.get("name"), Some(&Value::from("name")));
}
