//! The remote configuration document.
//!
//! The document is owned by the remote side and may carry any structure. The
//! engine only addresses one sub-path, the asset listing, and leaves every
//! other field exactly as it was read.

use serde_json::{Map, Value};

use super::types::RemoteAssetRecord;
use crate::error::EngineError;

const UNKNOWN: &str = "Unknown";

/// Where the asset listing lives inside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLocator {
    /// JSON pointer to the listing array, e.g. `/files_uploaded`.
    Pointer(String),
    /// The `components[]` entry whose `component_id` matches; the listing is
    /// `model_params.modelParam.file_upload.files_uploaded` inside it.
    Component(String),
}

const COMPONENT_LISTING_PATH: [&str; 3] = ["model_params", "modelParam", "file_upload"];
const COMPONENT_LISTING_KEY: &str = "files_uploaded";

#[derive(Debug, Clone)]
pub struct CommitDocument {
    root: Value,
    locator: ListingLocator,
}

impl CommitDocument {
    pub fn new(root: Value, locator: ListingLocator) -> Self {
        Self { root, locator }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    pub fn locator(&self) -> &ListingLocator {
        &self.locator
    }

    /// Fails when the listing could not be merged into this document.
    pub fn ensure_addressable(&self) -> Result<(), EngineError> {
        // Work on a copy so the real document stays untouched until commit.
        let mut scratch = self.clone();
        scratch.listing_parent_mut().map(|_| ())
    }

    /// Current listing entries; empty when the listing does not exist yet.
    pub fn listing(&self) -> &[Value] {
        let found = match &self.locator {
            ListingLocator::Pointer(pointer) => self.root.pointer(pointer),
            ListingLocator::Component(id) => find_component(&self.root, id).and_then(|c| {
                let mut cur = c;
                for seg in COMPONENT_LISTING_PATH {
                    cur = cur.get(seg)?;
                }
                cur.get(COMPONENT_LISTING_KEY)
            }),
        };
        found
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records for every listing entry that names a file.
    pub fn records(&self) -> Vec<RemoteAssetRecord> {
        let entries = self.listing();
        let records: Vec<RemoteAssetRecord> = entries.iter().filter_map(record_from_entry).collect();
        if records.len() != entries.len() {
            tracing::warn!(
                target: "depot.remote",
                skipped = entries.len() - records.len(),
                "listing entries without a file name or id were skipped"
            );
        }
        records
    }

    /// Append entries to the listing, creating it when missing. Existing
    /// entries are kept and nothing is de-duplicated. Returns the new length.
    pub fn append_listing(&mut self, entries: Vec<Value>) -> Result<usize, EngineError> {
        let mark_valid = matches!(self.locator, ListingLocator::Component(_));
        let (parent, key) = self.listing_parent_mut()?;

        let slot = parent
            .entry(key.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        let list = slot.as_array_mut().ok_or_else(|| {
            EngineError::Parse(format!("asset listing '{key}' is not an array"))
        })?;
        list.extend(entries);
        let total = list.len();

        if mark_valid {
            parent.insert("isValid".to_string(), Value::Bool(true));
        }
        Ok(total)
    }

    fn listing_parent_mut(&mut self) -> Result<(&mut Map<String, Value>, String), EngineError> {
        let Self { root, locator } = self;
        match locator {
            ListingLocator::Pointer(pointer) => {
                let mut segments = parse_pointer(pointer);
                let key = segments.pop().ok_or_else(|| {
                    EngineError::Parse(format!("listing pointer '{pointer}' is empty"))
                })?;
                let path: Vec<&str> = segments.iter().map(String::as_str).collect();
                let parent = ensure_object_path(root, &path).ok_or_else(|| {
                    EngineError::Parse(format!("listing pointer '{pointer}' crosses a non-object"))
                })?;
                Ok((parent, key))
            }
            ListingLocator::Component(id) => {
                let components = root
                    .get_mut("components")
                    .and_then(Value::as_array_mut)
                    .ok_or_else(|| {
                        EngineError::Parse("document has no components array".to_string())
                    })?;
                let component = components
                    .iter_mut()
                    .find(|c| c.get("component_id").and_then(Value::as_str) == Some(id.as_str()))
                    .ok_or_else(|| {
                        EngineError::Parse(format!("component '{id}' not found in document"))
                    })?;
                let parent = ensure_object_path(component, &COMPONENT_LISTING_PATH).ok_or_else(
                    || EngineError::Parse(format!("component '{id}' has a non-object upload section")),
                )?;
                Ok((parent, COMPONENT_LISTING_KEY.to_string()))
            }
        }
    }
}

fn find_component<'a>(root: &'a Value, id: &str) -> Option<&'a Value> {
    root.get("components")?
        .as_array()?
        .iter()
        .find(|c| c.get("component_id").and_then(Value::as_str) == Some(id))
}

fn parse_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Walk `path` under `value`, inserting empty objects for missing keys.
fn ensure_object_path<'a>(value: &'a mut Value, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut cur = value.as_object_mut()?;
    for seg in path {
        cur = cur
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()?;
    }
    Some(cur)
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The remote deletes listing entries by file name, so that is the identifier.
/// `id` only stands in for entries that carry no name.
fn record_from_entry(entry: &Value) -> Option<RemoteAssetRecord> {
    let name = entry.get("file_name").and_then(value_as_string);
    let identifier = name
        .clone()
        .or_else(|| entry.get("id").and_then(value_as_string))?;
    let label = |key: &str| {
        entry
            .get(key)
            .and_then(value_as_string)
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    Some(RemoteAssetRecord {
        display_name: name.unwrap_or_else(|| identifier.clone()),
        identifier,
        size_label: label("size"),
        uploaded_timestamp: label("uploaded_timestamp"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn workflow() -> Value {
        json!({
            "name": "chain",
            "owner": {"team": "qa"},
            "components": [
                {"component_id": "llm", "model_params": {"temperature": 0.2}},
                {
                    "component_id": "store",
                    "model_params": {
                        "modelParam": {
                            "index": "cases",
                            "file_upload": {
                                "files_uploaded": [
                                    {"file_name": "old.xlsx", "size": "1.0 KB", "uploaded_timestamp": "t0", "id": "f-1"}
                                ]
                            }
                        }
                    }
                }
            ]
        })
    }

    #[test]
    fn test_component_records() {
        let doc = CommitDocument::new(workflow(), ListingLocator::Component("store".into()));
        assert_eq!(
            doc.records(),
            vec![RemoteAssetRecord {
                identifier: "old.xlsx".into(),
                display_name: "old.xlsx".into(),
                size_label: "1.0 KB".into(),
                uploaded_timestamp: "t0".into(),
            }]
        );
    }

    #[test]
    fn test_entry_without_name_falls_back_to_id() {
        let doc = CommitDocument::new(
            json!({"files_uploaded": [{"id": 42, "size": "1.0 KB"}, {"size": "2.0 KB"}]}),
            ListingLocator::Pointer("/files_uploaded".into()),
        );
        let records = doc.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier, "42");
        assert_eq!(records[0].display_name, "42");
    }

    #[test]
    fn test_append_keeps_unrelated_fields_and_duplicates() {
        let mut doc = CommitDocument::new(workflow(), ListingLocator::Component("store".into()));
        let total = doc
            .append_listing(vec![
                json!({"file_name": "old.xlsx", "size": "2.0 KB", "uploaded_timestamp": "t1"}),
            ])
            .unwrap();
        assert_eq!(total, 2);

        let root = doc.root();
        assert_eq!(root["owner"], json!({"team": "qa"}));
        assert_eq!(root["components"][0], workflow()["components"][0]);
        let upload = &root["components"][1]["model_params"]["modelParam"];
        assert_eq!(upload["index"], json!("cases"));
        assert_eq!(upload["file_upload"]["isValid"], json!(true));
        let names: Vec<&str> = upload["file_upload"]["files_uploaded"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["file_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["old.xlsx", "old.xlsx"]);
    }

    #[test]
    fn test_append_creates_missing_upload_section() {
        let mut doc = CommitDocument::new(
            json!({"components": [{"component_id": "store"}]}),
            ListingLocator::Component("store".into()),
        );
        assert!(doc.listing().is_empty());
        doc.append_listing(vec![json!({"file_name": "a.xlsx"})]).unwrap();
        assert_eq!(doc.records().len(), 1);
    }

    #[test]
    fn test_missing_component_is_not_addressable() {
        let doc = CommitDocument::new(
            json!({"components": [{"component_id": "llm"}]}),
            ListingLocator::Component("store".into()),
        );
        assert!(doc.records().is_empty());
        assert!(matches!(doc.ensure_addressable(), Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_pointer_locator_on_empty_document() {
        let mut doc = CommitDocument::new(json!({}), ListingLocator::Pointer("/files_uploaded".into()));
        assert!(doc.ensure_addressable().is_ok());
        doc.append_listing(vec![json!({"file_name": "a.xlsx", "size": "1.0 KB"})])
            .unwrap();
        assert_eq!(doc.root(), &json!({"files_uploaded": [{"file_name": "a.xlsx", "size": "1.0 KB"}]}));
    }

    #[test]
    fn test_pointer_through_scalar_is_rejected() {
        let doc = CommitDocument::new(
            json!({"meta": 3}),
            ListingLocator::Pointer("/meta/files".into()),
        );
        assert!(doc.ensure_addressable().is_err());
    }
}
