//! Wire payloads for the worksheet server's REST surface.
//!
//! These types mirror the JSON the server sends and accepts. Most fields
//! default when absent or `null`; partial refreshes omit or null out
//! anything that did not change. The typed client-side model lives in
//! [`crate::core::worksheet`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub mod client;
pub mod error;

#[cfg(test)]
mod tests;

pub use client::{RestClient, WorksheetApi};
pub use error::ApiError;

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorksheetPayload {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub permission_spec: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_permissions: Vec<GroupPermissionPayload>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edit_permission: bool,
    #[serde(default)]
    pub last_item_id: Option<i64>,
    #[serde(default)]
    pub date_created: Option<Value>,
    #[serde(default)]
    pub date_last_modified: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: Vec<String>,
    /// Interpreted blocks. Partial refreshes send `null` for unchanged blocks.
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocks: Vec<Option<BlockPayload>>,
    /// Indexed by raw line; `null` entries have no block.
    #[serde(default)]
    pub raw_to_block: Option<Vec<Option<(i64, i64)>>>,
    /// Keyed by `"bi,si"`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub block_to_raw: HashMap<String, usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GroupPermissionPayload {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permission_spec: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BlockPayload {
    pub mode: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ids: Vec<Option<i64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_keys: Vec<Option<i64>>,
    #[serde(default)]
    pub bundles_spec: Option<BundlesSpec>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: Vec<String>,
    /// Table rows keyed by header name; `null` for unchanged rows in a
    /// partial refresh.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rows: Vec<Option<Map<String, Value>>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subworksheet_infos: Vec<Option<SubworksheetInfo>>,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_rows: Vec<SchemaFieldPayload>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BundlesSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle_infos: Vec<Option<BundleInfo>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BundleInfo {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle_type: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<DependencyInfo>,
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DependencyInfo {
    pub parent_uuid: String,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub child_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubworksheetInfo {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaFieldPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub field: String,
    #[serde(rename = "generalized-path", default)]
    pub generalized_path: Option<String>,
    #[serde(rename = "post-processor", default)]
    pub post_processor: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AddItemsRequest {
    pub items: Vec<String>,
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_sort_key: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
}

impl AddItemsRequest {
    pub fn bundles(uuids: Vec<String>, after_sort_key: i64) -> Self {
        Self {
            items: uuids,
            item_type: "bundle".to_string(),
            after_sort_key: Some(after_sort_key),
            ids: None,
        }
    }

    pub fn markup(text: String, after_sort_key: i64) -> Self {
        Self {
            items: vec![text],
            item_type: "markup".to_string(),
            after_sort_key: Some(after_sort_key),
            ids: None,
        }
    }

    /// Replacing the given item ids with nothing removes them.
    pub fn remove(item_type: &str, ids: Vec<i64>) -> Self {
        Self {
            items: Vec::new(),
            item_type: item_type.to_string(),
            after_sort_key: None,
            ids: Some(ids),
        }
    }
}

/// JSON:API style document used by the PATCH and DELETE endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonApiDocument {
    pub data: Vec<JsonApiResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonApiResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attributes: Option<Map<String, Value>>,
}

impl JsonApiDocument {
    pub fn single(id: &str, kind: &str, attributes: Option<Map<String, Value>>) -> Self {
        Self {
            data: vec![JsonApiResource {
                id: id.to_string(),
                kind: kind.to_string(),
                attributes,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CliCommandRequest<'a> {
    pub worksheet_uuid: &'a str,
    pub command: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CliCommandResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: String,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub structured_result: Option<StructuredResult>,
    #[serde(default)]
    pub completions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StructuredResult {
    /// `[action, parameter]` pairs.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ui_actions: Vec<(String, Value)>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub refs: HashMap<String, RefTarget>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RefTarget {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Actions the server asks the client to perform after a CLI command.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    OpenWorksheet(String),
    SetEditMode(bool),
    OpenBundle(String),
    Upload(Value),
    Unknown(String),
}

impl UiAction {
    pub fn from_pair(action: &str, parameter: &Value) -> Self {
        match action {
            "openWorksheet" => match parameter.as_str() {
                Some(uuid) => UiAction::OpenWorksheet(uuid.to_string()),
                None => UiAction::Unknown(action.to_string()),
            },
            "setEditMode" => UiAction::SetEditMode(parameter.as_bool().unwrap_or(true)),
            "openBundle" => match parameter.as_str() {
                Some(uuid) => UiAction::OpenBundle(uuid.to_string()),
                None => UiAction::Unknown(action.to_string()),
            },
            "upload" => UiAction::Upload(parameter.clone()),
            other => UiAction::Unknown(other.to_string()),
        }
    }
}

impl CliCommandResponse {
    pub fn ui_actions(&self) -> Vec<UiAction> {
        self.structured_result
            .as_ref()
            .map(|result| {
                result
                    .ui_actions
                    .iter()
                    .map(|(action, parameter)| UiAction::from_pair(action, parameter))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDocument {
    pub data: UserResource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserResource {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Map<String, Value>,
}

/// Attributes of the signed-in user shown in the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserInfo {
    pub id: String,
    pub user_name: String,
    pub disk_used: u64,
    pub disk_quota: u64,
    pub time_used: u64,
    pub time_quota: u64,
    pub notifications: u64,
}

impl From<UserDocument> for UserInfo {
    fn from(document: UserDocument) -> Self {
        let attrs = &document.data.attributes;
        let number = |key: &str| attrs.get(key).and_then(Value::as_u64).unwrap_or(0);
        UserInfo {
            id: document.data.id.clone(),
            user_name: attrs
                .get("user_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            disk_used: number("disk_used"),
            disk_quota: number("disk_quota"),
            time_used: number("time_used"),
            time_quota: number("time_quota"),
            notifications: number("notifications"),
        }
    }
}
