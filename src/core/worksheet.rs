//! Client-side worksheet model.
//!
//! A [`Worksheet`] is the typed form of the server's interpreted response:
//! an ordered list of [`Block`]s, the raw source lines, and the translation
//! tables linking the two. Bundle rows reference each other only by uuid.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::api::{BlockPayload, BundleInfo, WorksheetPayload};

/// Lifecycle state of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BundleState {
    Created,
    Uploading,
    Staged,
    Making,
    Starting,
    Preparing,
    Running,
    Finalizing,
    Ready,
    Failed,
    Killed,
    WorkerOffline,
    Unknown(String),
}

impl BundleState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => BundleState::Created,
            "uploading" => BundleState::Uploading,
            "staged" => BundleState::Staged,
            "making" => BundleState::Making,
            "starting" => BundleState::Starting,
            "preparing" => BundleState::Preparing,
            "running" => BundleState::Running,
            "finalizing" => BundleState::Finalizing,
            "ready" => BundleState::Ready,
            "failed" => BundleState::Failed,
            "killed" => BundleState::Killed,
            "worker_offline" => BundleState::WorkerOffline,
            other => BundleState::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BundleState::Created => "created",
            BundleState::Uploading => "uploading",
            BundleState::Staged => "staged",
            BundleState::Making => "making",
            BundleState::Starting => "starting",
            BundleState::Preparing => "preparing",
            BundleState::Running => "running",
            BundleState::Finalizing => "finalizing",
            BundleState::Ready => "ready",
            BundleState::Failed => "failed",
            BundleState::Killed => "killed",
            BundleState::WorkerOffline => "worker_offline",
            BundleState::Unknown(raw) => raw,
        }
    }

    /// `ready`, `failed` and `killed` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BundleState::Ready | BundleState::Failed | BundleState::Killed
        )
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleRow {
    pub uuid: String,
    pub name: String,
    pub bundle_type: String,
    pub state: BundleState,
    pub metadata: Map<String, Value>,
    /// Parent bundle uuids.
    pub dependencies: Vec<String>,
    pub command: Option<String>,
    /// Worksheet item id of this row.
    pub item_id: Option<i64>,
    pub sort_key: Option<i64>,
    /// Display values in header order.
    pub cells: Vec<String>,
    /// Position in the server's `bundle_infos`, which may hold `null`s.
    pub source_index: usize,
}

impl BundleRow {
    pub fn is_run(&self) -> bool {
        self.bundle_type == "run"
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Runs that still need refreshing.
    pub fn needs_polling(&self) -> bool {
        self.is_run() && !self.is_terminal()
    }

    fn from_info(
        info: &BundleInfo,
        header: &[String],
        row: Option<&Map<String, Value>>,
        item_id: Option<i64>,
        sort_key: Option<i64>,
        source_index: usize,
    ) -> Self {
        let name = info
            .metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let cells = header
            .iter()
            .map(|column| row.and_then(|r| r.get(column)).map(display_value).unwrap_or_default())
            .collect();
        BundleRow {
            uuid: info.uuid.clone(),
            name,
            bundle_type: info.bundle_type.clone(),
            state: BundleState::parse(info.state.as_deref().unwrap_or("created")),
            metadata: info.metadata.clone(),
            dependencies: info
                .dependencies
                .iter()
                .map(|dep| dep.parent_uuid.clone())
                .collect(),
            command: info.command.clone(),
            item_id,
            sort_key,
            cells,
            source_index,
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupBlock {
    pub ids: Vec<Option<i64>>,
    pub sort_keys: Vec<Option<i64>>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub header: Vec<String>,
    pub rows: Vec<BundleRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubworksheetRef {
    pub uuid: String,
    pub name: String,
    pub title: Option<String>,
    pub item_id: Option<i64>,
    pub sort_key: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubworksheetsBlock {
    pub items: Vec<SubworksheetRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    pub name: String,
    pub path: Option<String>,
    pub post_processor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaBlock {
    pub schema_name: String,
    pub columns: Vec<SchemaColumn>,
    pub ids: Vec<Option<i64>>,
    pub sort_keys: Vec<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchBlock {
    pub keywords: Vec<String>,
    pub ids: Vec<Option<i64>>,
    pub sort_keys: Vec<Option<i64>>,
}

/// Blocks the core does not interpret beyond their bundle references.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBlock {
    pub mode: String,
    pub bundle_uuids: Vec<String>,
    pub ids: Vec<Option<i64>>,
    pub sort_keys: Vec<Option<i64>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Markup(MarkupBlock),
    BundleTable(TableBlock),
    Subworksheets(SubworksheetsBlock),
    Schema(SchemaBlock),
    SearchDirective(SearchBlock),
    Image(RenderedBlock),
    Graph(RenderedBlock),
    Other(RenderedBlock),
}

impl Block {
    pub fn mode(&self) -> &str {
        match self {
            Block::Markup(_) => "markup_block",
            Block::BundleTable(_) => "table_block",
            Block::Subworksheets(_) => "subworksheets_block",
            Block::Schema(_) => "schema_block",
            Block::SearchDirective(_) => "search_block",
            Block::Image(b) | Block::Graph(b) | Block::Other(b) => &b.mode,
        }
    }

    /// Number of focusable rows. Tabular blocks have one per row (at least
    /// one, so an empty table can still be focused); everything else has 1.
    pub fn row_count(&self) -> usize {
        match self {
            Block::BundleTable(table) => table.rows.len().max(1),
            Block::Subworksheets(list) => list.items.len().max(1),
            _ => 1,
        }
    }

    pub fn is_tabular(&self) -> bool {
        matches!(self, Block::BundleTable(_) | Block::Subworksheets(_))
    }

    pub fn carries_bundles(&self) -> bool {
        match self {
            Block::BundleTable(table) => !table.rows.is_empty(),
            Block::Image(b) | Block::Graph(b) | Block::Other(b) => !b.bundle_uuids.is_empty(),
            _ => false,
        }
    }

    /// Bundle uuids starting at `sub` (inclusive) in display order.
    pub fn bundle_uuids_from(&self, sub: usize) -> Vec<String> {
        match self {
            Block::BundleTable(table) => table
                .rows
                .iter()
                .skip(sub)
                .map(|row| row.uuid.clone())
                .collect(),
            Block::Image(b) | Block::Graph(b) | Block::Other(b) if sub == 0 => {
                b.bundle_uuids.clone()
            }
            _ => Vec::new(),
        }
    }

    pub fn bundle_row(&self, sub: usize) -> Option<&BundleRow> {
        match self {
            Block::BundleTable(table) => table.rows.get(sub),
            _ => None,
        }
    }

    pub fn subworksheet(&self, sub: usize) -> Option<&SubworksheetRef> {
        match self {
            Block::Subworksheets(list) => list.items.get(sub),
            _ => None,
        }
    }

    /// Sort key of the item at `sub`. Non-tabular blocks report their last
    /// key, since inserting "after" them means after the whole block.
    pub fn sort_key_at(&self, sub: usize) -> Option<i64> {
        match self {
            Block::BundleTable(table) => table.rows.get(sub).and_then(|row| row.sort_key),
            Block::Subworksheets(list) => list.items.get(sub).and_then(|item| item.sort_key),
            Block::Markup(b) => last_key(&b.sort_keys),
            Block::Schema(b) => last_key(&b.sort_keys),
            Block::SearchDirective(b) => last_key(&b.sort_keys),
            Block::Image(b) | Block::Graph(b) | Block::Other(b) => last_key(&b.sort_keys),
        }
    }

    /// Every sort key appearing in the block, in display order.
    pub fn sort_keys(&self) -> Vec<(usize, i64)> {
        match self {
            Block::BundleTable(table) => table
                .rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| row.sort_key.map(|key| (i, key)))
                .collect(),
            Block::Subworksheets(list) => list
                .items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| item.sort_key.map(|key| (i, key)))
                .collect(),
            Block::Markup(b) => keys_at_zero(&b.sort_keys),
            Block::Schema(b) => keys_at_zero(&b.sort_keys),
            Block::SearchDirective(b) => keys_at_zero(&b.sort_keys),
            Block::Image(b) | Block::Graph(b) | Block::Other(b) => keys_at_zero(&b.sort_keys),
        }
    }

    /// Worksheet item ids of the whole block.
    pub fn item_ids(&self) -> Vec<i64> {
        let flatten = |ids: &[Option<i64>]| ids.iter().flatten().copied().collect();
        match self {
            Block::BundleTable(table) => table.rows.iter().filter_map(|row| row.item_id).collect(),
            Block::Subworksheets(list) => list.items.iter().filter_map(|i| i.item_id).collect(),
            Block::Markup(b) => flatten(&b.ids),
            Block::Schema(b) => flatten(&b.ids),
            Block::SearchDirective(b) => flatten(&b.ids),
            Block::Image(b) | Block::Graph(b) | Block::Other(b) => flatten(&b.ids),
        }
    }

    /// Convert one server block. Never fails: unknown modes become
    /// [`Block::Other`].
    pub fn from_payload(payload: &BlockPayload) -> Self {
        match payload.mode.as_str() {
            "markup_block" => Block::Markup(MarkupBlock {
                ids: payload.ids.clone(),
                sort_keys: payload.sort_keys.clone(),
                text: payload.text.clone().unwrap_or_default(),
            }),
            "table_block" => {
                let infos = payload
                    .bundles_spec
                    .as_ref()
                    .map(|spec| spec.bundle_infos.as_slice())
                    .unwrap_or_default();
                let rows = infos
                    .iter()
                    .enumerate()
                    .filter_map(|(i, info)| {
                        info.as_ref().map(|info| {
                            BundleRow::from_info(
                                info,
                                &payload.header,
                                payload.rows.get(i).and_then(Option::as_ref),
                                payload.ids.get(i).copied().flatten(),
                                payload.sort_keys.get(i).copied().flatten(),
                                i,
                            )
                        })
                    })
                    .collect();
                Block::BundleTable(TableBlock {
                    header: payload.header.clone(),
                    rows,
                })
            }
            "subworksheets_block" => Block::Subworksheets(SubworksheetsBlock {
                items: payload
                    .subworksheet_infos
                    .iter()
                    .enumerate()
                    .filter_map(|(i, info)| {
                        info.as_ref().map(|info| SubworksheetRef {
                            uuid: info.uuid.clone(),
                            name: info.name.clone(),
                            title: info.title.clone(),
                            item_id: payload.ids.get(i).copied().flatten(),
                            sort_key: payload.sort_keys.get(i).copied().flatten(),
                        })
                    })
                    .collect(),
            }),
            "schema_block" => Block::Schema(SchemaBlock {
                schema_name: payload.schema_name.clone().unwrap_or_default(),
                columns: payload
                    .field_rows
                    .iter()
                    .map(|field| SchemaColumn {
                        name: field.field.clone(),
                        path: field.generalized_path.clone(),
                        post_processor: field.post_processor.clone(),
                    })
                    .collect(),
                ids: payload.ids.clone(),
                sort_keys: payload.sort_keys.clone(),
            }),
            "search_block" | "wsearch_block" => Block::SearchDirective(SearchBlock {
                keywords: payload.keywords.clone(),
                ids: payload.ids.clone(),
                sort_keys: payload.sort_keys.clone(),
            }),
            "image_block" => Block::Image(rendered(payload)),
            "graph_block" => Block::Graph(rendered(payload)),
            _ => Block::Other(rendered(payload)),
        }
    }

    /// Merge a partial refresh of this block: rows present in `payload`
    /// replace the matching rows, `null` rows are left alone. Returns whether
    /// anything changed.
    pub fn merge_partial(&mut self, payload: &BlockPayload) -> bool {
        let Block::BundleTable(table) = self else {
            return false;
        };
        if payload.mode != "table_block" {
            return false;
        }
        let Some(spec) = payload.bundles_spec.as_ref() else {
            return false;
        };
        let header = if payload.header.is_empty() {
            table.header.clone()
        } else {
            payload.header.clone()
        };
        let mut changed = false;
        for (i, info) in spec.bundle_infos.iter().enumerate() {
            let Some(info) = info.as_ref() else {
                continue;
            };
            let Some(existing) = table.rows.iter_mut().find(|row| row.source_index == i) else {
                continue;
            };
            if existing.uuid != info.uuid {
                continue;
            }
            let mut replacement = BundleRow::from_info(
                info,
                &header,
                payload.rows.get(i).and_then(Option::as_ref),
                existing.item_id,
                existing.sort_key,
                i,
            );
            if payload.rows.get(i).and_then(Option::as_ref).is_none() {
                replacement.cells = existing.cells.clone();
            }
            if *existing != replacement {
                *existing = replacement;
                changed = true;
            }
        }
        changed
    }
}

fn rendered(payload: &BlockPayload) -> RenderedBlock {
    RenderedBlock {
        mode: payload.mode.clone(),
        bundle_uuids: payload
            .bundles_spec
            .as_ref()
            .map(|spec| {
                spec.bundle_infos
                    .iter()
                    .flatten()
                    .map(|info| info.uuid.clone())
                    .collect()
            })
            .unwrap_or_default(),
        ids: payload.ids.clone(),
        sort_keys: payload.sort_keys.clone(),
        text: payload.text.clone(),
    }
}

fn last_key(keys: &[Option<i64>]) -> Option<i64> {
    keys.iter().rev().find_map(|key| *key)
}

fn keys_at_zero(keys: &[Option<i64>]) -> Vec<(usize, i64)> {
    keys.iter().flatten().map(|key| (0, *key)).collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupPermission {
    pub group_id: Option<String>,
    pub group_name: String,
    pub permission: String,
}

/// The server-supplied maps between raw source lines and block coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationTables {
    /// `None` when the server sent no table at all.
    pub raw_to_block: Option<Vec<Option<(i64, i64)>>>,
    pub block_to_raw: HashMap<String, usize>,
}

/// What a raw-line lookup produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLookup {
    Found(i64, i64),
    /// The line exists in no mapping entry.
    Undefined,
    /// There is no table to consult.
    NoTable,
}

impl TranslationTables {
    pub fn block_key(block: i64, sub: usize) -> String {
        format!("{block},{sub}")
    }

    pub fn raw_line_for(&self, block: i64, sub: usize) -> Option<usize> {
        self.block_to_raw.get(&Self::block_key(block, sub)).copied()
    }

    pub fn block_for_raw(&self, raw_line: usize) -> RawLookup {
        match &self.raw_to_block {
            None => RawLookup::NoTable,
            Some(table) => match table.get(raw_line) {
                Some(Some((block, sub))) => RawLookup::Found(*block, *sub),
                _ => RawLookup::Undefined,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Worksheet {
    pub uuid: String,
    pub name: String,
    pub title: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub permission_spec: Option<String>,
    pub group_permissions: Vec<GroupPermission>,
    pub tags: Vec<String>,
    pub edit_permission: bool,
    pub last_item_id: Option<i64>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_last_modified: Option<DateTime<Utc>>,
    pub blocks: Vec<Block>,
    pub source: Vec<String>,
    pub tables: TranslationTables,
}

impl Worksheet {
    pub fn from_payload(payload: WorksheetPayload) -> Self {
        let blocks = payload
            .blocks
            .iter()
            .map(|block| match block {
                Some(block) => Block::from_payload(block),
                None => Block::Other(RenderedBlock {
                    mode: "empty_block".to_string(),
                    bundle_uuids: Vec::new(),
                    ids: Vec::new(),
                    sort_keys: Vec::new(),
                    text: None,
                }),
            })
            .collect();
        Worksheet {
            uuid: payload.uuid,
            name: payload.name,
            title: payload.title.filter(|title| !title.is_empty()),
            owner_id: payload.owner_id,
            owner_name: payload.owner_name,
            permission_spec: payload.permission_spec,
            group_permissions: payload
                .group_permissions
                .into_iter()
                .map(|group| GroupPermission {
                    group_id: group.group_id,
                    group_name: group.group_name,
                    permission: group.permission_spec,
                })
                .collect(),
            tags: payload.tags,
            edit_permission: payload.edit_permission,
            last_item_id: payload.last_item_id,
            date_created: payload.date_created.as_ref().and_then(normalize_date),
            date_last_modified: payload.date_last_modified.as_ref().and_then(normalize_date),
            blocks,
            source: payload.source,
            tables: TranslationTables {
                raw_to_block: payload.raw_to_block,
                block_to_raw: payload.block_to_raw,
            },
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn block(&self, index: i64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn row_count(&self, index: i64) -> usize {
        self.block(index).map(Block::row_count).unwrap_or(1)
    }

    pub fn bundle_row(&self, block: i64, sub: usize) -> Option<&BundleRow> {
        self.block(block).and_then(|b| b.bundle_row(sub))
    }

    pub fn bundle_rows(&self) -> impl Iterator<Item = &BundleRow> {
        self.blocks.iter().flat_map(|block| match block {
            Block::BundleTable(table) => table.rows.as_slice(),
            _ => &[],
        })
    }

    /// Bundle appearances across all blocks (repeats counted).
    pub fn bundle_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.bundle_uuids_from(0).len())
            .sum()
    }

    pub fn bundle_uuid_set(&self) -> HashSet<String> {
        self.blocks
            .iter()
            .flat_map(|block| block.bundle_uuids_from(0))
            .collect()
    }

    /// First coordinate at which `uuid` is rendered.
    pub fn locate_bundle(&self, uuid: &str) -> Option<(i64, usize)> {
        self.blocks.iter().enumerate().find_map(|(bi, block)| {
            block
                .bundle_uuids_from(0)
                .iter()
                .position(|candidate| candidate == uuid)
                .map(|si| (bi as i64, if block.is_tabular() { si } else { 0 }))
        })
    }

    /// Every table row coordinate rendering `uuid`, in layout order.
    pub fn bundle_appearances(&self, uuid: &str) -> Vec<(i64, usize)> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(bi, block)| match block {
                Block::BundleTable(table) => table
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row.uuid == uuid)
                    .map(|(si, _)| (bi as i64, si))
                    .collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Run rows that have not reached a terminal state, deduplicated.
    pub fn pollable_uuids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.bundle_rows()
            .filter(|row| row.needs_polling())
            .filter(|row| seen.insert(row.uuid.clone()))
            .map(|row| row.uuid.clone())
            .collect()
    }

    /// Apply a partial refresh. Returns whether any row changed.
    pub fn merge_partial(&mut self, payload: &WorksheetPayload) -> bool {
        let mut changed = false;
        for (block, update) in self.blocks.iter_mut().zip(payload.blocks.iter()) {
            if let Some(update) = update {
                changed |= block.merge_partial(update);
            }
        }
        changed
    }
}

/// Dates arrive as epoch seconds or ISO-8601 strings, with or without an
/// offset.
pub fn normalize_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            Utc.timestamp_opt(seconds.trunc() as i64, 0).single()
        }
        Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|naive| naive.and_utc())
                .or_else(|| text.parse::<i64>().ok().and_then(|s| Utc.timestamp_opt(s, 0).single()))
        }
        _ => None,
    }
}
