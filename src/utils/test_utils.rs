use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::api::{
    AddItemsRequest, ApiError, BlockPayload, BundleInfo, BundlesSpec, CliCommandResponse,
    UserInfo, WorksheetApi, WorksheetPayload,
};
use crate::core::app::{App, AppInit};
use crate::core::clipboard::OriginStore;

pub fn worksheet_json(blocks: Vec<BlockPayload>) -> WorksheetPayload {
    WorksheetPayload {
        uuid: "0xABCD".to_string(),
        name: "test-worksheet".to_string(),
        title: Some("Test Worksheet".to_string()),
        edit_permission: true,
        blocks: blocks.into_iter().map(Some).collect(),
        ..Default::default()
    }
}

pub fn markup_block_json(text: &str, sort_keys: &[i64]) -> BlockPayload {
    BlockPayload {
        mode: "markup_block".to_string(),
        text: Some(text.to_string()),
        ids: (1..=sort_keys.len() as i64).map(Some).collect(),
        sort_keys: sort_keys.iter().copied().map(Some).collect(),
        ..Default::default()
    }
}

/// A table of run bundles with `uuid` and `name` columns.
pub fn table_block_json(bundles: &[(&str, &str)], sort_keys: &[i64]) -> BlockPayload {
    let infos = bundles
        .iter()
        .map(|(uuid, state)| {
            let mut metadata = Map::new();
            metadata.insert("name".to_string(), json!(format!("name-{uuid}")));
            Some(BundleInfo {
                uuid: uuid.to_string(),
                bundle_type: "run".to_string(),
                state: Some(state.to_string()),
                metadata,
                ..Default::default()
            })
        })
        .collect();
    let rows = bundles
        .iter()
        .map(|(uuid, _)| {
            let mut row = Map::new();
            row.insert("uuid".to_string(), json!(uuid));
            row.insert("name".to_string(), json!(format!("name-{uuid}")));
            Some(row)
        })
        .collect();
    BlockPayload {
        mode: "table_block".to_string(),
        ids: (1..=bundles.len() as i64).map(Some).collect(),
        sort_keys: sort_keys.iter().copied().map(Some).collect(),
        bundles_spec: Some(BundlesSpec {
            bundle_infos: infos,
        }),
        header: vec!["uuid".to_string(), "name".to_string()],
        rows,
        ..Default::default()
    }
}

#[derive(Default)]
struct FakeState {
    worksheets: HashMap<String, WorksheetPayload>,
    command_responses: VecDeque<CliCommandResponse>,
    commands: Vec<String>,
    completions: Vec<String>,
    partial_requests: Vec<Vec<String>>,
    full_fetches: Vec<String>,
    add_items: Vec<(String, AddItemsRequest)>,
    saved_sources: Vec<(String, Vec<String>)>,
    save_failure: Option<(u16, String)>,
    deleted: Vec<String>,
    field_updates: Vec<(String, Map<String, Value>)>,
    bundle_updates: Vec<(String, Map<String, Value>)>,
}

/// In-memory [`WorksheetApi`] that records every call.
#[derive(Default, Clone)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    pub fn set_worksheet(&self, payload: WorksheetPayload) {
        let mut state = self.state.lock().unwrap();
        state.worksheets.insert(payload.uuid.clone(), payload);
    }

    /// Serve `payload` when `name` is requested, the way the server resolves
    /// worksheet names.
    pub fn set_alias(&self, name: &str, payload: WorksheetPayload) {
        let mut state = self.state.lock().unwrap();
        state.worksheets.insert(name.to_string(), payload);
    }

    pub fn push_command_response(&self, response: CliCommandResponse) {
        self.state
            .lock()
            .unwrap()
            .command_responses
            .push_back(response);
    }

    pub fn fail_next_save(&self, status: u16, body: &str) {
        self.state.lock().unwrap().save_failure = Some((status, body.to_string()));
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn completions(&self) -> Vec<String> {
        self.state.lock().unwrap().completions.clone()
    }

    pub fn partial_requests(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().partial_requests.clone()
    }

    pub fn full_fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().full_fetches.clone()
    }

    pub fn add_items_requests(&self) -> Vec<(String, AddItemsRequest)> {
        self.state.lock().unwrap().add_items.clone()
    }

    pub fn saved_sources(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().saved_sources.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn field_updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.state.lock().unwrap().field_updates.clone()
    }

    pub fn bundle_updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.state.lock().unwrap().bundle_updates.clone()
    }
}

#[async_trait]
impl WorksheetApi for FakeApi {
    async fn fetch_worksheet(
        &self,
        uuid: &str,
        _brief: bool,
    ) -> Result<WorksheetPayload, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.full_fetches.push(uuid.to_string());
        state.worksheets.get(uuid).cloned().ok_or(ApiError::NotFound)
    }

    async fn fetch_partial(
        &self,
        uuid: &str,
        bundle_uuids: &[String],
    ) -> Result<WorksheetPayload, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.partial_requests.push(bundle_uuids.to_vec());
        state.worksheets.get(uuid).cloned().ok_or(ApiError::NotFound)
    }

    async fn save_raw_source(&self, uuid: &str, lines: &[String]) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some((status, body)) = state.save_failure.take() {
            return Err(ApiError::Status { status, body });
        }
        state.saved_sources.push((uuid.to_string(), lines.to_vec()));
        Ok(())
    }

    async fn delete_worksheet(&self, uuid: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(uuid.to_string());
        state.worksheets.remove(uuid);
        Ok(())
    }

    async fn add_items(&self, uuid: &str, request: &AddItemsRequest) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .add_items
            .push((uuid.to_string(), request.clone()));
        Ok(())
    }

    async fn update_worksheet_fields(
        &self,
        uuid: &str,
        attributes: Map<String, Value>,
    ) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .field_updates
            .push((uuid.to_string(), attributes));
        Ok(())
    }

    async fn update_bundle_metadata(
        &self,
        uuid: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .bundle_updates
            .push((uuid.to_string(), metadata));
        Ok(())
    }

    async fn execute_command(
        &self,
        _worksheet_uuid: &str,
        command: &str,
        autocomplete: bool,
    ) -> Result<CliCommandResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        if autocomplete {
            state.completions.push(command.to_string());
        } else {
            state.commands.push(command.to_string());
        }
        Ok(state.command_responses.pop_front().unwrap_or_default())
    }

    async fn fetch_user(&self) -> Result<UserInfo, ApiError> {
        Ok(UserInfo {
            id: "0".to_string(),
            user_name: "tester".to_string(),
            ..Default::default()
        })
    }
}

/// An [`App`] wired to a [`FakeApi`] and a throwaway data directory.
pub fn create_test_app() -> (App, FakeApi, tempfile::TempDir) {
    let api = FakeApi::default();
    let dir = tempfile::TempDir::new().unwrap();
    let origin = OriginStore::new(dir.path(), "https://worksheets.test");
    let app = App::new(AppInit {
        api: Arc::new(api.clone()),
        server_url: "https://worksheets.test".to_string(),
        origin,
        ..AppInit::default_for_tests()
    });
    (app, api, dir)
}
