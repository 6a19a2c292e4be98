use super::*;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[test]
fn nulls_in_partial_refreshes_decode_as_defaults() {
    let payload: WorksheetPayload = serde_json::from_value(json!({
        "uuid": "0xws",
        "name": null,
        "tags": null,
        "edit_permission": null,
        "blocks": [
            null,
            {
                "mode": "table_block",
                "header": ["uuid", "name"],
                "rows": [null, {"uuid": "0x2", "name": "b"}],
                "bundles_spec": {"bundle_infos": [null, {"uuid": "0x2", "state": "running"}]},
                "sort_keys": [null, 20]
            }
        ]
    }))
    .unwrap();

    assert_eq!(payload.name, "");
    assert!(payload.tags.is_empty());
    assert!(!payload.edit_permission);
    assert!(payload.blocks[0].is_none());
    let table = payload.blocks[1].as_ref().unwrap();
    assert!(table.rows[0].is_none());
    assert_eq!(table.sort_keys, vec![None, Some(20)]);
    let infos = &table.bundles_spec.as_ref().unwrap().bundle_infos;
    assert_eq!(infos[1].as_ref().unwrap().state.as_deref(), Some("running"));
}

#[test]
fn schema_fields_use_hyphenated_keys() {
    let block: BlockPayload = serde_json::from_value(json!({
        "mode": "schema_block",
        "schema_name": "s",
        "field_rows": [{"field": "size", "generalized-path": "/", "post-processor": "size"}]
    }))
    .unwrap();
    assert_eq!(block.field_rows[0].generalized_path.as_deref(), Some("/"));
    assert_eq!(block.field_rows[0].post_processor.as_deref(), Some("size"));
}

#[test]
fn add_items_omits_unset_fields() {
    let paste = serde_json::to_value(AddItemsRequest::bundles(vec!["0x1".into()], 7)).unwrap();
    assert_eq!(
        paste,
        json!({"items": ["0x1"], "item_type": "bundle", "after_sort_key": 7})
    );

    let remove = serde_json::to_value(AddItemsRequest::remove("markup", vec![3, 4])).unwrap();
    assert_eq!(remove, json!({"items": [], "item_type": "markup", "ids": [3, 4]}));
}

#[test]
fn command_request_skips_autocomplete_when_false() {
    let plain = CliCommandRequest {
        worksheet_uuid: "0xws",
        command: "ls",
        autocomplete: false,
    };
    assert_eq!(
        serde_json::to_value(&plain).unwrap(),
        json!({"worksheet_uuid": "0xws", "command": "ls"})
    );
}

#[test]
fn ui_actions_decode_known_and_unknown_pairs() {
    let response: CliCommandResponse = serde_json::from_value(json!({
        "output": "ok",
        "structured_result": {
            "ui_actions": [
                ["openWorksheet", "0xother"],
                ["setEditMode", false],
                ["openBundle", 42],
                ["sparkle", null]
            ],
            "refs": {"0": {"uuid": "0xb", "type": "bundle"}}
        }
    }))
    .unwrap();

    assert_eq!(
        response.ui_actions(),
        vec![
            UiAction::OpenWorksheet("0xother".to_string()),
            UiAction::SetEditMode(false),
            UiAction::Unknown("openBundle".to_string()),
            UiAction::Unknown("sparkle".to_string()),
        ]
    );
    let refs = &response.structured_result.as_ref().unwrap().refs;
    assert_eq!(refs["0"].kind, "bundle");
}

#[test]
fn user_document_fills_missing_numbers_with_zero() {
    let document: UserDocument = serde_json::from_value(json!({
        "data": {
            "id": "7",
            "attributes": {"user_name": "ada", "disk_used": 10, "disk_quota": 100}
        }
    }))
    .unwrap();
    let user = UserInfo::from(document);
    assert_eq!(user.user_name, "ada");
    assert_eq!(user.disk_quota, 100);
    assert_eq!(user.time_quota, 0);
}

#[test]
fn long_status_bodies_are_truncated_for_dialogs() {
    let error = ApiError::Status {
        status: 400,
        body: "x".repeat(3000),
    };
    let message = error.user_message();
    assert!(message.ends_with("… (HTTP 400)"));
    assert_eq!(message.chars().filter(|c| *c == 'x').count(), 2000);
    assert_eq!(error.kind(), crate::core::error::ErrorKind::ServerValidation);
    assert_eq!(ApiError::NotFound.user_message(), "Not found");
}

/// Serve exactly one HTTP exchange and hand back the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buffer = [0_u8; 4096];
        loop {
            let read = stream.read(&mut buffer).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
            if request_complete(&request) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });
    (base_url, handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..split]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= split + 4 + length
}

fn client(base_url: &str, token: Option<&str>) -> RestClient {
    RestClient::new(
        reqwest::Client::new(),
        base_url,
        token.map(str::to_string),
    )
}

#[tokio::test]
async fn fetch_worksheet_sends_brief_flag_and_token() {
    let (base_url, server) = serve_once("200 OK", r#"{"uuid":"0xws","name":"home"}"#).await;
    let payload = client(&base_url, Some("secret"))
        .fetch_worksheet("0xws", true)
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert_eq!(payload.name, "home");
    assert!(request.starts_with("GET /rest/interpret/worksheet/0xws?brief=1 "));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer secret"));
}

#[tokio::test]
async fn partial_fetch_repeats_the_uuid_parameter() {
    let (base_url, server) = serve_once("200 OK", r#"{"uuid":"0xws"}"#).await;
    client(&base_url, None)
        .fetch_partial("0xws", &["0xa".to_string(), "0xb".to_string()])
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("GET /rest/interpret/worksheet/0xws?uuid=0xa&uuid=0xb "));
    assert!(!request.to_ascii_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn missing_worksheet_maps_to_not_found() {
    let (base_url, server) = serve_once("404 Not Found", "").await;
    let error = client(&base_url, None)
        .fetch_worksheet("0xgone", false)
        .await
        .unwrap_err();
    server.await.unwrap();
    assert!(matches!(error, ApiError::NotFound));
}

#[tokio::test]
async fn validation_errors_keep_the_body() {
    let (base_url, server) = serve_once("400 Bad Request", "Invalid worksheet name").await;
    let error = client(&base_url, None)
        .save_raw_source("0xws", &["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    let request = server.await.unwrap();

    assert!(request.starts_with("POST /rest/worksheets/0xws/raw "));
    assert!(request.ends_with("a\nb"));
    assert_eq!(error.user_message(), "Invalid worksheet name");
}

#[tokio::test]
async fn metadata_updates_wrap_in_a_json_api_document() {
    let (base_url, server) = serve_once("200 OK", "{}").await;
    let mut metadata = Map::new();
    metadata.insert("name".to_string(), json!("renamed"));
    client(&base_url, None)
        .update_bundle_metadata("0xb", metadata)
        .await
        .unwrap();
    let request = server.await.unwrap();

    assert!(request.starts_with("PATCH /rest/bundles "));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let document: JsonApiDocument = serde_json::from_str(body).unwrap();
    assert_eq!(document.data[0].id, "0xb");
    assert_eq!(document.data[0].kind, "bundles");
    assert_eq!(
        document.data[0].attributes.as_ref().unwrap()["metadata"],
        json!({"name": "renamed"})
    );
}

#[tokio::test]
async fn garbage_json_is_a_decode_error() {
    let (base_url, server) = serve_once("200 OK", "not json").await;
    let error = client(&base_url, None)
        .execute_command("0xws", "ls", false)
        .await
        .unwrap_err();
    server.await.unwrap();
    assert!(matches!(error, ApiError::Decode(_)));
}
