//! API payload fixtures and mock endpoint helpers

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Account used throughout the tests
pub const CAID: i64 = 123456;

/// A well-formed job handle
pub const HANDLE: &str = "28c5f5af-bd9e-423f-99a7-d2a8c440db7e";

/// Bytes served as the finished archive
pub const ARCHIVE: &[u8] = b"PK\x03\x04terraform export archive";

/// Body of an accepted export request
pub fn accepted_body(handle: &str) -> String {
    format!(r#"{{"handler": "{handle}", "status": "Export is in progress"}}"#)
}

/// Structured error envelope with a single entry
pub fn api_error_body(status: u16, title: &str, detail: &str) -> String {
    format!(
        r#"{{"errors":[{{"status":{status},"id":"error1","code":"Error{status}","source":{{"pointer":"/export"}},"title":"{title}","detail":"{detail}"}}]}}"#
    )
}

/// Path of the status endpoint for `handle`
pub fn download_path(handle: &str) -> String {
    format!("/v3/download/{handle}")
}

/// Mount a submit endpoint answering `202` with `handle`
pub async fn mount_submit(server: &MockServer, handle: &str) {
    Mock::given(method("POST"))
        .and(path("/v3/export"))
        .and(query_param("caid", CAID.to_string()))
        .respond_with(ResponseTemplate::new(202).set_body_string(accepted_body(handle)))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a status endpoint answering `202` for the first `pending` polls,
/// then `200` with [`ARCHIVE`]
pub async fn mount_status(server: &MockServer, handle: &str, pending: u64) {
    if pending > 0 {
        Mock::given(method("GET"))
            .and(path(download_path(handle)))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(pending)
            .expect(pending)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(download_path(handle)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARCHIVE.to_vec()))
        .mount(server)
        .await;
}
