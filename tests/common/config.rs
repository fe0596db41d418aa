//! Test configuration helpers for building clients against a mock API

use imperva_export::{ApiConfig, Config, ExportClient, PollConfig, RetryConfig};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// API id every test client sends
pub const TEST_API_ID: &str = "test-api-id";

/// API key every test client sends
pub const TEST_API_KEY: &str = "test-api-key";

/// Config pointing at `base_url` with millisecond retry and poll delays
pub fn test_config(base_url: &str, output_dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            api_id: TEST_API_ID.to_string(),
            api_key: TEST_API_KEY.to_string(),
        },
        output_dir: output_dir.to_path_buf(),
        retry: RetryConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            ..Default::default()
        },
        poll: PollConfig {
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Create an ExportClient talking to `server`, writing into a fresh temp dir
///
/// Returns the client and temp directory (keep temp_dir alive for test duration)
pub fn create_test_client(server: &MockServer) -> (ExportClient, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let client = create_test_client_in(server, temp_dir.path());
    (client, temp_dir)
}

/// Create an ExportClient talking to `server`, writing into `output_dir`
pub fn create_test_client_in(server: &MockServer, output_dir: &Path) -> ExportClient {
    ExportClient::new(test_config(&server.uri(), output_dir)).expect("Failed to create client")
}
