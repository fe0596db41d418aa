//! Custom test assertions for integration tests

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use imperva_export::Event;
use imperva_export::persist::is_staging_file;

/// Every event received before `timeout` elapsed or the channel closed
pub async fn collect_events(mut events: broadcast::Receiver<Event>, timeout: Duration) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            seen.push(event);
        }
    })
    .await;
    seen
}

/// Assert that `path` holds exactly `expected`
pub fn assert_archive(path: &Path, expected: &[u8]) {
    let contents = std::fs::read(path)
        .unwrap_or_else(|e| panic!("Expected archive at {}: {e}", path.display()));
    assert_eq!(contents, expected, "archive contents differ at {}", path.display());
}

/// Assert that no staging file remains in `dir`
pub fn assert_no_temp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let leftovers: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_staging_file(p))
        .collect();
    assert!(leftovers.is_empty(), "Leftover temp files: {leftovers:?}");
}

/// Assert that `dir` is empty or does not exist
pub fn assert_dir_empty(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let names: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.file_name()).collect();
    assert!(names.is_empty(), "Expected empty directory, found {names:?}");
}
