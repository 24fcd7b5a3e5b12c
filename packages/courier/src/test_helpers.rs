use crate::AppState;
use crate::config::{CourierConfig, FileConfig};

/// Build an `AppState` whose media storage lives in a fresh temp directory.
///
/// Callers must hold the returned `TempDir` for the lifetime of the test.
pub fn test_app_state() -> (AppState, tempfile::TempDir) {
    test_app_state_with(|_| {})
}

/// Like [`test_app_state`], with a hook to adjust the file config first.
pub fn test_app_state_with(adjust: impl FnOnce(&mut FileConfig)) -> (AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut fc = FileConfig::default();
    fc.server.host = "127.0.0.1".to_string();
    fc.storage.path = tmp.path().join("media");
    adjust(&mut fc);

    let config = CourierConfig::from_file(&fc).expect("config");
    let state = AppState::new(&config).expect("state");
    (state, tmp)
}
