//! File-backed configuration store behaviour on a real filesystem.

use sleepy_core::{
    ClientConfig, ConfigError, ConfigStore, DeviceId, FileConfigStore, HttpMethod, RestClient,
    RouteSpec,
};

fn sample() -> ClientConfig {
    ClientConfig {
        endpoint: "https://api.example.com".to_string(),
        api_key: "key".to_string(),
        api_secret: "secret".to_string(),
        debug: false,
        routes: vec![
            RouteSpec::new("user", HttpMethod::Get, "/users/{id}").signed(),
            RouteSpec::new("score", HttpMethod::Post, "/scores")
                .signed()
                .background(),
            RouteSpec::new("remove", HttpMethod::Delete, "/users/{id}"),
        ],
    }
}

#[test]
fn missing_file_is_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("sleepy.json"));

    let config = store.load().unwrap();
    assert_eq!(config, ClientConfig::default());
    assert!(config.debug);
}

#[test]
fn save_then_load_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("nested").join("sleepy.json"));

    store.save(&sample()).unwrap();
    assert!(store.path().exists());
    assert_eq!(store.load().unwrap(), sample());
}

#[test]
fn saved_document_uses_canonical_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("sleepy.json"));
    store.save(&sample()).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["endpoint"], "https://api.example.com");
    assert_eq!(json["apiKey"], "key");
    assert_eq!(json["apiSecret"], "secret");
    assert_eq!(json["debug"], "false");

    let route = &json["routes"][1];
    assert_eq!(route["Name"], "score");
    assert_eq!(route["Method"], "POST");
    assert_eq!(route["Path"], "/scores");
    assert_eq!(route["Async"], "true");
    assert_eq!(route["Signed"], "true");
    assert!(route.get("Secure").is_none());
}

#[test]
fn malformed_file_is_an_error_not_a_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleepy.json");
    std::fs::write(&path, r#"{"endpoint": "x"}"#).unwrap();

    let store = FileConfigStore::new(&path);
    assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    assert!(RestClient::from_store(&store, DeviceId::new("d")).is_err());
}

#[test]
fn unreadable_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be.
    let store = FileConfigStore::new(dir.path());
    assert!(matches!(store.load(), Err(ConfigError::Io { .. })));
}

#[test]
fn client_built_from_file_sees_routes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("sleepy.json"));
    store.save(&sample()).unwrap();

    let client = RestClient::from_store(&store, DeviceId::new("d")).unwrap();
    let names: Vec<_> = client.routes().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["user", "score", "remove"]);
    assert!(client.route("score").unwrap().is_async());
}
