use crate::test_server::TestProxy;
use config::{File, FileFormat, Map};
use fileproxy::test_util::origin::{CannedResponse, TestOrigin};
use fileproxy_server_lib::config::ConfigLoader;
use poem::http::StatusCode;
use tempfile::tempdir;

mod test_server;

#[tokio::test]
async fn test_api_docs_enabled_by_default() {
    let origin = TestOrigin::start().unwrap();
    let proxy = TestProxy::with_defaults(&origin);
    let response = proxy.client.get("/_docs").send().await;
    response.assert_status_is_ok();
    assert_eq!(origin.request_count(), 0);
}

#[tokio::test]
async fn test_disable_api_docs() {
    let origin = TestOrigin::start().unwrap();
    let (mut config, storage_dir) = TestProxy::config(&origin);
    config.enable_api_docs = false;
    let proxy = TestProxy::new(&config, storage_dir);
    let response = proxy.client.get("/_docs").send().await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serves_with_configuration_from_toml_file() {
    let origin = TestOrigin::start().unwrap();
    origin.route("/foo/bar", CannedResponse::ok("baz"));
    let file = File::from_str(
        &format!(
            "
            [origin]
            url = '{}'
            timeout = '2s'

            [storage]
            type = 'InMemory'

            [auth]
            users = {{ alice = 'qwerty', bob = 'hunter2' }}
            allowed_readers = ['alice']
            ",
            origin.base_url()
        ),
        FileFormat::Toml,
    );
    let config = ConfigLoader::new().add_file_source(file).load().unwrap();
    let proxy = TestProxy::new(&config, tempdir().unwrap());

    let response = proxy.client.get("/foo/bar").send().await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let response = proxy
        .client
        .get("/foo/bar")
        .header("authorization", "Basic Ym9iOmh1bnRlcjI=")
        .send()
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(origin.request_count(), 0);

    let response = proxy
        .client
        .get("/foo/bar")
        .header("authorization", "Basic YWxpY2U6cXdlcnR5")
        .send()
        .await;
    response.assert_status_is_ok();
    response.assert_text("baz").await;
    assert!(proxy.storage_is_empty());
}

#[tokio::test]
async fn test_serves_with_configuration_from_environment() {
    let origin = TestOrigin::start().unwrap();
    origin.route("/foo/bar", CannedResponse::ok("baz"));
    origin.route("/broken", CannedResponse::status(503));
    origin.require_authorization("Bearer origin-token");
    let storage_dir = tempdir().unwrap();
    let env = Map::from([
        (
            "FILEPROXY_ORIGIN__URL".to_string(),
            origin.base_url().to_string(),
        ),
        (
            "FILEPROXY_ORIGIN__ERROR_POLICY".to_string(),
            "PassThrough".to_string(),
        ),
        (
            "FILEPROXY_ORIGIN__AUTH__TYPE".to_string(),
            "Bearer".to_string(),
        ),
        (
            "FILEPROXY_ORIGIN__AUTH__TOKEN".to_string(),
            "origin-token".to_string(),
        ),
        (
            "FILEPROXY_STORAGE__TYPE".to_string(),
            "Filesystem".to_string(),
        ),
        (
            "FILEPROXY_STORAGE__PATH".to_string(),
            storage_dir.path().to_string_lossy().into_owned(),
        ),
    ]);
    let config = ConfigLoader::new()
        .add_environment_source(Some(env))
        .load()
        .unwrap();
    let proxy = TestProxy::new(&config, storage_dir);

    let response = proxy.client.get("/foo/bar").send().await;
    response.assert_status_is_ok();
    response.assert_text("baz").await;
    assert_eq!(proxy.stored("foo/bar").as_deref(), Some("baz"));

    let response = proxy.client.get("/broken").send().await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}
