//! Integration tests for the protocol client against a mock game server

#![allow(clippy::unwrap_used)]

mod common;

use common::{direct, fast_options, profile, sealed, token, version_file};
use sekai_protocol::{
    ClientError, ClientOptions, ClientState, CookieHelper, ImageBody, MasterPayload,
    ProtocolClient, Region, ensure_crypto_provider,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_direct_login(server: &MockServer, user_id: i64, token: &str) {
    Mock::given(method("PUT"))
        .and(path(format!("/api/user/{user_id}/auth")))
        .and(query_param("refreshUpdatedResources", "False"))
        .respond_with(sealed(
            200,
            &json!({
                "sessionToken": token,
                "dataVersion": "5.0.0.11",
                "assetVersion": "5.0.0.21",
                "suiteMasterSplitPath": ["suite/master/a", "suite/master/b"]
            }),
        ))
        .mount(server)
        .await;
}

async fn client(
    server: &MockServer,
    region: Region,
    account: sekai_protocol::Account,
    options: ClientOptions,
) -> (tempfile::TempDir, ProtocolClient) {
    ensure_crypto_provider();
    let (dir, versions) = version_file();
    let mut client = ProtocolClient::new(
        Arc::new(profile(region, &server.uri())),
        Arc::new(options),
        account,
        Arc::new(versions),
        None,
    )
    .unwrap();
    client.init().await.unwrap();
    (dir, client)
}

#[tokio::test]
async fn test_init_applies_version_headers() {
    let server = MockServer::start().await;
    let (_dir, client) = client(&server, Region::Jp, direct(42), fast_options()).await;

    assert_eq!(client.state(), ClientState::Ready);
    assert_eq!(client.session().get("x-app-version"), Some("5.0.0"));
    assert_eq!(client.session().get("x-app-hash"), Some("apphash"));
}

#[tokio::test]
async fn test_direct_login_and_token_capture() {
    let server = MockServer::start().await;
    mount_direct_login(&server, 42, "token-1").await;

    Mock::given(method("GET"))
        .and(path("/api/user/42/profile"))
        .and(header("x-session-token", "token-1"))
        .respond_with(
            sealed(200, &json!({"user": {"name": "miku"}}))
                .insert_header("X-Session-Token", "token-2"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .and(header("x-session-token", "token-2"))
        .respond_with(sealed(200, &json!({"serverDate": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(42), fast_options()).await;
    let login = client.login().await.unwrap();
    assert_eq!(login.session_token(), Some("token-1"));
    assert_eq!(client.state(), ClientState::Authenticated);
    assert_eq!(client.session().get("x-data-version"), Some("5.0.0.11"));

    let profile = client.get("/user/%user_id/profile", &[]).await.unwrap();
    assert_eq!(profile.status, 200);
    assert_eq!(profile.body["user"]["name"], "miku");

    let system = client.get("/system", &[]).await.unwrap();
    assert_eq!(system.body["serverDate"], 1);
}

#[tokio::test]
async fn test_token_login_resolves_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/auth"))
        .respond_with(sealed(
            200,
            &json!({"sessionToken": "t", "userRegistration": {"userId": 777}}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Tw, token("access"), fast_options()).await;
    assert_eq!(client.user_id(), None);
    client.login().await.unwrap();
    assert_eq!(client.user_id(), Some(777));
}

#[tokio::test]
async fn test_login_upgrade_required() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(426))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(1), fast_options()).await;
    assert!(matches!(
        client.login().await,
        Err(ClientError::UpgradeRequired)
    ));
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_client_error_payload_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/event/9/ranking"))
        .and(query_param("targetRank", "100"))
        .respond_with(sealed(404, &json!({"errorCode": "not_found"})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(1), fast_options()).await;
    let response = client
        .get(
            "/event/9/ranking",
            &[("targetRank".to_string(), "100".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body["errorCode"], "not_found");
}

#[tokio::test]
async fn test_maintenance_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .respond_with(sealed(503, &json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::En, direct(1), fast_options()).await;
    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::UnderMaintenance)
    ));
}

#[tokio::test]
async fn test_timeout_uses_full_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .respond_with(sealed(200, &json!({})).set_delay(Duration::from_millis(500)))
        .expect(4)
        .mount(&server)
        .await;

    let options = ClientOptions {
        timeout: Duration::from_millis(50),
        ..fast_options()
    };
    let (_dir, mut client) = client(&server, Region::Jp, direct(1), options).await;
    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::Timeout)
    ));
}

#[tokio::test]
async fn test_session_error_triggers_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/user/5/auth"))
        .respond_with(sealed(200, &json!({"sessionToken": "fresh"})))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .respond_with(sealed(403, &json!({})))
        .expect(4)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(5), fast_options()).await;
    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::SessionExpired)
    ));
    assert_eq!(client.session().session_token(), Some("fresh"));
}

#[tokio::test]
async fn test_unexpected_response_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .expect(4)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(1), fast_options()).await;
    match client.get("/system", &[]).await {
        Err(ClientError::UnexpectedResponse { status, body, .. }) => {
            assert_eq!(status, 500);
            assert!(body.contains("oops"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_cookie_expiry_refreshes_cookies() {
    ensure_crypto_provider();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/signature"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "CloudFront-Key=1"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .and(header("cookie", "CloudFront-Key=1"))
        .respond_with(ResponseTemplate::new(403).set_body_raw("<Error/>", "text/xml"))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, versions) = version_file();
    let cookies = CookieHelper::new(
        format!("{}/api/signature", server.uri()),
        reqwest::Client::new(),
    );
    let mut client = ProtocolClient::new(
        Arc::new(profile(Region::Jp, &server.uri()).with_cookies(true)),
        Arc::new(fast_options()),
        direct(1),
        Arc::new(versions),
        Some(Arc::new(cookies)),
    )
    .unwrap();
    client.init().await.unwrap();

    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::CookieExpired)
    ));
}

#[tokio::test]
async fn test_unreachable_proxy_falls_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .respond_with(sealed(200, &json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let options = fast_options().with_proxies(vec![
        "http://127.0.0.1:1".to_string(),
        String::new(),
    ]);
    let (_dir, mut client) = client(&server, Region::Jp, direct(1), options).await;
    let response = client.get("/system", &[]).await.unwrap();
    assert_eq!(response.body["ok"], true);
}

#[tokio::test]
async fn test_all_proxies_unreachable() {
    let server = MockServer::start().await;
    let options = fast_options().with_proxies(vec!["http://127.0.0.1:1".to_string()]);
    let (_dir, mut client) = client(&server, Region::Jp, direct(1), options).await;
    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::ProxyUnreachable { .. })
    ));
}

#[tokio::test]
async fn test_get_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image/mysekai/photo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/image/mysekai/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (_dir, client) = client(&server, Region::Jp, direct(1), fast_options()).await;

    let found = client.get_image("/mysekai/photo.png").await;
    assert_eq!(found.status, 200);
    assert_eq!(found.body, ImageBody::Data(bytes::Bytes::from_static(b"\x89PNG")));

    let missing = client.get_image("/mysekai/missing.png").await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.bytes().as_ref(), b"Error");
}

#[tokio::test]
async fn test_download_split_master() {
    let server = MockServer::start().await;
    mount_direct_login(&server, 42, "tok").await;
    Mock::given(method("GET"))
        .and(path("/api/suite/master/a"))
        .respond_with(sealed(200, &json!({"cards": [{"id": 1}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/suite/master/b"))
        .respond_with(sealed(200, &json!({"events": [{"id": 2}]})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut client) = client(&server, Region::Jp, direct(42), fast_options()).await;
    match client.download_master_data().await.unwrap() {
        MasterPayload::Split(tables) => {
            assert_eq!(tables["cards"], json!([{"id": 1}]));
            assert_eq!(tables["events"], json!([{"id": 2}]));
        }
        MasterPayload::Packed(_) => panic!("expected split master data"),
    }
}

#[tokio::test]
async fn test_download_packed_master() {
    ensure_crypto_provider();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/auth"))
        .respond_with(sealed(
            200,
            &json!({"sessionToken": "t", "cdnVersion": 12, "userRegistration": {"userId": 9}}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/master-data-12.info"))
        .respond_with(sealed(200, &json!({"cards": [[1, "a"]]})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, versions) = version_file();
    let mut client = ProtocolClient::new(
        Arc::new(
            profile(Region::Kr, &server.uri()).with_master_data_url(format!("{}/cdn", server.uri())),
        ),
        Arc::new(fast_options()),
        token("access"),
        Arc::new(versions),
        None,
    )
    .unwrap();
    client.init().await.unwrap();

    match client.download_master_data().await.unwrap() {
        MasterPayload::Packed(tables) => assert_eq!(tables["cards"], json!([[1, "a"]])),
        MasterPayload::Split(_) => panic!("expected packed master data"),
    }
}

#[tokio::test]
async fn test_close() {
    let server = MockServer::start().await;
    let (_dir, mut client) = client(&server, Region::Jp, direct(1), fast_options()).await;
    client.close();
    assert_eq!(client.state(), ClientState::Closed);
    assert!(matches!(
        client.get("/system", &[]).await,
        Err(ClientError::NotInitialized)
    ));
}
