// Integration tests for `BackendClient` using wiremock.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homedeck_api::models::{Server, UserToken};
use homedeck_api::otk::{CIPHERTEXT_HEADER, OTK_ID_HEADER};
use homedeck_api::{BackendClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, BackendClient) {
    let server = MockServer::start().await;
    let client = BackendClient::new(
        Url::parse(&server.uri()).unwrap(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn otk_body() -> serde_json::Value {
    json!({ "id": "otk-1", "key": STANDARD.encode([7u8; 32]) })
}

// ── Servers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_servers() {
    let (server, client) = setup().await;
    client.set_token("tok");

    let body = json!([
        { "ipaddress": "10.0.0.5", "name": "host1", "version": 2 },
        { "ipaddress": "10.0.0.9", "name": "host2", "version": 1 },
    ]);

    Mock::given(method("GET"))
        .and(path("/backend/servers"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let servers = client.list_servers().await.unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].ipaddress, "10.0.0.5");
    assert_eq!(servers[0].name, "host1");
    assert_eq!(servers[1].version, 1);
}

#[tokio::test]
async fn test_get_server_full_data() {
    let (server, client) = setup().await;
    client.set_token("tok");

    let body = json!({
        "ipaddress": "10.0.0.5",
        "name": "host1",
        "features": [{
            "id": "docker",
            "name": "Docker",
            "params": [],
            "credentials": [{ "key": "password", "value": "c2VhbGVk" }]
        }],
        "version": 4
    });

    Mock::given(method("GET"))
        .and(path("/backend/servers/10.0.0.5"))
        .and(query_param("full_data", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let full = client.get_server("10.0.0.5", true).await.unwrap();
    assert_eq!(full.features.len(), 1);
    assert_eq!(full.features[0].credentials[0].value, "c2VhbGVk");
}

#[tokio::test]
async fn test_unauthorized_maps_to_session_expired() {
    let (server, client) = setup().await;
    client.set_token("stale");

    Mock::given(method("GET"))
        .and(path("/backend/servers"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_servers().await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
}

#[tokio::test]
async fn test_delete_server() {
    let (server, client) = setup().await;
    client.set_token("tok");

    Mock::given(method("DELETE"))
        .and(path("/backend/servers/10.0.0.5"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    client.delete_server("10.0.0.5").await.unwrap();
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_sends_sealed_password() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/backend_nt/users/authenticate/otk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(otk_body()))
        .mount(&server)
        .await;

    let token_body = json!({
        "user_id": "admin",
        "token": "bearer-token",
        "client_key": "ck"
    });

    Mock::given(method("POST"))
        .and(path("/backend_nt/users/authenticate"))
        .and(header_exists(OTK_ID_HEADER))
        .and(header_exists(CIPHERTEXT_HEADER))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&token_body))
        .mount(&server)
        .await;

    let token: UserToken = client
        .authenticate("admin", &SecretString::from("hunter2".to_owned()))
        .await
        .unwrap();

    assert_eq!(token.user_id, "admin");
    assert_eq!(token.token, "bearer-token");
}

#[tokio::test]
async fn test_authenticate_rejection() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/backend_nt/users/authenticate/otk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(otk_body()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/backend_nt/users/authenticate"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client
        .authenticate("admin", &SecretString::from("wrong".to_owned()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn test_users_exist() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/backend_nt/users/exist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;

    assert!(client.users_exist().await.unwrap());
}

// ── Plugins ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disabled_plugin_ids() {
    let (server, client) = setup().await;
    client.set_token("tok");

    Mock::given(method("GET"))
        .and(path("/backend/plugins/actions"))
        .and(query_param("query", "disabled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["smart", "wol"])))
        .mount(&server)
        .await;

    let ids = client.disabled_plugin_ids().await.unwrap();
    assert_eq!(ids, vec!["smart".to_owned(), "wol".to_owned()]);
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_auto_discover() {
    let (server, client) = setup().await;
    client.set_token("tok");

    let body = json!([
        { "ipaddress": "192.168.1.10", "name": "nas" },
        { "ipaddress": "192.168.1.2", "name": "" },
    ]);

    Mock::given(method("POST"))
        .and(path("/backend/networks/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let found: Vec<Server> = client.auto_discover("192.168.1.0/24", true).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].ipaddress, "192.168.1.10");

    // The request the mock saw must carry the AutoDiscover envelope.
    let requests = server.received_requests().await.unwrap();
    let discover = requests
        .iter()
        .find(|r| r.url.path() == "/backend/networks/actions")
        .unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&discover.body).unwrap();
    assert_eq!(sent["action_type"], "AutoDiscover");
    assert_eq!(sent["params"][0]["name"], "network");
    assert_eq!(sent["params"][0]["value"], "192.168.1.0/24");
    assert_eq!(sent["params"][1]["name"], "lookup_names");
    assert_eq!(sent["params"][1]["value"], "true");
}
