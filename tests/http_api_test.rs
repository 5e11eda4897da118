use chrono::Utc;
use repsol_sync::api::{AccountApi, ApiClient, HttpAccountApi};
use repsol_sync::auth::AuthSession;
use repsol_sync::classify::ErrorKind;
use repsol_sync::config::ApiConfig;
use repsol_sync::model::{Contract, ContractKind, Credentials, Session};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        login_url: format!("{}/accounts.login", server.uri()),
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        ..ApiConfig::default()
    }
}

fn session() -> Session {
    Session {
        uid: "uid-1".to_string(),
        uid_signature: "sig-1".to_string(),
        signature_timestamp: "1700000000".to_string(),
        issued_at: Utc::now(),
        validity: Duration::from_secs(600),
    }
}

fn contract() -> Contract {
    Contract {
        cups: "ES0031000000000001AA".to_string(),
        kind: ContractKind::Electric,
        code: "C1".to_string(),
        house_id: "H1".to_string(),
        active: true,
        raw: json!({}),
    }
}

fn credentials() -> Credentials {
    Credentials::new("user@example.com", "secret")
}

async fn mount_login_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": 0,
            "userInfo": {
                "UID": "uid-1",
                "UIDSignature": "sig-1",
                "signatureTimestamp": "1700000000"
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_success_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .and(body_string_contains("loginID=user%40example.com"))
        .and(body_string_contains("apiKey=test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": 0,
            "userInfo": {"UID": "uid-1", "UIDSignature": "sig-1", "signatureTimestamp": 1700000000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let session = api.login(&credentials()).await.unwrap();
    assert_eq!(session.uid, "uid-1");
    assert_eq!(session.uid_signature, "sig-1");
    assert_eq!(session.signature_timestamp, "1700000000");
    assert!(session.is_valid_at(Utc::now()));
}

#[tokio::test]
async fn login_rejection_payload_is_invalid_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": 403042,
            "errorMessage": "Invalid LoginID"
        })))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let err = api.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAuth);
}

#[tokio::test]
async fn login_unauthorized_status_is_invalid_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let err = api.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAuth);
}

#[tokio::test]
async fn login_non_json_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let err = api.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn slow_upstream_is_cannot_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts.login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = api_config(&server);
    config.request_timeout_secs = 1;
    let api = HttpAccountApi::new(config).unwrap();
    let err = api.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotConnect);
}

#[tokio::test]
async fn unreachable_upstream_is_cannot_connect() {
    let config = ApiConfig {
        login_url: "http://127.0.0.1:9/accounts.login".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 2,
        ..ApiConfig::default()
    };
    let api = HttpAccountApi::new(config).unwrap();
    let err = api.login(&credentials()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotConnect);
}

#[tokio::test]
async fn resource_calls_carry_signature_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contracts"))
        .and(header("UID", "uid-1"))
        .and(header("signature", "sig-1"))
        .and(header("signatureTimestamp", "1700000000"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"code": "H1", "contracts": [
                {"code": "C1", "contractType": "ELECTRICITY", "cups": "ES0031000000000001AA"}
            ]}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let houses = api.list_contracts(&session()).await.unwrap();
    assert_eq!(houses.len(), 1);
    assert_eq!(houses[0].contracts.len(), 1);
}

#[tokio::test]
async fn server_error_is_cannot_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/products/C1/costs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let err = api.get_consumption(&session(), &contract()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotConnect);
}

#[tokio::test]
async fn unexpected_shape_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/products/C1/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "an", "object"])))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let err = api.get_consumption(&session(), &contract()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn missing_next_invoice_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/products/C1/nextInvoice"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let next = api.get_next_invoice(&session(), &contract()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn single_invoice_object_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/houses/H1/products/C1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issueDate": "2025-02-01", "amount": 42.0, "status": "PAID"
        })))
        .mount(&server)
        .await;

    let api = HttpAccountApi::new(api_config(&server)).unwrap();
    let invoices = api.get_invoices(&session(), &contract()).await.unwrap();
    assert_eq!(invoices.into_vec().len(), 1);
}

#[tokio::test]
async fn rejected_session_is_dropped_by_client() {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    Mock::given(method("GET"))
        .and(path("/contracts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api: Arc<dyn AccountApi> = Arc::new(HttpAccountApi::new(api_config(&server)).unwrap());
    let auth = Arc::new(AuthSession::new(Arc::clone(&api), credentials()));
    let client = ApiClient::new(api, Arc::clone(&auth));

    let err = client.list_contracts().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAuth);
    assert!(!auth.has_session().await);
}
