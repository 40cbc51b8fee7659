//! Integration tests for the 17track client
//!
//! A local axum server stands in for the user and buyer APIs and records
//! every call it receives.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use seventeentrack::{Client, SeventeenTrackError};
use tokio::net::TcpListener;

const TOKEN: &str = "good-token";

#[derive(Clone, Default)]
struct MockApi {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    add_code: i64,
    /// When set, the non-archived list holds this many generated packages
    bulk: usize,
}

impl MockApi {
    fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn param_of(&self, method: &str) -> Value {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .unwrap()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(|c| c == format!("Last-Event-ID={TOKEN}"))
        .unwrap_or(false)
}

async fn user_api(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["method"], "GetUserInfo");
    if authorized(&headers) {
        Json(json!({ "Code": 0, "Json": { "uid": 8805512 } }))
    } else {
        Json(json!({ "Code": -11, "Message": "not signed in" }))
    }
}

async fn buyer_api(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let param = body["param"].clone();
    api.calls.lock().unwrap().push((method.clone(), param.clone()));

    if !authorized(&headers) {
        return Json(json!({ "Code": -11 }));
    }

    let reply = match method.as_str() {
        "GetTrackInfoList" if param["IsArchived"] == json!(true) => json!({
            "Code": 0,
            "Json": [{
                "FTrackInfoId": 2,
                "FTrackNo": "410",
                "FRemark": "friendly name 2",
                "FLastEvent": r#"{"z":"info text 2","a":"2020-07-10 10:32","c":"location 2"}"#,
                "FSecondCountry": 206,
                "FPackageState": 20,
            }]
        }),
        "GetTrackInfoList" if api.bulk > 0 => {
            let page = param["Page"].as_u64().unwrap_or(1) as usize;
            let per_page = param["PerPage"].as_u64().unwrap_or(40) as usize;
            let rows: Vec<Value> = (0..api.bulk)
                .skip((page - 1) * per_page)
                .take(per_page)
                .map(|n| json!({ "FTrackInfoId": 100 + n, "FTrackNo": format!("BULK{n}") }))
                .collect();
            json!({ "Code": 0, "Json": rows })
        }
        "GetTrackInfoList" => json!({
            "Code": 0,
            "Json": [{
                "FTrackInfoId": 1,
                "FTrackNo": "456",
                "FRemark": "friendly name 1",
                "FLastEvent": r#"{"z":"info text 1","a":"2020-08-10 10:32","c":"location 1"}"#,
                "FSecondCountry": 206,
                "FPackageState": 10,
                "FLang": "en",
            }]
        }),
        "GetIndexData" => json!({
            "Code": 0,
            "Json": { "eitem": [
                { "e": 10, "ec": 1 },
                { "e": 35, "ec": 1 },
                { "e": 77, "ec": 9 },
            ] }
        }),
        "AddTrackNo" => json!({ "Code": api.add_code, "Json": null }),
        "SetTrackRemark" | "SetTrackCarrier" => json!({ "Code": 0, "Json": null }),
        other => panic!("unexpected method {other}"),
    };
    Json(reply)
}

async fn serve(api: MockApi) -> Client {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/userapi/call", post(user_api))
        .route("/orderapi/call", post(buyer_api))
        .with_state(api);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Client::with_endpoints(
        reqwest::Client::new(),
        format!("http://{addr}/userapi/call"),
        format!("http://{addr}/orderapi/call"),
    )
}

async fn logged_in(api: MockApi) -> Client {
    let mut client = serve(api).await;
    assert!(client.profile.login(TOKEN).await.unwrap());
    client
}

#[tokio::test]
async fn test_login_success_stores_account_id() {
    let client = logged_in(MockApi::default()).await;
    assert_eq!(client.profile.account_id(), Some("8805512"));
}

#[tokio::test]
async fn test_login_rejected_token() {
    let mut client = serve(MockApi::default()).await;
    assert!(!client.profile.login("bad-token").await.unwrap());
    assert_eq!(client.profile.account_id(), None);

    let err = client.profile.summary(false).await.unwrap_err();
    assert!(matches!(err, SeventeenTrackError::NotLoggedIn));
}

#[tokio::test]
async fn test_packages_are_mapped() {
    let api = MockApi::default();
    let client = logged_in(api.clone()).await;

    let packages = client
        .profile
        .packages(false, chrono_tz::Europe::Berlin)
        .await
        .unwrap();
    assert_eq!(packages.len(), 1);
    let package = &packages[0];
    assert_eq!(package.tracking_number, "456");
    assert_eq!(package.friendly_name.as_deref(), Some("friendly name 1"));
    assert_eq!(package.status, "In Transit");
    assert_eq!(package.location, "location 1");
    assert_eq!(package.destination_country, "Brazil");
    assert_eq!(
        package.timestamp.unwrap().to_rfc3339(),
        "2020-08-10T12:32:00+02:00"
    );

    let param = api.param_of("GetTrackInfoList");
    assert_eq!(param["IsArchived"], json!(false));
    assert_eq!(param["PerPage"], json!(40));

    let archived = client.profile.packages(true, chrono_tz::UTC).await.unwrap();
    assert_eq!(archived[0].tracking_number, "410");
    assert_eq!(archived[0].status, "Expired");
}

#[tokio::test]
async fn test_packages_are_read_across_pages() {
    let api = MockApi {
        bulk: 45,
        ..Default::default()
    };
    let client = logged_in(api.clone()).await;

    let packages = client.profile.packages(false, chrono_tz::UTC).await.unwrap();
    assert_eq!(packages.len(), 45);
    assert_eq!(packages[44].tracking_number, "BULK44");
    let pages: Vec<Value> = api
        .params_of("GetTrackInfoList")
        .iter()
        .map(|p| p["Page"].clone())
        .collect();
    assert_eq!(pages, vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn test_add_package_finds_package_on_later_page() {
    let api = MockApi {
        bulk: 45,
        ..Default::default()
    };
    let client = logged_in(api.clone()).await;

    client
        .profile
        .add_package_with_carrier("BULK44", None, Some("Shoes"))
        .await
        .unwrap();
    assert_eq!(
        api.param_of("SetTrackRemark"),
        json!({ "TrackInfoId": "144", "Remark": "Shoes" })
    );
}

#[tokio::test]
async fn test_summary_contains_every_status() {
    let client = logged_in(MockApi::default()).await;
    let summary = client.profile.summary(false).await.unwrap();

    assert_eq!(summary.len(), 7);
    assert_eq!(summary["In Transit"], 1);
    assert_eq!(summary["Undelivered"], 1);
    assert_eq!(summary["Delivered"], 0);
    assert_eq!(summary.get_index(0).map(|(k, _)| k.as_str()), Some("Not Found"));
}

#[tokio::test]
async fn test_add_package_without_extras_is_single_call() {
    let api = MockApi::default();
    let client = logged_in(api.clone()).await;

    client
        .profile
        .add_package_with_carrier("NEW123", None, None)
        .await
        .unwrap();
    assert_eq!(api.methods(), vec!["AddTrackNo"]);
    assert_eq!(api.param_of("AddTrackNo"), json!({ "TrackNos": ["NEW123"] }));
}

#[tokio::test]
async fn test_add_package_sets_carrier_and_remark() {
    let api = MockApi::default();
    let client = logged_in(api.clone()).await;

    client
        .profile
        .add_package_with_carrier("456", Some("DHL"), Some("Shoes"))
        .await
        .unwrap();
    assert_eq!(
        api.methods(),
        vec!["AddTrackNo", "GetTrackInfoList", "SetTrackCarrier", "SetTrackRemark"]
    );
    assert_eq!(
        api.param_of("SetTrackRemark"),
        json!({ "TrackInfoId": "1", "Remark": "Shoes" })
    );
    assert_eq!(api.param_of("SetTrackCarrier")["Carrier"], "DHL");
}

#[tokio::test]
async fn test_add_package_unknown_after_add() {
    let client = logged_in(MockApi::default()).await;
    let err = client
        .profile
        .add_package_with_carrier("NOT-LISTED", None, Some("Shoes"))
        .await
        .unwrap_err();
    assert!(matches!(err, SeventeenTrackError::InvalidTrackingNumber(n) if n == "NOT-LISTED"));
}

#[tokio::test]
async fn test_add_package_rejected() {
    let api = MockApi {
        add_code: -5,
        ..Default::default()
    };
    let client = logged_in(api.clone()).await;
    let err = client
        .profile
        .add_package_with_carrier("456", None, Some("Shoes"))
        .await
        .unwrap_err();
    assert!(matches!(err, SeventeenTrackError::Request(_)));
    assert_eq!(api.methods(), vec!["AddTrackNo"]);
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let mut client = Client::with_endpoints(
        reqwest::Client::new(),
        "http://127.0.0.1:9/userapi/call",
        "http://127.0.0.1:9/orderapi/call",
    );
    let err = client.profile.login(TOKEN).await.unwrap_err();
    assert!(matches!(err, SeventeenTrackError::Http(_)));
}
