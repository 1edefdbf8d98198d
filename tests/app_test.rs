#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use fillrate::app::{AppState, router};
use fillrate::config::AppConfig;
use fillrate::dashboard;
use fillrate::loader::{self, LoadedTable};
use fillrate::profile::DashboardProfile;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const PO_LINES: &str = "\
manufacturer_name,category_name,subcategory_name,wh_name,sku_po_qty,sku_grn_qty,sku_level_fill_rate,overall_po_fill_rate
Acme,Snacks,Chips,WH1,100,90,90%,95%
Bolt,Drinks,Soda,WH2,50,25,50%,60%
Bolt,Snacks,Nuts,WH1,200,200,100%,100%
";

const BOUNDARY: &str = "fillrate-test-boundary";

fn app(profile: DashboardProfile, preload: bool) -> Router {
    router(state(profile, preload))
}

fn state(profile: DashboardProfile, preload: bool) -> Arc<AppState> {
    let preloaded = preload.then(|| {
        let table = loader::from_csv_reader(PO_LINES.as_bytes()).unwrap();
        let table = dashboard::prepare_table(table, &profile).unwrap();
        (
            "po.csv".to_string(),
            LoadedTable {
                table,
                sheet_names: Vec::new(),
            },
        )
    });
    Arc::new(AppState::with_data(AppConfig::default(), profile, preloaded))
}

fn upload_request(filename: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = filename,
        c = contents
    );
    Request::post("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_filter_and_export() {
    let app = app(DashboardProfile::po_fill_rate(), false);

    let response = app
        .clone()
        .oneshot(upload_request("po.csv", PO_LINES))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body = json_body(response).await;
    assert_eq!(body["rows"], 3);
    assert_eq!(body["filename"], "po.csv");

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/dashboard")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"filters": {"manufacturer_name": "Bolt"}}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = json_body(response).await;
    assert_eq!(view["row_count"], 3);
    assert_eq!(view["filtered_row_count"], 2);
    assert_eq!(view["kpis"][0]["value"], 250.0);
    assert_eq!(view["filters"][0]["selection"], "Bolt");

    // the selection is remembered for the next plain request
    let response = app
        .clone()
        .oneshot(
            Request::get("/api/dashboard")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["filtered_row_count"], 2);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/export/csv")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("filtered_data.csv"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.lines().all(|l| !l.starts_with("Acme")));
}

#[tokio::test]
async fn stale_selection_falls_back_to_all() {
    let app = app(DashboardProfile::po_fill_rate(), true);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/dashboard")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"filters": {"wh_name": "WH9"}}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = json_body(response).await;
    assert_eq!(view["filtered_row_count"], 3);
    assert_eq!(view["filters"][3]["selection"], "All");
}

#[tokio::test]
async fn preloaded_data_serves_new_sessions() {
    let app = app(DashboardProfile::po_fill_rate(), true);

    let response = app
        .clone()
        .oneshot(Request::get("/api/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    let view = json_body(response).await;
    assert_eq!(view["title"], "Fill Rate Dashboard");
    assert_eq!(view["fill_rates"][0]["label"], "QFR (%)");

    let response = app
        .oneshot(
            Request::get("/api/export/summary/category")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("category")
    );
}

#[tokio::test]
async fn dashboard_without_data_is_not_found() {
    let app = app(DashboardProfile::po_fill_rate(), false);
    let response = app
        .oneshot(Request::get("/api/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn upload_missing_required_columns_is_rejected() {
    let app = app(DashboardProfile::qfr_pivot(), false);
    let response = app
        .oneshot(upload_request("pivot.csv", "Category,Sum of QFR\nSnacks,80%\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("Manufacturer"));
}

#[tokio::test]
async fn unknown_chart_is_not_found() {
    let app = app(DashboardProfile::po_fill_rate(), true);
    let response = app
        .oneshot(
            Request::get("/api/export/summary/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn email_without_relay_is_a_gateway_error() {
    let app = app(DashboardProfile::po_fill_rate(), true);
    let response = app
        .oneshot(
            Request::post("/api/email")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"to": "buyer@example.com", "chart": "category"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(body["message"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn malformed_json_gets_a_json_error() {
    let app = app(DashboardProfile::po_fill_rate(), true);
    let response = app
        .oneshot(
            Request::post("/api/dashboard")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn upload_without_multipart_gets_a_json_error() {
    let app = app(DashboardProfile::po_fill_rate(), false);
    let response = app
        .oneshot(
            Request::post("/api/upload")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("sku,qty"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["status"], "error");
}

#[tokio::test]
async fn cookieless_downloads_do_not_create_sessions() {
    let state = state(DashboardProfile::po_fill_rate(), true);
    let app = router(Arc::clone(&state));

    for _ in 0..50 {
        let response = app
            .clone()
            .oneshot(Request::get("/api/export/csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(header::SET_COOKIE));
    }
    assert_eq!(state.session_count(), 0);

    let response = app
        .oneshot(Request::get("/api/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn chart_is_a_png_or_a_json_error() {
    let app = app(DashboardProfile::po_fill_rate(), true);
    let response = app
        .clone()
        .oneshot(Request::get("/api/chart/category").body(Body::empty()).unwrap())
        .await
        .unwrap();
    // rendering needs system fonts, which test machines may lack
    if response.status() == StatusCode::OK {
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    } else {
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["status"], "error");
    }

    let response = app
        .oneshot(Request::get("/api/chart/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
