use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use edu_inventory_lib::{db, remote_table::RemoteTable, server::build_router, DuplicateKind};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn router() -> Result<Router> {
    let pool = db::open_memory_pool().await?;
    Ok(build_router(RemoteTable::from_pool(pool).await?))
}

fn body(serial: &str, tag: &str) -> Value {
    json!({
        "brand": "Samsung",
        "serialNumber": serial,
        "assetTag": tag,
        "model": "Monitor",
        "ram": "NotFound",
        "processor": "-",
        "motherboard": "-",
        "storage": "-",
        "location": "E.M.E.I. Estrelinha do Mar"
    })
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn post_returns_created_row() -> Result<()> {
    let router = router().await?;
    let (status, created) = call(&router, "POST", "/items", Some(body("MON1", "500"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], 1);
    assert_eq!(created["serialNumber"], "MON1");
    assert_eq!(created["assetTag"], "500");
    assert!(created["createdAt"].as_i64().unwrap() > 0);

    let (status, rows) = call(&router, "GET", "/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0], created);
    Ok(())
}

#[tokio::test]
async fn duplicates_answer_400_with_three_distinct_messages() -> Result<()> {
    let router = router().await?;
    call(&router, "POST", "/items", Some(body("MON1", "500"))).await;

    let cases = [
        (body("MON1", "501"), DuplicateKind::SerialNumber),
        (body("MON2", "500"), DuplicateKind::AssetTag),
        (body("MON1", "500"), DuplicateKind::Both),
    ];
    for (payload, kind) in cases {
        let (status, err) = call(&router, "POST", "/items", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], kind.to_string());
        assert_eq!(err["code"], kind.code());
    }

    let (_, rows) = call(&router, "GET", "/items", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_payloads_are_rejected_before_insert() -> Result<()> {
    let router = router().await?;

    let mut missing = body("MON1", "500");
    missing["brand"] = json!("");
    let (status, err) = call(&router, "POST", "/items", Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "VALIDATION/MISSING_FIELD");

    let (status, err) = call(&router, "POST", "/items", Some(body("MON1", "5OO"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "VALIDATION/ASSET_TAG_NOT_NUMERIC");

    let (_, rows) = call(&router, "GET", "/items", None).await;
    assert_eq!(rows, json!([]));
    Ok(())
}

#[tokio::test]
async fn cors_preflight_is_permitted() -> Result<()> {
    let router = router().await?;
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/items")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .body(Body::empty())?;
    let resp = router.oneshot(request).await?;
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("access-control-allow-origin"));
    Ok(())
}

#[tokio::test]
async fn concurrent_posts_of_one_serial_insert_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let table = RemoteTable::open(&dir.path().join("items.sqlite3")).await?;
    let router = build_router(table.clone());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let router = router.clone();
        tasks.push(tokio::spawn(async move {
            call(&router, "POST", "/items", Some(body("SAME", &format!("{}", 700 + i)))).await
        }));
    }
    let mut created = 0;
    for task in tasks {
        let (status, _) = task.await?;
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
    assert_eq!(created, 1);
    assert_eq!(table.list_all().await?.len(), 1);
    Ok(())
}
