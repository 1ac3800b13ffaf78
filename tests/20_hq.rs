mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::StatusCode;

#[tokio::test]
async fn hq_is_closed_when_no_key_is_configured() -> Result<()> {
    let app = common::app(None);

    let res = common::send(
        &app.router,
        common::get("/api/hq/tenants").header("x-hq-key", "anything").body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn hq_rejects_missing_or_wrong_key() -> Result<()> {
    let app = common::app(Some("hq-secret"));

    let missing = common::send(&app.router, common::get("/api/hq/tenants").body(Body::empty())?).await?;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = common::send(
        &app.router,
        common::get("/api/hq/tenants").header("x-hq-key", "hq-secreT").body(Body::empty())?,
    )
    .await?;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn hq_lists_active_tenants_without_a_session() -> Result<()> {
    let app = common::app(Some("hq-secret"));

    let res = common::send(
        &app.router,
        common::get("/api/hq/tenants").header("x-hq-key", "hq-secret").body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::OK);
    let slugs: Vec<&str> = res.body["data"]
        .as_array()
        .expect("tenant list")
        .iter()
        .filter_map(|t| t["slug"].as_str())
        .collect();
    assert_eq!(slugs, vec!["northside", "southside"]);
    Ok(())
}

#[tokio::test]
async fn hq_summary_reports_unreachable_tenants_individually() -> Result<()> {
    let app = common::app(Some("hq-secret"));

    let res = common::send(
        &app.router,
        common::get("/api/hq/summary").header("x-hq-key", "hq-secret").body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::OK);
    let rows = res.body["data"].as_array().expect("summary rows");
    assert_eq!(rows.len(), 2);
    for (row, (slug, schema)) in rows.iter().zip([("northside", "t_northside"), ("southside", "t_southside")]) {
        assert_eq!(row["slug"], slug);
        assert_eq!(row["schema"], schema);
        assert_eq!(row["error"], "unavailable");
        assert!(row.get("counts").is_none());
    }
    Ok(())
}
