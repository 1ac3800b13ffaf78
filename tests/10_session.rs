mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, StatusCode};
use schoolhub_api::auth::ExtraClaims;

#[tokio::test]
async fn whoami_requires_a_bearer_token() -> Result<()> {
    let app = common::app(None);

    let res = common::send(&app.router, common::get("/api/auth/whoami").body(Body::empty())?).await?;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Not authenticated");
    assert!(res.headers.get("x-refreshed-token").is_none());
    Ok(())
}

#[tokio::test]
async fn valid_session_gets_a_refreshed_token() -> Result<()> {
    let app = common::app(None);
    let token = app.tokens.issue(7, &ExtraClaims::for_tenant("northside"))?;

    let res = common::send(
        &app.router,
        common::get("/api/auth/whoami")
            .header(header::AUTHORIZATION, common::bearer(&token))
            .body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["user_id"], 7);
    assert_eq!(res.body["data"]["tenant"], "northside");

    // Out-of-band only: present in the header, absent from the body
    let refreshed = res
        .headers
        .get("x-refreshed-token")
        .expect("refreshed token header")
        .to_str()?
        .to_string();
    assert!(!res.body.to_string().contains(&refreshed));

    let renewed = app.tokens.validate_and_maybe_renew(&refreshed)?;
    assert_eq!(renewed.user_id, 7);
    assert_eq!(renewed.claims.extra.tenant.as_deref(), Some("northside"));
    Ok(())
}

#[tokio::test]
async fn idle_session_looks_like_any_other_auth_failure() -> Result<()> {
    let app = common::app(None);
    let stale_iat = chrono::Utc::now().timestamp() - 21 * 60;
    let idle = app.tokens.issue_at(7, &ExtraClaims::for_tenant("northside"), stale_iat)?;

    let idle_res = common::send(
        &app.router,
        common::get("/api/auth/whoami")
            .header(header::AUTHORIZATION, common::bearer(&idle))
            .body(Body::empty())?,
    )
    .await?;
    let garbage_res = common::send(
        &app.router,
        common::get("/api/auth/whoami")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())?,
    )
    .await?;

    assert_eq!(idle_res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(idle_res.body, garbage_res.body);
    Ok(())
}

#[tokio::test]
async fn unknown_tenant_claim_fails_before_any_transaction() -> Result<()> {
    let app = common::app(None);
    let token = app.tokens.issue(7, &ExtraClaims::for_tenant("doesnotexist"))?;

    let res = common::send(
        &app.router,
        common::get("/api/auth/me")
            .header(header::AUTHORIZATION, common::bearer(&token))
            .body(Body::empty())?,
    )
    .await?;

    // The pool points at nothing; reaching it would surface as a 5xx
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Tenant not found");
    assert!(!res.body.to_string().contains("doesnotexist"));
    Ok(())
}

#[tokio::test]
async fn session_without_tenant_claim_is_tenant_required() -> Result<()> {
    let app = common::app(None);
    let token = app.tokens.issue(7, &ExtraClaims::default())?;

    let res = common::send(
        &app.router,
        common::get("/api/students/42/access")
            .header(header::AUTHORIZATION, common::bearer(&token))
            .body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn tenant_header_cannot_redirect_a_session() -> Result<()> {
    let app = common::app(None);
    let token = app.tokens.issue(7, &ExtraClaims::for_tenant("northside"))?;

    let res = common::send(
        &app.router,
        common::get("/api/auth/me")
            .header(header::AUTHORIZATION, common::bearer(&token))
            .header("x-tenant", "southside")
            .body(Body::empty())?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_requires_explicit_known_tenant() -> Result<()> {
    let app = common::app(None);
    let body = r#"{"email":"teacher@northside.edu","password":"secret"}"#;

    let missing = common::send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))?,
    )
    .await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let unknown = common::send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-tenant", "doesnotexist")
            .body(Body::from(body))?,
    )
    .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn login_rejects_malformed_json() -> Result<()> {
    let app = common::app(None);

    let res = common::send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-tenant", "northside")
            .body(Body::from("{not json"))?,
    )
    .await?;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "INVALID_JSON");
    Ok(())
}

fn preflight(origin: &str) -> axum::http::request::Builder {
    axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/api/auth/whoami")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
}

#[tokio::test]
async fn wildcard_cors_origin_serves_without_credentials() -> Result<()> {
    let app = common::app_with_origins(None, &["*"]);

    let res = common::send(&app.router, preflight("https://portal.example.org").body(Body::empty())?).await?;

    assert_eq!(res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(|v| v.as_bytes()), Some(&b"*"[..]));
    assert!(res.headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    Ok(())
}

#[tokio::test]
async fn listed_cors_origin_allows_credentials() -> Result<()> {
    let app = common::app(None);

    let res = common::send(&app.router, preflight("http://localhost:5173").body(Body::empty())?).await?;

    assert_eq!(
        res.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).map(|v| v.as_bytes()),
        Some(&b"http://localhost:5173"[..])
    );
    assert_eq!(
        res.headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).map(|v| v.as_bytes()),
        Some(&b"true"[..])
    );
    Ok(())
}
