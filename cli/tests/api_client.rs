//! Integration tests for the API client.

use std::time::Duration;

use chrono::Utc;
use hackadmin_cli::api::ApiClient;
use hackadmin_shared::{
    ApiError, Filters, HackathonRequest, PageQuery, PaginatedQuery, QueryConfig, RefreshConfig,
    RefreshScheduler, SessionFlag, SessionStatus, SessionStore, Subscription, TokenRefresher,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const FIFTEEN_MINUTES_MS: i64 = 15 * 60 * 1000;

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "admin@example.com", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "accessToken": "old-token",
                    "expiresIn": 900,
                    "user": {"id": "u1", "email": "admin@example.com", "role": "admin"}
                }))
                .append_header("set-cookie", "refreshToken=initial; Path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

async fn signed_in_client(server: &MockServer) -> ApiClient {
    mount_login(server).await;
    let api = ApiClient::new(&format!("{}/api", server.uri()), SessionStore::new()).expect("client");
    api.sign_in("admin@example.com", "secret").await.expect("sign in");
    api
}

fn page_body(rows: serde_json::Value, page: u32, total: u64) -> serde_json::Value {
    json!({
        "data": rows,
        "meta": {
            "page": page,
            "limit": 10,
            "total": total,
            "totalPages": total.div_ceil(10),
            "hasNextPage": (page as u64) * 10 < total,
            "hasPrevPage": page > 1
        }
    })
}

#[tokio::test]
async fn sign_in_stores_session_and_refresh_cookie() {
    let server = MockServer::start().await;
    let before = Utc::now().timestamp_millis();
    let api = signed_in_client(&server).await;

    let snapshot = api.session().snapshot();
    assert_eq!(snapshot.status, SessionStatus::Authenticated);
    let session = snapshot.session.expect("session");
    assert_eq!(session.access_token, "old-token");
    assert_eq!(session.user.map(|user| user.id).as_deref(), Some("u1"));
    assert!(session.access_token_expires_at >= before + FIFTEEN_MINUTES_MS);
    assert_eq!(api.cookie_header().as_deref(), Some("refreshToken=initial"));
}

#[tokio::test]
async fn rejected_sign_in_leaves_session_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let api = ApiClient::new(&format!("{}/api/", server.uri()), SessionStore::new()).expect("client");
    let err = api.sign_in("admin@example.com", "nope").await.expect_err("rejected");
    assert_eq!(
        err,
        ApiError::Http {
            status: 401,
            message: "Invalid credentials".to_string(),
        }
    );
    assert_eq!(api.session().status(), SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn rotated_refresh_cookie_is_used_for_the_next_refresh() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("cookie", "refreshToken=initial"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "new-token-xyz"}))
                .append_header("set-cookie", "refreshToken=rotated-1; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("cookie", "refreshToken=rotated-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "newer-token"})))
        .expect(1)
        .mount(&server)
        .await;

    let scheduler =
        RefreshScheduler::start(api.session().clone(), api.clone(), RefreshConfig::default());
    let before = Utc::now().timestamp_millis();
    assert!(scheduler.refresh_token().await);
    let after = Utc::now().timestamp_millis();

    assert_eq!(api.session().access_token().as_deref(), Some("new-token-xyz"));
    let expires_at = api.session().access_token_expires_at().expect("session");
    assert!(expires_at >= before + FIFTEEN_MINUTES_MS);
    assert!(expires_at <= after + FIFTEEN_MINUTES_MS);
    assert!(scheduler.refresh_error().is_none());
    assert_eq!(api.cookie_header().as_deref(), Some("refreshToken=rotated-1"));

    let refreshed = api.refresh().await.expect("second refresh");
    assert_eq!(refreshed.access_token, "newer-token");
}

#[tokio::test]
async fn refresh_failure_surfaces_backend_message() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid refresh token"})),
        )
        .mount(&server)
        .await;

    let scheduler =
        RefreshScheduler::start(api.session().clone(), api.clone(), RefreshConfig::default());
    assert!(!scheduler.refresh_token().await);

    let err = scheduler.refresh_error().expect("refresh error");
    assert_eq!(
        err,
        ApiError::Http {
            status: 401,
            message: "Invalid refresh token".to_string(),
        }
    );
    assert!(err.is_auth_failure());
    assert_eq!(api.session().access_token().as_deref(), Some("old-token"));
}

#[tokio::test]
async fn refresh_without_token_is_rejected() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    assert_eq!(api.refresh().await, Err(ApiError::MissingToken));
}

#[tokio::test]
async fn list_sends_bearer_token_and_query_parameters() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/admin/hackathon-requests"))
        .and(header("authorization", "Bearer old-token"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(query_param("status", "pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            json!([{"id": "r11", "title": "Rust Jam", "organizer": "ferris", "status": "pending"}]),
            2,
            11,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let query = PageQuery {
        filters: Filters::new().with("status", "pending"),
        page: 2,
        limit: 10,
    };
    let page = api
        .list_hackathon_requests(&query, CancellationToken::new())
        .await
        .expect("page");

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].title, "Rust Jam");
    assert_eq!(page.meta.total_pages, 2);
    assert!(page.meta.has_prev_page);
    assert!(!page.meta.has_next_page);
}

#[tokio::test]
async fn unauthorized_list_flags_session_expired() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .mount(&server)
        .await;

    let query = PageQuery {
        filters: Filters::new(),
        page: 1,
        limit: 10,
    };
    let err = api
        .list_users(&query, CancellationToken::new())
        .await
        .expect_err("unauthorized");
    assert_eq!(err.status(), Some(401));

    let session = api.session().snapshot().session.expect("session");
    assert_eq!(session.error, Some(SessionFlag::AccessTokenExpired));
}

#[tokio::test]
async fn cancelled_list_request_returns_cancelled() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/admin/plans"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_body(json!([]), 1, 0))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let pending = {
        let api = api.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let query = PageQuery {
                filters: Filters::new(),
                page: 1,
                limit: 10,
            };
            api.list_plans(&query, cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("cancellation is prompt")
        .expect("join");
    assert_eq!(result.map(|page| page.data.len()), Err(ApiError::Cancelled));
}

#[tokio::test]
async fn paginated_query_drives_the_admin_endpoint() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/admin/hackathon-requests"))
        .and(query_param("search", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            json!([{"id": "r7", "title": "Alice's Jam"}]),
            1,
            1,
        )))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/hackathon-requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            json!([{"id": "r1", "title": "Spring Hack"}, {"id": "r2", "title": "Summer Hack"}]),
            1,
            2,
        )))
        .mount(&server)
        .await;

    let config = QueryConfig::default().with_debounce(Duration::from_millis(20));
    let query = PaginatedQuery::<HackathonRequest>::spawn(
        api.list_fetcher(),
        config,
    );
    let mut updates = query.subscribe();

    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|state| state.data.len() == 2),
    )
    .await
    .expect("first page in time")
    .expect("query alive");

    assert!(query.set_filter("search", Some("alice".into())));
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|state| !state.loading() && state.data.len() == 1),
    )
    .await
    .expect("search results in time")
    .expect("query alive");

    assert_eq!(query.data()[0].title, "Alice's Jam");
    assert_eq!(query.page(), 1);
    assert!(query.error().is_none());
}

#[tokio::test]
async fn subscriptions_fetcher_hits_the_subscriptions_endpoint() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/admin/subscriptions"))
        .and(query_param("status", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            json!([{"id": "s1", "userId": "u9", "planId": "pro", "status": "active"}]),
            1,
            1,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = QueryConfig::default().with_filters(Filters::new().with("status", "active"));
    let query = PaginatedQuery::<Subscription>::spawn(api.list_fetcher(), config);
    let mut updates = query.subscribe();
    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|state| !state.loading()))
        .await
        .expect("page in time")
        .expect("query alive");

    let rows = query.data();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "u9");
    assert_eq!(rows[0].plan_id, "pro");
}

#[tokio::test]
async fn sign_out_clears_session_even_when_logout_fails() {
    let server = MockServer::start().await;
    let api = signed_in_client(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    api.sign_out().await;
    assert_eq!(api.session().status(), SessionStatus::Unauthenticated);
    assert_eq!(api.session().access_token(), None);
}
