#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use newsdesk_backend::helper::feed_helpers::{self, ChangeKind};
use newsdesk_backend::models::db_operations::articles_db_operations;
use serde_json::{json, Value};

#[actix_web::test]
async fn flood_alert_goes_through_review() {
    let desk = common::desk();
    let chief = desk.superadmin("chief@desk.test");
    let editor = desk.admin(&chief, "editor@desk.test", None);
    let ana = desk.reporter(&chief, "ana@desk.test", true);
    let app = desk_app!(desk);

    let reporter_cookie = log_in!(app, "ana@desk.test");
    let editor_cookie = log_in!(app, "editor@desk.test");
    let chief_cookie = log_in!(app, "chief@desk.test");

    let mut changes = desk.state.change_feed.subscribe();
    let req = TestRequest::post()
        .uri("/api/articles")
        .cookie(reporter_cookie)
        .set_json(json!({ "title": "Flood Alert", "content": "<p>River over its banks.</p>" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let change = changes.try_recv().unwrap();
    assert_eq!((change.table, change.kind), (feed_helpers::ARTICLES, ChangeKind::Insert));
    assert_eq!(change.owner_id.as_deref(), Some(ana.id.as_str()));
    assert!(change.visible_to(&editor));
    assert!(!change.visible_to(&desk.reporter(&chief, "ben@desk.test", true)));

    let transition = |cookie, expected: &str, target: &str| {
        TestRequest::post()
            .uri(&format!("/api/articles/{}/transition", id))
            .cookie(cookie)
            .set_json(json!({ "expected": expected, "target": target }))
            .to_request()
    };

    let resp = test::call_service(&app, transition(editor_cookie.clone(), "pending", "processing")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "processing");
    assert_eq!(body["data"]["reviewed_by"], editor.id.as_str());

    let resp = test::call_service(&app, transition(editor_cookie, "processing", "approved")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let resp = test::call_service(&app, transition(chief_cookie, "processing", "approved")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["reviewed_by"], chief.id.as_str());
    assert!(body["data"]["reviewed_at"].is_string());
}

#[actix_web::test]
async fn unverified_reporter_is_refused_a_session() {
    let desk = common::desk();
    let chief = desk.superadmin("chief@desk.test");
    desk.reporter(&chief, "new@desk.test", false);
    let app = desk_app!(desk);

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "new@desk.test", "password": common::PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let leftover = resp.response().cookies().find(|c| c.name() == "id").map(|c| c.into_owned());
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("pending verification"));

    let mut req = TestRequest::get().uri("/api/session");
    if let Some(cookie) = leftover {
        req = req.cookie(cookie);
    }
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "new@desk.test", "password": "wrong password" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn politics_with_three_articles_cannot_be_deleted() {
    let desk = common::desk();
    let chief = desk.superadmin("chief@desk.test");
    desk.admin(&chief, "editor@desk.test", Some(&["categories", "news"]));
    let app = desk_app!(desk);
    let cookie = log_in!(app, "editor@desk.test");

    let req = TestRequest::post()
        .uri("/api/categories")
        .cookie(cookie.clone())
        .set_json(json!({ "name": "Politics" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let politics = body["data"]["id"].as_str().unwrap().to_string();

    for title in ["Vote", "Budget", "Summit"] {
        let req = TestRequest::post()
            .uri("/api/articles")
            .cookie(cookie.clone())
            .set_json(json!({ "title": title, "content": "<p>text</p>", "category_id": politics }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = TestRequest::delete()
        .uri(&format!("/api/categories/{}", politics))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Cannot delete this category: 3 article(s) still use it.");

    let req = TestRequest::get().uri("/api/categories").cookie(cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let conn = desk.pool.get().unwrap();
    assert_eq!(articles_db_operations::count_by_category(&conn, &politics).unwrap(), 3);
}

#[actix_web::test]
async fn new_article_shows_up_once_in_the_queue() {
    let desk = common::desk();
    let chief = desk.superadmin("chief@desk.test");
    desk.admin(&chief, "editor@desk.test", None);
    desk.reporter(&chief, "ana@desk.test", true);
    let app = desk_app!(desk);
    let reporter_cookie = log_in!(app, "ana@desk.test");
    let editor_cookie = log_in!(app, "editor@desk.test");

    let req = TestRequest::post()
        .uri("/api/articles")
        .cookie(reporter_cookie.clone())
        .set_json(json!({ "title": "Harbour reopens", "content": "<p>Ships are back.</p>" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = TestRequest::get().uri("/api/approval-queue").cookie(editor_cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let hits = body["data"]["data"].as_array().unwrap().iter().filter(|a| a["id"] == id.as_str()).count();
    assert_eq!(hits, 1);
    assert_eq!(body["data"]["count"], 1);

    // Reporters have no approval section.
    let req = TestRequest::get().uri("/api/approval-queue").cookie(reporter_cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn permission_changes_apply_without_logging_in_again() {
    let desk = common::desk();
    let chief = desk.superadmin("chief@desk.test");
    desk.admin(&chief, "triage@desk.test", Some(&["news"]));
    let app = desk_app!(desk);
    let chief_cookie = log_in!(app, "chief@desk.test");
    let triage_cookie = log_in!(app, "triage@desk.test");

    let req = TestRequest::get().uri("/api/session").cookie(triage_cookie.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let sections = body["data"]["access"]["sections"].as_array().unwrap().clone();
    assert!(sections.contains(&json!("news")));
    assert!(sections.contains(&json!("support")));
    assert!(!sections.contains(&json!("approval")));
    let triage_id = body["data"]["account"]["id"].as_str().unwrap().to_string();

    let req = TestRequest::put()
        .uri(&format!("/api/accounts/{}/permissions", triage_id))
        .cookie(chief_cookie)
        .set_json(json!({ "permissions": ["news", "approval"] }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/api/approval-queue").cookie(triage_cookie).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn paging_far_past_the_end_returns_an_empty_page() {
    let desk = common::desk();
    desk.superadmin("chief@desk.test");
    let app = desk_app!(desk);
    let cookie = log_in!(app, "chief@desk.test");

    for uri in ["/api/articles", "/api/approval-queue", "/api/tickets", "/api/accounts?role=admin"] {
        let sep = if uri.contains('?') { '&' } else { '?' };
        let req = TestRequest::get()
            .uri(&format!("{}{}page=4294967295&limit=100", uri, sep))
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["data"], json!([]), "{}", uri);
    }
}

#[actix_web::test]
async fn requests_without_a_session_are_unauthorized() {
    let desk = common::desk();
    let app = desk_app!(desk);
    for uri in ["/api/session", "/api/articles", "/api/tickets", "/api/approval-queue"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}
