mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

async fn send_text(app: &common::TestApp, token: &str, conversation: &str, content: &str) -> Value {
    let (h, v) = common::auth_header(token);
    let res = app
        .server
        .post(&format!("/conversations/{conversation}/messages"))
        .add_header(h, v)
        .multipart(MultipartForm::new().add_text("content", content.to_string()))
        .await;
    res.assert_status(StatusCode::CREATED);
    res.json()
}

/// Private chat, read receipt, forward into a group, then a refused edit.
#[tokio::test]
async fn forward_and_read_tracking_scenario() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;
    let bob = common::login(&app.server, "bob").await;
    let carol = common::login(&app.server, "carol").await;

    let c1 = common::create_private(&app.server, &alice, &bob).await;
    let c1 = c1["id"].as_str().unwrap().to_string();
    let m1 = send_text(&app, &alice, &c1, "hi").await;
    assert_eq!(m1["is_forwarded"], false);
    assert_eq!(m1["sender"]["id"], json!(alice));

    let (h, v) = common::auth_header(&bob);
    let res = app.server.get(&format!("/conversations/{c1}")).add_header(h, v).await;
    res.assert_status_ok();
    let conversation: Value = res.json();
    let read_by = &conversation["messages"][0]["read_by"];
    assert!(read_by.get(&bob).is_some());
    assert!(read_by.get(&alice).is_none());

    let c2 = common::create_group(&app.server, &alice, "team", &[&bob, &carol]).await;
    let c2 = c2["id"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .post(&format!("/conversations/{c2}/forwards"))
        .add_header(h, v)
        .json(&json!({ "message_id": m1["id"] }))
        .await;
    res.assert_status(StatusCode::CREATED);
    let m2: Value = res.json();
    assert_eq!(m2["content"], "hi");
    assert_eq!(m2["is_forwarded"], true);
    assert_eq!(m2["original_message_id"], m1["id"]);
    assert_eq!(m2["conversation_id"], json!(c2));

    let (h, v) = common::auth_header(&alice);
    let id = m2["id"].as_str().unwrap();
    app.server
        .patch(&format!("/messages/{id}"))
        .add_header(h, v)
        .json(&json!({ "content": "changed" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Carol cannot pull messages out of a conversation she is not in.
    let (h, v) = common::auth_header(&carol);
    app.server
        .post(&format!("/conversations/{c2}/forwards"))
        .add_header(h, v)
        .json(&json!({ "message_id": m1["id"] }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn edit_delete_and_comments() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;
    let bob = common::login(&app.server, "bob").await;
    let conv = common::create_private(&app.server, &alice, &bob).await;
    let conv = conv["id"].as_str().unwrap().to_string();
    let msg = send_text(&app, &alice, &conv, "hi").await;
    let id = msg["id"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&bob);
    app.server
        .patch(&format!("/messages/{id}"))
        .add_header(h, v)
        .json(&json!({ "content": "mine now" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .patch(&format!("/messages/{id}"))
        .add_header(h, v)
        .json(&json!({ "content": "hello" }))
        .await;
    res.assert_status_ok();
    let edited: Value = res.json();
    assert_eq!(edited["content"], "hello");
    assert!(edited["edited_at"].is_string());

    let (h, v) = common::auth_header(&bob);
    let res = app
        .server
        .post(&format!("/messages/{id}/comments"))
        .add_header(h, v)
        .json(&json!({ "emoji": "👍" }))
        .await;
    res.assert_status(StatusCode::CREATED);
    let comment: Value = res.json();

    let (h, v) = common::auth_header(&bob);
    app.server
        .post(&format!("/messages/{id}/comments"))
        .add_header(h, v)
        .json(&json!({ "emoji": "🎉" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let (h, v) = common::auth_header(&alice);
    app.server
        .post(&format!("/messages/{id}/comments"))
        .add_header(h, v)
        .json(&json!({ "emoji": "lol" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let comment_id = comment["id"].as_str().unwrap();
    let (h, v) = common::auth_header(&alice);
    app.server
        .delete(&format!("/comments/{comment_id}"))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (h, v) = common::auth_header(&bob);
    app.server
        .delete(&format!("/comments/{comment_id}"))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let (h, v) = common::auth_header(&alice);
    app.server
        .delete(&format!("/messages/{id}"))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let (h, v) = common::auth_header(&alice);
    let conversation: Value = app.server.get(&format!("/conversations/{conv}")).add_header(h, v).await.json();
    assert_eq!(conversation["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn message_needs_content_or_attachment() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;
    let bob = common::login(&app.server, "bob").await;
    let conv = common::create_private(&app.server, &alice, &bob).await;
    let conv = conv["id"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&alice);
    app.server
        .post(&format!("/conversations/{conv}/messages"))
        .add_header(h, v)
        .multipart(MultipartForm::new().add_text("content", ""))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&alice);
    app.server
        .post(&format!("/conversations/{conv}/messages"))
        .add_header(h, v)
        .multipart(MultipartForm::new().add_text("content", "hi").add_text("reply_to", "nope"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .post(&format!("/conversations/{conv}/messages"))
        .add_header(h, v)
        .multipart(
            MultipartForm::new().add_part(
                "attachment",
                Part::bytes(b"not really a png".to_vec())
                    .file_name("pic.png")
                    .mime_type("image/png"),
            ),
        )
        .await;
    res.assert_status(StatusCode::CREATED);
    let message: Value = res.json();
    let attachment = message["attachment"].as_str().unwrap();
    assert!(attachment.starts_with("/uploads/attachments/"));
    assert!(message.get("content").is_none());

    // Stored files are served back as-is.
    let served = app.server.get(attachment).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), b"not really a png");
}
