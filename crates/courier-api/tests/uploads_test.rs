mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

fn image(name: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part("image", Part::bytes(bytes.to_vec()).file_name(name).mime_type("image/png"))
}

fn stored_path(app: &common::TestApp, reference: &str) -> std::path::PathBuf {
    app.upload_dir.join(reference.trim_start_matches("/uploads/"))
}

#[tokio::test]
async fn profile_picture_replacement_removes_old_file() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;

    let (h, v) = common::auth_header(&alice);
    let res = app.server.put("/me/photo").add_header(h, v).multipart(image("a.png", b"first")).await;
    res.assert_status_ok();
    let user: Value = res.json();
    let first = user["profile_picture"].as_str().unwrap().to_string();
    assert!(first.starts_with("/uploads/profile-pictures/"));
    assert!(stored_path(&app, &first).exists());

    let (h, v) = common::auth_header(&alice);
    let res = app.server.put("/me/photo").add_header(h, v).multipart(image("b.png", b"second")).await;
    res.assert_status_ok();
    let user: Value = res.json();
    let second = user["profile_picture"].as_str().unwrap().to_string();

    assert_ne!(first, second);
    assert!(!stored_path(&app, &first).exists());
    assert!(stored_path(&app, &second).exists());
}

#[tokio::test]
async fn bad_uploads_are_rejected() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;

    let (h, v) = common::auth_header(&alice);
    app.server
        .put("/me/photo")
        .add_header(h, v)
        .multipart(image("empty.png", b""))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&alice);
    app.server
        .put("/me/photo")
        .add_header(h, v)
        .multipart(image("noextension", b"data"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (h, v) = common::auth_header(&alice);
    app.server
        .put("/me/photo")
        .add_header(h, v)
        .multipart(MultipartForm::new().add_text("caption", "no file"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn group_photo_removed_with_last_member() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;
    let bob = common::login(&app.server, "bob").await;
    let group = common::create_group(&app.server, &alice, "team", &[]).await;
    let id = group["id"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&bob);
    app.server
        .put(&format!("/conversations/{id}/photo"))
        .add_header(h, v)
        .multipart(image("g.png", b"group"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .put(&format!("/conversations/{id}/photo"))
        .add_header(h, v)
        .multipart(image("g.png", b"group"))
        .await;
    res.assert_status_ok();
    let updated: Value = res.json();
    let photo = updated["photo"].as_str().unwrap().to_string();
    assert!(photo.starts_with("/uploads/group-photos/"));
    assert!(stored_path(&app, &photo).exists());

    let (h, v) = common::auth_header(&alice);
    app.server
        .delete(&format!("/conversations/{id}/members/me"))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert!(!stored_path(&app, &photo).exists());
}

#[tokio::test]
async fn attachment_removed_with_its_last_message() {
    let app = common::setup().await;
    let alice = common::login(&app.server, "alice").await;
    let group = common::create_group(&app.server, &alice, "team", &[]).await;
    let id = group["id"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .post(&format!("/conversations/{id}/messages"))
        .add_header(h, v)
        .multipart(MultipartForm::new().add_part(
            "attachment",
            Part::bytes(b"pixels".to_vec()).file_name("pic.png").mime_type("image/png"),
        ))
        .await;
    res.assert_status(StatusCode::CREATED);
    let original: Value = res.json();
    let attachment = original["attachment"].as_str().unwrap().to_string();

    let (h, v) = common::auth_header(&alice);
    let res = app
        .server
        .post(&format!("/conversations/{id}/forwards"))
        .add_header(h, v)
        .json(&json!({ "message_id": original["id"] }))
        .await;
    res.assert_status(StatusCode::CREATED);
    let copy: Value = res.json();
    assert_eq!(copy["attachment"].as_str(), Some(attachment.as_str()));

    // The copy still points at the file.
    let (h, v) = common::auth_header(&alice);
    app.server
        .delete(&format!("/messages/{}", original["id"].as_str().unwrap()))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(stored_path(&app, &attachment).exists());

    let (h, v) = common::auth_header(&alice);
    app.server
        .delete(&format!("/messages/{}", copy["id"].as_str().unwrap()))
        .add_header(h, v)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(!stored_path(&app, &attachment).exists());
}
