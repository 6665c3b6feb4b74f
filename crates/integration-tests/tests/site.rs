use indoc::{formatdoc, indoc};
use integration_tests::TestServer;

#[tokio::test]
async fn builtin_page_over_https() {
    let config = indoc! {r#"
        [server.site.tls]
        certificate = "certs/cert.pem"
        key = "certs/key.pem"
    "#};

    let server = TestServer::start(config).await;
    assert!(server.client.base_url().starts_with("https://"));

    let response = server.client.get("/").await;
    assert_eq!(response.status(), 200);

    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    insta::assert_snapshot!(content_type, @"text/html; charset=utf-8");

    let body = response.text().await.unwrap();
    assert!(body.contains("Hello from Tollgate"));
}

#[tokio::test]
async fn plain_http_without_tls() {
    let server = TestServer::start("").await;
    assert!(server.client.base_url().starts_with("http://"));

    let response = server.client.get("/").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let server = TestServer::start("").await;

    let response = server.client.get("/does/not/exist").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn static_root() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "<h1>custom landing page</h1>").unwrap();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    std::fs::write(root.path().join("docs").join("guide.txt"), "read me").unwrap();

    let config = formatdoc! {r#"
        [server.site]
        root = "{}"
    "#, root.path().display().to_string().replace('\\', "/")};

    let server = TestServer::start(&config).await;

    let response = server.client.get("/").await;
    assert_eq!(response.status(), 200);
    insta::assert_snapshot!(response.text().await.unwrap(), @"<h1>custom landing page</h1>");

    let response = server.client.get("/docs/guide.txt").await;
    assert_eq!(response.status(), 200);
    insta::assert_snapshot!(response.text().await.unwrap(), @"read me");

    let response = server.client.get("/docs/missing.txt").await;
    assert_eq!(response.status(), 404);
}
