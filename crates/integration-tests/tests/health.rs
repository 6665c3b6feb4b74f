use indoc::indoc;
use integration_tests::TestServer;

#[tokio::test]
async fn enabled_by_default() {
    let server = TestServer::start("").await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @r#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn disabled() {
    let config = indoc! {r#"
        [server.health]
        enabled = false
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn custom_path() {
    let config = indoc! {r#"
        [server.health]
        path = "/status"
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.get("/status").await;
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @r#"{"status":"healthy"}"#);

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn with_tls() {
    let config = indoc! {r#"
        [server.site.tls]
        certificate = "certs/cert.pem"
        key = "certs/key.pem"
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn separate_listener() {
    let config = indoc! {r#"
        [server.health]
        listen = "127.0.0.1:0"
    "#};

    let server = TestServer::start(config).await;

    let response = server.client.get("/health").await;
    assert_eq!(response.status(), 404);

    let response = server.health.as_ref().unwrap().get("/health").await;
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @r#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn never_rate_limited() {
    let config = indoc! {r#"
        [server.rate_limit]
        rate = "1r/m"
        burst = 1
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/").await.status(), 200);
    assert_eq!(server.client.get("/").await.status(), 429);

    for _ in 0..5 {
        assert_eq!(server.client.get("/health").await.status(), 200);
    }
}
