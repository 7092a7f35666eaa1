use std::time::Duration;

use accio::FetchError;
use accio::cancel::CancelSignal;
use accio::transport::{FetchOptions, Fetcher, HttpFetcher, create_client};

use crate::{ApiServer, config, fetcher, setup};

fn options() -> FetchOptions {
    FetchOptions {
        with_credentials: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fetch_player() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let player = fetcher
        .fetch_json("/api/player/42/full", options())
        .await
        .unwrap();

    assert_eq!(player["name"], "Player 42");
    assert_eq!(server.hits("/api/player/42/full"), 1);
}

#[tokio::test]
async fn test_absolute_url() {
    setup();
    let server = ApiServer::new();
    let fetcher = HttpFetcher::new(reqwest::Client::new(), None);

    let url = server.url("/api/player/7/full");
    let player = fetcher.fetch_json(url.as_str(), options()).await.unwrap();

    assert_eq!(player["id"], "7");
}

#[tokio::test]
async fn test_error_message() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let err = fetcher
        .fetch_json("/api/player/404/full", options())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Server {
            status: 404,
            message: "Player not found".into()
        }
    );
}

#[tokio::test]
async fn test_status_without_body() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let err = fetcher
        .fetch_json("/respond_statuscode/500/api/players", options())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.message(), "Unknown");
}

#[tokio::test]
async fn test_garbage_body() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let err = fetcher
        .fetch_json("/garbage/not-json", options())
        .await
        .unwrap_err();

    assert_eq!(err.name(), "decode");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_follows_redirects() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let player = fetcher
        .fetch_json("/delay/10ms/api/player/1/full", options())
        .await
        .unwrap();

    assert_eq!(player["id"], "1");
    assert_eq!(server.hits("/api/player/1/full"), 1);
}

#[tokio::test]
async fn test_credentials() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));

    let headers = fetcher.fetch_json("/headers/x", options()).await.unwrap();
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["cookie"], "session=c0ffee");
    assert!(headers["userAgent"].as_str().unwrap().starts_with("accio/"));

    let anonymous = FetchOptions::default();
    let headers = fetcher.fetch_json("/headers/x", anonymous).await.unwrap();
    assert!(headers["cookie"].is_null());
}

#[tokio::test]
async fn test_cancellation() {
    setup();
    let server = ApiServer::new();
    let fetcher = fetcher(&config(&server));
    let signal = CancelSignal::new();

    let options = FetchOptions {
        with_credentials: true,
        cancel: signal.token(),
    };
    let (result, _) = tokio::join!(
        fetcher.fetch_json("/delay/1h/api/player/1/full", options),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal.renew();
        }
    );

    assert_eq!(result, Err(FetchError::Cancelled));
}

#[tokio::test]
async fn test_timeout() {
    setup();
    let server = ApiServer::new();
    let mut config = config(&server);
    config.timeout = Duration::from_millis(100);
    let fetcher = HttpFetcher::new(create_client(&config).unwrap(), config.api_url.clone());

    let err = fetcher
        .fetch_json("/delay/1h/api/player/1/full", options())
        .await
        .unwrap_err();

    assert_eq!(err.name(), "network");
    assert_eq!(err.message(), "Failed to reach the server");
}
