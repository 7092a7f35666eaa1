use std::time::Duration;

use accio::key::ResourceKey;
use accio::{RefreshOptions, UseFetchOptions};

use crate::{ApiServer, Player, PlayerCollection, accio, config, setup};

#[tokio::test]
async fn test_subscriptions_share_the_cache() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let first = accio.use_fetch::<Player>("/api/player/42/full", Default::default());
    first.settled().await;
    let player = first.data().get().unwrap();
    assert_eq!(player.name, "Player 42");
    assert_eq!(player.country_rank, 1);

    let second = accio.use_fetch::<Player>("/api/player/42/full", Default::default());
    assert_eq!(second.data().get().unwrap().id, "42");
    assert_eq!(server.hits("/api/player/42/full"), 1);
}

#[tokio::test]
async fn test_query_keys() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let key = ResourceKey::new("/api/players")
        .query("search", "Alice")
        .query("page", 2);
    let subscription = accio.use_fetch::<PlayerCollection>(key, Default::default());
    subscription.settled().await;

    let page = subscription.data().get().unwrap();
    assert_eq!(page.players[0].name, "Alice");
    assert_eq!(page.metadata.page, 2);
    assert_eq!(page.metadata.items_per_page, 50);
    assert_eq!(server.hits("/api/players?page=2&search=Alice"), 1);
}

#[tokio::test]
async fn test_server_error() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let subscription = accio.use_fetch::<Player>("/api/player/404/full", Default::default());
    subscription.settled().await;

    let err = subscription.error().get().unwrap();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), "Player not found");
    assert!(subscription.data().get().is_none());
    assert!(subscription.initial_load_complete().get());
}

#[tokio::test]
async fn test_focus_revalidates() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let subscription = accio.use_fetch::<Player>("/api/player/42/full", Default::default());
    subscription.settled().await;
    let mut data = subscription.data().watch();

    accio.lifecycle().focus();
    tokio::time::timeout(Duration::from_secs(5), data.changed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(server.hits("/api/player/42/full"), 2);
    assert!(!subscription.loading().get());
}

#[tokio::test]
async fn test_refresh_switches_resource() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let options = UseFetchOptions::default().ignore_subscriptions(true);
    let subscription = accio.use_fetch::<Player>("/api/player/1/full", options);
    subscription.settled().await;

    subscription
        .refresh(RefreshOptions {
            new_url: Some("/api/player/2/full".into()),
            ..Default::default()
        })
        .await;

    assert_eq!(subscription.data().get().unwrap().name, "Player 2");
    assert_eq!(server.accesses(), 2);
}

#[tokio::test]
async fn test_logout_cancels_requests() {
    setup();
    let server = ApiServer::new();
    let accio = accio(&config(&server));

    let subscription = accio.use_fetch::<Player>("/delay/1h/api/player/1/full", Default::default());
    tokio::time::sleep(Duration::from_millis(50)).await;
    accio.cancel_signal().renew();
    subscription.settled().await;

    assert!(subscription.error().get().is_none());
    assert!(!subscription.loading().get());
    assert!(subscription.initial_load_complete().get());
    assert!(!accio.store().has("/delay/1h/api/player/1/full"));
}
