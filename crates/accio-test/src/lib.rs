//! Helpers for testing the coordinator and its HTTP transport.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`ApiServer`], make sure that the server is held until all requests to it have
//!    been made. If the server is dropped, connections to it fail. To avoid this, assign it to a
//!    variable: `let server = ApiServer::new();`.

use std::collections::{BTreeMap, HashMap};
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::extract::{self, OriginalUri, Request};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `accio` crate and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("accio=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A test server that binds to a random port and serves a web app.
///
/// This server requires a `tokio` runtime and is supposed to be run in a `tokio::test`. It
/// automatically stops serving when dropped.
#[derive(Debug)]
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl Server {
    pub fn with_router(router: Router) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Hits = Arc<Mutex<BTreeMap<String, usize>>>;

/// A fake ScoreSaber API that counts requests per path and query.
///
/// Routes:
///
///  - `/api/player/:id/full`: a player named `Player {id}`. The id `404` responds with a not
///    found error in the API's error format.
///  - `/api/players`: a page of players, echoing the `page` and `search` query parameters.
///  - `/respond_statuscode/:num/*tail`: an empty response with the given status.
///  - `/garbage/*tail`: a `200 OK` with the tail as plain text body.
///  - `/delay/:time/*path`: redirects to `/path` after waiting for `time` (e.g. `100ms`).
///  - `/headers/*tail`: the request's `Accept`, `Cookie` and `User-Agent` headers as JSON.
pub struct ApiServer {
    server: Server,
    hits: Hits,
}

impl ApiServer {
    pub fn new() -> Self {
        let hits = Hits::default();

        let hitcounter = {
            let hits = hits.clone();
            move |OriginalUri(uri), req: Request, next: Next| {
                let hits = hits.clone();
                async move {
                    {
                        let mut hits = hits.lock().unwrap();
                        let hits = hits.entry(uri.to_string()).or_default();
                        *hits += 1;
                    }

                    next.run(req).await
                }
            }
        };

        let router = Router::new()
            .route("/api/player/:id/full", get(player))
            .route("/api/players", get(players))
            .route(
                "/respond_statuscode/:num/*tail",
                get(
                    |extract::Path((num, _)): extract::Path<(u16, String)>| async move {
                        StatusCode::from_u16(num).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                    },
                ),
            )
            .route(
                "/garbage/*tail",
                get(|extract::Path(tail): extract::Path<String>| async move { tail }),
            )
            .route(
                "/delay/:time/*path",
                get(
                    |extract::Path((time, path)): extract::Path<(String, String)>| async move {
                        let duration = humantime::parse_duration(&time).unwrap();
                        tokio::time::sleep(duration).await;

                        Redirect::to(&format!("/{path}"))
                    },
                ),
            )
            .route("/headers/*tail", get(headers))
            .layer(middleware::from_fn(hitcounter));

        let server = Server::with_router(router);

        Self { server, hits }
    }

    /// The number of requests to `path_and_query` since the last call.
    pub fn hits(&self, path_and_query: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .remove(path_and_query)
            .unwrap_or_default()
    }

    /// The total number of requests since the last call.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_values().sum()
    }

    pub fn all_hits(&self) -> Vec<(String, usize)> {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_iter().collect()
    }

    /// The base URL to configure as API URL.
    pub fn base_url(&self) -> Url {
        self.server.url("/")
    }

    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }
}

impl Default for ApiServer {
    fn default() -> Self {
        Self::new()
    }
}

fn player_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Player {id}"),
        "profilePicture": format!("https://cdn.scoresaber.com/avatars/{id}.jpg"),
        "country": "DE",
        "pp": 12345.67,
        "rank": 1,
        "countryRank": 1,
        "role": null,
        "badges": [],
        "histories": "",
        "permissions": 0,
        "banned": false,
        "inactive": false,
        "scoreStats": {
            "totalScore": 1000000,
            "totalRankedScore": 500000,
            "averageRankedAccuracy": 95.5,
            "totalPlayCount": 100,
            "rankedPlayCount": 50,
            "replaysWatched": 7
        }
    })
}

async fn player(extract::Path(id): extract::Path<String>) -> Response {
    if id == "404" {
        let body = json!({ "errorMessage": "Player not found" });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }
    Json(player_json(&id)).into_response()
}

async fn players(extract::Query(query): extract::Query<HashMap<String, String>>) -> Json<Value> {
    let page: u64 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let mut player = player_json("76561198000000000");
    if let Some(search) = query.get("search") {
        player["name"] = search.as_str().into();
    }
    Json(json!({
        "players": [player],
        "metadata": { "total": 1, "page": page, "itemsPerPage": 50 }
    }))
}

async fn headers(headers: HeaderMap) -> Json<Value> {
    let get = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    Json(json!({
        "accept": get(header::ACCEPT),
        "cookie": get(header::COOKIE),
        "userAgent": get(header::USER_AGENT),
    }))
}
