use std::sync::Arc;

use accio::Accio;
use accio::config::Config;
use accio::transport::HttpFetcher;
use serde::Deserialize;

pub use accio_test::{ApiServer, setup};

/// A configuration pointing at the given test server.
pub fn config(server: &ApiServer) -> Config {
    Config {
        api_url: Some(server.base_url()),
        session_cookie: Some("session=c0ffee".into()),
        ..Default::default()
    }
}

pub fn fetcher(config: &Config) -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::from_config(config).unwrap())
}

pub fn accio(config: &Config) -> Accio {
    Accio::from_config(config).unwrap()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub country_rank: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub total: u64,
    pub page: u64,
    pub items_per_page: u64,
}

#[derive(Debug, Deserialize)]
pub struct PlayerCollection {
    pub players: Vec<Player>,
    pub metadata: Metadata,
}
