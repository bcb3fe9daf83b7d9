mod client;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{PageDetails, SearchHit};

pub use client::WikipediaClient;

/// Remote source of article data.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Full-text search; hits come back in rank order.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Full records for the given page ids, keyed by id. Ids the remote
    /// does not know are simply absent from the map.
    async fn fetch_details(&self, ids: &[i64]) -> Result<HashMap<i64, PageDetails>>;

    /// Pages near a coordinate, nearest first.
    async fn geosearch(&self, latitude: f64, longitude: f64) -> Result<Vec<SearchHit>>;
}
