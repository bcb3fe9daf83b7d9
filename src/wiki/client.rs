use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Coordinates, PageDetails, SearchHit};

use super::ArticleSource;

const USER_AGENT: &str = concat!(
    "wiki-pocket/",
    env!("CARGO_PKG_VERSION"),
    " (offline Wikipedia reader)"
);

// The extracts module answers at most 20 pages per request.
const DETAILS_BATCH_SIZE: usize = 20;
const THUMBNAIL_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    query: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    pageid: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct GeoQuery {
    #[serde(default)]
    geosearch: Vec<GeoRow>,
}

#[derive(Debug, Deserialize)]
struct GeoRow {
    pageid: i64,
    title: String,
    dist: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: HashMap<String, PageRow>,
}

#[derive(Debug, Deserialize)]
struct PageRow {
    pageid: Option<i64>,
    title: Option<String>,
    extract: Option<String>,
    thumbnail: Option<Thumbnail>,
    fullurl: Option<String>,
    #[serde(default)]
    coordinates: Vec<CoordinateRow>,
    missing: Option<serde_json::Value>,
    invalid: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct CoordinateRow {
    lat: f64,
    lon: f64,
}

impl PageRow {
    fn into_details(self) -> Option<PageDetails> {
        if self.missing.is_some() || self.invalid.is_some() {
            return None;
        }
        Some(PageDetails {
            id: self.pageid?,
            title: self.title?,
            extract: self.extract.unwrap_or_default(),
            thumbnail_url: self.thumbnail.map(|t| t.source),
            canonical_url: self.fullurl,
            coordinates: self.coordinates.first().map(|c| Coordinates {
                latitude: c.lat,
                longitude: c.lon,
            }),
        })
    }
}

/// Client for the MediaWiki action API.
pub struct WikipediaClient {
    client: Client,
    api_url: Url,
    search_limit: u32,
    nearby_radius_meters: u32,
    nearby_limit: u32,
}

impl WikipediaClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| AppError::Config(format!("invalid Wikipedia API url {api_url}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url,
            search_limit: 10,
            nearby_radius_meters: 10_000,
            nearby_limit: 10,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new(&config.wikipedia_api_url, config.request_timeout())?;
        client.search_limit = config.search_limit;
        client.nearby_radius_meters = config.nearby_radius_meters;
        client.nearby_limit = config.nearby_limit;
        Ok(client)
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<Option<T>> {
        let response = self
            .client
            .get(self.api_url.clone())
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::WikipediaApi(format!("HTTP {}", response.status())));
        }

        let body: ApiResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(AppError::WikipediaApi(format!("{}: {}", error.code, error.info)));
        }

        Ok(body.query)
    }

    async fn fetch_batch(&self, ids: &[i64]) -> Result<Vec<PageDetails>> {
        let page_ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("|");

        let params = [
            ("pageids", page_ids),
            ("prop", "extracts|pageimages|info|coordinates".to_string()),
            ("exintro", "1".to_string()),
            ("explaintext", "1".to_string()),
            ("exlimit", "max".to_string()),
            ("inprop", "url".to_string()),
            ("piprop", "thumbnail".to_string()),
            ("pithumbsize", THUMBNAIL_SIZE.to_string()),
        ];

        let pages = self
            .query::<PagesQuery>(&params)
            .await?
            .map(|q| q.pages)
            .unwrap_or_default();

        Ok(pages
            .into_values()
            .filter_map(PageRow::into_details)
            .collect())
    }
}

#[async_trait]
impl ArticleSource for WikipediaClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let params = [
            ("list", "search".to_string()),
            ("srsearch", query.to_string()),
            ("srlimit", self.search_limit.to_string()),
        ];

        let hits = self
            .query::<SearchQuery>(&params)
            .await?
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .map(|row| SearchHit {
                id: row.pageid,
                title: row.title,
                distance_meters: None,
            })
            .collect::<Vec<_>>();

        tracing::debug!("Search for {:?} returned {} hits", query, hits.len());
        Ok(hits)
    }

    async fn fetch_details(&self, ids: &[i64]) -> Result<HashMap<i64, PageDetails>> {
        let mut details = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(DETAILS_BATCH_SIZE) {
            for page in self.fetch_batch(batch).await? {
                details.insert(page.id, page);
            }
        }
        Ok(details)
    }

    async fn geosearch(&self, latitude: f64, longitude: f64) -> Result<Vec<SearchHit>> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::InvalidArgument(format!(
                "coordinate out of range: {latitude}, {longitude}"
            )));
        }

        let params = [
            ("list", "geosearch".to_string()),
            ("gscoord", format!("{latitude}|{longitude}")),
            ("gsradius", self.nearby_radius_meters.to_string()),
            ("gslimit", self.nearby_limit.to_string()),
        ];

        let hits = self
            .query::<GeoQuery>(&params)
            .await?
            .map(|q| q.geosearch)
            .unwrap_or_default()
            .into_iter()
            .map(|row| SearchHit {
                id: row.pageid,
                title: row.title,
                distance_meters: row.dist,
            })
            .collect();

        Ok(hits)
    }
}
