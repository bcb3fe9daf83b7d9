use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::ai::SummaryProvider;
use crate::db::{ArticleStore, ArticleStream};
use crate::error::Result;
use crate::models::{Article, PageDetails};
use crate::wiki::ArticleSource;

const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// Coordinates the local article cache with the remote article and summary
/// sources.
///
/// Reads are cache-first and every remote fetch is written through to the
/// cache before it is returned. None of the public operations fail: errors
/// are logged and the caller gets an empty list, `None` or zero instead.
#[derive(Clone)]
pub struct WikipediaRepository {
    store: ArticleStore,
    source: Arc<dyn ArticleSource>,
    summarizer: Option<Arc<dyn SummaryProvider>>,
    max_age: Duration,
}

impl WikipediaRepository {
    pub fn new(
        store: ArticleStore,
        source: Arc<dyn ArticleSource>,
        summarizer: Option<Arc<dyn SummaryProvider>>,
    ) -> Self {
        Self {
            store,
            source,
            summarizer,
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn has_summarizer(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Searches cached titles first and only asks the remote source when
    /// nothing local matches. A cache hit is returned as-is, never refreshed.
    pub async fn search_articles(&self, query: &str) -> Vec<Article> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        match self.try_search_articles(query).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!("Error searching articles for {:?}: {}", query, e);
                Vec::new()
            }
        }
    }

    async fn try_search_articles(&self, query: &str) -> Result<Vec<Article>> {
        let cached = self.store.find_by_title(query).await?;
        if !cached.is_empty() {
            tracing::debug!("Search {:?} served {} articles from cache", query, cached.len());
            return Ok(cached);
        }

        let ids: Vec<i64> = self
            .source
            .search(query)
            .await?
            .into_iter()
            .map(|hit| hit.id)
            .collect();

        self.fetch_and_cache(&ids).await
    }

    /// Returns the cached article with a fresh access time, or fetches and
    /// caches it when it is not stored yet.
    pub async fn get_article(&self, id: i64) -> Option<Article> {
        match self.try_get_article(id).await {
            Ok(article) => article,
            Err(e) => {
                tracing::error!("Error getting article {}: {}", id, e);
                None
            }
        }
    }

    async fn try_get_article(&self, id: i64) -> Result<Option<Article>> {
        if let Some(mut article) = self.store.find_by_id(id).await? {
            article.last_accessed = access_time();
            self.store.touch(id, article.last_accessed).await?;
            return Ok(Some(article));
        }

        let mut details = self.source.fetch_details(&[id]).await?;
        let Some(page) = details.remove(&id) else {
            tracing::debug!("Article {} not found remotely", id);
            return Ok(None);
        };

        let article = page.into_article(access_time());
        self.store.upsert(article.clone()).await?;
        Ok(Some(article))
    }

    pub async fn get_nearby_articles(&self, latitude: f64, longitude: f64) -> Vec<Article> {
        match self.try_get_nearby_articles(latitude, longitude).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!(
                    "Error getting nearby articles for {}|{}: {}",
                    latitude,
                    longitude,
                    e
                );
                Vec::new()
            }
        }
    }

    async fn try_get_nearby_articles(&self, latitude: f64, longitude: f64) -> Result<Vec<Article>> {
        tracing::debug!("Fetching nearby articles for {}|{}", latitude, longitude);

        let hits = self.source.geosearch(latitude, longitude).await?;
        if hits.is_empty() {
            tracing::warn!("No nearby articles found for {}|{}", latitude, longitude);
            return Ok(Vec::new());
        }
        if let Some(nearest) = hits.first() {
            tracing::debug!(
                "Found {} nearby articles, nearest {:?} at {:?} m",
                hits.len(),
                nearest.title,
                nearest.distance_meters
            );
        }

        let ids: Vec<i64> = hits.into_iter().map(|hit| hit.id).collect();
        self.fetch_and_cache(&ids).await
    }

    /// One batched detail fetch for `ids`, written through to the cache.
    /// Results keep the order of `ids`; ids the remote no longer knows are
    /// dropped.
    async fn fetch_and_cache(&self, ids: &[i64]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut details = self.source.fetch_details(ids).await?;
        let now = access_time();
        let articles: Vec<Article> = ids
            .iter()
            .filter_map(|id| details.remove(id))
            .map(|page| page.into_article(now))
            .collect();

        self.store.upsert_many(articles.clone()).await?;
        Ok(articles)
    }

    pub fn recent_articles(&self, limit: usize) -> ArticleStream {
        self.store.recent(limit)
    }

    pub fn favorite_articles(&self) -> ArticleStream {
        self.store.favorites()
    }

    pub async fn favorite_articles_list(&self) -> Vec<Article> {
        match self.store.favorites_snapshot().await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!("Error reading favorite articles: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.store.count().await.unwrap_or_else(|e| {
            tracing::error!("Error counting cached articles: {}", e);
            0
        })
    }

    pub async fn toggle_favorite(&self, id: i64, is_favorite: bool) {
        if let Err(e) = self.store.set_favorite(id, is_favorite).await {
            tracing::error!("Error setting favorite for article {}: {}", id, e);
        }
    }

    /// Asks the summarizer for an article summary unless one is already
    /// stored. Returns whatever summary the article ends up with.
    pub async fn generate_ai_summary(&self, id: i64) -> Option<String> {
        match self.try_generate_ai_summary(id).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Error generating AI summary for article {}: {}", id, e);
                None
            }
        }
    }

    async fn try_generate_ai_summary(&self, id: i64) -> Result<Option<String>> {
        let Some(article) = self.store.find_by_id(id).await? else {
            return Ok(None);
        };

        if article.has_ai_summary() {
            return Ok(article.ai_summary);
        }

        let Some(summarizer) = &self.summarizer else {
            tracing::warn!("No summarizer configured; skipping summary for article {}", id);
            return Ok(None);
        };

        let summary = summarizer.summarize(&article.extract).await?;
        self.store.set_ai_summary(id, summary.clone()).await?;
        tracing::debug!("Stored {} summary for article {}", summarizer.model(), id);
        Ok(Some(summary))
    }

    /// Refreshes every favorite from the remote source, one at a time.
    /// A favorite that fails to refresh is left untouched and does not stop
    /// the others. Returns how many were refreshed.
    pub async fn sync_favorite_articles(&self) -> usize {
        let favorites = match self.store.favorites_snapshot().await {
            Ok(favorites) => favorites,
            Err(e) => {
                tracing::error!("Error syncing favorite articles: {}", e);
                return 0;
            }
        };

        let mut synced = 0;
        for favorite in favorites {
            let id = favorite.id;
            match self.refresh_favorite(favorite).await {
                Ok(true) => synced += 1,
                Ok(false) => tracing::warn!("Favorite article {} no longer exists remotely", id),
                Err(e) => tracing::error!("Error syncing article {}: {}", id, e),
            }
        }

        tracing::info!("Synced {} favorite articles", synced);
        synced
    }

    async fn refresh_favorite(&self, favorite: Article) -> Result<bool> {
        let mut details = self.source.fetch_details(&[favorite.id]).await?;
        let Some(page) = details.remove(&favorite.id) else {
            return Ok(false);
        };

        let refreshed = refreshed_favorite(page, &favorite);
        let needs_summary = !refreshed.has_ai_summary();
        self.store.upsert(refreshed).await?;

        if needs_summary {
            self.generate_ai_summary(favorite.id).await;
        }
        Ok(true)
    }

    /// Evicts non-favorite articles not read within the max age. Returns how
    /// many were removed.
    pub async fn cleanup_old_articles(&self) -> usize {
        match self.try_cleanup_old_articles().await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!("Removed {} stale articles from cache", removed);
                }
                removed
            }
            Err(e) => {
                tracing::error!("Error cleaning up old articles: {}", e);
                0
            }
        }
    }

    async fn try_cleanup_old_articles(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.max_age;
        let old = self.store.find_older_than(cutoff).await?;
        if old.is_empty() {
            return Ok(0);
        }
        self.store.delete(old).await
    }
}

/// Stored timestamps keep millisecond precision, so hand out the same.
fn access_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Fresh remote content that stays a favorite and keeps its summary.
fn refreshed_favorite(page: PageDetails, previous: &Article) -> Article {
    Article {
        is_favorite: true,
        ai_summary: previous.ai_summary.clone(),
        ..page.into_article(access_time())
    }
}
