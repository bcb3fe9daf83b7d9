use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use rusqlite::{params, OptionalExtension, Row};
use tokio::sync::watch;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, Coordinates};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, title, extract, thumbnail_url, canonical_url, latitude, longitude, last_accessed, is_favorite, ai_summary";

/// A live cache view: yields the current snapshot, then a new one after
/// every write to the store, until dropped.
pub type ArticleStream = BoxStream<'static, Result<Vec<Article>>>;

#[derive(Debug, Clone, Copy)]
enum LiveView {
    Recent(usize),
    Favorites,
}

/// SQLite-backed article cache. Cloning shares the same connection and
/// change notifications.
#[derive(Clone)]
pub struct ArticleStore {
    conn: Connection,
    changes: Arc<watch::Sender<u64>>,
}

impl ArticleStore {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        let (changes, _) = watch::channel(0);
        Ok(Self {
            conn,
            changes: Arc::new(changes),
        })
    }

    fn notify_changed(&self) {
        self.changes
            .send_modify(|version| *version = version.wrapping_add(1));
    }

    // Lookups

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"
                ))?;
                let article = stmt
                    .query_row(params![id], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Case-insensitive substring match on the title.
    ///
    /// SQLite's `LIKE` folds case for ASCII letters only, so "париж" does
    /// not match "Париж".
    pub async fn find_by_title(&self, text: &str) -> Result<Vec<Article>> {
        let pattern = like_pattern(text);
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {ARTICLE_COLUMNS} FROM articles
                       WHERE title LIKE ?1 ESCAPE '\'
                       ORDER BY title COLLATE NOCASE"#
                ))?;
                let articles = stmt
                    .query_map(params![pattern], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn recent_snapshot(&self, limit: usize) -> Result<Vec<Article>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY last_accessed DESC, id LIMIT ?1"
                ))?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn favorites_snapshot(&self) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE is_favorite = 1 ORDER BY title COLLATE NOCASE, id"
                ))?;
                let articles = stmt
                    .query_map([], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Non-favorite articles last read before `cutoff`.
    pub async fn find_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Article>> {
        let cutoff_ms = cutoff.timestamp_millis();
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles WHERE is_favorite = 0 AND last_accessed < ?1"
                ))?;
                let articles = stmt
                    .query_map(params![cutoff_ms], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // Live views

    pub fn recent(&self, limit: usize) -> ArticleStream {
        self.observe(LiveView::Recent(limit))
    }

    pub fn favorites(&self) -> ArticleStream {
        self.observe(LiveView::Favorites)
    }

    fn observe(&self, view: LiveView) -> ArticleStream {
        let changes = self.changes.subscribe();
        stream::unfold(
            (self.clone(), changes, true),
            move |(store, mut changes, first)| async move {
                if !first && changes.changed().await.is_err() {
                    return None;
                }
                changes.borrow_and_update();
                let snapshot = match view {
                    LiveView::Recent(limit) => store.recent_snapshot(limit).await,
                    LiveView::Favorites => store.favorites_snapshot().await,
                };
                Some((snapshot, (store, changes, false)))
            },
        )
        .boxed()
    }

    // Writes

    pub async fn upsert(&self, article: Article) -> Result<()> {
        self.conn
            .call(move |conn| {
                upsert_row(conn, &article)?;
                Ok(())
            })
            .await?;
        self.notify_changed();
        Ok(())
    }

    pub async fn upsert_many(&self, articles: Vec<Article>) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for article in &articles {
                    upsert_row(&tx, article)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        self.notify_changed();
        Ok(())
    }

    /// Bumps the access time without rewriting the rest of the row.
    pub async fn touch(&self, id: i64, accessed_at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET last_accessed = ?1 WHERE id = ?2",
                    params![accessed_at.timestamp_millis(), id],
                )?;
                Ok(changed)
            })
            .await?;
        if changed > 0 {
            self.notify_changed();
        }
        Ok(())
    }

    /// Updates the flag only. Unknown ids are ignored.
    pub async fn set_favorite(&self, id: i64, is_favorite: bool) -> Result<()> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET is_favorite = ?1 WHERE id = ?2",
                    params![is_favorite, id],
                )?;
                Ok(changed)
            })
            .await?;
        if changed > 0 {
            self.notify_changed();
        }
        Ok(())
    }

    pub async fn set_ai_summary(&self, id: i64, summary: String) -> Result<()> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE articles SET ai_summary = ?1 WHERE id = ?2",
                    params![summary, id],
                )?;
                Ok(changed)
            })
            .await?;
        if changed > 0 {
            self.notify_changed();
        }
        Ok(())
    }

    /// Removes the given articles by id; returns how many rows went away.
    pub async fn delete(&self, articles: Vec<Article>) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare("DELETE FROM articles WHERE id = ?1")?;
                    for id in &ids {
                        removed += stmt.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        if removed > 0 {
            self.notify_changed();
        }
        Ok(removed)
    }
}

fn upsert_row(conn: &rusqlite::Connection, article: &Article) -> rusqlite::Result<usize> {
    conn.execute(
        r#"INSERT INTO articles (id, title, extract, thumbnail_url, canonical_url, latitude, longitude,
                                last_accessed, is_favorite, ai_summary)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT(id) DO UPDATE SET
               title = excluded.title,
               extract = excluded.extract,
               thumbnail_url = excluded.thumbnail_url,
               canonical_url = excluded.canonical_url,
               latitude = excluded.latitude,
               longitude = excluded.longitude,
               last_accessed = excluded.last_accessed,
               is_favorite = excluded.is_favorite,
               ai_summary = excluded.ai_summary"#,
        params![
            article.id,
            article.title,
            article.extract,
            article.thumbnail_url,
            article.canonical_url,
            article.coordinates.map(|c| c.latitude),
            article.coordinates.map(|c| c.longitude),
            article.last_accessed.timestamp_millis(),
            article.is_favorite,
            article.ai_summary,
        ],
    )
}

/// Escapes LIKE wildcards so the input matches literally.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    let latitude: Option<f64> = row.get(5)?;
    let longitude: Option<f64> = row.get(6)?;
    let last_accessed: i64 = row.get(7)?;

    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        extract: row.get(2)?,
        thumbnail_url: row.get(3)?,
        canonical_url: row.get(4)?,
        coordinates: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Coordinates {
                latitude,
                longitude,
            }),
        last_accessed: DateTime::from_timestamp_millis(last_accessed).unwrap_or_else(Utc::now),
        is_favorite: row.get(8)?,
        ai_summary: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn article(id: i64, title: &str) -> Article {
        Article {
            id,
            title: title.to_string(),
            extract: format!("{title} extract"),
            thumbnail_url: None,
            canonical_url: Some(format!("https://en.wikipedia.org/?curid={id}")),
            coordinates: None,
            // Millisecond precision, matching what the column stores.
            last_accessed: DateTime::from_timestamp_millis(Utc::now().timestamp_millis())
                .unwrap(),
            is_favorite: false,
            ai_summary: None,
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_identical_row() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let a = article(1, "Paris");

        store.upsert(a.clone()).await.unwrap();
        let once = store.find_by_id(1).await.unwrap();
        store.upsert(a.clone()).await.unwrap();
        let twice = store.find_by_id(1).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(once, twice);
        assert_eq!(twice, Some(a));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_fields() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let mut a = article(1, "Paris");
        a.is_favorite = true;
        a.ai_summary = Some("Capital of France.".to_string());
        store.upsert(a).await.unwrap();

        store.upsert(article(1, "Paris, France")).await.unwrap();

        let stored = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored.title, "Paris, France");
        assert!(!stored.is_favorite);
        assert!(stored.ai_summary.is_none());
    }

    #[tokio::test]
    async fn coordinates_round_trip_through_columns() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let mut a = article(3, "Louvre");
        a.coordinates = Some(Coordinates {
            latitude: 48.8606,
            longitude: 2.3376,
        });
        a.thumbnail_url = Some("https://upload.example/louvre.jpg".to_string());
        store.upsert(a.clone()).await.unwrap();

        assert_eq!(store.find_by_id(3).await.unwrap(), Some(a));
        assert_eq!(store.find_by_id(4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn title_search_is_case_insensitive_and_literal() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        store
            .upsert_many(vec![
                article(1, "Paris"),
                article(2, "Paris Hilton"),
                article(3, "London"),
                article(4, "100% Pure"),
            ])
            .await
            .unwrap();

        let hits = store.find_by_title("pARis").await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let hits = store.find_by_title("0%").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 4);

        assert!(store.find_by_title("_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn title_search_folds_ascii_case_only() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        store.upsert(article(5, "Париж")).await.unwrap();

        assert_eq!(store.find_by_title("Париж").await.unwrap().len(), 1);
        assert!(store.find_by_title("париж").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_orders_by_last_access_and_caps() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        let mut articles = Vec::new();
        for (id, age_minutes) in [(1, 30), (2, 10), (3, 20)] {
            let mut a = article(id, &format!("Article {id}"));
            a.last_accessed = now - Duration::minutes(age_minutes);
            articles.push(a);
        }
        store.upsert_many(articles).await.unwrap();

        let recent = store.recent_snapshot(2).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn set_favorite_on_missing_id_is_noop() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        tokio_test::assert_ok!(store.set_favorite(99, true).await);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.favorites_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn touch_updates_access_time_only() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let mut stored = article(6, "Marseille");
        stored.is_favorite = true;
        store.upsert(stored.clone()).await.unwrap();

        let later = stored.last_accessed + Duration::hours(1);
        store.touch(6, later).await.unwrap();
        tokio_test::assert_ok!(store.touch(99, later).await);

        let touched = store.find_by_id(6).await.unwrap().unwrap();
        assert_eq!(touched.last_accessed, later);
        assert!(touched.is_favorite);
        assert_eq!(touched.title, "Marseille");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn set_ai_summary_touches_only_that_field() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let a = article(8, "Seine");
        store.upsert(a.clone()).await.unwrap();

        store
            .set_ai_summary(8, "A river.".to_string())
            .await
            .unwrap();

        let stored = store.find_by_id(8).await.unwrap().unwrap();
        assert_eq!(stored.ai_summary.as_deref(), Some("A river."));
        assert_eq!(stored.title, a.title);
        assert_eq!(stored.last_accessed, a.last_accessed);
    }

    #[tokio::test]
    async fn older_than_skips_favorites_and_fresh_rows() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        let now = Utc::now();

        let mut stale = article(1, "Stale");
        stale.last_accessed = now - Duration::days(40);
        let mut stale_favorite = article(2, "Stale favorite");
        stale_favorite.last_accessed = now - Duration::days(40);
        stale_favorite.is_favorite = true;
        let fresh = article(3, "Fresh");
        store
            .upsert_many(vec![stale, stale_favorite, fresh])
            .await
            .unwrap();

        let old = store
            .find_older_than(now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].id, 1);

        assert_eq!(store.delete(old).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.delete(Vec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn favorites_view_pushes_new_snapshots() {
        let store = ArticleStore::open_in_memory().await.unwrap();
        store
            .upsert_many(vec![article(1, "Paris"), article(2, "Lyon")])
            .await
            .unwrap();

        let mut favorites = store.favorites();
        let first = favorites.next().await.unwrap().unwrap();
        assert!(first.is_empty());

        store.set_favorite(2, true).await.unwrap();
        let second = tokio::time::timeout(StdDuration::from_secs(2), favorites.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ids: Vec<i64> = second.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.db");
        let path = path.to_string_lossy().to_string();

        {
            let store = ArticleStore::new(&path).await.unwrap();
            store.upsert(article(11, "Versailles")).await.unwrap();
            store.set_favorite(11, true).await.unwrap();
        }

        let reopened = ArticleStore::new(&path).await.unwrap();
        let stored = reopened.find_by_id(11).await.unwrap().unwrap();
        assert!(stored.is_favorite);
    }

    #[tokio::test]
    async fn new_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("articles.db");

        let store = ArticleStore::new(&path.to_string_lossy()).await.unwrap();
        store.upsert(article(12, "Lyon")).await.unwrap();

        assert!(path.exists());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
