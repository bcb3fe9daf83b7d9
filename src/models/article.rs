use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A cached Wikipedia page. `id` is the remote page id and the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub extract: String,
    pub thumbnail_url: Option<String>,
    pub canonical_url: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub last_accessed: DateTime<Utc>,
    pub is_favorite: bool,
    pub ai_summary: Option<String>,
}

impl Article {
    pub fn has_ai_summary(&self) -> bool {
        self.ai_summary
            .as_deref()
            .is_some_and(|summary| !summary.trim().is_empty())
    }
}

/// Full page record as returned by the remote article source.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDetails {
    pub id: i64,
    pub title: String,
    pub extract: String,
    pub thumbnail_url: Option<String>,
    pub canonical_url: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl PageDetails {
    /// Builds a fresh cache record: not a favorite, no summary.
    pub fn into_article(self, accessed_at: DateTime<Utc>) -> Article {
        Article {
            id: self.id,
            title: self.title,
            extract: self.extract,
            thumbnail_url: self.thumbnail_url,
            canonical_url: self.canonical_url,
            coordinates: self.coordinates,
            last_accessed: accessed_at,
            is_favorite: false,
            ai_summary: None,
        }
    }
}

/// One row of a text search or geosearch result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub distance_meters: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageDetails {
        PageDetails {
            id: 42,
            title: "Eiffel Tower".to_string(),
            extract: "Wrought-iron lattice tower.".to_string(),
            thumbnail_url: Some("https://upload.example/eiffel.jpg".to_string()),
            canonical_url: Some("https://en.wikipedia.org/wiki/Eiffel_Tower".to_string()),
            coordinates: Some(Coordinates {
                latitude: 48.8584,
                longitude: 2.2945,
            }),
        }
    }

    #[test]
    fn page_becomes_plain_article() {
        let now = Utc::now();
        let article = page().into_article(now);

        assert_eq!(article.id, 42);
        assert_eq!(article.last_accessed, now);
        assert!(!article.is_favorite);
        assert!(article.ai_summary.is_none());
        assert_eq!(article.coordinates.map(|c| c.latitude), Some(48.8584));
    }

    #[test]
    fn blank_summary_does_not_count() {
        let mut article = page().into_article(Utc::now());
        assert!(!article.has_ai_summary());

        article.ai_summary = Some("  ".to_string());
        assert!(!article.has_ai_summary());

        article.ai_summary = Some("A tower in Paris.".to_string());
        assert!(article.has_ai_summary());
    }
}
