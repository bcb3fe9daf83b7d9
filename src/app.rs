use std::sync::Arc;

use futures::StreamExt;

use crate::ai::{OpenAiSummarizer, SummaryProvider};
use crate::cli::{Command, USAGE};
use crate::config::Config;
use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::{Article, UiState};
use crate::repository::WikipediaRepository;
use crate::wiki::WikipediaClient;

const WRAP_WIDTH: usize = 80;

pub struct App {
    pub state: UiState,
    recent_limit: usize,
    repository: WikipediaRepository,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let store = ArticleStore::new(&config.db_path).await?;
        let source = Arc::new(WikipediaClient::from_config(config)?);

        let summarizer = match config.summarizer_config() {
            Some(settings) => {
                Some(Arc::new(OpenAiSummarizer::new(settings)?) as Arc<dyn SummaryProvider>)
            }
            None => None,
        };

        let repository = WikipediaRepository::new(store, source, summarizer)
            .with_max_age(config.cache_max_age());

        Ok(Self::with_repository(repository, config.recent_limit))
    }

    pub fn with_repository(repository: WikipediaRepository, recent_limit: usize) -> Self {
        Self {
            state: UiState::Initial,
            recent_limit,
            repository,
        }
    }

    /// Housekeeping run once per start, before any command.
    pub async fn startup(&self) {
        self.repository.cleanup_old_articles().await;
    }

    /// Runs one command and returns the text to show the user.
    pub async fn handle_command(&mut self, command: Command) -> Result<String> {
        self.state = UiState::Loading;

        let output = match command {
            Command::Help => {
                self.state = UiState::Initial;
                USAGE.to_string()
            }

            Command::Search(query) => {
                let results = self.repository.search_articles(&query).await;
                self.state = UiState::from_results(&results);
                render_list(&results, &format!("No articles found for \"{query}\""))
            }

            Command::Article(id) => self.show_article(id).await,

            Command::Nearby {
                latitude,
                longitude,
            } => {
                let results = self
                    .repository
                    .get_nearby_articles(latitude, longitude)
                    .await;
                self.state = UiState::from_results(&results);
                render_list(&results, "No articles found near this location")
            }

            Command::Favorite(id) => self.set_favorite(id, true).await,

            Command::Unfavorite(id) => self.set_favorite(id, false).await,

            Command::Favorites => {
                let favorites = self
                    .repository
                    .favorite_articles()
                    .next()
                    .await
                    .transpose()?
                    .unwrap_or_default();
                self.state = UiState::from_results(&favorites);
                render_list(&favorites, "No favorite articles yet")
            }

            Command::Recent(limit) => {
                let limit = limit.unwrap_or(self.recent_limit);
                let recent = self
                    .repository
                    .recent_articles(limit)
                    .next()
                    .await
                    .transpose()?
                    .unwrap_or_default();
                self.state = UiState::from_results(&recent);
                render_list(&recent, "No recently viewed articles")
            }

            Command::Summarize(id) => {
                if !self.repository.has_summarizer() {
                    self.state = UiState::Error("no OpenAI API key configured".to_string());
                    "Set openai_api_key in the config or OPENAI_API_KEY to enable summaries"
                        .to_string()
                } else {
                    let summary = self.repository.generate_ai_summary(id).await;
                    self.state = UiState::from_lookup(summary.as_ref(), "summary unavailable");
                    summary.unwrap_or_else(|| format!("Could not summarize article {id}"))
                }
            }

            Command::Sync => {
                let synced = self.repository.sync_favorite_articles().await;
                let total = self.repository.favorite_articles_list().await.len();
                self.state = UiState::Success;
                format!("Synced {synced} of {total} favorite articles")
            }

            Command::Cleanup => {
                let removed = self.repository.cleanup_old_articles().await;
                let remaining = self.repository.cached_count().await;
                self.state = UiState::Success;
                format!("Removed {removed} stale articles, {remaining} still cached")
            }

            Command::Open(id) => {
                let url = self
                    .repository
                    .get_article(id)
                    .await
                    .and_then(|article| article.canonical_url);
                self.state = UiState::from_lookup(url.as_ref(), "Article not found");
                match url {
                    Some(url) => {
                        open::that(&url)?;
                        format!("Opened {url}")
                    }
                    None => format!("Article {id} not found"),
                }
            }
        };

        Ok(output)
    }

    async fn show_article(&mut self, id: i64) -> String {
        let Some(mut article) = self.repository.get_article(id).await else {
            self.state = UiState::Error("Article not found".to_string());
            return format!("Article {id} not found");
        };
        self.state = UiState::Success;

        if !article.has_ai_summary() && self.repository.has_summarizer() {
            article.ai_summary = self.repository.generate_ai_summary(id).await;
        }

        render_article(&article)
    }

    async fn set_favorite(&mut self, id: i64, is_favorite: bool) -> String {
        // Make sure the article is cached so the flag has a row to land on.
        if self.repository.get_article(id).await.is_none() {
            self.state = UiState::Error("Article not found".to_string());
            return format!("Article {id} not found");
        }

        self.repository.toggle_favorite(id, is_favorite).await;
        self.state = UiState::Success;
        if is_favorite {
            format!("Added article {id} to favorites")
        } else {
            format!("Removed article {id} from favorites")
        }
    }
}

fn render_list(articles: &[Article], empty_message: &str) -> String {
    if articles.is_empty() {
        return empty_message.to_string();
    }

    articles
        .iter()
        .map(|article| {
            let star = if article.is_favorite { "*" } else { " " };
            format!("{star} {:>10}  {}", article.id, article.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_article(article: &Article) -> String {
    let mut out = String::new();
    let star = if article.is_favorite { " *" } else { "" };
    out.push_str(&format!("{} [{}]{}\n", article.title, article.id, star));

    if let Some(url) = &article.canonical_url {
        out.push_str(url);
        out.push('\n');
    }
    if let Some(coordinates) = article.coordinates {
        out.push_str(&format!(
            "Location: {:.4}, {:.4}\n",
            coordinates.latitude, coordinates.longitude
        ));
    }

    if !article.extract.is_empty() {
        out.push('\n');
        out.push_str(&textwrap::fill(&article.extract, WRAP_WIDTH));
        out.push('\n');
    }

    if let Some(summary) = article.ai_summary.as_deref().filter(|s| !s.trim().is_empty()) {
        out.push_str("\nAI summary:\n");
        out.push_str(&textwrap::fill(summary, WRAP_WIDTH));
        out.push('\n');
    }

    out.trim_end().to_string()
}
