mod summarizer;

use async_trait::async_trait;

use crate::error::Result;

pub use summarizer::{OpenAiSummarizer, SummarizerConfig};

/// Remote service that condenses article text into a short summary.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;

    fn model(&self) -> &str;
}
