pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    extract TEXT NOT NULL DEFAULT '',
    thumbnail_url TEXT,
    canonical_url TEXT,
    latitude REAL,
    longitude REAL,
    last_accessed INTEGER NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    ai_summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_last_accessed ON articles(last_accessed DESC);
CREATE INDEX IF NOT EXISTS idx_articles_is_favorite ON articles(is_favorite);
CREATE INDEX IF NOT EXISTS idx_articles_title ON articles(title COLLATE NOCASE);
"#;
