//! Database schema definitions

pub const CREATE_VISITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    ip_hash TEXT NOT NULL,
    user_agent TEXT,
    timestamp BIGINT NOT NULL       -- Unix millis, UTC
)
"#;

pub const CREATE_ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id TEXT PRIMARY KEY,            -- UUID, hyphenated lowercase
    title TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    excerpt TEXT,
    category TEXT NOT NULL,
    image TEXT,
    published INTEGER NOT NULL DEFAULT 0,
    views INTEGER NOT NULL DEFAULT 0,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL
)
"#;

// For rolling-window counts and the daily chart
pub const CREATE_INDEX_VISITS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON visits(timestamp)";

// For the top articles panel
pub const CREATE_INDEX_ARTICLES_VIEWS: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_views ON articles(views DESC, created_at DESC)";

// For the public listing (published, newest first)
pub const CREATE_INDEX_ARTICLES_PUBLISHED: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published, created_at DESC)";
