pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- recipes table
CREATE TABLE IF NOT EXISTS recipes (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    pub_date TEXT,
    name TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    short_description TEXT NOT NULL DEFAULT '',
    rating REAL NOT NULL DEFAULT 0,
    reviews_count INTEGER NOT NULL DEFAULT 0,
    wma_count INTEGER NOT NULL DEFAULT 0,
    photo_url TEXT,
    ingredient_groups TEXT NOT NULL DEFAULT '[]',
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_recipes_pub_date ON recipes(pub_date DESC);

-- tags and authors, keyed by canonical id
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT
);

CREATE TABLE IF NOT EXISTS authors (
    id TEXT PRIMARY KEY,
    name TEXT
);

CREATE TABLE IF NOT EXISTS recipe_tags (
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (recipe_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag_id ON recipe_tags(tag_id);

CREATE TABLE IF NOT EXISTS recipe_authors (
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    PRIMARY KEY (recipe_id, author_id)
);

CREATE INDEX IF NOT EXISTS idx_recipe_authors_author_id ON recipe_authors(author_id);

-- full-text index, one row per recipe
CREATE VIRTUAL TABLE IF NOT EXISTS recipes_fts USING fts5(
    recipe_id UNINDEXED,
    essentials,
    ingredients,
    tokenize = 'porter unicode61'
);

-- chats (consumers)
CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY,
    username TEXT,
    first_name TEXT,
    last_name TEXT,
    last_seen TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS liked_recipes (
    chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    liked_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (chat_id, recipe_id)
);

CREATE TABLE IF NOT EXISTS blocked_tags (
    chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (chat_id, tag_id)
);

CREATE TABLE IF NOT EXISTS blocked_authors (
    chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    PRIMARY KEY (chat_id, author_id)
);

-- subscriptions: exactly one of tag_id / author_id is set
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    tag_id TEXT REFERENCES tags(id) ON DELETE CASCADE,
    author_id TEXT REFERENCES authors(id) ON DELETE CASCADE,
    last_item_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    CHECK ((tag_id IS NULL) <> (author_id IS NULL))
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_subscriptions_tag
    ON subscriptions(chat_id, tag_id) WHERE tag_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS uq_subscriptions_author
    ON subscriptions(chat_id, author_id) WHERE author_id IS NOT NULL;

-- pagination sessions backing interactive list messages (soft-deleted only)
CREATE TABLE IF NOT EXISTS pagination_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL,
    chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    query_primary TEXT NOT NULL DEFAULT '',
    query_ingredients TEXT NOT NULL DEFAULT '',
    page_n INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pagination_sessions_message
    ON pagination_sessions(chat_id, message_id);
"#;
