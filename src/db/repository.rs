use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Author, Recipe, RecipeCard, Subject, SubjectKind, Tag};
use crate::normalize::id_from_name;

use super::query::RecipeQuery;
use super::schema::SCHEMA;

/// Minimum Jaro-Winkler similarity for a name to be offered as a suggestion.
const SIMILARITY_THRESHOLD: f64 = 0.8;

pub(super) const RECIPE_COLUMNS: &str = "r.id, r.url, r.pub_date, r.name, r.title, r.description, \
     r.short_description, r.rating, r.reviews_count, r.wma_count, r.photo_url, r.ingredient_groups";

#[derive(Clone)]
pub struct Repository {
    pub(super) conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Recipe operations

    /// Upsert one source page worth of recipes in a single transaction.
    ///
    /// Recipes are insert-or-update by id, tags and authors are created only
    /// if absent (an existing display name is kept), and each recipe's tag
    /// and author sets are replaced with the ones given.
    pub async fn save_page(&self, cards: Vec<RecipeCard>) -> Result<usize> {
        let rows = cards
            .into_iter()
            .map(|card| {
                let groups_json = serde_json::to_string(&card.recipe.ingredient_groups)?;
                Ok((card, groups_json))
            })
            .collect::<Result<Vec<_>>>()?;

        let saved = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (card, groups_json) in &rows {
                    upsert_card(&tx, card, groups_json)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(saved)
    }

    /// Publication date of the newest stored recipe.
    pub async fn latest_pub_date(&self) -> Result<Option<DateTime<Utc>>> {
        let latest = self
            .conn
            .call(|conn| {
                let latest: Option<String> =
                    conn.query_row("SELECT MAX(pub_date) FROM recipes", [], |row| row.get(0))?;
                Ok(latest)
            })
            .await?;
        Ok(latest.and_then(|s| parse_datetime(&s)))
    }

    pub async fn recipe_card(&self, id: &str) -> Result<Option<RecipeCard>> {
        let id = id.to_string();
        let card = self
            .conn
            .call(move |conn| {
                let recipe = conn
                    .query_row(
                        &format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ?1"),
                        params![id],
                        recipe_from_row,
                    )
                    .optional()?;
                match recipe {
                    Some(recipe) => Ok(load_cards(conn, vec![recipe])?.pop()),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(card)
    }

    pub async fn query_recipes(
        &self,
        query: &RecipeQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RecipeCard>> {
        let (from, mut values) = query.from_clause();
        let sql = format!(
            "SELECT {RECIPE_COLUMNS} {from} {} LIMIT ? OFFSET ?",
            query.order_clause()
        );
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));

        let cards = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let recipes = stmt
                    .query_map(params_from_iter(values.iter()), recipe_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(load_cards(conn, recipes)?)
            })
            .await?;
        Ok(cards)
    }

    pub async fn count_recipes(&self, query: &RecipeQuery) -> Result<usize> {
        let (from, values) = query.from_clause();
        let sql = format!("SELECT COUNT(*) {from}");

        let count = self
            .conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as usize)
    }

    /// Dated recipes linked to `subject` published strictly after `after`,
    /// oldest first.
    pub async fn recipes_for_subject(
        &self,
        subject: &Subject,
        after: DateTime<Utc>,
    ) -> Result<Vec<RecipeCard>> {
        let sql = match subject.kind {
            SubjectKind::Tag => format!(
                "SELECT {RECIPE_COLUMNS} FROM recipes r JOIN recipe_tags l ON l.recipe_id = r.id \
                 WHERE l.tag_id = ?1 AND r.pub_date IS NOT NULL AND r.pub_date > ?2 \
                 ORDER BY r.pub_date, r.id"
            ),
            SubjectKind::Author => format!(
                "SELECT {RECIPE_COLUMNS} FROM recipes r JOIN recipe_authors l ON l.recipe_id = r.id \
                 WHERE l.author_id = ?1 AND r.pub_date IS NOT NULL AND r.pub_date > ?2 \
                 ORDER BY r.pub_date, r.id"
            ),
        };
        let subject_id = subject.id.clone();
        let after = to_db_time(&after);

        let cards = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let recipes = stmt
                    .query_map(params![subject_id, after], recipe_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(load_cards(conn, recipes)?)
            })
            .await?;
        Ok(cards)
    }

    // Tag and author operations

    pub async fn tag(&self, id: &str) -> Result<Option<Tag>> {
        let id = id.to_string();
        let tag = self
            .conn
            .call(move |conn| {
                let tag = conn
                    .query_row(
                        "SELECT id, name FROM tags WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(Tag {
                                id: row.get(0)?,
                                name: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(tag)
            })
            .await?;
        Ok(tag)
    }

    pub async fn author(&self, id: &str) -> Result<Option<Author>> {
        let id = id.to_string();
        let author = self
            .conn
            .call(move |conn| {
                let author = conn
                    .query_row(
                        "SELECT id, name FROM authors WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(Author {
                                id: row.get(0)?,
                                name: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(author)
            })
            .await?;
        Ok(author)
    }

    /// Tags whose id is close to the canonical form of `name`, best first.
    pub async fn similar_tags(&self, name: &str, limit: usize) -> Result<Vec<Tag>> {
        let ranked = self.similar_names("tags", name, limit).await?;
        Ok(ranked
            .into_iter()
            .map(|(id, name)| Tag { id, name })
            .collect())
    }

    /// Authors whose id is close to the canonical form of `name`, best first.
    pub async fn similar_authors(&self, name: &str, limit: usize) -> Result<Vec<Author>> {
        let ranked = self.similar_names("authors", name, limit).await?;
        Ok(ranked
            .into_iter()
            .map(|(id, name)| Author { id, name })
            .collect())
    }

    async fn similar_names(
        &self,
        table: &'static str,
        name: &str,
        limit: usize,
    ) -> Result<Vec<(String, Option<String>)>> {
        let target = id_from_name(name);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("SELECT id, name FROM {table}"))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<(String, Option<String>)>>>()?;
                Ok(rows)
            })
            .await?;

        let mut scored: Vec<(f64, (String, Option<String>))> = rows
            .into_iter()
            .map(|row| (strsim::jaro_winkler(&target, &row.0), row))
            .filter(|(score, _)| *score >= SIMILARITY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1 .0.cmp(&b.1 .0)));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, row)| row).collect())
    }
}

fn upsert_card(
    conn: &rusqlite::Connection,
    card: &RecipeCard,
    groups_json: &str,
) -> rusqlite::Result<()> {
    let recipe = &card.recipe;
    conn.execute(
        r#"INSERT INTO recipes (id, url, pub_date, name, title, description, short_description,
                                rating, reviews_count, wma_count, photo_url, ingredient_groups)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT(id) DO UPDATE SET
               url = excluded.url,
               pub_date = excluded.pub_date,
               name = excluded.name,
               title = excluded.title,
               description = excluded.description,
               short_description = excluded.short_description,
               rating = excluded.rating,
               reviews_count = excluded.reviews_count,
               wma_count = excluded.wma_count,
               photo_url = excluded.photo_url,
               ingredient_groups = excluded.ingredient_groups,
               fetched_at = datetime('now')"#,
        params![
            recipe.id,
            recipe.url,
            recipe.pub_date.as_ref().map(to_db_time),
            recipe.name,
            recipe.title,
            recipe.description,
            recipe.short_description,
            recipe.rating,
            recipe.reviews_count,
            recipe.wma_count,
            recipe.photo_url,
            groups_json,
        ],
    )?;

    conn.execute(
        "DELETE FROM recipe_tags WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    for tag in &card.tags {
        conn.execute(
            "INSERT INTO tags (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = COALESCE(tags.name, excluded.name)",
            params![tag.id, tag.name],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
            params![recipe.id, tag.id],
        )?;
    }

    conn.execute(
        "DELETE FROM recipe_authors WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    for author in &card.authors {
        conn.execute(
            "INSERT INTO authors (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = COALESCE(authors.name, excluded.name)",
            params![author.id, author.name],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO recipe_authors (recipe_id, author_id) VALUES (?1, ?2)",
            params![recipe.id, author.id],
        )?;
    }

    conn.execute(
        "DELETE FROM recipes_fts WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    conn.execute(
        "INSERT INTO recipes_fts (recipe_id, essentials, ingredients) VALUES (?1, ?2, ?3)",
        params![
            recipe.id,
            recipe.essentials_text(),
            recipe.ingredients_text()
        ],
    )?;

    Ok(())
}

/// Attach tags and authors, in the order they were associated.
pub(super) fn load_cards(
    conn: &rusqlite::Connection,
    recipes: Vec<Recipe>,
) -> rusqlite::Result<Vec<RecipeCard>> {
    let mut tag_stmt = conn.prepare_cached(
        "SELECT t.id, t.name FROM tags t JOIN recipe_tags l ON l.tag_id = t.id
         WHERE l.recipe_id = ?1 ORDER BY l.rowid",
    )?;
    let mut author_stmt = conn.prepare_cached(
        "SELECT a.id, a.name FROM authors a JOIN recipe_authors l ON l.author_id = a.id
         WHERE l.recipe_id = ?1 ORDER BY l.rowid",
    )?;

    let mut cards = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let tags = tag_stmt
            .query_map(params![recipe.id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let authors = author_stmt
            .query_map(params![recipe.id], |row| {
                Ok(Author {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        cards.push(RecipeCard {
            recipe,
            tags,
            authors,
        });
    }
    Ok(cards)
}

/// Fixed-width UTC timestamp so that text comparison orders chronologically.
pub(crate) fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Required timestamp column; a malformed value is a conversion error.
pub(super) fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

pub(super) fn recipe_from_row(row: &Row) -> rusqlite::Result<Recipe> {
    let groups_json: String = row.get(11)?;
    let ingredient_groups = serde_json::from_str(&groups_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;

    Ok(Recipe {
        id: row.get(0)?,
        url: row.get(1)?,
        pub_date: row
            .get::<_, Option<String>>(2)?
            .and_then(|s| parse_datetime(&s)),
        name: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        short_description: row.get(6)?,
        rating: row.get(7)?,
        reviews_count: row.get(8)?,
        wma_count: row.get(9)?,
        photo_url: row.get(10)?,
        ingredient_groups,
    })
}
