//! Recipe query value object.
//!
//! A [`RecipeQuery`] describes *what* to select (text filters, liked-by,
//! exclusions, ordering) independently of how the repository executes it,
//! so query construction can be tested without a database.

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::types::Value;

use crate::models::{BlockedSets, SessionQuery};

/// Keyword separating the dish part of a search from the ingredients part.
pub const INGREDIENTS_DELIMITER: &str = "with";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeOrder {
    /// Most reviewed first, then best rated, then newest.
    Popularity,
    Title,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeQuery {
    pub primary: String,
    pub ingredients: String,
    pub liked_by: Option<i64>,
    pub excluded_tags: Vec<String>,
    pub excluded_authors: Vec<String>,
    pub order: RecipeOrder,
}

impl RecipeQuery {
    pub fn search(primary: impl Into<String>, ingredients: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            ingredients: ingredients.into(),
            liked_by: None,
            excluded_tags: Vec::new(),
            excluded_authors: Vec::new(),
            order: RecipeOrder::Popularity,
        }
    }

    pub fn liked(chat_id: i64) -> Self {
        Self {
            liked_by: Some(chat_id),
            order: RecipeOrder::Title,
            ..Self::search("", "")
        }
    }

    pub fn random() -> Self {
        Self {
            order: RecipeOrder::Random,
            ..Self::search("", "")
        }
    }

    pub fn for_session(chat_id: i64, query: &SessionQuery) -> Self {
        match query {
            SessionQuery::Search {
                primary,
                ingredients,
            } => Self::search(primary.clone(), ingredients.clone()),
            SessionQuery::Liked => Self::liked(chat_id),
        }
    }

    pub fn excluding(mut self, blocked: &BlockedSets) -> Self {
        self.excluded_tags = blocked.tags.clone();
        self.excluded_authors = blocked.authors.clone();
        self
    }

    /// FTS5 match expression, or `None` when both text halves are empty.
    ///
    /// An empty half contributes no filter at all rather than matching
    /// nothing.
    pub fn match_expression(&self) -> Option<String> {
        let terms: Vec<String> = fts_terms("essentials", &self.primary)
            .chain(fts_terms("ingredients", &self.ingredients))
            .collect();
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" AND "))
        }
    }

    /// `FROM ... WHERE ...` fragment and its positional parameters.
    pub(crate) fn from_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("FROM recipes r");
        let mut params = Vec::new();

        if let Some(chat_id) = self.liked_by {
            sql.push_str(" JOIN liked_recipes l ON l.recipe_id = r.id AND l.chat_id = ?");
            params.push(Value::Integer(chat_id));
        }

        sql.push_str(" WHERE 1 = 1");

        if let Some(expr) = self.match_expression() {
            sql.push_str(
                " AND r.id IN (SELECT recipe_id FROM recipes_fts WHERE recipes_fts MATCH ?)",
            );
            params.push(Value::Text(expr));
        }

        if !self.excluded_tags.is_empty() {
            sql.push_str(&format!(
                " AND NOT EXISTS (SELECT 1 FROM recipe_tags x WHERE x.recipe_id = r.id AND x.tag_id IN ({}))",
                placeholders(self.excluded_tags.len())
            ));
            params.extend(self.excluded_tags.iter().cloned().map(Value::Text));
        }

        if !self.excluded_authors.is_empty() {
            sql.push_str(&format!(
                " AND NOT EXISTS (SELECT 1 FROM recipe_authors x WHERE x.recipe_id = r.id AND x.author_id IN ({}))",
                placeholders(self.excluded_authors.len())
            ));
            params.extend(self.excluded_authors.iter().cloned().map(Value::Text));
        }

        (sql, params)
    }

    pub(crate) fn order_clause(&self) -> &'static str {
        match self.order {
            RecipeOrder::Popularity => {
                "ORDER BY r.reviews_count DESC, r.rating DESC, r.pub_date DESC NULLS LAST, r.id"
            }
            RecipeOrder::Title => "ORDER BY r.title COLLATE NOCASE, r.id",
            RecipeOrder::Random => "ORDER BY random()",
        }
    }
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"))
}

fn delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b{INGREDIENTS_DELIMITER}\b")).expect("valid delimiter regex")
    })
}

fn fts_terms<'a>(column: &'a str, text: &'a str) -> impl Iterator<Item = String> + 'a {
    word_re()
        .find_iter(text)
        .map(move |word| format!("{column} : \"{}\"", word.as_str()))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Split a raw `/search` argument into `(primary, ingredients)` on the
/// first standalone delimiter keyword. Either half may come back empty.
pub fn split_search_text(raw: &str) -> (String, String) {
    let mut parts = delimiter_re().splitn(raw, 2);
    let primary = parts.next().unwrap_or_default().trim().to_string();
    let ingredients = parts.next().unwrap_or_default().trim().to_string();
    (primary, ingredients)
}
