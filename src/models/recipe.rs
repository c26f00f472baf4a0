use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{display_name, id_from_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientGroup {
    pub title: Option<String>,
    pub ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub url: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub name: String,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub rating: f64,
    pub reviews_count: i64,
    pub wma_count: i64,
    pub photo_url: Option<String>,
    pub ingredient_groups: Vec<IngredientGroup>,
}

impl Recipe {
    /// Text indexed for the ingredients half of a search query.
    pub fn ingredients_text(&self) -> String {
        self.ingredient_groups
            .iter()
            .flat_map(|group| group.title.iter().chain(group.ingredients.iter()))
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text indexed for the primary half of a search query.
    pub fn essentials_text(&self) -> String {
        format!("{}\n{}", self.title, self.short_description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: Option<String>,
}

impl Tag {
    pub fn from_display_name(name: &str) -> Self {
        Self {
            id: id_from_name(name),
            name: Some(display_name(name)),
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: Option<String>,
}

impl Author {
    pub fn from_display_name(name: &str) -> Self {
        Self {
            id: id_from_name(name),
            name: Some(display_name(name)),
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A recipe together with the associations parsed or loaded alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeCard {
    pub recipe: Recipe,
    pub tags: Vec<Tag>,
    pub authors: Vec<Author>,
}

impl RecipeCard {
    pub fn id(&self) -> &str {
        &self.recipe.id
    }

    pub fn pub_date(&self) -> Option<DateTime<Utc>> {
        self.recipe.pub_date
    }
}
