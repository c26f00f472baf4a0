//! Wire format of the recipe listing endpoint.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SourcePage {
    #[serde(default)]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub hed: String,
    #[serde(default)]
    pub social_title: String,
    #[serde(default)]
    pub dek: String,
    #[serde(default)]
    pub social_description: String,
    #[serde(default)]
    pub aggregate_rating: Option<f64>,
    #[serde(default)]
    pub reviews_count: Option<i64>,
    #[serde(default)]
    pub will_make_again_pct: Option<i64>,
    /// `{"tout": [{"id", "filename"}]}`, but sometimes an empty list or null.
    #[serde(default)]
    pub photos: serde_json::Value,
    #[serde(default)]
    pub ingredient_groups: Vec<RawIngredientGroup>,
    #[serde(default)]
    pub cne_tags: Vec<String>,
    #[serde(default)]
    pub contributors: Option<RawContributors>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawIngredientGroup {
    #[serde(default)]
    pub hed: String,
    #[serde(default)]
    pub ingredients: Vec<RawIngredient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawIngredient {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContributors {
    #[serde(default)]
    pub author: Option<Vec<RawContributor>>,
    #[serde(default)]
    pub chef: Option<Vec<RawContributor>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContributor {
    #[serde(default)]
    pub name: String,
}
