use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{Author, IngredientGroup, Recipe, RecipeCard, Tag};
use crate::normalize::{clean_text, group_title, hashtag_name, id_from_name, split_author_names};

use super::raw::RawItem;

/// Tag attached to every ingested recipe, naming where it came from.
pub const SOURCE_TAG_ID: &str = "bonappetit";
pub const SOURCE_TAG_NAME: &str = "BonAppetit";

const SPONSORED_PATH_MARKER: &str = "/sponsored/";
const SPONSORED_TEMPLATE: &str = "sponsored";
const INTERNAL_TAG_PREFIX: char = '_';

/// Promotional items are never stored.
pub fn is_sponsored(item: &RawItem) -> bool {
    item.url.contains(SPONSORED_PATH_MARKER) || item.template.as_deref() == Some(SPONSORED_TEMPLATE)
}

/// Parse the source's publication date; `None` means "unknown date".
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turns raw listing items into recipes with their tags and authors.
#[derive(Debug, Clone)]
pub struct ItemParser {
    base_url: String,
    assets_url: String,
}

impl ItemParser {
    pub fn new(base_url: &str, assets_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            assets_url: assets_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn parse(&self, item: &RawItem) -> RecipeCard {
        let ingredient_groups = item
            .ingredient_groups
            .iter()
            .map(|group| IngredientGroup {
                title: group_title(&group.hed),
                ingredients: group
                    .ingredients
                    .iter()
                    .map(|ingredient| clean_text(&ingredient.description))
                    .collect(),
            })
            .collect();

        let recipe = Recipe {
            id: item.id.clone(),
            url: format!("{}{}", self.base_url, item.url),
            pub_date: item.pub_date.as_deref().and_then(parse_pub_date),
            name: clean_text(&item.hed),
            title: clean_text(&item.social_title),
            description: clean_text(&item.dek),
            short_description: clean_text(&item.social_description),
            rating: item.aggregate_rating.unwrap_or(0.0),
            reviews_count: item.reviews_count.unwrap_or(0),
            wma_count: item.will_make_again_pct.unwrap_or(0),
            photo_url: self.photo_url(item),
            ingredient_groups,
        };

        RecipeCard {
            recipe,
            tags: parse_tags(item),
            authors: parse_authors(item),
        }
    }

    fn photo_url(&self, item: &RawItem) -> Option<String> {
        let photo = item.photos.get("tout")?.get(0)?;
        let id = photo.get("id")?.as_str()?;
        let filename = photo.get("filename")?.as_str()?;
        Some(format!("{}/photos/{id}/{filename}", self.assets_url))
    }
}

fn parse_tags(item: &RawItem) -> Vec<Tag> {
    let mut tags: Vec<Tag> = item
        .cne_tags
        .iter()
        .filter(|name| !name.starts_with(INTERNAL_TAG_PREFIX))
        .map(|name| Tag {
            id: id_from_name(name),
            name: Some(hashtag_name(name)),
        })
        .collect();
    tags.push(Tag {
        id: SOURCE_TAG_ID.to_string(),
        name: Some(SOURCE_TAG_NAME.to_string()),
    });
    tags
}

fn parse_authors(item: &RawItem) -> Vec<Author> {
    let Some(contributors) = &item.contributors else {
        return Vec::new();
    };
    contributors
        .author
        .iter()
        .flatten()
        .chain(contributors.chef.iter().flatten())
        .flat_map(|row| split_author_names(&row.name))
        .map(|name| Author::from_display_name(&name))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::source::raw::RawItem;

    fn raw(value: serde_json::Value) -> RawItem {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> RawItem {
        raw(json!({
            "id": "5f1",
            "url": "/recipe/lemony-pasta",
            "template": "recipe",
            "pubDate": "2024-03-01T10:00:00.000Z",
            "hed": "Lemony Pasta",
            "socialTitle": "Lemony Pasta&#8212;Fast",
            "dek": "<p>Bright &amp; quick.</p>",
            "socialDescription": "Dinner in 20",
            "aggregateRating": 4.6,
            "reviewsCount": 12,
            "willMakeAgainPct": 95,
            "photos": {"tout": [{"id": "abc", "filename": "pasta.jpg"}]},
            "ingredientGroups": [
                {"hed": "FOR THE SAUCE.", "ingredients": [{"description": "1 <b>lemon</b>"}]},
                {"hed": "", "ingredients": [{"description": "Salt"}]}
            ],
            "cneTags": ["Quick Dinner", "_hidden", "Pasta"],
            "contributors": {
                "author": [{"name": "Molly Baz & Chris Morocco"}],
                "chef": [{"name": "Kitchen Team, New York"}, {"name": "Andy Baraghani"}]
            }
        }))
    }

    #[test]
    fn parses_recipe_fields() {
        let parser = ItemParser::new("https://www.bonappetit.com", "https://assets.bonappetit.com/");
        let card = parser.parse(&sample());
        let recipe = &card.recipe;

        assert_eq!(recipe.url, "https://www.bonappetit.com/recipe/lemony-pasta");
        assert_eq!(
            recipe.pub_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(recipe.title, "Lemony Pasta — Fast");
        assert_eq!(recipe.description, "Bright & quick.");
        assert_eq!(recipe.reviews_count, 12);
        assert_eq!(recipe.wma_count, 95);
        assert_eq!(
            recipe.photo_url.as_deref(),
            Some("https://assets.bonappetit.com/photos/abc/pasta.jpg")
        );
        assert_eq!(recipe.ingredient_groups[0].title.as_deref(), Some("For the sauce"));
        assert_eq!(recipe.ingredient_groups[0].ingredients, vec!["1 lemon"]);
        assert_eq!(recipe.ingredient_groups[1].title, None);
    }

    #[test]
    fn parses_tags_with_source_tag_last() {
        let parser = ItemParser::new("https://www.bonappetit.com", "https://assets.bonappetit.com");
        let tags = parser.parse(&sample()).tags;
        let ids: Vec<_> = tags.iter().map(|t| t.id.as_str()).collect();

        assert_eq!(ids, vec!["quickdinner", "pasta", SOURCE_TAG_ID]);
        assert_eq!(tags[0].name.as_deref(), Some("QuickDinner"));
    }

    #[test]
    fn parses_authors_from_both_roles() {
        let parser = ItemParser::new("https://www.bonappetit.com", "https://assets.bonappetit.com");
        let authors = parser.parse(&sample()).authors;
        let names: Vec<_> = authors.iter().map(|a| a.label()).collect();

        assert_eq!(names, vec!["Molly Baz", "Chris Morocco", "Andy Baraghani"]);
        assert_eq!(authors[0].id, "mollybaz");
    }

    #[test]
    fn missing_optional_fields_fall_back() {
        let parser = ItemParser::new("https://www.bonappetit.com", "https://assets.bonappetit.com");
        let card = parser.parse(&raw(json!({
            "id": "x",
            "url": "/recipe/x",
            "pubDate": "sometime last week",
            "photos": [],
            "contributors": null
        })));

        assert_eq!(card.recipe.pub_date, None);
        assert_eq!(card.recipe.photo_url, None);
        assert_eq!(card.recipe.rating, 0.0);
        assert!(card.authors.is_empty());
        assert_eq!(card.tags.len(), 1);
    }

    #[test]
    fn detects_sponsored_items() {
        let mut item = sample();
        assert!(!is_sponsored(&item));
        item.template = Some("sponsored".to_string());
        assert!(is_sponsored(&item));

        let mut item = sample();
        item.url = "/sponsored/some-brand-recipe".to_string();
        assert!(is_sponsored(&item));
    }

    #[test]
    fn parse_pub_date_accepts_plain_dates() {
        assert_eq!(
            parse_pub_date("2024-02-15"),
            Some(Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_pub_date(""), None);
    }
}
