mod client;
mod parse;
mod raw;

pub use client::{HttpSource, RecipeSource};
pub use parse::{is_sponsored, parse_pub_date, ItemParser, SOURCE_TAG_ID, SOURCE_TAG_NAME};
pub use raw::{RawContributor, RawContributors, RawIngredient, RawIngredientGroup, RawItem, SourcePage};
