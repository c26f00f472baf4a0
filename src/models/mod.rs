mod chat;
mod lookup;
mod recipe;
mod session;

pub use chat::{BlockedSets, Chat, NewChat, Subject, SubjectKind, Subscription};
pub use lookup::Lookup;
pub use recipe::{Author, IngredientGroup, Recipe, RecipeCard, Tag};
pub use session::{PaginationSession, SessionQuery};
