//! Telegram MarkdownV2 rendering of recipes and result pages.

use crate::models::{IngredientGroup, RecipeCard};

use super::{Button, Callback, Controls};

const BUTTONS_PER_ROW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Link,
    Code,
    Text,
}

pub fn escape(text: &str, entity: Entity) -> String {
    let special: &[char] = match entity {
        Entity::Link => &['\\', ')'],
        Entity::Code => &['\\', '`'],
        Entity::Text => &[
            '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}',
            '.', '!',
        ],
    };
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn text(value: &str) -> String {
    escape(value, Entity::Text)
}

fn title_link(card: &RecipeCard) -> String {
    format!(
        "[{}]({})",
        text(&card.recipe.title),
        escape(&card.recipe.url, Entity::Link)
    )
}

fn author_list(card: &RecipeCard) -> String {
    card.authors
        .iter()
        .map(|author| format!("_{}_", text(author.label())))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ingredient_group(group: &IngredientGroup) -> String {
    let header = group
        .title
        .as_deref()
        .map(|title| format!("*{}:*\n", text(title)))
        .unwrap_or_default();
    let body = group
        .ingredients
        .iter()
        .map(|ingredient| format!(" \\- {}", text(ingredient)))
        .collect::<Vec<_>>()
        .join("\n");
    header + &body
}

/// Full recipe card with like/dismiss buttons.
pub fn recipe_message(card: &RecipeCard) -> (String, Controls) {
    let mut sections = vec![format!("*{}*", title_link(card))];

    let description = card.recipe.description.replace('\n', "\n\n");
    sections.push(text(&description));
    sections.push(
        card.recipe
            .ingredient_groups
            .iter()
            .map(ingredient_group)
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    if !card.authors.is_empty() {
        sections.push(format!("By {}", author_list(card)));
    }
    sections.push(
        card.tags
            .iter()
            .map(|tag| format!("\\#{}", text(tag.label())))
            .collect::<Vec<_>>()
            .join(" "),
    );

    let message = sections
        .into_iter()
        .filter(|section| !section.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let id = Some(card.id());
    let controls = vec![vec![
        Button::new("❤", Callback::new("recipe", "like", id).encode()),
        Button::new("❌", Callback::new("recipe", "delete", id).encode()),
    ]];
    (message, controls)
}

fn list_item(card: &RecipeCard) -> String {
    let stats = text(&format!(
        "{:.1}/5.0, {} reviews",
        card.recipe.rating, card.recipe.reviews_count
    ));
    if card.authors.is_empty() {
        format!("{} \\({stats}\\)", title_link(card))
    } else {
        format!("{} by {} \\({stats}\\)", title_link(card), author_list(card))
    }
}

/// One page of a paginated listing. `offset` numbers the rows; `namespace`
/// scopes the navigation callbacks (`search` or `liked`).
pub fn list_message(
    cards: &[RecipeCard],
    offset: usize,
    page_n: u32,
    total: usize,
    page_size: usize,
    namespace: &str,
) -> (String, Controls) {
    let mut rows: Vec<String> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| format!("{}\\. {}", offset + i + 1, list_item(card)))
        .collect();
    let pages = total.div_ceil(page_size.max(1)).max(1);
    rows.push(String::new());
    rows.push(format!("_Page {}/{}_", page_n + 1, pages));

    let show_buttons: Vec<Button> = cards
        .iter()
        .enumerate()
        .map(|(i, card)| {
            Button::new(
                (offset + i + 1).to_string(),
                Callback::new("recipe", "show", Some(card.id())).encode(),
            )
        })
        .collect();

    let mut controls: Controls = show_buttons
        .chunks(BUTTONS_PER_ROW)
        .map(<[Button]>::to_vec)
        .collect();
    controls.push(vec![
        Button::new("⬅", Callback::new(namespace, "previousPage", None).encode()),
        Button::new("❌", Callback::new(namespace, "delete", None).encode()),
        Button::new("➡", Callback::new(namespace, "nextPage", None).encode()),
    ]);

    (rows.join("\n"), controls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_card;

    #[test]
    fn escapes_by_entity() {
        assert_eq!(escape("a_b.c!", Entity::Text), "a\\_b\\.c\\!");
        assert_eq!(escape("https://x.com/a_(b)", Entity::Link), "https://x.com/a_(b\\)");
        assert_eq!(escape("`x`", Entity::Code), "\\`x\\`");
    }

    #[test]
    fn recipe_message_has_sections_and_buttons() {
        let card = test_card("r1", "Lemon Pasta", Some((2024, 3, 1)));
        let (message, controls) = recipe_message(&card);

        assert!(message.starts_with("*[Lemon Pasta]("));
        assert!(message.contains("*Main:*\n \\- 1 lemon\n \\- 2 eggs"));
        assert!(message.contains("By _Molly Baz_"));
        assert!(message.contains("\\#Dinner"));
        assert!(!message.contains("\n\n\n"));
        assert_eq!(controls[0][0].callback, "recipe/like/r1");
        assert_eq!(controls[0][1].callback, "recipe/delete/r1");
    }

    #[test]
    fn list_message_rows_buttons_and_footer() {
        let cards: Vec<_> = (0..7)
            .map(|i| test_card(&format!("r{i}"), &format!("Dish {i}"), None))
            .collect();
        let (message, controls) = list_message(&cards, 10, 1, 17, 10, "search");

        assert!(message.starts_with("11\\. [Dish 0]"));
        assert!(message.contains("by _Molly Baz_ \\(4\\.5/5\\.0, 10 reviews\\)"));
        assert!(message.ends_with("_Page 2/2_"));
        assert_eq!(controls.len(), 3);
        assert_eq!(controls[0].len(), 5);
        assert_eq!(controls[1].len(), 2);
        assert_eq!(controls[0][0].text, "11");
        assert_eq!(controls[0][0].callback, "recipe/show/r0");
        let nav: Vec<_> = controls[2].iter().map(|b| b.callback.as_str()).collect();
        assert_eq!(nav, vec!["search/previousPage", "search/delete", "search/nextPage"]);
    }
}
