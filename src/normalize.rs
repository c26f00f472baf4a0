//! Name canonicalization and free-text cleanup shared by ingestion and the bot.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Author display names allowed through even though they fail the
/// personal-name heuristics.
pub const AUTHOR_NAME_EXCEPTIONS: &[&str] = &["Bon Appétit Test Kitchen"];

const MAX_AUTHOR_NAME_WORDS: usize = 3;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<.*?>").expect("valid html tag regex"))
}

fn char_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#(\d+);").expect("valid char ref regex"))
}

fn possessive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"['’‘]s\b").expect("valid possessive regex"))
}

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]+").expect("valid non-word regex"))
}

/// Derive the stable identifier for a tag or author display name.
///
/// `"Chef's Pizza!"`, `"Chef's Pizza"` and `"chefs pizza"` all map to
/// `"chefspizza"`. The function is pure: the same input always yields the
/// same identifier, which is what makes tag/author creation idempotent.
pub fn id_from_name(name: &str) -> String {
    let normalized = caseless::default_case_fold_str(&name.nfkc().collect::<String>());
    let without_possessive = possessive_re().replace_all(&normalized, "s");
    non_word_re().replace_all(&without_possessive, "").into_owned()
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn display_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tag names render as hashtags, so spaces and hyphens are dropped.
pub fn hashtag_name(name: &str) -> String {
    name.replace([' ', '-'], "")
}

/// Strip HTML tags, decode numeric character references and pad em-dashes.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("&amp;", "&");
    let text = html_tag_re().replace_all(&text, "");
    let text = char_ref_re().replace_all(&text, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    text.replace('—', " — ")
}

/// Ingredient group heading: cleaned, trailing periods removed, capitalized.
pub fn group_title(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    let trimmed = cleaned.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(capitalize(trimmed))
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Split a contributor row into individual author names.
///
/// Rows may join several people with `" & "`. Entries that look like an
/// address (contain a comma) or are too long to be a personal name are
/// dropped unless they are on the exception list.
pub fn split_author_names(raw: &str) -> Vec<String> {
    raw.trim()
        .split(" & ")
        .map(str::trim)
        .filter(|name| is_personal_name(name))
        .map(display_name)
        .collect()
}

fn is_personal_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if AUTHOR_NAME_EXCEPTIONS.contains(&name) {
        return true;
    }
    !name.contains(',') && name.split_whitespace().count() <= MAX_AUTHOR_NAME_WORDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_name_is_stable() {
        assert_eq!(id_from_name("Chef's Pizza!"), id_from_name("Chef's Pizza!"));
        assert_eq!(id_from_name("Chef's Pizza"), id_from_name("chefs pizza"));
        assert_eq!(id_from_name("Chef’s Pizza"), "chefspizza");
        assert_eq!(id_from_name("#Quick Dinner"), "quickdinner");
    }

    #[test]
    fn id_from_name_normalizes_unicode() {
        assert_eq!(id_from_name("ＶＥＧＡＮ"), "vegan");
        assert_eq!(id_from_name("Crème Brûlée"), "crèmebrûlée");
        assert_eq!(id_from_name("Crème Brûlée"), id_from_name("crème brûlée"));
        assert_eq!(id_from_name("Straße"), "strasse");
        assert_eq!(id_from_name("Straße"), id_from_name("STRASSE"));
        assert_eq!(id_from_name("ΟΔΟΣ"), id_from_name("οδος"));
    }

    #[test]
    fn display_name_collapses_whitespace() {
        assert_eq!(display_name("  Molly   Baz \n"), "Molly Baz");
    }

    #[test]
    fn clean_text_strips_markup() {
        assert_eq!(
            clean_text("<p>Salt &amp; pepper&#8212;to taste</p>"),
            "Salt & pepper — to taste"
        );
        assert_eq!(clean_text("a—b"), "a — b");
        assert_eq!(clean_text("caf&#233;"), "café");
    }

    #[test]
    fn group_title_strips_period_and_capitalizes() {
        assert_eq!(group_title("FOR THE SAUCE."), Some("For the sauce".to_string()));
        assert_eq!(group_title("<b>dressing</b>.."), Some("Dressing".to_string()));
        assert_eq!(group_title("   "), None);
    }

    #[test]
    fn hashtag_name_drops_separators() {
        assert_eq!(hashtag_name("Quick Dinner"), "QuickDinner");
        assert_eq!(hashtag_name("gluten-free"), "glutenfree");
    }

    #[test]
    fn split_author_names_applies_heuristics() {
        assert_eq!(
            split_author_names(" Molly Baz & Chris Morocco "),
            vec!["Molly Baz", "Chris Morocco"]
        );
        assert!(split_author_names("123 Main St, Brooklyn").is_empty());
        assert!(split_author_names("The Best Home Cooks Ever").is_empty());
        assert_eq!(
            split_author_names("Bon Appétit Test Kitchen & Andy Baraghani"),
            vec!["Bon Appétit Test Kitchen", "Andy Baraghani"]
        );
        assert_eq!(
            split_author_names("Molly Baz &  & Andy"),
            vec!["Molly Baz", "Andy"]
        );
    }
}
