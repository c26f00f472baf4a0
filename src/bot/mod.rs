//! Chat command and callback handling.
//!
//! [`Bot`] is built once at startup and handed to the polling loop; it
//! routes each inbound event to the repository, the lookup resolver or the
//! paginator and answers with a short MarkdownV2 reply.

mod command;
mod poll;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{split_search_text, RecipeQuery, Repository};
use crate::error::{AppError, Result};
use crate::lookup;
use crate::models::{Lookup, NewChat, SessionQuery, Subject};
use crate::pagination::{Direction, PageOutcome, Paginator};
use crate::transport::format::{self, escape, Entity};
use crate::transport::{Callback, DeliverySink};

pub use command::Command;
pub use poll::run_polling;

const HELP: &str = "Commands:
/subscribe #tag or author - get new recipes as they are published
/unsubscribe #tag or author
/subscriptions - list your subscriptions
/search text [with ingredients] - search recipes
/liked - recipes you liked
/block #tag or author - hide from search results
/unblock #tag or author
/random - a random recipe";

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub page_size: usize,
    pub max_subscriptions: usize,
}

pub struct Bot {
    repository: Repository,
    sink: Arc<dyn DeliverySink>,
    settings: BotSettings,
}

impl Bot {
    pub fn new(repository: Repository, sink: Arc<dyn DeliverySink>, settings: BotSettings) -> Self {
        Self {
            repository,
            sink,
            settings,
        }
    }

    fn paginator(&self) -> Paginator<'_> {
        Paginator::new(&self.repository, self.sink.as_ref(), self.settings.page_size)
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sink
            .send(chat_id, &escape(text, Entity::Text), &Vec::new())
            .await?;
        Ok(())
    }

    /// Handle an inbound text message. Plain text is ignored.
    pub async fn handle_message(&self, chat: NewChat, text: &str) -> Result<()> {
        let Some(command) = Command::parse(text) else {
            return Ok(());
        };
        let chat_id = chat.id;
        self.repository.upsert_chat(chat).await?;
        debug!(chat_id, ?command, "Command");

        match self.run_command(chat_id, command).await {
            Err(e) => match e.user_message() {
                Some(message) => self.reply(chat_id, message).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn run_command(&self, chat_id: i64, command: Command) -> Result<()> {
        match command {
            Command::Start => self.reply(chat_id, "You have been registered").await,
            Command::Help | Command::Unknown(_) => self.reply(chat_id, HELP).await,
            Command::Subscribe(arg) => self.subscribe(chat_id, &arg).await,
            Command::Unsubscribe(arg) => self.unsubscribe(chat_id, &arg).await,
            Command::Subscriptions => self.list_subscriptions(chat_id).await,
            Command::Search(arg) => self.search(chat_id, &arg).await,
            Command::Liked => {
                if self.paginator().open(chat_id, SessionQuery::Liked).await?.is_none() {
                    self.reply(chat_id, "You have no liked recipes yet").await?;
                }
                Ok(())
            }
            Command::Block(arg) => self.block(chat_id, &arg, true).await,
            Command::Unblock(arg) => self.block(chat_id, &arg, false).await,
            Command::Random => self.random(chat_id).await,
        }
    }

    /// Resolve a command argument to a subject, replying with the reason
    /// when it does not name exactly one tag or author.
    async fn resolve_subject(
        &self,
        chat_id: i64,
        arg: &str,
        usage: &str,
    ) -> Result<Option<(Subject, String)>> {
        if arg.trim().is_empty() {
            self.reply(chat_id, usage).await?;
            return Ok(None);
        }
        match lookup::resolve(&self.repository, arg).await? {
            Lookup::Found { subject, label } => Ok(Some((subject, label))),
            miss => {
                self.reply(chat_id, &lookup_miss_message(&miss)).await?;
                Ok(None)
            }
        }
    }

    async fn subscribe(&self, chat_id: i64, arg: &str) -> Result<()> {
        let usage = "Usage: /subscribe #tag or author name";
        let Some((subject, label)) = self.resolve_subject(chat_id, arg, usage).await? else {
            return Ok(());
        };
        self.repository
            .subscribe(chat_id, &subject, self.settings.max_subscriptions, Utc::now())
            .await?;
        info!(chat_id, subject = %subject.id, "Subscribed");
        self.reply(chat_id, &format!("Subscribed to {label}")).await
    }

    async fn unsubscribe(&self, chat_id: i64, arg: &str) -> Result<()> {
        let usage = "Usage: /unsubscribe #tag or author name";
        let Some((subject, label)) = self.resolve_subject(chat_id, arg, usage).await? else {
            return Ok(());
        };
        let message = if self.repository.unsubscribe(chat_id, &subject).await? {
            format!("Unsubscribed from {label}")
        } else {
            format!("You are not subscribed to {label}")
        };
        self.reply(chat_id, &message).await
    }

    async fn list_subscriptions(&self, chat_id: i64) -> Result<()> {
        let subscriptions = self.repository.subscriptions(chat_id).await?;
        if subscriptions.is_empty() {
            return self.reply(chat_id, "You have no subscriptions").await;
        }
        let lines: Vec<String> = subscriptions.iter().map(|s| format!("• {s}")).collect();
        self.reply(chat_id, &format!("Your subscriptions:\n{}", lines.join("\n")))
            .await
    }

    async fn search(&self, chat_id: i64, arg: &str) -> Result<()> {
        let (primary, ingredients) = split_search_text(arg);
        if primary.is_empty() && ingredients.is_empty() {
            return self
                .reply(chat_id, "Usage: /search text [with ingredients]")
                .await;
        }
        let query = SessionQuery::Search {
            primary,
            ingredients,
        };
        if self.paginator().open(chat_id, query).await?.is_none() {
            self.reply(chat_id, "Nothing found").await?;
        }
        Ok(())
    }

    async fn block(&self, chat_id: i64, arg: &str, block: bool) -> Result<()> {
        let usage = if block {
            "Usage: /block #tag or author name"
        } else {
            "Usage: /unblock #tag or author name"
        };
        let Some((subject, label)) = self.resolve_subject(chat_id, arg, usage).await? else {
            return Ok(());
        };
        let message = match (block, self.toggle_block(chat_id, &subject, block).await?) {
            (true, true) => format!("Blocked {label}"),
            (true, false) => format!("{label} is already blocked"),
            (false, true) => format!("Unblocked {label}"),
            (false, false) => format!("{label} was not blocked"),
        };
        self.reply(chat_id, &message).await
    }

    async fn toggle_block(&self, chat_id: i64, subject: &Subject, block: bool) -> Result<bool> {
        if block {
            self.repository.block(chat_id, subject).await
        } else {
            self.repository.unblock(chat_id, subject).await
        }
    }

    async fn random(&self, chat_id: i64) -> Result<()> {
        let blocked = self.repository.blocked_sets(chat_id).await?;
        let query = RecipeQuery::random().excluding(&blocked);
        let Some(card) = self.repository.query_recipes(&query, 0, 1).await?.pop() else {
            return self.reply(chat_id, "No recipes yet").await;
        };
        let (text, controls) = format::recipe_message(&card);
        self.sink.send(chat_id, &text, &controls).await?;
        Ok(())
    }

    /// Handle a button press on `message_id`. Returns a short notice to
    /// show the user, if any.
    pub async fn handle_callback(
        &self,
        chat: NewChat,
        message_id: i64,
        data: &str,
    ) -> Result<Option<String>> {
        let chat_id = chat.id;
        self.repository.upsert_chat(chat).await?;

        let Some(callback) = Callback::parse(data) else {
            return Ok(Some("Unknown action".to_string()));
        };
        debug!(chat_id, message_id, callback = %callback.encode(), "Callback");

        match self.run_callback(chat_id, message_id, &callback).await {
            Err(e) => match e.user_message() {
                Some(message) => Ok(Some(message.to_string())),
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn run_callback(
        &self,
        chat_id: i64,
        message_id: i64,
        callback: &Callback,
    ) -> Result<Option<String>> {
        let item_id = callback.item_id.as_deref();
        match (callback.namespace.as_str(), callback.action.as_str(), item_id) {
            ("recipe", "show", Some(id)) => {
                let card = self
                    .repository
                    .recipe_card(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))?;
                let (text, controls) = format::recipe_message(&card);
                self.sink.send(chat_id, &text, &controls).await?;
                Ok(None)
            }
            ("recipe", "like", Some(id)) => {
                let liked = self.repository.toggle_like(chat_id, id).await?;
                Ok(Some(if liked { "Liked" } else { "Removed from liked" }.to_string()))
            }
            ("recipe", "delete", _) => {
                self.sink.delete(chat_id, message_id).await?;
                Ok(None)
            }
            ("search" | "liked", "delete", _) => {
                self.paginator().dismiss(chat_id, message_id).await?;
                Ok(None)
            }
            ("search" | "liked", action, _) => {
                let Some(direction) = Direction::from_action(action) else {
                    return Ok(Some("Unknown action".to_string()));
                };
                match self.paginator().navigate(chat_id, message_id, direction).await? {
                    PageOutcome::Rendered(_) => Ok(None),
                    PageOutcome::NotFound => Ok(Some("Nothing found".to_string())),
                }
            }
            _ => Ok(Some("Unknown action".to_string())),
        }
    }
}

fn did_you_mean(suggestion: Option<String>) -> String {
    suggestion
        .map(|s| format!(". Did you mean {s}?"))
        .unwrap_or_default()
}

fn lookup_miss_message(lookup: &Lookup) -> String {
    match lookup {
        Lookup::Found { label, .. } => label.clone(),
        Lookup::TagNotFound { name, suggestion } => format!(
            "Tag #{name} not found{}",
            did_you_mean(suggestion.as_ref().map(|t| format!("#{}", t.label())))
        ),
        Lookup::AuthorNotFound { name, suggestion } => format!(
            "Author {name} not found{}",
            did_you_mean(suggestion.as_ref().map(|a| a.label().to_string()))
        ),
        Lookup::Ambiguous { tag, author } => format!(
            "\"{}\" is both tag #{} and author {}. Use #{} for the tag or @{} for the author",
            author.label(),
            tag.label(),
            author.label(),
            tag.label(),
            author.label()
        ),
        Lookup::NothingFound { name, suggestions } if suggestions.is_empty() => {
            format!("Nothing found for \"{name}\"")
        }
        Lookup::NothingFound { name, suggestions } => format!(
            "Nothing found for \"{name}\". Did you mean: {}?",
            suggestions.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_card;
    use crate::models::{Author, Tag};
    use crate::transport::memory::{Delivery, RecordingSink};

    const CHAT: i64 = 11;

    async fn setup() -> (Bot, Arc<RecordingSink>) {
        let repo = Repository::open_in_memory().await.unwrap();
        let mut quick = test_card("q", "Quick Pasta", Some((2024, 3, 2)));
        quick.tags.push(Tag::from_display_name("Quick"));
        quick.authors.push(Author::from_display_name("Quick"));
        let cards = vec![
            test_card("a", "Lemon Pasta", Some((2024, 3, 1))),
            test_card("b", "Pasta Salad", Some((2024, 3, 3))),
            quick,
        ];
        repo.save_page(cards).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        let bot = Bot::new(
            repo,
            sink.clone(),
            BotSettings {
                page_size: 2,
                max_subscriptions: 1,
            },
        );
        (bot, sink)
    }

    fn chat() -> NewChat {
        NewChat {
            id: CHAT,
            username: Some("cook".to_string()),
            ..Default::default()
        }
    }

    fn last_text(sink: &RecordingSink) -> String {
        sink.sent_texts(CHAT).pop().unwrap_or_default()
    }

    #[tokio::test]
    async fn subscribe_reports_constraints_to_the_user() {
        let (bot, sink) = setup().await;

        bot.handle_message(chat(), "/subscribe #dinner").await.unwrap();
        assert_eq!(last_text(&sink), "Subscribed to \\#Dinner");

        bot.handle_message(chat(), "/subscribe #dinner").await.unwrap();
        assert!(last_text(&sink).contains("already subscribed"));

        bot.handle_message(chat(), "/subscribe Molly Baz").await.unwrap();
        assert!(last_text(&sink).contains("at most 1 subscriptions"));

        bot.handle_message(chat(), "/subscriptions").await.unwrap();
        assert!(last_text(&sink).contains("• \\#Dinner"));
    }

    #[tokio::test]
    async fn ambiguous_and_missing_names_get_explanations() {
        let (bot, sink) = setup().await;

        bot.handle_message(chat(), "/subscribe quick").await.unwrap();
        assert!(last_text(&sink).contains("is both tag"));

        bot.handle_message(chat(), "/block #diner").await.unwrap();
        assert!(last_text(&sink).contains("Did you mean \\#Dinner?"));

        bot.handle_message(chat(), "/subscribe").await.unwrap();
        assert!(last_text(&sink).starts_with("Usage"));
    }

    #[tokio::test]
    async fn search_pages_through_results_with_callbacks() {
        let (bot, sink) = setup().await;

        bot.handle_message(chat(), "/search pasta").await.unwrap();
        let message_id = match sink.deliveries().last() {
            Some(Delivery::Sent { message_id, .. }) => *message_id,
            other => panic!("unexpected delivery: {other:?}"),
        };

        let notice = bot
            .handle_callback(chat(), message_id, "search/nextPage")
            .await
            .unwrap();
        assert_eq!(notice, None);

        let notice = bot
            .handle_callback(chat(), message_id, "search/nextPage")
            .await
            .unwrap();
        assert_eq!(notice.as_deref(), Some("Nothing found"));

        bot.handle_callback(chat(), message_id, "search/delete")
            .await
            .unwrap();
        assert!(sink.deliveries().contains(&Delivery::Deleted {
            chat_id: CHAT,
            message_id,
        }));
    }

    #[tokio::test]
    async fn like_toggles_and_missing_recipes_are_reported() {
        let (bot, sink) = setup().await;
        bot.handle_message(chat(), "/start").await.unwrap();

        let liked = bot.handle_callback(chat(), 1, "recipe/like/a").await.unwrap();
        assert_eq!(liked.as_deref(), Some("Liked"));
        let unliked = bot.handle_callback(chat(), 1, "recipe/like/a").await.unwrap();
        assert_eq!(unliked.as_deref(), Some("Removed from liked"));

        let missing = bot.handle_callback(chat(), 1, "recipe/show/nope").await.unwrap();
        assert_eq!(missing.as_deref(), Some("Recipe not found"));

        bot.handle_callback(chat(), 1, "recipe/show/a").await.unwrap();
        assert!(last_text(&sink).contains("Lemon Pasta"));
    }

    #[tokio::test]
    async fn random_skips_blocked_recipes() {
        let (bot, sink) = setup().await;
        bot.handle_message(chat(), "/block #dinner").await.unwrap();

        bot.handle_message(chat(), "/random").await.unwrap();
        assert_eq!(last_text(&sink), "No recipes yet");
    }
}
