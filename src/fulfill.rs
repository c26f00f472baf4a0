//! Delivery of newly ingested recipes to subscribed chats.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::db::Repository;
use crate::error::Result;
use crate::models::RecipeCard;
use crate::transport::{format, DeliverySink};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FulfillReport {
    pub delivered: usize,
    pub consumers: usize,
    pub failed_consumers: usize,
}

#[derive(Debug, Default)]
struct ConsumerOutcome {
    delivered: usize,
    failed: bool,
}

pub struct Fulfiller<'a> {
    repository: &'a Repository,
    sink: &'a dyn DeliverySink,
    concurrency: usize,
}

impl<'a> Fulfiller<'a> {
    pub fn new(repository: &'a Repository, sink: &'a dyn DeliverySink, concurrency: usize) -> Self {
        Self {
            repository,
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// One fulfillment pass over every chat.
    pub async fn fulfill(&self) -> Result<FulfillReport> {
        let chat_ids = self.repository.chat_ids().await?;

        let outcomes: Vec<ConsumerOutcome> = stream::iter(chat_ids)
            .map(|chat_id| self.fulfill_chat(chat_id))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = FulfillReport {
            delivered: outcomes.iter().map(|o| o.delivered).sum(),
            consumers: outcomes.len(),
            failed_consumers: outcomes.iter().filter(|o| o.failed).count(),
        };
        info!(
            delivered = report.delivered,
            consumers = report.consumers,
            failed = report.failed_consumers,
            "Fulfillment finished"
        );
        Ok(report)
    }

    async fn fulfill_chat(&self, chat_id: i64) -> ConsumerOutcome {
        let mut outcome = ConsumerOutcome::default();

        let pending = match self.pending_recipes(chat_id).await {
            Ok(pending) => pending,
            Err(e) => {
                error!(chat_id, error = %e, "Failed to collect pending recipes");
                outcome.failed = true;
                return outcome;
            }
        };

        for card in pending {
            if let Err(e) = self.deliver(chat_id, &card).await {
                // Later recipes wait too so the watermark never skips this one.
                error!(chat_id, recipe = card.id(), error = %e, "Delivery failed");
                outcome.failed = true;
                break;
            }
            outcome.delivered += 1;
        }

        debug!(chat_id, delivered = outcome.delivered, "Chat fulfilled");
        outcome
    }

    async fn deliver(&self, chat_id: i64, card: &RecipeCard) -> Result<()> {
        let (text, controls) = format::recipe_message(card);
        self.sink.send(chat_id, &text, &controls).await?;
        if let Some(date) = card.pub_date() {
            self.repository.advance_watermarks(chat_id, date).await?;
        }
        Ok(())
    }

    /// Union of every subscription's new recipes, each once, oldest first.
    async fn pending_recipes(&self, chat_id: i64) -> Result<Vec<RecipeCard>> {
        let mut pending: HashMap<String, RecipeCard> = HashMap::new();
        for subscription in self.repository.subscriptions(chat_id).await? {
            let cards = self
                .repository
                .recipes_for_subject(&subscription.subject, subscription.last_item_date)
                .await?;
            for card in cards {
                pending.entry(card.recipe.id.clone()).or_insert(card);
            }
        }

        let mut pending: Vec<RecipeCard> = pending.into_values().collect();
        pending.sort_by(|a, b| {
            a.pub_date()
                .cmp(&b.pub_date())
                .then_with(|| a.recipe.id.cmp(&b.recipe.id))
        });
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::db::test_card;
    use crate::models::{Author, NewChat, Subject, Tag};
    use crate::transport::memory::RecordingSink;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn tagged(id: &str, title: &str, d: u32, tags: &[&str]) -> RecipeCard {
        let mut card = test_card(id, title, Some((2024, 3, d)));
        card.tags = tags.iter().map(|t| Tag::from_display_name(t)).collect();
        card
    }

    async fn setup(chats: &[i64]) -> Repository {
        let repo = Repository::open_in_memory().await.unwrap();
        for &id in chats {
            repo.upsert_chat(NewChat {
                id,
                ..Default::default()
            })
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn recipe_matching_two_subscriptions_is_delivered_once() {
        let repo = setup(&[1]).await;
        repo.save_page(vec![tagged("r", "Vegan Pasta", 5, &["Vegan", "Pasta"])])
            .await
            .unwrap();
        repo.subscribe(1, &Subject::tag("vegan"), 10, day(1)).await.unwrap();
        repo.subscribe(1, &Subject::tag("pasta"), 10, day(1)).await.unwrap();

        let sink = RecordingSink::default();
        let report = Fulfiller::new(&repo, &sink, 2).fulfill().await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(sink.sent_texts(1).len(), 1);
        for subscription in repo.subscriptions(1).await.unwrap() {
            assert!(subscription.last_item_date >= Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());
        }

        let again = Fulfiller::new(&repo, &sink, 2).fulfill().await.unwrap();
        assert_eq!(again.delivered, 0);
    }

    #[tokio::test]
    async fn delivers_union_oldest_first() {
        let repo = setup(&[1]).await;
        let mut by_author = tagged("a", "Newest", 9, &["Lunch"]);
        by_author.authors = vec![Author::from_display_name("Chris Morocco")];
        let mut older = tagged("b", "Oldest", 3, &["Dinner"]);
        older.authors.clear();
        repo.save_page(vec![by_author, older, tagged("c", "Middle", 6, &["Dinner"])])
            .await
            .unwrap();
        repo.subscribe(1, &Subject::tag("dinner"), 10, day(1)).await.unwrap();
        repo.subscribe(1, &Subject::author("chrismorocco"), 10, day(1))
            .await
            .unwrap();

        let sink = RecordingSink::default();
        Fulfiller::new(&repo, &sink, 1).fulfill().await.unwrap();

        let texts = sink.sent_texts(1);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("Oldest"));
        assert!(texts[1].contains("Middle"));
        assert!(texts[2].contains("Newest"));
    }

    #[tokio::test]
    async fn failed_delivery_keeps_watermark_and_spares_other_chats() {
        let repo = setup(&[1, 2]).await;
        repo.save_page(vec![
            tagged("a", "First", 2, &["Dinner"]),
            tagged("b", "Second", 4, &["Dinner"]),
        ])
        .await
        .unwrap();
        repo.subscribe(1, &Subject::tag("dinner"), 10, day(1)).await.unwrap();
        repo.subscribe(2, &Subject::tag("dinner"), 10, day(1)).await.unwrap();

        let sink = RecordingSink::default();
        sink.fail_chat(1);
        let report = Fulfiller::new(&repo, &sink, 4).fulfill().await.unwrap();

        assert_eq!(report.consumers, 2);
        assert_eq!(report.failed_consumers, 1);
        assert_eq!(report.delivered, 2);
        assert_eq!(sink.sent_texts(2).len(), 2);
        assert_eq!(repo.subscriptions(1).await.unwrap()[0].last_item_date, day(1));
    }

    #[tokio::test]
    async fn failure_midway_stops_before_later_recipes() {
        let repo = setup(&[1]).await;
        repo.save_page(vec![
            tagged("a", "First", 2, &["Dinner"]),
            tagged("b", "Broken", 4, &["Dinner"]),
            tagged("c", "Third", 6, &["Dinner"]),
        ])
        .await
        .unwrap();
        repo.subscribe(1, &Subject::tag("dinner"), 10, day(1)).await.unwrap();

        let sink = RecordingSink::default();
        sink.fail_when_text_contains("Broken");
        let report = Fulfiller::new(&repo, &sink, 1).fulfill().await.unwrap();

        assert_eq!(report.delivered, 1);
        let watermark = repo.subscriptions(1).await.unwrap()[0].last_item_date;
        assert_eq!(watermark, Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap());
    }
}
