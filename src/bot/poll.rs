use std::time::Duration;

use tracing::{error, info, warn};

use crate::ingest::jittered;
use crate::models::NewChat;
use crate::transport::{TelegramClient, Update};

use super::Bot;

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Long-poll Telegram and dispatch updates to `bot` one at a time, so
/// callbacks for the same message are handled in arrival order.
pub async fn run_polling(bot: &Bot, client: &TelegramClient) {
    info!("Polling for updates");
    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Polling failed, retrying");
                tokio::time::sleep(jittered(RETRY_PAUSE)).await;
                continue;
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            dispatch(bot, client, update).await;
        }
    }
}

async fn dispatch(bot: &Bot, client: &TelegramClient, update: Update) {
    if let Some(message) = update.message {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        if let Err(e) = bot.handle_message(NewChat::from(&message.chat), text).await {
            error!(chat_id = message.chat.id, error = %e, "Command failed");
        }
        return;
    }

    if let Some(callback) = update.callback_query {
        let notice = match (&callback.message, callback.data.as_deref()) {
            (Some(message), Some(data)) => {
                match bot
                    .handle_callback(NewChat::from(&message.chat), message.message_id, data)
                    .await
                {
                    Ok(notice) => notice,
                    Err(e) => {
                        error!(chat_id = message.chat.id, error = %e, "Callback failed");
                        Some("Something went wrong".to_string())
                    }
                }
            }
            _ => None,
        };
        if let Err(e) = client.answer_callback(&callback.id, notice.as_deref()).await {
            warn!(error = %e, "Failed to answer callback");
        }
    }
}
