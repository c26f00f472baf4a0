use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::NewChat;

use super::{Controls, DeliverySink};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";
const PARSE_MODE: &str = "MarkdownV2";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&ChatInfo> for NewChat {
    fn from(chat: &ChatInfo) -> Self {
        NewChat {
            id: chat.id,
            username: chat.username.clone(),
            first_name: chat.first_name.clone(),
            last_name: chat.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: ChatInfo,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<IncomingMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboard<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

fn keyboard(controls: &Controls) -> Option<InlineKeyboard<'_>> {
    if controls.is_empty() {
        return None;
    }
    Some(InlineKeyboard {
        inline_keyboard: controls
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| InlineButton {
                        text: &button.text,
                        callback_data: &button.callback,
                    })
                    .collect()
            })
            .collect(),
    })
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboard<'a>>,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Bot API client. Also the production `DeliverySink`.
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self
            .client
            .post(format!("{}/bot{}/{}", self.api_url, self.token, method))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{method}: {e}")))?;
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("{method}: HTTP {status}: {e}")))?;

        if !body.ok {
            let description = body.description.unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AppError::Transport(format!("{method}: {description}")));
        }
        body.result
            .ok_or_else(|| AppError::Transport(format!("{method}: empty result")))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };
        self.call(
            "getUpdates",
            &request,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    pub async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let request = AnswerCallbackRequest {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &request, None).await?;
        Ok(())
    }
}

#[async_trait]
impl DeliverySink for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str, controls: &Controls) -> Result<i64> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: false,
            reply_markup: keyboard(controls),
        };
        let sent: SentMessage = self.call("sendMessage", &request, None).await?;
        Ok(sent.message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        controls: &Controls,
    ) -> Result<()> {
        let request = EditMessageRequest {
            chat_id,
            message_id,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: true,
            reply_markup: keyboard(controls),
        };
        // Edited text messages come back as the message object.
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let request = DeleteMessageRequest {
            chat_id,
            message_id,
        };
        let _: bool = self.call("deleteMessage", &request, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::transport::Button;

    async fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&server.uri(), "TOKEN").unwrap()
    }

    #[tokio::test]
    async fn send_returns_message_id_and_posts_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 42,
                "parse_mode": "MarkdownV2",
                "reply_markup": {"inline_keyboard": [[{"text": "❤", "callback_data": "recipe/like/r1"}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 777, "chat": {"id": 42}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let controls = vec![vec![Button::new("❤", "recipe/like/r1")]];
        let id = client(&server).await.send(42, "hi", &controls).await.unwrap();
        assert_eq!(id, 777);
    }

    #[tokio::test]
    async fn api_errors_become_transport_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/deleteMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: message to delete not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.delete(42, 1).await.unwrap_err();
        match err {
            AppError::Transport(message) => assert!(message.contains("message to delete not found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_updates_decodes_messages_and_callbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .and(body_partial_json(json!({"offset": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {
                        "message_id": 1,
                        "chat": {"id": 42, "username": "cook"},
                        "text": "/search pasta"
                    }},
                    {"update_id": 11, "callback_query": {
                        "id": "cb1",
                        "message": {"message_id": 2, "chat": {"id": 42}},
                        "data": "search/nextPage"
                    }}
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).await.get_updates(10, 0).await.unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.text.as_deref(), Some("/search pasta"));
        assert_eq!(message.chat.username.as_deref(), Some("cook"));
        let callback = updates[1].callback_query.as_ref().unwrap();
        assert_eq!(callback.data.as_deref(), Some("search/nextPage"));
        assert_eq!(callback.message.as_ref().unwrap().message_id, 2);
    }
}
