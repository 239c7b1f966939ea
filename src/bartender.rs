use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{env, fmt};

use crate::{
    db,
    errors::AppError,
    structs::{Category, InventoryItem},
    AppState,
};

pub const DEFAULT_MODEL: &str = "grok-2-latest";
pub const DEFAULT_ENDPOINT: &str = "https://api.x.ai/v1/responses";

const SYSTEM_PROMPT: &str = "You are a friendly, knowledgeable bartender assistant with a warm \
personality. You have access to the user's home bar inventory and can:\n\n\
- Suggest cocktails they can make with their current inventory\n\
- Recommend what ingredients to buy to expand their cocktail options\n\
- Provide recipes and mixing instructions\n\
- Offer pairing suggestions for food or occasions\n\
- Give advice on bar organization and stock management\n\
- Share interesting facts about spirits and cocktail history\n\n\
Keep responses conversational, fun, and helpful. Use a warm, inviting tone like a friendly \
bartender would.\n\
If they're missing ingredients for a drink, suggest alternatives from their inventory or \
recommend what to buy.\n\
Format cocktail recipes clearly with ingredients and steps.\n\
Feel free to use occasional bartender expressions and be encouraging about their bar collection!";

/// Client for the external responses API. Conversation state lives on the
/// remote side, addressed by an opaque response id.
#[derive(Clone)]
pub struct BartenderClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl fmt::Debug for BartenderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print the bearer secret
        f.debug_struct("BartenderClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<&'a str>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct ResponsesReply {
    pub output: Value,
    pub id: String,
}

#[derive(Serialize, Debug)]
pub struct BartenderAnswer {
    pub answer: String,
    pub response_id: String,
}

impl BartenderClient {
    pub fn new(api_key: String, endpoint: String, model: String) -> Self {
        BartenderClient {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
            model,
        }
    }

    pub fn from_env() -> Self {
        let api_key = env::var("X_AI_API_KEY").unwrap_or_else(|_| {
            log::warn!("X_AI_API_KEY not set; bartender chat will fail upstream");
            String::new()
        });
        let endpoint =
            env::var("BARKEEP_AI_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());
        let model = env::var("BARKEEP_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
        BartenderClient::new(api_key, endpoint, model)
    }

    async fn send(
        &self,
        user_content: &str,
        previous_response_id: Option<&str>,
    ) -> Result<ResponsesReply, AppError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: vec![
                InputMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                InputMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            previous_response_id,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log::error!("AI request failed: {}", e);
                AppError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            log::error!("AI API error: {}. Details: {}", status, detail);
            return Err(AppError::Upstream(format!("AI API error: {status}")));
        }

        response.json::<ResponsesReply>().await.map_err(|e| {
            log::error!("Malformed AI response: {}", e);
            AppError::Upstream(e.to_string())
        })
    }
}

/// One chat exchange. A fresh turn (no token) grounds the question in the
/// target account's current inventory; a continuation turn sends the question
/// alone and lets the remote service recall the thread by token.
pub async fn ask_bartender(
    state: &AppState,
    account_id: i64,
    question: &str,
    previous_response_id: Option<&str>,
) -> Result<BartenderAnswer, AppError> {
    let user_content = match previous_response_id {
        Some(_) => question.to_owned(),
        None => {
            let items = db::list_inventory(state, account_id).await?;
            let context = build_inventory_context(&items);
            format!("Bar Inventory:\n{context}\n\nUser's question: {question}")
        }
    };

    let reply = state
        .bartender
        .send(&user_content, previous_response_id)
        .await?;
    let answer = extract_answer(&reply.output);
    Ok(BartenderAnswer {
        answer,
        response_id: reply.id,
    })
}

/// Category-grouped inventory summary injected into the first turn.
pub fn build_inventory_context(items: &[InventoryItem]) -> String {
    if items.is_empty() {
        return "No items in inventory yet.".to_owned();
    }

    let describe = |items: &[InventoryItem], category: Category| {
        let descriptions: Vec<String> = items
            .iter()
            .filter(|item| item.category == category)
            .map(|item| match &item.brand {
                Some(brand) => format!("{} ({}) x{}", item.name, brand, item.quantity),
                None => format!("{} x{}", item.name, item.quantity),
            })
            .collect();
        if descriptions.is_empty() {
            "None".to_owned()
        } else {
            descriptions.join(", ")
        }
    };

    format!(
        "Liquor: {}\nMixers: {}\nWine: {}",
        describe(items, Category::Liquor),
        describe(items, Category::Mixer),
        describe(items, Category::Wine),
    )
}

/// Pulls the answer text out of the response's output blocks: first block
/// with an `output_text` content entry, then a block tagged `text`, then the
/// first block's content, then empty.
pub fn extract_answer(output: &Value) -> String {
    let Some(blocks) = output.as_array() else {
        return output.as_str().unwrap_or_default().to_owned();
    };

    for block in blocks {
        if let Some(content) = block.get("content").and_then(Value::as_array) {
            for entry in content {
                if entry.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = entry.get("text").and_then(Value::as_str) {
                        if !text.is_empty() {
                            return text.to_owned();
                        }
                    }
                }
            }
        }
    }

    if let Some(block) = blocks
        .iter()
        .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
    {
        if let Some(content) = block.get("content").and_then(Value::as_str) {
            return content.to_owned();
        }
    }

    blocks
        .first()
        .and_then(|b| b.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}
