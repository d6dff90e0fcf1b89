//! HTTP client for the board server endpoints.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use shared::{
    domain::{BoardConfig, Card, CardId, ColumnId},
    protocol::{ApiEnvelope, AssignRequest, BoardAction, CardPatch, NewCard},
};

use crate::error::BoardError;

const SNIPPET_LIMIT: usize = 200;

#[derive(Clone)]
pub struct BoardApi {
    http: Client,
    base_url: String,
}

impl BoardApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub async fn fetch_cards(&self) -> Result<Vec<Card>, BoardError> {
        let response = self
            .http
            .get(format!("{}/cards", self.base_url))
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn create_card(&self, card: &NewCard) -> Result<Card, BoardError> {
        let response = self
            .http
            .post(format!("{}/cards", self.base_url))
            .json(card)
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn move_card(&self, card_id: CardId, column_id: &ColumnId) -> Result<Card, BoardError> {
        let action = BoardAction::MoveCard {
            card_id,
            column_id: column_id.clone(),
        };
        let response = self
            .http
            .post(format!("{}/actions", self.base_url))
            .json(&action)
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn patch_card(&self, card_id: CardId, patch: &CardPatch) -> Result<Card, BoardError> {
        let response = self
            .http
            .patch(format!("{}/cards/{card_id}", self.base_url))
            .json(patch)
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn assign_card(
        &self,
        card_id: CardId,
        assignee: Option<String>,
    ) -> Result<Card, BoardError> {
        let response = self
            .http
            .post(format!("{}/cards/{card_id}/assign", self.base_url))
            .json(&AssignRequest { assignee })
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn delete_card(&self, card_id: CardId) -> Result<(), BoardError> {
        let response = self
            .http
            .delete(format!("{}/cards/{card_id}", self.base_url))
            .send()
            .await?;
        decode_ack(response).await
    }

    pub async fn fetch_config(&self) -> Result<BoardConfig, BoardError> {
        let response = self
            .http
            .get(format!("{}/config", self.base_url))
            .send()
            .await?;
        decode_envelope(response).await
    }

    pub async fn put_config(&self, config: &BoardConfig) -> Result<(), BoardError> {
        let response = self
            .http
            .put(format!("{}/config", self.base_url))
            .json(config)
            .send()
            .await?;
        decode_ack(response).await
    }
}

/// Decode an `{ success, data, error }` envelope, classifying non-2xx and
/// non-JSON bodies rather than attempting to parse them as success.
async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T, BoardError> {
    let envelope: ApiEnvelope<T> = read_envelope(response).await?;
    envelope.data.ok_or_else(|| BoardError::UnexpectedResponse {
        status: StatusCode::OK.as_u16(),
        content_type: "application/json".to_string(),
        snippet: "successful envelope without a data payload".to_string(),
    })
}

/// Like [`decode_envelope`] for endpoints whose success carries no payload.
async fn decode_ack(response: Response) -> Result<(), BoardError> {
    let _: ApiEnvelope<serde_json::Value> = read_envelope(response).await?;
    Ok(())
}

async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> Result<ApiEnvelope<T>, BoardError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response.text().await?;

    if !content_type.starts_with("application/json") {
        return Err(BoardError::UnexpectedResponse {
            status: status.as_u16(),
            content_type: if content_type.is_empty() {
                "untyped".to_string()
            } else {
                content_type
            },
            snippet: snippet(&body),
        });
    }

    match serde_json::from_str::<ApiEnvelope<T>>(&body) {
        Ok(envelope) if !status.is_success() => Err(BoardError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| format!("request failed with status {status}")),
        }),
        Ok(envelope) if !envelope.success => Err(BoardError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| "request rejected by server".to_string()),
        }),
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(BoardError::Api {
            status: status.as_u16(),
            message: snippet(&body),
        }),
        Err(_) => Err(BoardError::UnexpectedResponse {
            status: status.as_u16(),
            content_type,
            snippet: snippet(&body),
        }),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= SNIPPET_LIMIT {
        trimmed.to_string()
    } else {
        let mut end = SNIPPET_LIMIT;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
