use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One piece of a multimodal message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagePart {
    Text { text: String },
    /// Image already encoded as standard base64.
    Image { data_base64: String, mime_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    #[must_use]
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// User message carrying an instruction followed by one inline image.
    #[must_use]
    pub fn with_image(
        text: impl Into<String>,
        data_base64: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::User,
            parts: vec![
                MessagePart::Text { text: text.into() },
                MessagePart::Image {
                    data_base64: data_base64.into(),
                    mime_type: mime_type.into(),
                },
            ],
        }
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, MessagePart::Image { .. }))
    }

    /// Concatenated text parts, images omitted.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the model and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a batch of texts in one request. The returned vectors are in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no embedding model or the request fails.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch call fails or yields no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        let batch = vec![text.to_owned()];
        async move {
            self.embed_batch(&batch)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::EmptyResponse {
                    provider: self.name().to_owned(),
                })
        }
    }

    fn supports_vision(&self) -> bool {
        false
    }

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_has_single_part() {
        let msg = Message::text(Role::System, "be brief");
        assert_eq!(msg.parts.len(), 1);
        assert!(!msg.has_image());
        assert_eq!(msg.text_content(), "be brief");
    }

    #[test]
    fn image_message_orders_text_then_image() {
        let msg = Message::with_image("describe", "aGVsbG8=", "image/png");
        assert_eq!(msg.role, Role::User);
        assert!(msg.has_image());
        assert!(matches!(msg.parts[0], MessagePart::Text { .. }));
        assert!(matches!(msg.parts[1], MessagePart::Image { .. }));
        assert_eq!(msg.text_content(), "describe");
    }

    #[test]
    fn role_strings() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
