//! Agronomy chat assistant.
//!
//! Conversation history is an explicit value owned by the caller and passed
//! into each request; the server keeps no per-conversation state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::ChatRole;
use crate::pipeline::gemini::{
    Content, GenerateContentRequest, GenerationConfig, GenerationError, Part, TextGenerator,
};

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Reply used when a successful response carries no text.
pub const NO_RESPONSE: &str = "No response";

const CHAT_TEMPERATURE: f32 = 0.3;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat assistant is not configured")]
    NotConfigured,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message exceeds {MAX_MESSAGE_CHARS} characters")]
    MessageTooLong,

    #[error("Chat generation failed: {0}")]
    Generation(#[from] GenerationError),
}

// ═══════════════════════════════════════════
// Conversation state
// ═══════════════════════════════════════════

/// Reply length profile. Voice replies are read aloud and kept short.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Text,
    Voice,
}

impl ChatMode {
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            Self::Text => 500,
            Self::Voice => 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Ordered turns of one conversation, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState {
    turns: Vec<ChatTurn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Map a conversation to a generation request body.
pub fn build_chat_request(state: &ConversationState, mode: ChatMode) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: state
            .turns()
            .iter()
            .map(|turn| Content {
                role: Some(turn.role.as_str().to_string()),
                parts: vec![Part::text(turn.text.clone())],
            })
            .collect(),
        generation_config: Some(GenerationConfig {
            max_output_tokens: mode.max_output_tokens(),
            temperature: CHAT_TEMPERATURE,
        }),
    }
}

/// Trim and bound-check a user message.
pub fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::MessageTooLong);
    }
    Ok(trimmed)
}

// ═══════════════════════════════════════════
// Assistant
// ═══════════════════════════════════════════

pub struct AgronomyChat {
    generator: Arc<dyn TextGenerator>,
}

impl AgronomyChat {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// Send `message` after the existing turns. On success both the user
    /// turn and the reply are appended to `state`; on error it is unchanged.
    pub fn reply(
        &self,
        state: &mut ConversationState,
        message: &str,
        mode: ChatMode,
    ) -> Result<String, ChatError> {
        if !self.generator.is_configured() {
            return Err(ChatError::NotConfigured);
        }
        let message = validate_message(message)?;

        let mut next = state.clone();
        next.push(ChatTurn::user(message));

        let response = self.generator.generate(&build_chat_request(&next, mode))?;
        let reply = response.first_text().unwrap_or(NO_RESPONSE).to_string();

        next.push(ChatTurn::model(reply.clone()));
        *state = next;

        tracing::debug!(turns = state.len(), mode = ?mode, "Chat reply generated");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gemini::{MockOutcome, MockTextGenerator};

    fn chat(mock: &Arc<MockTextGenerator>) -> AgronomyChat {
        AgronomyChat::new(mock.clone())
    }

    #[test]
    fn request_maps_roles_and_text_mode_limits() {
        let state = ConversationState::from_turns(vec![
            ChatTurn::user("My maize leaves are yellow"),
            ChatTurn::model("Check nitrogen levels."),
        ]);
        let request = build_chat_request(&state, ChatMode::Text);
        assert_eq!(request.contents.len(), 2);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert_eq!(request.contents[1].role.as_deref(), Some("model"));
        assert_eq!(
            request.contents[1].parts[0].text.as_deref(),
            Some("Check nitrogen levels.")
        );
        let config = request.generation_config.unwrap();
        assert_eq!(config.max_output_tokens, 500);
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn voice_mode_caps_output_tokens() {
        let request = build_chat_request(&ConversationState::new(), ChatMode::Voice);
        assert_eq!(request.generation_config.unwrap().max_output_tokens, 150);
    }

    #[test]
    fn reply_appends_both_turns() {
        let mock = Arc::new(MockTextGenerator::replying("Apply mulch."));
        let mut state = ConversationState::new();
        let reply = chat(&mock)
            .reply(&mut state, "  How do I keep soil moist?  ", ChatMode::Text)
            .unwrap();

        assert_eq!(reply, "Apply mulch.");
        assert_eq!(
            state.turns(),
            &[ChatTurn::user("How do I keep soil moist?"), ChatTurn::model("Apply mulch.")]
        );
        let sent = mock.last_request().unwrap();
        assert_eq!(sent.contents.len(), 1);
    }

    #[test]
    fn empty_text_yields_no_response() {
        let mock = Arc::new(MockTextGenerator::with_outcome(MockOutcome::EmptyResponse));
        let mut state = ConversationState::new();
        let reply = chat(&mock).reply(&mut state, "hello", ChatMode::Voice).unwrap();
        assert_eq!(reply, NO_RESPONSE);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn failure_leaves_state_unchanged() {
        let mock = Arc::new(MockTextGenerator::with_outcome(MockOutcome::Status(503)));
        let mut state = ConversationState::from_turns(vec![ChatTurn::user("earlier")]);
        let err = chat(&mock)
            .reply(&mut state, "hello", ChatMode::Text)
            .unwrap_err();
        assert!(matches!(err, ChatError::Generation(GenerationError::Status { status: 503, .. })));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn unconfigured_makes_no_request() {
        let mock = Arc::new(MockTextGenerator::unconfigured());
        let err = chat(&mock)
            .reply(&mut ConversationState::new(), "hello", ChatMode::Text)
            .unwrap_err();
        assert!(matches!(err, ChatError::NotConfigured));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn message_validation() {
        assert!(matches!(validate_message("   "), Err(ChatError::EmptyMessage)));
        assert_eq!(validate_message(" hi ").unwrap(), "hi");
        let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_message(&at_limit).is_ok());
        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(validate_message(&over), Err(ChatError::MessageTooLong)));
    }

    #[test]
    fn conversation_state_serializes_as_turn_list() {
        let state = ConversationState::from_turns(vec![ChatTurn::user("hi")]);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!([{ "role": "user", "text": "hi" }]));
        let back: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
