// Chat page logic: an append-only transcript and one assistant reply per user turn.
// The terminal chat (`advieswijzer chat`) drives the same handler.

use std::io::{BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::advisory::{render_failure, ModelSettings};
use crate::backend::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::constants::{CHAT_CONTEXT_TURNS, CHAT_MAX_TOKENS};
use crate::error::AdvisoryError;
use crate::prompt::CHAT_SYSTEM_INSTRUCTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    fn to_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(&self.content),
            Role::Assistant => ChatMessage::assistant(&self.content),
        }
    }
}

/// Full conversation for display. Only the tail is sent to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTranscript {
    turns: Vec<ChatTurn>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ChatTurn { role, content: content.into() });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent `CHAT_CONTEXT_TURNS` turns, oldest first.
    pub fn context_window(&self) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(CHAT_CONTEXT_TURNS);
        &self.turns[start..]
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Outbound messages: the chat persona followed by the context window.
pub fn build_context(transcript: &ChatTranscript) -> Vec<ChatMessage> {
    std::iter::once(ChatMessage::system(CHAT_SYSTEM_INSTRUCTION))
        .chain(transcript.context_window().iter().map(ChatTurn::to_message))
        .collect()
}

pub fn render_chat_stub(question: &str) -> String {
    let question = question.trim();
    format!(
        "🔒 AI staat uit of er is geen API-key, dus hier is geen gegenereerd antwoord.\n\n\
        Je vraag: \"{question}\"\n\n\
        Zo zou je de vraag ook kunnen stellen:\n\
        - Welke eerste drie stappen raad je aan voor: \"{question}\"?\n\
        - Wat kost het ongeveer en hoe lang duurt het om dit aan te pakken: \"{question}\"?"
    )
}

pub async fn respond(
    transcript: &mut ChatTranscript,
    new_user_turn: &str,
    use_live: bool,
    backend: Option<&dyn CompletionBackend>,
    model: &ModelSettings,
) -> ChatTurn {
    transcript.push(Role::User, new_user_turn);

    let reply = match backend {
        Some(backend) if use_live => {
            let request = CompletionRequest {
                model: model.model.clone(),
                temperature: model.temperature,
                messages: build_context(transcript),
                max_tokens: Some(CHAT_MAX_TOKENS),
            };
            info!(turns = transcript.len(), "Sending chat turn to backend");
            match backend.complete(&request).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Chat turn failed");
                    render_failure(&AdvisoryError::BackendCallFailed { kind: e.kind(), detail: e.to_string() })
                }
            }
        }
        _ => render_chat_stub(new_user_turn),
    };

    transcript.push(Role::Assistant, reply);
    transcript
        .turns()
        .last()
        .cloned()
        .unwrap_or(ChatTurn { role: Role::Assistant, content: String::new() })
}

/// Interactive chat on stdin/stdout until EOF or an empty line.
pub async fn run_terminal_chat(
    use_live: bool,
    backend: Option<&dyn CompletionBackend>,
    model: &ModelSettings,
) -> Result<ChatTranscript> {
    info!(use_live, "Starting terminal chat");
    let mut transcript = ChatTranscript::new();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "jij> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        let reply = respond(&mut transcript, question, use_live, backend, model).await;
        writeln!(stdout, "adviseur> {}\n", reply.content)?;
    }

    info!(turns = transcript.len(), "Terminal chat finished");
    Ok(transcript)
}
