use futures::StreamExt;
use std::fmt;
use tokio::sync::watch;
use uuid::Uuid;
use log::{ debug, error, info };

use super::log::{ MessageLog, Turn };
use crate::config::prompt::{ self, PromptConfig };
use crate::error::{ PersonaError, Result };
use crate::llm::{ ChatHandle, ChatModel, LlmError };
use crate::models::{ AgentPersona, ChatMessage };

pub const INIT_FAILURE_MESSAGE: &str = "Sorry, I am unable to start a chat right now.";
pub const SEND_FAILURE_MESSAGE: &str = "I'm sorry, I encountered an error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    AwaitingResponse,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::AwaitingResponse => "awaiting a response",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A conversation between the user and one persona.
///
/// ```text
/// Uninitialized -> Initializing -> Ready <-> AwaitingResponse
///                       |                          |
///                       +--> Failed       (stream error: apology, back to Ready)
/// ```
pub struct ChatSession {
    id: Uuid,
    agent: AgentPersona,
    state: SessionState,
    handle: Option<Box<dyn ChatHandle>>,
    log: MessageLog,
}

impl ChatSession {
    pub fn new(agent: AgentPersona) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent,
            state: SessionState::Uninitialized,
            handle: None,
            log: MessageLog::new(),
        }
    }

    /// Creates and initializes a session. Initialization failures are already
    /// reflected in the message log and state, so they are only logged here.
    pub async fn open(model: &dyn ChatModel, agent: AgentPersona, prompts: &PromptConfig) -> Self {
        let mut session = Self::new(agent);
        if let Err(e) = session.initialize(model, prompts).await {
            debug!("Session {} opened in failed state: {}", session.id, e);
        }
        session
    }

    /// Seeds the model with the persona and streams its opening turn.
    pub async fn initialize(&mut self, model: &dyn ChatModel, prompts: &PromptConfig) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(PersonaError::SessionNotReady(self.state));
        }
        self.state = SessionState::Initializing;
        info!("Opening chat session {} with '{}'", self.id, self.agent.name);

        let instruction = prompt::get_system_instruction(prompts, &self.agent);
        let mut handle = match model.start_chat(&instruction).await {
            Ok(handle) => handle,
            Err(e) => {
                return Err(self.fail_initialization(e));
            }
        };

        let mut turn = self.log.begin_turn();
        let streamed = stream_turn(handle.as_mut(), &mut turn, &prompts.greeting_trigger).await;
        let greeting = turn.finalize();

        match streamed {
            Ok(()) if !greeting.trim().is_empty() => {
                self.handle = Some(handle);
                self.state = SessionState::Ready;
                Ok(())
            }
            Ok(()) => Err(self.fail_initialization(LlmError::EmptyResponse)),
            Err(e) => Err(self.fail_initialization(e)),
        }
    }

    fn fail_initialization(&mut self, cause: LlmError) -> PersonaError {
        error!("Failed to initialize chat with '{}': {}", self.agent.name, cause);
        self.log.reset_to(ChatMessage::model(INIT_FAILURE_MESSAGE));
        self.state = SessionState::Failed;
        PersonaError::ChatInit(cause)
    }

    /// Sends one user message and streams the reply into the log.
    ///
    /// Blank input, or a session that is not `Ready` (including `Failed`),
    /// is rejected without touching the log. A stream failure replaces the
    /// reply placeholder with an apology and leaves the session `Ready`.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(PersonaError::invalid_input("Message is empty."));
        }
        if self.state != SessionState::Ready {
            return Err(PersonaError::SessionNotReady(self.state));
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(PersonaError::SessionNotReady(self.state));
        };

        self.log.push(ChatMessage::user(text));
        self.state = SessionState::AwaitingResponse;

        let mut turn = self.log.begin_turn();
        debug!("Session {} streaming turn {}", self.id, turn.id());
        let result = match stream_turn(handle.as_mut(), &mut turn, text).await {
            Ok(()) => Ok(turn.finalize()),
            Err(e) => {
                error!("Error sending message to '{}': {}", self.agent.name, e);
                turn.fail(SEND_FAILURE_MESSAGE);
                Err(PersonaError::ChatSend(e))
            }
        };

        self.state = SessionState::Ready;
        result
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent(&self) -> &AgentPersona {
        &self.agent
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.log.subscribe()
    }
}

async fn stream_turn(
    handle: &mut dyn ChatHandle,
    turn: &mut Turn<'_>,
    message: &str
) -> std::result::Result<(), LlmError> {
    let mut stream = handle.send_message_stream(message).await?;
    while let Some(chunk) = stream.next().await {
        turn.append(&chunk?);
    }
    Ok(())
}
