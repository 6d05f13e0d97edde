use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use log::{ error, info, warn };

use crate::chat::ChatSession;
use crate::config::prompt::PromptConfig;
use crate::error::{ PersonaError, Result };
use crate::llm::{ ChatModel, StructuredModel };
use crate::models::AgentPersona;
use crate::persona::PersonaGenerator;
use crate::share;
use crate::storage::Favorites;
use crate::transcript::TranscriptProvider;

pub const DEFAULT_AGENT_COUNT: u8 = 3;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub count: u8,
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_AGENT_COUNT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Everything a front end renders: the current persona list and the
/// generation status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub personas: Vec<AgentPersona>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub shared_view: bool,
}

/// Owns application state and mediates between the transcript provider,
/// persona generator, favorites and the single open chat session.
pub struct AppController {
    transcripts: Arc<dyn TranscriptProvider>,
    generator: PersonaGenerator,
    chat_model: Arc<dyn ChatModel>,
    prompts: Arc<PromptConfig>,
    favorites: Favorites,
    state: watch::Sender<AppState>,
    chat: Option<ChatSession>,
}

impl AppController {
    pub fn new(
        transcripts: Arc<dyn TranscriptProvider>,
        structured_model: Arc<dyn StructuredModel>,
        chat_model: Arc<dyn ChatModel>,
        prompts: Arc<PromptConfig>,
        favorites: Favorites
    ) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self {
            transcripts,
            generator: PersonaGenerator::new(structured_model, Arc::clone(&prompts)),
            chat_model,
            prompts,
            favorites,
            state,
            chat: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Transcript fetch followed by persona generation. Prior results and
    /// errors are cleared up front; a failure leaves an error and no personas.
    pub async fn generate(
        &mut self,
        url: &str,
        options: GenerationOptions
    ) -> Result<Vec<AgentPersona>> {
        if url.trim().is_empty() {
            let err = PersonaError::invalid_input("Please enter a YouTube URL.");
            self.state.send_modify(|s| {
                s.error = Some(err.to_string());
            });
            return Err(err);
        }

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
            s.personas.clear();
            s.shared_view = false;
        });

        let result = self.run_pipeline(url.trim(), options).await;

        self.state.send_modify(|s| {
            s.is_loading = false;
            match &result {
                Ok(personas) => {
                    s.personas = personas.clone();
                }
                Err(e) => {
                    s.error = Some(format!("Failed to generate agents. {}", e));
                }
            }
        });
        if let Err(e) = &result {
            error!("Generation failed: {}", e);
        }
        result
    }

    async fn run_pipeline(&self, url: &str, options: GenerationOptions) -> Result<Vec<AgentPersona>> {
        let transcript = self.transcripts.fetch_transcript(url).await?;
        if transcript.trim().is_empty() {
            return Err(PersonaError::TranscriptUnavailable);
        }
        let personas = self.generator.generate(&transcript, options.count, options.temperature).await?;
        info!("Generated {} personas from {}", personas.len(), url);
        Ok(personas)
    }

    /// Shows the persona carried by a share link. Invalid links change nothing.
    pub fn load_shared_link(&mut self, link: &str) -> Option<AgentPersona> {
        match share::decode_share_link(link) {
            Some(agent) => {
                info!("Loaded shared agent '{}'", agent.name);
                self.state.send_modify(|s| {
                    s.personas = vec![agent.clone()];
                    s.shared_view = true;
                });
                Some(agent)
            }
            None => {
                warn!("Ignoring invalid share link, continuing at {}", share::bare_url(link));
                None
            }
        }
    }

    pub fn share_link(&self, base_url: &str, agent: &AgentPersona) -> Result<String> {
        share::encode_share_link(base_url, agent)
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.contains(name)
    }

    pub fn toggle_favorite(&mut self, agent: &AgentPersona) -> Result<bool> {
        self.favorites.toggle(agent)
    }

    pub fn remove_favorite(&mut self, name: &str) -> Result<bool> {
        self.favorites.remove(name)
    }

    pub fn clear_favorites(&mut self) -> Result<()> {
        self.favorites.clear()
    }

    pub fn export_favorites(&self, path: &Path) -> Result<usize> {
        self.favorites.export_to(path)
    }

    pub fn import_favorites(&mut self, path: &Path) -> Result<usize> {
        self.favorites.import_from(path)
    }

    /// Opens a chat with `agent`, abandoning any session already open.
    pub async fn start_chat(&mut self, agent: AgentPersona) -> &ChatSession {
        if let Some(previous) = self.chat.take() {
            info!("Abandoning chat session {} with '{}'", previous.id(), previous.agent().name);
        }
        let session = ChatSession::open(self.chat_model.as_ref(), agent, &self.prompts).await;
        self.chat.insert(session)
    }

    pub fn close_chat(&mut self) {
        self.chat = None;
    }

    pub fn chat(&self) -> Option<&ChatSession> {
        self.chat.as_ref()
    }

    pub async fn send_message(&mut self, text: &str) -> Result<String> {
        let session = self.chat.as_mut().ok_or(PersonaError::NoChatSession)?;
        session.send(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::SessionState;
    use crate::llm::{ ChatHandle, LlmError, TextStream };
    use crate::models::Role;
    use crate::storage::{ KeyValueStore, MemoryStore };
    use crate::transcript::MockTranscriptProvider;
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::time::Duration;

    struct CountingModel {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StructuredModel for CountingModel {
        async fn generate_json(
            &self,
            _prompt: &str,
            _schema: &JsonValue,
            _temperature: f32
        ) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct EchoChat;

    struct EchoHandle;

    #[async_trait]
    impl ChatModel for EchoChat {
        async fn start_chat(&self, _instruction: &str) -> std::result::Result<Box<dyn ChatHandle>, LlmError> {
            Ok(Box::new(EchoHandle))
        }
    }

    #[async_trait]
    impl ChatHandle for EchoHandle {
        async fn send_message_stream(&mut self, message: &str) -> std::result::Result<TextStream, LlmError> {
            let chunks = vec![Ok("You said: ".to_string()), Ok(message.to_string())];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    struct EmptyTranscripts;

    #[async_trait]
    impl TranscriptProvider for EmptyTranscripts {
        async fn fetch_transcript(&self, _url: &str) -> Result<String> {
            Ok("  ".to_string())
        }
    }

    const PERSONAS: &str = r#"[
        {"name": "Causa", "description": "Causal guide", "expertise": ["SCMs"], "personalityTraits": ["Calm"], "avatarPrompt": "robot"}
    ]"#;

    fn persona(name: &str) -> AgentPersona {
        AgentPersona {
            name: name.to_string(),
            description: "shared".to_string(),
            expertise: vec![],
            personality_traits: vec![],
            avatar_prompt: String::new(),
        }
    }

    fn controller_with(
        transcripts: Arc<dyn TranscriptProvider>,
        reply: &str
    ) -> (AppController, Arc<CountingModel>, Arc<dyn KeyValueStore>) {
        let model = Arc::new(CountingModel { reply: reply.to_string(), calls: AtomicUsize::new(0) });
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::default());
        let favorites = Favorites::load(Arc::clone(&store)).unwrap();
        let controller = AppController::new(
            transcripts,
            model.clone(),
            Arc::new(EchoChat),
            Arc::new(PromptConfig::default()),
            favorites
        );
        (controller, model, store)
    }

    fn controller(reply: &str) -> (AppController, Arc<CountingModel>, Arc<dyn KeyValueStore>) {
        controller_with(Arc::new(MockTranscriptProvider::new(Duration::ZERO)), reply)
    }

    #[tokio::test]
    async fn generate_populates_personas() {
        let (mut app, model, _) = controller(PERSONAS);
        let personas = app.generate("https://youtu.be/abc", GenerationOptions::default()).await.unwrap();

        assert_eq!(personas.len(), 1);
        let state = app.state();
        assert_eq!(state.personas, personas);
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_url_never_reaches_the_generator() {
        let (mut app, model, _) = controller(PERSONAS);
        assert!(app.generate("not-a-url", GenerationOptions::default()).await.is_err());

        let state = app.state();
        assert_eq!(state.error.as_deref(), Some("Failed to generate agents. Invalid YouTube URL provided."));
        assert!(state.personas.is_empty());
        assert!(!state.is_loading);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_url_is_reported_without_loading() {
        let (mut app, _, _) = controller(PERSONAS);
        let mut rx = app.subscribe();
        assert!(app.generate("   ", GenerationOptions::default()).await.is_err());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.error.as_deref(), Some("Please enter a YouTube URL."));
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let (mut app, model, _) = controller_with(Arc::new(EmptyTranscripts), PERSONAS);
        let err = app.generate("https://youtu.be/abc", GenerationOptions::default()).await.unwrap_err();
        assert!(matches!(err, PersonaError::TranscriptUnavailable));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_generation_clears_previous_results() {
        let (mut app, _, _) = controller(PERSONAS);
        app.generate("https://youtu.be/abc", GenerationOptions::default()).await.unwrap();

        let (mut broken, _, _) = controller("not json");
        broken.state.send_modify(|s| s.personas = app.state().personas);
        assert!(broken.generate("https://youtu.be/abc", GenerationOptions::default()).await.is_err());
        let state = broken.state();
        assert!(state.personas.is_empty());
        assert!(state.error.unwrap().starts_with("Failed to generate agents."));
    }

    #[tokio::test]
    async fn shared_link_shows_one_persona_until_next_generation() {
        let (mut app, _, _) = controller(PERSONAS);
        let link = app.share_link("http://localhost:5173/", &persona("Shared One")).unwrap();

        assert_eq!(app.load_shared_link(&link), Some(persona("Shared One")));
        let state = app.state();
        assert!(state.shared_view);
        assert_eq!(state.personas, vec![persona("Shared One")]);

        assert_eq!(app.load_shared_link("http://localhost:5173/?agent=garbage"), None);
        assert!(app.state().shared_view);

        app.generate("https://youtu.be/abc", GenerationOptions::default()).await.unwrap();
        assert!(!app.state().shared_view);
    }

    #[tokio::test]
    async fn favorites_are_independent_of_the_persona_list() {
        let (mut app, _, store) = controller(PERSONAS);
        let personas = app.generate("https://youtu.be/abc", GenerationOptions::default()).await.unwrap();

        assert!(app.toggle_favorite(&personas[0]).unwrap());
        assert!(app.is_favorite("Causa"));
        assert!(store.get(crate::storage::FAVORITES_KEY).unwrap().is_some());

        app.clear_favorites().unwrap();
        assert!(!app.is_favorite("Causa"));
        assert_eq!(app.state().personas.len(), 1);
    }

    #[test]
    fn favorites_round_trip_through_export_and_import() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(crate::storage::EXPORT_FILE_NAME);
        let (mut app, _, _) = controller(PERSONAS);
        assert!(app.export_favorites(&path).is_err());

        app.toggle_favorite(&persona("Kept")).unwrap();
        app.toggle_favorite(&persona("Dropped")).unwrap();
        assert!(app.remove_favorite("Dropped").unwrap());
        assert!(!app.remove_favorite("Dropped").unwrap());
        assert_eq!(app.export_favorites(&path).unwrap(), 1);

        let (mut other, _, _) = controller(PERSONAS);
        assert_eq!(other.import_favorites(&path).unwrap(), 1);
        assert_eq!(other.import_favorites(&path).unwrap(), 0);
        assert!(other.is_favorite("Kept"));
        assert!(!other.is_favorite("Dropped"));
    }

    #[tokio::test]
    async fn only_one_chat_session_is_live() {
        let (mut app, _, _) = controller(PERSONAS);
        assert!(matches!(app.send_message("hi").await, Err(PersonaError::NoChatSession)));

        let first_id = app.start_chat(persona("First")).await.id();
        let second = app.start_chat(persona("Second")).await;
        assert_ne!(second.id(), first_id);
        assert_eq!(second.agent().name, "Second");
        assert_eq!(second.messages()[0].content, "You said: Hello");

        assert_eq!(app.send_message("hi there").await.unwrap(), "You said: hi there");
        let session = app.chat().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.messages().last().unwrap().role, Role::Model);

        app.close_chat();
        assert!(app.chat().is_none());
    }
}
