use serde_json::{ json, Value as JsonValue };
use std::sync::Arc;
use log::{ error, info, warn };

use crate::config::prompt::{ self, PromptConfig };
use crate::error::{ GenerationCause, PersonaError, Result };
use crate::llm::StructuredModel;
use crate::models::AgentPersona;

/// Schema the model's reply is constrained to: an array of personas with all
/// five fields required.
pub fn response_schema() -> JsonValue {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": {
                    "type": "STRING",
                    "description": "A creative and fitting name for the AI agent persona."
                },
                "description": {
                    "type": "STRING",
                    "description": "A detailed background and role description for the agent, explaining its purpose and origin based on the transcript's content."
                },
                "expertise": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "A list of 3-5 key areas of expertise or knowledge domains."
                },
                "personalityTraits": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "A list of 3-5 core personality traits that define the agent's interaction style."
                },
                "avatarPrompt": {
                    "type": "STRING",
                    "description": "A detailed visual description for an AI image generator to create an avatar for this agent. e.g., 'A thoughtful and futuristic android with glowing blue circuits, in a minimalist lab setting, digital art'."
                }
            },
            "required": ["name", "description", "expertise", "personalityTraits", "avatarPrompt"]
        }
    })
}

/// Strictly parses the model's reply. Any element missing a field, or with an
/// empty name or description, rejects the whole batch.
pub fn parse_personas(text: &str) -> std::result::Result<Vec<AgentPersona>, GenerationCause> {
    let personas: Vec<AgentPersona> = serde_json::from_str(text.trim())?;
    for (index, persona) in personas.iter().enumerate() {
        persona.validate().map_err(|reason| GenerationCause::InvalidPersona { index, reason })?;
    }
    Ok(personas)
}

pub struct PersonaGenerator {
    model: Arc<dyn StructuredModel>,
    prompts: Arc<PromptConfig>,
}

impl PersonaGenerator {
    pub fn new(model: Arc<dyn StructuredModel>, prompts: Arc<PromptConfig>) -> Self {
        Self { model, prompts }
    }

    /// One external call per invocation, no caching and no retry.
    /// `temperature` is forwarded as given.
    pub async fn generate(
        &self,
        transcript: &str,
        count: u8,
        temperature: f32
    ) -> Result<Vec<AgentPersona>> {
        let prompt = prompt::get_generation_prompt(&self.prompts, transcript, count);
        info!("Requesting {} personas (temperature {})", count, temperature);

        let text = self.model
            .generate_json(&prompt, &response_schema(), temperature).await
            .map_err(|e| {
                error!("Error calling model service: {}", e);
                PersonaError::Generation(GenerationCause::Llm(e))
            })?;

        let personas = parse_personas(&text).map_err(|cause| {
            error!("Model returned non-conforming personas: {}", cause);
            PersonaError::Generation(cause)
        })?;

        if personas.len() != usize::from(count) {
            warn!("Asked for {} personas, model returned {}", count, personas.len());
        }
        Ok(personas)
    }
}
