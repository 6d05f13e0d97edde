use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use log::info;

use crate::models::AgentPersona;

const DEFAULT_GENERATION_TEMPLATE: &str =
    "Analyze the following video transcript. Based on the content, tone, and topics discussed, create {count} distinct and creative AI agent personas. These personas should be imagined as specialized AI agents spun off from the knowledge in the video.

For each persona, provide a name, a detailed description of their background and purpose, a list of their expertise, key personality traits, and a detailed prompt for generating a visual avatar.

Ensure the output is a valid JSON array matching the provided schema.

Transcript:
---
{transcript}
---";

const DEFAULT_SYSTEM_INSTRUCTION_TEMPLATE: &str =
    "You are an AI assistant embodying the persona of {name}.
Your background: {description}.
Your expertise lies in: {expertise}.
Your personality is: {personality}.
Converse with the user strictly according to this persona. Do not break character. Start the conversation by greeting the user and introducing yourself.";

const DEFAULT_GREETING_TRIGGER: &str = "Hello";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{template}' is missing '{placeholder}'")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Prompt templates. Any key left out of an override file keeps its default.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub persona_generation: String,
    pub persona_system_instruction: String,
    pub greeting_trigger: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona_generation: DEFAULT_GENERATION_TEMPLATE.to_string(),
            persona_system_instruction: DEFAULT_SYSTEM_INSTRUCTION_TEMPLATE.to_string(),
            greeting_trigger: DEFAULT_GREETING_TRIGGER.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.persona_generation.contains("{transcript}") {
            return Err(PromptError::MissingPlaceholder {
                template: "persona_generation",
                placeholder: "{transcript}",
            });
        }
        if !self.persona_system_instruction.contains("{name}") {
            return Err(PromptError::MissingPlaceholder {
                template: "persona_system_instruction",
                placeholder: "{name}",
            });
        }
        Ok(())
    }
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Reads the override file when one is given, otherwise the built-in templates.
pub fn load_prompts<P: AsRef<Path>>(path: Option<P>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(path) => {
            let file_content = fs::read_to_string(path.as_ref())?;
            let config = load_prompts_from_str(&file_content)?;
            info!("Loaded prompt templates from {}", path.as_ref().display());
            Ok(Arc::new(config))
        }
        None => Ok(Arc::new(PromptConfig::default())),
    }
}

pub fn get_generation_prompt(config: &PromptConfig, transcript: &str, count: u8) -> String {
    config.persona_generation
        .replace("{count}", &count.to_string())
        .replace("{transcript}", transcript)
}

pub fn get_system_instruction(config: &PromptConfig, agent: &AgentPersona) -> String {
    config.persona_system_instruction
        .replace("{name}", &agent.name)
        .replace("{description}", &agent.description)
        .replace("{expertise}", &agent.expertise.join(", "))
        .replace("{personality}", &agent.personality_traits.join(", "))
}
