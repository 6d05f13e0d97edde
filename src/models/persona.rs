use serde::{ Serialize, Deserialize };
use std::fmt;

/// An AI character profile generated from a transcript.
///
/// `name` doubles as the identity used for favoriting and deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPersona {
    pub name: String,
    pub description: String,
    pub expertise: Vec<String>,
    pub personality_traits: Vec<String>,
    pub avatar_prompt: String,
}

impl AgentPersona {
    /// A persona is usable only with a non-empty name and description.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err(format!("'{}' has an empty description", self.name));
        }
        Ok(())
    }

    pub fn placeholder_image_url(&self) -> String {
        let seed: String = url::form_urlencoded::byte_serialize(self.name.as_bytes()).collect();
        format!("https://picsum.photos/seed/{}/400/300", seed)
    }
}

impl fmt::Display for AgentPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  {}", self.description)?;
        writeln!(f, "  Expertise: {}", self.expertise.join(", "))?;
        write!(f, "  Personality: {}", self.personality_traits.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(name: &str, description: &str) -> AgentPersona {
        AgentPersona {
            name: name.to_string(),
            description: description.to_string(),
            expertise: vec!["Causal inference".to_string()],
            personality_traits: vec!["Curious".to_string()],
            avatar_prompt: "An android in a lab".to_string(),
        }
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(persona("Dr. Causal", "Explains causes")).unwrap();
        assert!(json.get("personalityTraits").is_some());
        assert!(json.get("avatarPrompt").is_some());
        assert!(json.get("personality_traits").is_none());
    }

    #[test]
    fn validate_requires_name_and_description() {
        assert!(persona("Dr. Causal", "Explains causes").validate().is_ok());
        assert!(persona("  ", "Explains causes").validate().is_err());
        assert!(persona("Dr. Causal", "").validate().is_err());
    }

    #[test]
    fn placeholder_image_url_encodes_the_name() {
        let url = persona("Dr. Causal", "x").placeholder_image_url();
        assert_eq!(url, "https://picsum.photos/seed/Dr.+Causal/400/300");
    }
}
