use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde::Deserialize;
use url::Url;
use log::{ debug, warn };

use crate::error::{ PersonaError, Result };
use crate::models::AgentPersona;

pub const SHARE_PARAM: &str = "agent";

/// What a share link must carry: a name and a description. The remaining
/// persona fields may be absent.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedAgent {
    name: String,
    description: String,
    #[serde(default)]
    expertise: Vec<String>,
    #[serde(default)]
    personality_traits: Vec<String>,
    #[serde(default)]
    avatar_prompt: String,
}

impl From<SharedAgent> for AgentPersona {
    fn from(shared: SharedAgent) -> Self {
        AgentPersona {
            name: shared.name,
            description: shared.description,
            expertise: shared.expertise,
            personality_traits: shared.personality_traits,
            avatar_prompt: shared.avatar_prompt,
        }
    }
}

/// Builds `<base>?agent=<base64 of the persona's UTF-8 JSON>`. Any query or
/// fragment already on `base_url` is dropped.
pub fn encode_share_link(base_url: &str, agent: &AgentPersona) -> Result<String> {
    let mut url = Url::parse(base_url).map_err(|e|
        PersonaError::invalid_input(format!("Invalid share base URL '{}': {}", base_url, e))
    )?;
    url.set_fragment(None);
    url.set_query(None);

    let encoded = STANDARD.encode(serde_json::to_string(agent)?);
    url.query_pairs_mut().append_pair(SHARE_PARAM, &encoded);
    Ok(url.into())
}

/// Reverses [`encode_share_link`]. Accepts a full link, a bare query
/// (`?agent=...`), a relative link (`/app?agent=...`) or the parameter
/// value itself. Missing expertise, traits or avatar prompt default to
/// empty. Anything that does not
/// decode into a persona with a name and description yields `None`.
pub fn decode_share_link(link: &str) -> Option<AgentPersona> {
    let link = link.trim();
    let Some(encoded) = share_param(link) else {
        debug!("No '{}' parameter in share link", SHARE_PARAM);
        return None;
    };

    // A raw link whose '+' was never percent-encoded arrives with spaces.
    let encoded = encoded.replace(' ', "+");
    let bytes = match STANDARD.decode(encoded.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to parse shared agent data: {}", e);
            return None;
        }
    };
    let agent: AgentPersona = match serde_json::from_slice::<SharedAgent>(&bytes) {
        Ok(shared) => shared.into(),
        Err(e) => {
            warn!("Failed to parse shared agent data: {}", e);
            return None;
        }
    };
    if let Err(reason) = agent.validate() {
        warn!("Shared agent rejected: {}", reason);
        return None;
    }
    Some(agent)
}

fn share_param(link: &str) -> Option<String> {
    if let Ok(url) = Url::parse(link) {
        return form_param(url.query().unwrap_or_default());
    }
    if link.starts_with("agent=") || link.contains("&agent=") {
        return form_param(link);
    }
    if let Some((_, query)) = link.split_once('?') {
        let query = query.split('#').next().unwrap_or_default();
        return form_param(query);
    }
    if link.is_empty() {
        None
    } else {
        Some(link.to_string())
    }
}

fn form_param(query: &str) -> Option<String> {
    url::form_urlencoded
        ::parse(query.as_bytes())
        .find(|(key, _)| key == SHARE_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// The link with its query and fragment scrubbed.
pub fn bare_url(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => link.split(|c| c == '?' || c == '#').next().unwrap_or_default().to_string(),
    }
}
