use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::{ info, warn };

use super::KeyValueStore;
use crate::error::{ PersonaError, Result };
use crate::models::AgentPersona;

pub const FAVORITES_KEY: &str = "favoriteAgents";
pub const EXPORT_FILE_NAME: &str = "agent-personas-favorites.json";

/// Reads the favorites list. An unparsable value is dropped from storage and
/// an empty list returned.
pub fn load_favorites(store: &dyn KeyValueStore) -> Result<Vec<AgentPersona>> {
    let Some(raw) = store.get(FAVORITES_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<AgentPersona>>(&raw) {
        Ok(favorites) => Ok(favorites),
        Err(e) => {
            let err = PersonaError::StorageCorruption(e);
            warn!("{}", err);
            store.remove(FAVORITES_KEY)?;
            Ok(Vec::new())
        }
    }
}

pub fn save_favorites(store: &dyn KeyValueStore, favorites: &[AgentPersona]) -> Result<()> {
    store.set(FAVORITES_KEY, &serde_json::to_string(favorites)?)
}

/// Parses an import document: a JSON array whose every element is a valid persona.
pub fn parse_import(text: &str) -> Result<Vec<AgentPersona>> {
    let imported: Vec<AgentPersona> = serde_json
        ::from_str(text)
        .map_err(|e| PersonaError::invalid_input(format!("Invalid file format: {}", e)))?;
    for (index, agent) in imported.iter().enumerate() {
        agent
            .validate()
            .map_err(|reason| {
                PersonaError::invalid_input(format!("Invalid file format: entry {}: {}", index, reason))
            })?;
    }
    Ok(imported)
}

/// The user's favorite personas, unique by name, persisted on every change.
pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
    items: Vec<AgentPersona>,
}

impl Favorites {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let items = load_favorites(store.as_ref())?;
        info!("Loaded {} favorite agents", items.len());
        Ok(Self { store, items })
    }

    pub fn items(&self) -> &[AgentPersona] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|fav| fav.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&AgentPersona> {
        self.items.iter().find(|fav| fav.name == name)
    }

    /// Flips membership of `agent` by name. Returns whether it is now a favorite.
    pub fn toggle(&mut self, agent: &AgentPersona) -> Result<bool> {
        let mut next = self.items.clone();
        let now_favorite = if self.contains(&agent.name) {
            next.retain(|fav| fav.name != agent.name);
            false
        } else {
            next.push(agent.clone());
            true
        };
        self.commit(next)?;
        Ok(now_favorite)
    }

    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if !self.contains(name) {
            return Ok(false);
        }
        let next = self.items
            .iter()
            .filter(|fav| fav.name != name)
            .cloned()
            .collect();
        self.commit(next)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(FAVORITES_KEY)?;
        self.items.clear();
        Ok(())
    }

    pub fn export_json(&self) -> Result<String> {
        if self.items.is_empty() {
            return Err(PersonaError::invalid_input("You have no favorites to export."));
        }
        Ok(serde_json::to_string_pretty(&self.items)?)
    }

    pub fn export_to(&self, path: &Path) -> Result<usize> {
        let json = self.export_json()?;
        fs::write(path, json)?;
        info!("Exported {} favorites to {}", self.items.len(), path.display());
        Ok(self.items.len())
    }

    /// Merges an import document, skipping names already present (including
    /// repeats inside the document). Returns how many were added.
    pub fn import_json(&mut self, text: &str) -> Result<usize> {
        let imported = parse_import(text)?;
        let mut names: HashSet<String> = self.items
            .iter()
            .map(|fav| fav.name.clone())
            .collect();
        let mut next = self.items.clone();
        for agent in imported {
            if names.insert(agent.name.clone()) {
                next.push(agent);
            }
        }
        let added = next.len() - self.items.len();
        self.commit(next)?;
        info!("Successfully imported {} new agents", added);
        Ok(added)
    }

    pub fn import_from(&mut self, path: &Path) -> Result<usize> {
        let text = fs
            ::read_to_string(path)
            .map_err(|e| {
                PersonaError::invalid_input(format!("File could not be read: {}: {}", path.display(), e))
            })?;
        self.import_json(&text)
    }

    /// Persists `next`; memory follows only once the write succeeded.
    fn commit(&mut self, next: Vec<AgentPersona>) -> Result<()> {
        save_favorites(self.store.as_ref(), &next)?;
        self.items = next;
        Ok(())
    }
}
