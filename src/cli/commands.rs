use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use log::{ info, warn };

use super::{ repl, Args, Command, FavoritesCommand };
use crate::app::{ AppController, GenerationOptions };
use crate::config::prompt::PromptConfig;
use crate::error::PersonaError;
use crate::llm::gemini::GeminiClient;
use crate::llm::LlmConfig;
use crate::models::AgentPersona;
use crate::share;
use crate::storage::Favorites;
use crate::transcript::MockTranscriptProvider;

type CliResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Whether `command` talks to the model service and so needs an API key.
pub fn needs_model(command: &Command) -> bool {
    match command {
        Command::Generate { .. } | Command::Chat { .. } => true,
        Command::Open { chat, .. } => *chat,
        Command::Share { .. } | Command::Favorites(_) => false,
    }
}

pub fn build_controller(
    args: &Args,
    prompts: Arc<PromptConfig>,
    favorites: Favorites
) -> Result<AppController, Box<dyn Error + Send + Sync>> {
    let llm_config = LlmConfig {
        api_key: Some(args.api_key.clone()).filter(|k| !k.is_empty()),
        model: args.model.clone(),
        base_url: args.base_url.clone(),
    };
    let client = if needs_model(&args.command) {
        GeminiClient::from_config(&llm_config)?
    } else {
        // Never called: favorites and share links stay local.
        GeminiClient::new(String::new(), llm_config.model, llm_config.base_url)
    };
    let client = Arc::new(client);
    info!("Model client configured: Model={}", client.model());

    let transcripts = Arc::new(
        MockTranscriptProvider::new(Duration::from_millis(args.transcript_delay_ms))
    );
    Ok(AppController::new(transcripts, client.clone(), client, prompts, favorites))
}

fn print_card(index: Option<usize>, agent: &AgentPersona, favorite: bool) {
    let marker = if favorite { " ★" } else { "" };
    match index {
        Some(i) => println!("[{}] {}{}", i, agent, marker),
        None => println!("{}{}", agent, marker),
    }
    println!("  Avatar: {}", agent.avatar_prompt);
    println!("  Image: {}", agent.placeholder_image_url());
    println!();
}

pub async fn generate(
    app: &mut AppController,
    url: &str,
    options: GenerationOptions,
    save: bool,
    chat: Option<usize>,
    json: bool
) -> CliResult {
    info!("Generating {} agents (creativity {:.1})...", options.count, options.temperature);
    let personas = match app.generate(url, options).await {
        Ok(personas) => personas,
        Err(e) => {
            let message = app.state().error.unwrap_or_else(|| e.to_string());
            eprintln!("{}", message);
            return Err(Box::new(e));
        }
    };

    if save {
        for agent in &personas {
            if !app.is_favorite(&agent.name) {
                app.toggle_favorite(agent)?;
            }
        }
        info!("Saved {} personas to favorites", personas.len());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&personas)?);
    } else {
        for (i, agent) in personas.iter().enumerate() {
            print_card(Some(i + 1), agent, app.is_favorite(&agent.name));
        }
    }

    if let Some(position) = chat {
        let agent = position
            .checked_sub(1)
            .and_then(|i| personas.get(i))
            .cloned()
            .ok_or_else(|| {
                PersonaError::invalid_input(
                    format!("No persona at position {} (generated {})", position, personas.len())
                )
            })?;
        repl::chat_loop(app, agent).await?;
    }
    Ok(())
}

pub async fn chat_with_favorite(app: &mut AppController, name: &str) -> CliResult {
    let agent = app
        .favorites()
        .get(name)
        .cloned()
        .ok_or_else(|| PersonaError::invalid_input(format!("No favorite named '{}'", name)))?;
    repl::chat_loop(app, agent).await
}

/// Shows the persona carried by a share link, optionally saving it.
pub fn open_link(
    app: &mut AppController,
    link: &str,
    save: bool
) -> Result<AgentPersona, Box<dyn Error + Send + Sync>> {
    let agent = app.load_shared_link(link).ok_or_else(|| {
        PersonaError::invalid_input(
            format!("Not a valid share link, continuing at {}", share::bare_url(link))
        )
    })?;
    print_card(None, &agent, app.is_favorite(&agent.name));
    if save && !app.is_favorite(&agent.name) {
        app.toggle_favorite(&agent)?;
        println!("Added '{}' to favorites", agent.name);
    }
    Ok(agent)
}

pub fn share_favorite(app: &AppController, name: &str, base_url: &str) -> CliResult {
    let agent = app
        .favorites()
        .get(name)
        .ok_or_else(|| PersonaError::invalid_input(format!("No favorite named '{}'", name)))?;
    println!("{}", app.share_link(base_url, agent)?);
    Ok(())
}

pub fn favorites(app: &mut AppController, command: FavoritesCommand) -> CliResult {
    match command {
        FavoritesCommand::List { json } => {
            let favorites = app.favorites();
            if json {
                println!("{}", serde_json::to_string_pretty(favorites.items())?);
            } else if favorites.is_empty() {
                println!("No favorite agents yet.");
            } else {
                for (i, agent) in favorites.items().iter().enumerate() {
                    print_card(Some(i + 1), agent, true);
                }
            }
        }
        FavoritesCommand::Remove { name } => {
            if app.remove_favorite(&name)? {
                println!("Removed '{}'", name);
            } else {
                warn!("No favorite named '{}'", name);
            }
        }
        FavoritesCommand::Clear { yes } => {
            if !yes {
                return Err(
                    Box::new(
                        PersonaError::invalid_input(
                            "Clearing favorites cannot be undone; re-run with --yes to confirm."
                        )
                    )
                );
            }
            app.clear_favorites()?;
            println!("Cleared all favorite agents.");
        }
        FavoritesCommand::Export { path } => {
            let count = app.export_favorites(&path)?;
            println!("Exported {} agents to {}", count, path.display());
        }
        FavoritesCommand::Import { path } => {
            let added = app.import_favorites(&path)?;
            println!("Successfully imported {} new agents.", added);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn only_model_commands_need_a_key() {
        assert!(needs_model(&parse(&["persona-forge", "generate", "https://youtu.be/x"]).command));
        assert!(needs_model(&parse(&["persona-forge", "chat", "Causa"]).command));
        assert!(needs_model(&parse(&["persona-forge", "open", "?agent=x", "--chat"]).command));
        assert!(!needs_model(&parse(&["persona-forge", "open", "?agent=x"]).command));
        assert!(!needs_model(&parse(&["persona-forge", "share", "Causa"]).command));
        assert!(!needs_model(&parse(&["persona-forge", "favorites", "list"]).command));
    }

    #[test]
    fn local_commands_build_without_an_api_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_path = dir.path().join("store.json");
        let store_arg = store_path.to_str().unwrap();
        let prompts = Arc::new(PromptConfig::default());

        let args = parse(&["persona-forge", "--api-key", "", "--store-path", store_arg, "favorites", "list"]);
        let store = crate::storage::create_store(Some(store_path.as_path())).unwrap();
        let favorites = Favorites::load(store).unwrap();
        assert!(build_controller(&args, prompts.clone(), favorites).is_ok());

        let args = parse(&["persona-forge", "--api-key", "", "--store-path", store_arg, "chat", "Causa"]);
        let store = crate::storage::create_store(Some(store_path.as_path())).unwrap();
        let favorites = Favorites::load(store).unwrap();
        assert!(build_controller(&args, prompts, favorites).is_err());
    }

    #[test]
    fn open_saves_shared_persona_through_the_controller() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_path = dir.path().join("store.json");
        let args = parse(
            &["persona-forge", "--store-path", store_path.to_str().unwrap(), "favorites", "list"]
        );
        let store = crate::storage::create_store(Some(store_path.as_path())).unwrap();
        let mut app = build_controller(
            &args,
            Arc::new(PromptConfig::default()),
            Favorites::load(store).unwrap()
        ).unwrap();

        let shared = AgentPersona {
            name: "Causa".to_string(),
            description: "Causal guide".to_string(),
            expertise: vec![],
            personality_traits: vec![],
            avatar_prompt: String::new(),
        };
        let link = share::encode_share_link("http://localhost:5173/", &shared).unwrap();
        assert_eq!(open_link(&mut app, &link, true).unwrap(), shared);
        assert!(app.is_favorite("Causa"));
        assert!(app.state().shared_view);
        assert!(open_link(&mut app, "http://localhost:5173/?agent=junk", false).is_err());

        share_favorite(&app, "Causa", "http://localhost:5173/").unwrap();
        assert!(share_favorite(&app, "Nobody", "http://localhost:5173/").is_err());

        favorites(&mut app, FavoritesCommand::Clear { yes: false }).unwrap_err();
        assert!(app.is_favorite("Causa"));
        favorites(&mut app, FavoritesCommand::Remove { name: "Causa".to_string() }).unwrap();
        assert!(!app.is_favorite("Causa"));
    }
}
