pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod persona;
pub mod share;
pub mod storage;
pub mod transcript;

use app::GenerationOptions;
use cli::{ commands, Args, Command };
use config::prompt::load_prompts;
use log::info;
use std::error::Error;
use storage::Favorites;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Model: {}", args.model.as_deref().unwrap_or(llm::DEFAULT_MODEL));
    info!("Model Base URL: {}", args.base_url.as_deref().unwrap_or(llm::DEFAULT_BASE_URL));
    info!("API Key Set: {}", !args.api_key.is_empty());
    info!("Store Path: {}", args.store_path.display());
    info!(
        "Prompts Path: {}",
        args.prompts_path.as_ref().map_or("<built-in>".to_string(), |p| p.display().to_string())
    );
    info!("Share Base URL: {}", args.share_base_url);
    info!("Transcript Delay: {}ms", args.transcript_delay_ms);
    info!("-------------------------");

    let store = storage::create_store(Some(args.store_path.as_path()))?;
    let favorites = Favorites::load(store)?;
    let prompts = load_prompts(args.prompts_path.as_ref())?;
    let mut app = commands::build_controller(&args, prompts, favorites)?;

    match args.command {
        Command::Generate { url, count, temperature, save, chat, json } => {
            let options = GenerationOptions { count, temperature };
            commands::generate(&mut app, &url, options, save, chat, json).await?;
        }
        Command::Chat { name } => {
            commands::chat_with_favorite(&mut app, &name).await?;
        }
        Command::Open { link, save, chat } => {
            let agent = commands::open_link(&mut app, &link, save)?;
            if chat {
                cli::repl::chat_loop(&mut app, agent).await?;
            }
        }
        Command::Share { name } => {
            commands::share_favorite(&app, &name, &args.share_base_url)?;
        }
        Command::Favorites(command) => {
            commands::favorites(&mut app, command)?;
        }
    }

    Ok(())
}
