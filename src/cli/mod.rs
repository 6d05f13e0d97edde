pub mod commands;
pub mod repl;

use clap::{ Parser, Subcommand };
use std::path::PathBuf;

use crate::app::{ DEFAULT_AGENT_COUNT, DEFAULT_TEMPERATURE };
use crate::storage::EXPORT_FILE_NAME;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Model Service Args ---
    /// API key for the Gemini API. Required by `generate`, `chat` and `open --chat`.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "", hide_env_values = true, global = true)]
    pub api_key: String,

    /// Model name (e.g., gemini-2.5-flash)
    #[arg(long, env = "GEMINI_MODEL", global = true)] // No default, rely on client default if None
    pub model: Option<String>,

    /// Base URL of the Generative Language API
    #[arg(long, env = "GEMINI_BASE_URL", global = true)]
    pub base_url: Option<String>,

    // --- Storage Args ---
    /// File holding the favorites key-value store.
    #[arg(long, env = "PERSONA_STORE_PATH", default_value = ".persona-forge/store.json", global = true)]
    pub store_path: PathBuf,

    /// Optional JSON file overriding the built-in prompt templates.
    #[arg(long, env = "PROMPTS_PATH", global = true)]
    pub prompts_path: Option<PathBuf>,

    // --- General App Args ---
    /// Page URL that share links are built on.
    #[arg(long, env = "SHARE_BASE_URL", default_value = "http://localhost:5173/", global = true)]
    pub share_base_url: String,

    /// Simulated transcript fetch delay in milliseconds.
    #[arg(long, env = "TRANSCRIPT_DELAY_MS", default_value = "1500", global = true)]
    pub transcript_delay_ms: u64,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate agent personas from a YouTube video's transcript
    Generate {
        /// YouTube video URL
        url: String,

        /// Number of agents to create
        #[arg(short = 'n', long, default_value_t = DEFAULT_AGENT_COUNT, value_parser = clap::value_parser!(u8).range(1..=5))]
        count: u8,

        /// Creativity of the generated personas (0.1 to 1.0)
        #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE, value_parser = parse_temperature)]
        temperature: f32,

        /// Add every generated persona to favorites
        #[arg(long)]
        save: bool,

        /// Start chatting with the persona at this 1-based position
        #[arg(long)]
        chat: Option<usize>,

        /// Print the personas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chat with a favorite persona
    Chat {
        /// Name of the favorite
        name: String,
    },

    /// Show the persona carried by a share link
    Open {
        link: String,

        /// Add the shared persona to favorites
        #[arg(long)]
        save: bool,

        /// Start chatting with the shared persona
        #[arg(long)]
        chat: bool,
    },

    /// Print a share link for a favorite persona
    Share {
        name: String,
    },

    /// Manage favorite personas
    #[command(subcommand)]
    Favorites(FavoritesCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum FavoritesCommand {
    /// List favorites
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove one favorite by name
    Remove {
        name: String,
    },
    /// Remove all favorites. This cannot be undone.
    Clear {
        /// Confirm clearing
        #[arg(long)]
        yes: bool,
    },
    /// Write favorites to a pretty-printed JSON file
    Export {
        #[arg(default_value = EXPORT_FILE_NAME)]
        path: PathBuf,
    },
    /// Merge favorites from a JSON file, skipping names already present
    Import {
        path: PathBuf,
    },
}

pub fn parse_temperature(value: &str) -> Result<f32, String> {
    let temperature: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !(0.1..=1.0).contains(&temperature) {
        return Err(format!("temperature must be between 0.1 and 1.0, got {}", temperature));
    }
    Ok(temperature)
}
