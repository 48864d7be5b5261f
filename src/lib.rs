pub mod cli;
pub mod commands;
pub mod content;
pub mod database;
pub mod editor;
pub mod gemini;
pub mod settings;

pub use commands::{AppState, CommandError};
pub use content::{
    group_by_status, BoardColumn, ContentItem, ContentItemInput, ContentStatus, ContentType,
    ItemPersistence, ItemStore, Platform,
};
pub use database::Database;
pub use editor::{EditorSession, EditorTab, GenerationKind, GenerationOutcome, SessionState};
pub use gemini::{GenerationBackend, GenerationError, GenerationGateway};
pub use settings::Settings;

use cli::CliCommand;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

pub fn run() -> ExitCode {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(CliCommand::Help) => {
            println!("{}", cli::USAGE);
            return ExitCode::SUCCESS;
        }
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, cli::USAGE);
            return ExitCode::from(2);
        }
    };

    let db = match Database::default_path().and_then(|path| {
        let db = Database::open(&path)?;
        Ok((path, db))
    }) {
        Ok((path, db)) => {
            init_tracing(log_json_enabled(&db));
            tracing::debug!(path = %path.display(), "opened database");
            Arc::new(db)
        }
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let state = match AppState::initialize(db) {
            Ok(state) => state,
            Err(e) => {
                eprintln!("Failed to load content: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let mutating = is_mutating(&command);
        let result = dispatch(&state, command).await;

        // Saved state must match memory before exit, even after a failed save
        if mutating {
            if let Err(e) = state.store.flush() {
                tracing::error!(error = %e, "final save failed");
                eprintln!("Warning: changes could not be saved: {}", e);
                return ExitCode::FAILURE;
            }
        }

        match result {
            Ok(output) => {
                if !output.is_empty() {
                    println!("{}", output);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        }
    })
}

/// Log format is chosen before the subscriber exists, so it is read
/// straight from stored settings plus the environment.
fn log_json_enabled(db: &Database) -> bool {
    db.get_settings()
        .map(|s| s.with_env_overrides().log_json)
        .unwrap_or(false)
}

fn is_mutating(command: &CliCommand) -> bool {
    matches!(
        command,
        CliCommand::New { .. }
            | CliCommand::Edit { .. }
            | CliCommand::Delete { .. }
            | CliCommand::Draft { .. }
            | CliCommand::Thumbnail { .. }
            | CliCommand::Ideas { .. }
    )
}

fn summarize(item: &ContentItem) -> String {
    format!(
        "{}  [{}] {} ({} / {})",
        item.id,
        item.status.as_str(),
        item.title,
        item.content_type.as_str(),
        item.platform.as_str()
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value).map_err(|e| CommandError::new(e.to_string()))
}

async fn dispatch(state: &AppState, command: CliCommand) -> Result<String, CommandError> {
    match command {
        CliCommand::List => {
            let items = commands::list_items(state)?;
            if items.is_empty() {
                return Ok("No content yet. Create one with `creatorflow new <title>`.".to_string());
            }
            Ok(items.iter().map(summarize).collect::<Vec<_>>().join("\n"))
        }
        CliCommand::Board => Ok(content::render_board(&commands::get_board(state)?)),
        CliCommand::Show { id } => match commands::get_item(state, &id)? {
            Some(item) => to_json(&item),
            None => Err(CommandError::new(format!("Content item not found: {}", id))),
        },
        CliCommand::New { input } => {
            let item = commands::create_item(state, input).await?;
            Ok(format!("Created {}", summarize(&item)))
        }
        CliCommand::Edit { id, input } => {
            let item = commands::update_item(state, &id, input).await?;
            Ok(format!("Updated {}", summarize(&item)))
        }
        CliCommand::Delete { id, confirmed } => {
            if commands::delete_item(state, &id, confirmed)? {
                Ok(format!("Deleted {}", id))
            } else {
                Ok(format!("No item with id {}", id))
            }
        }
        CliCommand::Draft { id } => {
            let item = commands::generate_draft_for(state, &id).await?;
            Ok(item.draft_content)
        }
        CliCommand::Thumbnail { id } => {
            let item = commands::generate_thumbnail_for(state, &id).await?;
            let url = item.thumbnail_url.unwrap_or_default();
            Ok(format!("Thumbnail saved ({} bytes as data URL)", url.len()))
        }
        CliCommand::Ideas { id } => {
            let item = commands::suggest_ideas_for(state, &id).await?;
            Ok(item.draft_content)
        }
        CliCommand::ConfigShow => to_json(&commands::get_effective_settings(state)?),
        CliCommand::ConfigSet { field, value } => {
            let mut settings = commands::get_settings(state)?;
            settings.set_field(&field, &value).map_err(CommandError::new)?;
            commands::save_settings(state, settings).await?;
            Ok(format!("Updated {}", field))
        }
        CliCommand::RecoverList => {
            let keys = commands::list_quarantined(state)?;
            if keys.is_empty() {
                return Ok("No quarantined data.".to_string());
            }
            Ok(keys.join("\n"))
        }
        CliCommand::RecoverShow { key } => commands::show_quarantined(state, &key),
        CliCommand::RecoverDelete { key, confirmed } => {
            if commands::delete_quarantined(state, &key, confirmed)? {
                Ok(format!("Deleted {}", key))
            } else {
                Ok(format!("No quarantined data under {}", key))
            }
        }
        CliCommand::Help => Ok(cli::USAGE.to_string()),
    }
}
