use std::path::PathBuf;

use advieswijzer::advisory::{self, ModelSettings};
use advieswijzer::backend::should_use_live_backend;
use advieswijzer::config::{resolve_api_key, Capabilities, SecretStore, Settings};
use advieswijzer::constants::{self, API_KEY_VAR, DEFAULT_TEMPERATURE};
use advieswijzer::questionnaire::{ApproachPreference, QuestionnaireInput};
use advieswijzer::{chat, prompt, tokens, web_server};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Chat completion model [env: OPENAI_MODEL]
    #[arg(long, global = true)]
    model: Option<String>,
    /// Sampling temperature
    #[arg(long, global = true, env = "ADVIES_TEMPERATURE")]
    temperature: Option<f32>,
    /// Base URL of the OpenAI-compatible API [env: OPENAI_BASE_URL]
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// TOML file holding OPENAI_API_KEY [env: ADVIES_SECRETS]
    #[arg(long, global = true)]
    secrets: Option<PathBuf>,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web interface.
    Serve {
        #[arg(long, default_value = "127.0.0.1", help = "Address to listen on.")]
        host: String,
        #[arg(long, default_value_t = 8501, help = "Port for the web server.")]
        port: u16,
        #[arg(long, help = "Start new sessions with AI switched off.")]
        no_ai: bool,
    },
    /// Generate one advisory document and print it.
    Advise {
        #[arg(long, help = "Office software in use.")]
        software: String,
        #[arg(long = "pain-point", help = "Selected pain point (repeatable).")]
        pain_points: Vec<String>,
        #[arg(long = "weight", value_parser = parse_weight, help = "Weight as LABEL=1..5 (repeatable).")]
        weights: Vec<(String, u8)>,
        #[arg(long, default_value = "", help = "Free-text notes.")]
        notes: String,
        #[arg(long, value_enum, default_value_t = ApproachPreference::Hybrid)]
        approach: ApproachPreference,
        #[arg(long, help = "Do not call the AI backend.")]
        no_ai: bool,
        #[arg(long, help = "Print the composed prompt and its token estimate first.")]
        show_prompt: bool,
    },
    /// Chat with the advisor in the terminal.
    Chat {
        #[arg(long, help = "Do not call the AI backend.")]
        no_ai: bool,
    },
}

fn parse_weight(raw: &str) -> Result<(String, u8), String> {
    let (label, weight) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected LABEL=WEIGHT, got '{raw}'"))?;
    let weight: u8 = weight
        .trim()
        .parse()
        .map_err(|_| format!("weight must be a number from 1 to 5, got '{weight}'"))?;
    if !(constants::MIN_WEIGHT..=constants::MAX_WEIGHT).contains(&weight) {
        return Err(format!("weight must be from 1 to 5, got {weight}"));
    }
    Ok((label.trim().to_string(), weight))
}

fn load_settings(args: &ConfigArgs, ai_enabled: bool) -> Result<Settings> {
    let secrets_path = args
        .secrets
        .clone()
        .unwrap_or_else(|| PathBuf::from(constants::SECRETS_PATH.as_str()));
    let secrets = SecretStore::load(&secrets_path).context("Failed to load secrets")?;
    let api_key = resolve_api_key(&secrets, std::env::var(API_KEY_VAR).ok());

    let settings = Settings {
        api_key,
        base_url: args
            .base_url
            .clone()
            .unwrap_or_else(|| constants::OPENAI_BASE_URL.clone()),
        model: ModelSettings {
            model: args.model.clone().unwrap_or_else(|| constants::DEFAULT_MODEL.clone()),
            temperature: args.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        },
        ai_enabled,
        templates_dir: PathBuf::from(constants::TEMPLATES_DIR.as_str()),
        static_dir: PathBuf::from(constants::STATIC_DIR.as_str()),
        capabilities: Capabilities::detect(),
    };

    match settings.configuration_status() {
        Some(status) => warn!("{status}; using stub responses"),
        None => info!(model = %settings.model.model, "AI backend configured"),
    }
    Ok(settings)
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,advieswijzer=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("advieswijzer starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve { host, port, no_ai } => {
            let settings = load_settings(&cli.config, !no_ai)?;
            let server = web_server::start_web_server(&host, port, settings);
            tokio::pin!(server);

            tokio::select! {
                res = &mut server => res.context("Web server stopped")?,
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received, shutting down"),
            }
        }
        Commands::Advise {
            software,
            pain_points,
            weights,
            notes,
            approach,
            no_ai,
            show_prompt,
        } => {
            let settings = load_settings(&cli.config, !no_ai)?;
            let input = QuestionnaireInput {
                software,
                pain_points,
                weights: weights.into_iter().collect(),
                notes,
                approach,
            };
            input.validate()?;
            for label in input.missing_weights() {
                warn!(%label, "No weight given, using the default");
            }

            let request = prompt::compose(&input);
            if show_prompt {
                println!("{}\n\n{}\n", request.system_instruction, request.user_instruction);
                println!("(ongeveer {} tokens)\n", tokens::estimate_request(&request));
            }

            let use_live = should_use_live_backend(
                settings.ai_enabled,
                settings.credential_present(),
                settings.capabilities.live_backend,
            );
            let backend = if use_live { settings.build_backend() } else { None };
            let result = advisory::generate(&request, use_live, backend.as_deref(), &settings.model).await;
            info!(source = ?result.source, "Advice ready");
            println!("{}", result.text);
        }
        Commands::Chat { no_ai } => {
            let settings = load_settings(&cli.config, !no_ai)?;
            let use_live = should_use_live_backend(
                settings.ai_enabled,
                settings.credential_present(),
                settings.capabilities.live_backend,
            );
            let backend = if use_live { settings.build_backend() } else { None };
            chat::run_terminal_chat(use_live, backend.as_deref(), &settings.model)
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight() {
        assert_eq!(parse_weight("Handmatig werk=5"), Ok(("Handmatig werk".to_string(), 5)));
        assert_eq!(parse_weight("a=b=2"), Ok(("a=b".to_string(), 2)));
        assert!(parse_weight("Handmatig werk").is_err());
        assert!(parse_weight("x=0").is_err());
        assert!(parse_weight("x=six").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
