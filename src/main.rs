//! chatgate CLI
//!
//! Commands:
//!   serve    - Start HTTP server
//!   models   - List the model catalog
//!   instance - Print the resolved client config for a provider/model
//!   config   - Show (or reset) the config file

use anyhow::{Context, Result};
use chatgate::{catalog, AppState, Config, CreateInstance, EnvConfig, ModelService, PreferenceOverrides, Provider};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(name = "chatgate")]
#[command(about = "Multi-provider LLM chat gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3001")]
        port: u16,
    },

    /// List the model catalog
    Models {
        /// Only models of this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Print the client config the factory resolves
    Instance {
        /// Provider tag (openai, anthropic, gemini, groq, ollama, llmchat, ixcoach)
        #[arg(short, long)]
        provider: String,

        /// Model key (defaults to the provider's test model)
        #[arg(short, long)]
        model: Option<String>,

        /// Caller-supplied API key
        #[arg(long)]
        api_key: Option<String>,

        /// Resolve as an authenticated user
        #[arg(long)]
        logged_in: bool,

        /// Requested max tokens
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Show the config file
    Config {
        /// Overwrite it with defaults
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config::load()?.unwrap_or_default();
            let env = EnvConfig::from_env().context("Invalid environment configuration")?;
            let state = AppState::from_config(&config, &env);
            chatgate::run_server(state, port).await?;
        }

        Commands::Models { provider } => {
            let models = match provider {
                Some(tag) => catalog::for_provider(tag.parse::<Provider>()?),
                None => catalog::all(),
            };

            println!("{:<28} {:<10} {:>10}", "MODEL".bold(), "PROVIDER".bold(), "MAX OUT".bold());
            for model in models {
                println!(
                    "{:<28} {:<10} {:>10}",
                    model.key.cyan(),
                    model.provider.name(),
                    model.max_output_tokens
                );
            }
        }

        Commands::Instance {
            provider,
            model,
            api_key,
            logged_in,
            max_tokens,
        } => {
            let provider: Provider = provider.parse()?;
            let key = model.unwrap_or_else(|| catalog::test_model_key(provider).to_string());
            let descriptor = catalog::find(&key)
                .filter(|m| m.provider == provider)
                .with_context(|| format!("Model {} is not offered by {}", key, provider))?;

            let config = Config::load()?.unwrap_or_default();
            let origin = std::env::var("PUBLIC_ORIGIN").unwrap_or(config.public_origin);
            let service = ModelService::new(origin, config.preferences);

            let mut request = CreateInstance::new(provider, descriptor).logged_in(logged_in);
            if let Some(api_key) = api_key {
                request = request.with_api_key(api_key);
            }
            if max_tokens.is_some() {
                request = request.with_preferences(PreferenceOverrides {
                    max_tokens,
                    ..Default::default()
                });
            }

            let client = service.create_instance(request)?;
            if client.config().proxied {
                eprintln!("{} {}", "Proxied through".dimmed(), service.origin());
            }
            println!("{}", serde_json::to_string_pretty(client.config())?);
        }

        Commands::Config { reset } => {
            let path = Config::path()?;
            let config = if reset {
                let config = Config::default();
                config.save()?;
                println!("{} {}", "Reset".green(), path.display());
                config
            } else {
                match Config::load()? {
                    Some(config) => config,
                    None => {
                        println!("{} {} (using defaults)", "No config at".yellow(), path.display());
                        Config::default()
                    }
                }
            };
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
