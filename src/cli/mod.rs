use crate::Secrets;
use crate::cache::{CacheFilter, CacheManager, CacheStats};
use crate::provider;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use colored::Colorize;
use kuba_core::{GlobalConfig, GlobalDefaults, ProviderKind, format_duration, parse_duration};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_ENVIRONMENT: &str = "default";
const DEFAULT_DOCUMENT: &str = "kuba.yaml";

/// Main CLI structure for the kuba application.
#[derive(Parser)]
#[command(name = "kuba")]
#[command(about = "Declarative environments from any secret manager", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overrides KUBA_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an environment and print its variables
    Show {
        /// Environment to resolve
        #[arg(short, long, env = "KUBA_ENV")]
        env: Option<String>,
        /// Path to kuba.yaml
        #[arg(short, long, env = "KUBA_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Env)]
        format: Format,
    },
    /// Inspect or invalidate cached secrets
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Init or show ~/.config/kuba/config.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List secret providers and whether this build includes them
    Providers,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List live cache entries
    List,
    /// Show entry counts
    Stats,
    /// Remove cache entries
    Clear {
        #[command(flatten)]
        filter: FilterArgs,
        /// Only remove entries that have already expired
        #[arg(long)]
        expired: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Set a new time-to-live on cache entries
    UpdateTtl {
        #[command(flatten)]
        filter: FilterArgs,
        /// New TTL measured from now, e.g. "30m" or "1h30m"
        #[arg(long)]
        ttl: String,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only entries for this kuba.yaml
    #[arg(long)]
    path: Option<PathBuf>,
    /// Only entries for this environment
    #[arg(long)]
    env: Option<String>,
    /// Only entries for this variable
    #[arg(long)]
    name: Option<String>,
}

impl FilterArgs {
    fn is_empty(&self) -> bool {
        self.path.is_none() && self.env.is_none() && self.name.is_none()
    }
}

impl From<FilterArgs> for CacheFilter {
    fn from(args: FilterArgs) -> Self {
        CacheFilter {
            path: args.path.map(|p| p.to_string_lossy().into_owned()),
            kuba_env: args.env,
            name: args.name,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize user configuration
    Init,
    /// Show current configuration
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Env,
    Json,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KUBA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Quotes a value for `NAME=value` output when the shell would split or expand it.
fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+,=".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn print_values(values: &BTreeMap<String, String>, format: Format) -> Result<()> {
    match format {
        Format::Env => {
            for (name, value) in values {
                println!("{}={}", name, shell_quote(value));
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(values)?),
    }
    Ok(())
}

fn open_cache(global: &GlobalConfig) -> Result<CacheManager> {
    CacheManager::new(global.cache).wrap_err("Failed to open the cache")
}

fn disabled_hint() -> Result<()> {
    println!(
        "Caching is disabled. Enable it in {} or with 'kuba config init'.",
        GlobalConfig::path()?.display()
    );
    Ok(())
}

pub fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalConfig::load().wrap_err("Failed to load global configuration")?;

    match cli.command {
        Commands::Show {
            env,
            config,
            format,
        } => {
            let env = env
                .or_else(|| global.defaults.environment.clone())
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
            let config = config
                .or_else(|| global.defaults.config.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT));

            let secrets = Secrets::load(&config, &global)
                .wrap_err_with(|| format!("Failed to load {}", config.display()))?;
            let values = secrets
                .resolve(&env)
                .wrap_err_with(|| format!("Failed to resolve environment '{}'", env))?;
            secrets.close()?;

            print_values(&values, format)
        }
        Commands::Cache { action } => {
            let mut cache = open_cache(&global)?;
            if !cache.is_enabled() {
                return disabled_hint();
            }

            match action {
                CacheAction::List => {
                    let entries = cache.list()?;
                    if entries.is_empty() {
                        println!("The cache is empty.");
                    } else {
                        println!(
                            "{:<40} {:<16} {:<28} {}",
                            "PATH".bold(),
                            "ENV".bold(),
                            "NAME".bold(),
                            "EXPIRES".bold()
                        );
                        for entry in &entries {
                            println!(
                                "{:<40} {:<16} {:<28} {}",
                                entry.path,
                                entry.kuba_env.cyan(),
                                entry.env,
                                entry
                                    .expires_at
                                    .with_timezone(&Local)
                                    .format("%Y-%m-%d %H:%M:%S")
                            );
                        }
                    }
                }
                CacheAction::Stats => match cache.stats()? {
                    CacheStats::Disabled => disabled_hint()?,
                    CacheStats::Enabled {
                        total_entries,
                        ttl,
                        per_environment,
                    } => {
                        println!("Entries: {}", total_entries.to_string().bold());
                        println!("TTL:     {}", format_duration(ttl));
                        for (env, count) in per_environment {
                            println!("  {:<20} {}", env.cyan(), count);
                        }
                    }
                },
                CacheAction::Clear {
                    filter,
                    expired,
                    yes,
                } => {
                    if filter.is_empty() && !expired && !yes {
                        let confirmed = inquire::Confirm::new("Remove every cache entry?")
                            .with_default(false)
                            .prompt()?;
                        if !confirmed {
                            println!("Cancelled.");
                            return Ok(());
                        }
                    }
                    let removed = cache
                        .clear_filtered(&filter.into(), expired)
                        .wrap_err("Failed to clear the cache")?;
                    println!("{} Removed {} entries", "✓".green(), removed);
                }
                CacheAction::UpdateTtl { filter, ttl } => {
                    let ttl = parse_duration(&ttl)?;
                    let updated = cache
                        .update_expiry(&filter.into(), ttl)
                        .wrap_err("Failed to update cache expiry")?;
                    println!(
                        "{} Updated {} entries to expire in {}",
                        "✓".green(),
                        updated,
                        format_duration(ttl)
                    );
                }
            }

            cache.close()?;
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Init => {
                use inquire::{Confirm, Text};

                let enabled = Confirm::new("Cache resolved secrets locally?")
                    .with_default(global.cache.enabled)
                    .prompt()?;

                let mut cache = global.cache;
                cache.enabled = enabled;
                if enabled {
                    let ttl = Text::new("How long should cached secrets live?")
                        .with_default(&format_duration(global.cache.ttl))
                        .with_help_message("e.g. 30m, 12h, 1d")
                        .prompt()?;
                    cache.ttl = parse_duration(&ttl)?;
                }

                let environment = Text::new("Default environment:")
                    .with_default(
                        global
                            .defaults
                            .environment
                            .as_deref()
                            .unwrap_or(DEFAULT_ENVIRONMENT),
                    )
                    .prompt()?;

                let config = GlobalConfig {
                    cache,
                    defaults: GlobalDefaults {
                        environment: Some(environment).filter(|e| !e.is_empty()),
                        config: global.defaults.config.clone(),
                    },
                };

                let path = config.save()?;
                println!("\n{} Configuration saved to {}", "✓".green(), path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let path = GlobalConfig::path()?;
                if !path.exists() {
                    println!("No configuration found. Run 'kuba config init' to create one.");
                    return Ok(());
                }

                println!("Configuration file: {}\n", path.display());
                println!(
                    "Cache:       {}",
                    if global.cache.enabled {
                        format!("enabled ({})", format_duration(global.cache.ttl)).green()
                    } else {
                        "disabled".yellow()
                    }
                );
                println!(
                    "Environment: {}",
                    global.defaults.environment.as_deref().unwrap_or("(none)")
                );
                println!(
                    "Document:    {}",
                    global
                        .defaults
                        .config
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(none)".to_string())
                );
                Ok(())
            }
        },
        Commands::Providers => {
            for kind in ProviderKind::ALL {
                let status = if provider::is_available(kind.as_str()) {
                    "available".green()
                } else {
                    "not in this build".dimmed()
                };
                println!("{:<10} {}", kind.as_str().bold(), status);
            }
            Ok(())
        }
    }
}
