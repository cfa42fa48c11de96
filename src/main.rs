use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sjoelguard::config::SjoelguardConfig;
use sjoelguard::ratelimit::{spawn_sweeper, Action, Category, Clock, LimitKey, RateLimiter};
use sjoelguard::telemetry::init_tracing;

/// Inspect and exercise the Sjoelguard admission-control policies.
#[derive(Debug, Parser)]
#[command(name = "sjoelguard", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective policy table
    Policies {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Load the configuration and build the policy registry
    Validate,
    /// Run repeated checks for one identifier against a fresh limiter
    Simulate {
        /// Policy category (auth, games)
        #[arg(long)]
        category: String,
        /// Policy action (sign-in, sign-up, password-reset, create, score-submit)
        #[arg(long)]
        action: String,
        /// Caller identifier, e.g. an email address or user id
        #[arg(long)]
        identifier: String,
        /// Number of attempts to make
        #[arg(long, default_value_t = 1)]
        attempts: u32,
        /// Pause between attempts, in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SjoelguardConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Sjoelguard starting");

    // Unknown or invalid policy overrides stop the process here.
    let limiter = Arc::new(RateLimiter::with_config(&config)?);

    match cli.command {
        Command::Policies { json } => {
            let entries = limiter.registry().entries();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{:<8} {:<16} {:>10} {:>5}", "CATEGORY", "ACTION", "WINDOW", "MAX");
                for entry in entries {
                    println!(
                        "{:<8} {:<16} {:>9}s {:>5}",
                        entry.category, entry.action, entry.window_secs, entry.max_count
                    );
                }
            }
        }
        Command::Validate => {
            info!(
                policies = limiter.registry().policies().count(),
                sweep_threshold = config.limiter.sweep_threshold,
                "Configuration is valid"
            );
            println!("ok");
        }
        Command::Simulate {
            category,
            action,
            identifier,
            attempts,
            delay_ms,
        } => {
            let category: Category = category.parse()?;
            let action: Action = action.parse()?;
            // Reject unregistered pairs before the first attempt
            limiter.registry().get_policy(category, action)?;
            let key = LimitKey::new(category, action, identifier);

            let sweeper = config
                .sweep_interval()
                .map(|interval| spawn_sweeper(limiter.clone(), interval));

            for attempt in 1..=attempts {
                let allowed = limiter.check(&key)?;
                let status = limiter.remaining(&key)?;
                let retry_after = status.retry_after(limiter.clock().now());
                let resets_at = chrono::Utc::now() + chrono::Duration::from_std(retry_after)?;

                if !allowed {
                    warn!(key = %key, attempt = attempt, "Attempt denied");
                }

                println!(
                    "attempt {:>3}: {:<7} remaining={} resets_at={}",
                    attempt,
                    if allowed { "allowed" } else { "denied" },
                    status.remaining,
                    resets_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
                );

                if delay_ms > 0 && attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            if let Some(sweeper) = sweeper {
                sweeper.shutdown().await;
            }
        }
    }

    Ok(())
}
