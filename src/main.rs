use clap::{Parser, Subcommand};
use clipseek::Result;
use clipseek::commands::{ingest, reingest, search, show_status};
use clipseek::config::{run_interactive_config, show_config};
use clipseek::query::DEFAULT_QUERY_LIMIT;

#[derive(Parser)]
#[command(name = "clipseek")]
#[command(about = "Semantic clip search over time-coded video transcripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding backend and vector collection
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Search the provider and ingest matching sources into the index
    Ingest {
        /// Search query for sources to ingest, e.g. a channel or topic
        query: String,
        /// Maximum number of sources to ingest
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Override the segment window length in seconds
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Semantically search ingested segments for clips
    Search {
        /// What to look for
        text: String,
        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
    },
    /// Re-upsert previously persisted segment files without refetching
    Reingest,
    /// Show configuration and backend connectivity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest {
            query,
            count,
            interval,
        } => {
            ingest(query, count, interval).await?;
        }
        Commands::Search { text, limit } => {
            search(text, limit).await?;
        }
        Commands::Reingest => {
            reingest().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["clipseek", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Status);
        }
    }

    #[test]
    fn ingest_command_with_query() {
        let cli = Cli::try_parse_from(["clipseek", "ingest", "acquired podcast"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                query,
                count,
                interval,
            } = parsed.command
            {
                assert_eq!(query, "acquired podcast");
                assert_eq!(count, 10);
                assert_eq!(interval, None);
            }
        }
    }

    #[test]
    fn ingest_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "clipseek",
            "ingest",
            "acquired podcast",
            "--count",
            "3",
            "--interval",
            "60",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                query,
                count,
                interval,
            } = parsed.command
            {
                assert_eq!(query, "acquired podcast");
                assert_eq!(count, 3);
                assert_eq!(interval, Some(60.0));
            }
        }
    }

    #[test]
    fn search_command_defaults_to_three_results() {
        let cli = Cli::try_parse_from(["clipseek", "search", "who talked about NVIDIA"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { text, limit } = parsed.command {
                assert_eq!(text, "who talked about NVIDIA");
                assert_eq!(limit, 3);
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["clipseek", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["clipseek", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["clipseek", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
