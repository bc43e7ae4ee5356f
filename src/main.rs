use clap::{Parser, Subcommand};
use meeplebot::Result;
use meeplebot::commands::{
    ask_question, handle_single_message, list_topics, research_topic, run_interactive_config,
    show_config, show_status,
};

#[derive(Parser)]
#[command(name = "meeplebot")]
#[command(about = "A board game research assistant with retrieval-augmented answering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model services and file server
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Research a board game and build its knowledge base
    Research {
        /// Name of the game to research
        name: String,
    },
    /// Ask a question about a researched game
    Ask {
        /// The question to answer
        question: String,
        /// Explicit game name; inferred from the question otherwise
        #[arg(long)]
        topic: Option<String>,
    },
    /// List all games in the library
    List,
    /// Show detailed status of the research pipeline
    Status,
    /// Route one chat message through the full bot pipeline
    Message {
        /// The message text
        text: String,
        /// Chat session id for conversational context
        #[arg(long, default_value_t = 0)]
        chat_id: i64,
    },
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
        Commands::Research { name } => {
            research_topic(&name).await?;
        }
        Commands::Ask { question, topic } => {
            ask_question(&question, topic.as_deref()).await?;
        }
        Commands::List => {
            list_topics().await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Message { text, chat_id } => {
            handle_single_message(chat_id, &text).await?;
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
        let cli = Cli::try_parse_from(["meeplebot", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::List);
        }
    }

    #[test]
    fn research_command_takes_a_name() {
        let cli = Cli::try_parse_from(["meeplebot", "research", "Catan"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Research { name } = parsed.command {
                assert_eq!(name, "Catan");
            }
        }
    }

    #[test]
    fn ask_command_with_topic_flag() {
        let cli = Cli::try_parse_from([
            "meeplebot",
            "ask",
            "how many players?",
            "--topic",
            "Catan",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, topic } = parsed.command {
                assert_eq!(question, "how many players?");
                assert_eq!(topic, Some("Catan".to_string()));
            }
        }
    }

    #[test]
    fn message_command_defaults_chat_id() {
        let cli = Cli::try_parse_from(["meeplebot", "message", "hello"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Message { chat_id, .. } = parsed.command {
                assert_eq!(chat_id, 0);
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["meeplebot", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["meeplebot", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}
