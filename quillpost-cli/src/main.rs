//! QuillPost command-line client

mod commands;
mod events;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use quillpost_core::posts::DEFAULT_PAGE_SIZE;
use quillpost_core::settings;

use crate::state::AppState;

/// QuillPost command-line interface.
#[derive(Parser, Debug)]
#[command(name = "quillpost")]
#[command(about = "Read and write QuillPost blog posts from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Identity service URL
    #[arg(long, env = "QUILLPOST_AUTH_API_URL", global = true)]
    auth_url: Option<String>,

    /// Blog service URL
    #[arg(long, env = "QUILLPOST_BLOG_API_URL", global = true)]
    blog_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session
    Login {
        username: String,
        #[arg(long, env = "QUILLPOST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account (does not sign in)
    Register {
        username: String,
        #[arg(long, env = "QUILLPOST_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session
    Whoami,
    /// Save the effective service URLs to the settings file
    Configure,
    /// Update the signed-in user's profile with a JSON object of changes
    Profile { changes: String },
    /// Blog posts
    Posts {
        #[command(subcommand)]
        command: PostsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PostsCommand {
    /// List posts
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
    /// Show one post
    Show { id: i64 },
    /// Write a new post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Edit a post you own
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a post you own
    Delete { id: i64 },
    /// List your own posts
    Mine,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let mut client_settings = settings::load_settings();
    if let Some(url) = cli.auth_url {
        client_settings.auth_api_url = url;
    }
    if let Some(url) = cli.blog_url {
        client_settings.blog_api_url = url;
    }

    let state = AppState::new(client_settings).map_err(anyhow::Error::msg)?;
    let mut session_events = state.session.subscribe_events();

    let session = state.session.bootstrap().await;
    info!("Startup session status: {:?}", session.status);

    let result = run(&state, cli.command).await;

    events::report(&events::drain(&mut session_events));
    result
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Login { username, password } => {
            commands::login(state, &username, &password).await
        }
        Commands::Register {
            username,
            password,
            email,
        } => commands::register(state, &username, &password, email).await,
        Commands::Logout => commands::logout(state),
        Commands::Whoami => commands::whoami(state),
        Commands::Configure => commands::configure(state),
        Commands::Profile { changes } => commands::update_profile(state, &changes).await,
        Commands::Posts { command } => match command {
            PostsCommand::List { skip, limit } => commands::posts_list(state, skip, limit).await,
            PostsCommand::Show { id } => commands::posts_show(state, id).await,
            PostsCommand::Create { title, content } => {
                commands::posts_create(state, title, content).await
            }
            PostsCommand::Edit { id, title, content } => {
                commands::posts_edit(state, id, title, content).await
            }
            PostsCommand::Delete { id } => commands::posts_delete(state, id).await,
            PostsCommand::Mine => commands::posts_mine(state).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_posts_list_defaults() {
        let cli = Cli::try_parse_from(["quillpost", "posts", "list"]).unwrap();
        match cli.command {
            Commands::Posts {
                command: PostsCommand::List { skip, limit },
            } => {
                assert_eq!(skip, 0);
                assert_eq!(limit, DEFAULT_PAGE_SIZE);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_edit_with_partial_fields() {
        let cli = Cli::try_parse_from([
            "quillpost",
            "--log-level",
            "debug",
            "posts",
            "edit",
            "3",
            "--title",
            "New title",
        ])
        .unwrap();
        match cli.command {
            Commands::Posts {
                command: PostsCommand::Edit { id, title, content },
            } => {
                assert_eq!(id, 3);
                assert_eq!(title.as_deref(), Some("New title"));
                assert!(content.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
