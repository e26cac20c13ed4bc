use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use sidechat::feed::{CommentFeed, SubmitOutcome};
use sidechat::storage::Database;
use sidechat::util::time_ago;
use sidechat::Config;

/// Get the config directory path (~/.config/sidechat/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("sidechat"))
}

#[derive(Parser, Debug)]
#[command(name = "sidechat", about = "Live per-video comment feeds over SQLite")]
struct Args {
    /// Path to the database (overrides config file)
    #[arg(long, value_name = "FILE")]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a profile (or update its avatar if the username exists)
    Seed {
        username: String,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Post a single comment to a video's discussion
    Post {
        /// Video id (UUID)
        video: Uuid,
        /// Author username (must be seeded)
        author: String,
        text: String,
    },
    /// Follow a video's discussion live, posting lines read from stdin
    Tail {
        /// Video id (UUID)
        video: Uuid,
        /// Author username for posted lines (must be seeded)
        author: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config =
        Config::load(&config_dir.join("config.toml")).context("Failed to load configuration")?;

    let db_path = args.db.unwrap_or_else(|| config.db_path.clone());
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database '{}'", db_path))?;

    match args.command {
        Command::Seed {
            username,
            avatar_url,
        } => {
            let id = db
                .create_profile(&username, avatar_url.as_deref())
                .await
                .context("Failed to create profile")?;
            println!("Profile '{}' ready (id {})", username, id);
        }

        Command::Post {
            video,
            author,
            text,
        } => {
            let author_id = resolve_author(&db, &author).await?;
            let feed = CommentFeed::open(db, video, config.feed()).await;
            match feed.submit(&text, author_id).await? {
                SubmitOutcome::Posted => println!("Posted to {}", video),
                SubmitOutcome::Ignored => println!("Nothing to post"),
            }
        }

        Command::Tail { video, author } => {
            let author_id = resolve_author(&db, &author).await?;
            tail(db, video, author_id, &config).await?;
        }
    }

    Ok(())
}

async fn resolve_author(db: &Database, username: &str) -> Result<i64> {
    db.profile_id(username)
        .await
        .context("Failed to look up author")?
        .with_context(|| format!("Unknown author '{}'; run `sidechat seed {}` first", username, username))
}

/// Print the current list, then print each live arrival and post stdin
/// lines until EOF or Ctrl-C.
async fn tail(db: Database, video: Uuid, author_id: i64, config: &Config) -> Result<()> {
    let mut feed = CommentFeed::open(db, video, config.feed()).await;

    let now = chrono::Utc::now();
    for comment in feed.comments().iter() {
        print_comment(comment, now);
    }
    println!("-- live ({} so far) --", feed.len());

    let mut updates = feed.subscribe_updates();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = feed.len();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let list = updates.borrow_and_update().clone();
                // New arrivals are prepended, oldest new one printed first
                let fresh = list.len().saturating_sub(shown);
                for comment in list.iter().take(fresh).rev() {
                    print_comment(comment, chrono::Utc::now());
                }
                shown = list.len();
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(text) => {
                        feed.typing().keystroke();
                        feed.submit(&text, author_id).await?;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    feed.close().await;
    Ok(())
}

fn print_comment(comment: &sidechat::EnrichedComment, now: chrono::DateTime<chrono::Utc>) {
    let author = comment
        .profile
        .as_ref()
        .map(|p| p.username.as_str())
        .unwrap_or("[unknown]");
    println!(
        "{:>12}  {}  {}",
        time_ago(comment.created_at, now),
        author,
        comment.body
    );
}
