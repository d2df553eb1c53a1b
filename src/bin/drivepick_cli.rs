//! drivepick CLI - Drive picker and search from a terminal
//!
//! Usage:
//!   drivepick-cli query <root> <term>     Print the Drive filter for a search
//!   drivepick-cli search <term>           Search the configured roots
//!   drivepick-cli browse [--mode upload]  Run the picker with console menus

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use drivepick::config::{default_config_path, load_config};
use drivepick::search::build_query;
use drivepick::{
    CallbackEvent, CallbackRouter, ConsoleChat, CredentialSource, CredentialStore, DrivePicker,
    DriveSearch, ItemType, JsonUserStore, ListMode, SearchOptions, SearchPlan, TokenDirectory,
};

#[derive(Parser)]
#[command(
    name = "drivepick-cli",
    about = "drivepick CLI - Google Drive picker and multi-drive search",
    version
)]
struct Cli {
    /// Config file (default: <config dir>/drivepick/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Download,
    Upload,
}

impl From<Mode> for ListMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Download => ListMode::Download,
            Mode::Upload => ListMode::Upload,
        }
    }
}

#[derive(clap::Args)]
struct MatchArgs {
    /// Match the whole name instead of each word
    #[arg(long)]
    exact: bool,
    /// Only search direct children of each root
    #[arg(long)]
    no_recursive: bool,
    /// folders, files or both
    #[arg(long, default_value = "both")]
    item_type: ItemType,
}

impl MatchArgs {
    fn options(&self, no_multi: bool) -> SearchOptions {
        SearchOptions {
            exact: self.exact,
            no_multi,
            recursive: !self.no_recursive,
            item_type: self.item_type,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the filter and request parameters for a search, without network access
    Query {
        /// Drive or folder id
        root: String,
        term: String,
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// Search every configured root
    Search {
        term: String,
        /// Chat user id whose default destination scopes the search
        #[arg(long, default_value_t = 0)]
        user: i64,
        /// Stop at the first root with results
        #[arg(long)]
        no_multi: bool,
        #[command(flatten)]
        matching: MatchArgs,
    },
    /// Open a picker; type a button number or a raw payload per line
    Browse {
        #[arg(long, value_enum, default_value = "download")]
        mode: Mode,
        #[arg(long, default_value_t = 0)]
        user: i64,
        /// Skip the credential menu and use the owner token
        #[arg(long)]
        owner: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    drivepick::init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = load_config(&config_path);
    config.validate().context("invalid configuration")?;
    let tokens = Arc::new(TokenDirectory::new(
        config.owner_token_path.clone(),
        config.user_tokens_dir.clone(),
        config.retry.clone(),
    ));

    match cli.command {
        Commands::Query { root, term, matching } => {
            let term = drivepick::search::escape_term(&term);
            let query = build_query(&root, &term, &matching.options(false));
            println!("q = {}", query.filter);
            for (key, value) in query.params() {
                println!("{} = {}", key, value);
            }
        }
        Commands::Search { term, user, no_multi, matching } => {
            let users = JsonUserStore::open(&config.user_data_path).await;
            let plan = SearchPlan::for_user(user, &users, &config.search_roots()).await;
            if plan.roots.is_empty() {
                bail!("no drives configured in {:?}", config_path);
            }
            let service = tokens
                .authorize(plan.credential)
                .await
                .with_context(|| format!("cannot authorize {}", plan.credential))?;

            let results = DriveSearch::new(matching.options(no_multi))
                .drive_list(service.as_ref(), &plan.roots, &term)
                .await;
            if results.is_empty() {
                println!("No result found for {}", term);
            }
            for (i, page) in results.pages.iter().enumerate() {
                println!("--- page {}/{} ---", i + 1, results.pages.len());
                println!("{}", page);
            }
            println!("{} entries", results.count);
        }
        Commands::Browse { mode, user, owner } => {
            let chat = Arc::new(ConsoleChat::new());
            let router = CallbackRouter::new();
            let users = Arc::new(JsonUserStore::open(&config.user_data_path).await);

            let input_chat = chat.clone();
            let input_router = router.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let payload = input_chat.resolve_input(&line);
                    if !input_router.dispatch(CallbackEvent::new(user, payload)) {
                        eprintln!("Not a picker button: {}", line.trim());
                    }
                }
            });

            let picker = DrivePicker::new(user, chat, tokens, users)
                .with_timeout(config.picker_timeout())
                .with_default_destination(&config.gdrive_id);
            let credential = owner.then_some(CredentialSource::Owner);
            let outcome = picker.run(&router, mode.into(), credential).await;
            println!("{}", outcome.into_message());
        }
    }
    Ok(())
}
