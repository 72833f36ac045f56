// src/bin/ideas-client.rs
//! Terminal front end for the idea poll.
use std::{env, io::Write, sync::Arc};

use idea_poll::client::{
    HttpApi, IdeaStore,
    api::DEFAULT_BASE_URL,
    view::{self, Command, HELP},
};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr and stay quiet by default so they don't clobber the page.
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let base_url = env::var("IDEAS_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let store = IdeaStore::new(Arc::new(HttpApi::new(&base_url)?));
    store.initialize().await;

    let mut lines = BufReader::new(stdin()).lines();
    println!("{HELP}");
    loop {
        store.settle().await;
        let state = store.snapshot().await;
        println!("{}", view::render(&state));
        for notification in store.take_notifications().await {
            println!("{}", view::render_notification(&notification));
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Some(Command::Vote(n)) => match state.unvoted_column().get(n - 1) {
                Some(idea) => {
                    store.vote(idea.id).await;
                }
                None => println!("No idea numbered {n} on this page"),
            },
            Some(Command::Next) => store.next_page().await,
            Some(Command::Prev) => store.prev_page().await,
            Some(Command::Page(page)) => {
                if page > state.total_pages() {
                    println!("There are only {} pages", state.total_pages());
                } else {
                    store.go_to_page(page).await;
                }
            }
            Some(Command::PageSize(size)) => store.change_items_per_page(size).await,
            Some(Command::Reset) => {
                store.reset_vote_state().await;
            }
            Some(Command::Retry) => {
                store.fetch_vote_status().await;
                store.refresh().await;
            }
            Some(Command::Help) => println!("{HELP}"),
            Some(Command::Quit) => break,
            None => println!("Unrecognised command, type h for help"),
        }
    }

    Ok(())
}
