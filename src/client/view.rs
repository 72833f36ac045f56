//! Text rendering of the client state, plus the commands the terminal client understands.
//!
//! Everything here is a pure function of a [StoreState]; nothing in this module keeps state of its
//! own or talks to the network.
use std::fmt::Write;

use crate::client::store::{Notification, PAGE_SIZES, StoreState};
use crate::models::{Idea, VOTE_CAP};

const BAR_WIDTH: usize = 20;
const TITLE_PREVIEW: usize = 30;
const DESCRIPTION_PREVIEW: usize = 72;

/// Shorten `text` to `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

pub fn render(state: &StoreState) -> String {
    if state.loading && !state.has_data() {
        return "Loading ideas...\n".to_string();
    }
    if let (Some(error), false) = (&state.error, state.has_data()) {
        return render_error(error);
    }

    let mut out = String::new();
    out.push_str(&render_vote_manager(state));
    out.push('\n');
    out.push_str(&render_vote_status(state));
    out.push('\n');
    out.push_str(&render_columns(state));
    if state.has_data() {
        out.push('\n');
        out.push_str(&render_pagination(state));
    }
    out
}

pub fn render_error(error: &str) -> String {
    format!("Failed to load ideas\n{error}\n[r] Try again\n")
}

pub fn render_vote_manager(state: &StoreState) -> String {
    let mut out = String::from("== Ideas Vote Manager ==\n");
    let _ = writeln!(out, "Total votes used: {}/{VOTE_CAP}", state.total_votes);
    let _ = writeln!(
        out,
        "Status: {}",
        if state.can_vote() { "Can vote" } else { "Limit reached" }
    );

    if !state.voted_details.is_empty() {
        out.push_str("Recently voted ideas:\n");
        for idea in state.voted_details.iter().take(3) {
            let _ = writeln!(out, "  * {}", truncate(&idea.title, TITLE_PREVIEW));
        }
        if state.voted_details.len() > 3 {
            let _ = writeln!(out, "  ... and {} more", state.voted_details.len() - 3);
        }
    }
    out.push_str("[reset] Reset vote state\n");
    out
}

pub fn render_vote_status(state: &StoreState) -> String {
    let used = state.total_votes.clamp(0, VOTE_CAP) as usize;
    let filled = used * BAR_WIDTH / VOTE_CAP as usize;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let summary = if state.can_vote() {
        format!("{} left", state.remaining_votes())
    } else {
        "Limit reached".to_string()
    };
    format!(
        "You have used {} out of {VOTE_CAP} votes [{bar}] {summary}\n",
        state.total_votes
    )
}

fn render_card(out: &mut String, label: &str, idea: &Idea, animating: bool) {
    let votes = if idea.votes == 1 { "vote" } else { "votes" };
    let _ = write!(out, "  {label} {} ({} {votes})", idea.title, idea.votes);
    if animating {
        out.push_str(" ...voting");
    }
    out.push('\n');
    if let Some(description) = &idea.description {
        let _ = writeln!(out, "      {}", truncate(description, DESCRIPTION_PREVIEW));
    }
}

/// The two columns: ideas already voted for, then the ones still open, numbered for `vote N`.
pub fn render_columns(state: &StoreState) -> String {
    let voted = state.voted_column();
    let unvoted = state.unvoted_column();
    let mut out = String::new();

    let _ = writeln!(out, "-- My Votes ({}) --", voted.len());
    if voted.is_empty() {
        out.push_str("  No votes yet. Vote for ideas to see them here!\n");
    }
    for idea in voted {
        render_card(&mut out, "[x]", idea, state.is_animating(idea.id));
    }

    out.push('\n');
    let _ = write!(out, "-- All Ideas ({}) --", unvoted.len());
    if state.can_vote() {
        let _ = write!(out, " {} votes left", state.remaining_votes());
    }
    if state.loading {
        out.push_str(" (loading...)");
    }
    out.push('\n');
    if unvoted.is_empty() && !state.loading {
        out.push_str("  All done here! You've voted for all ideas on this page.\n");
    }
    for (n, idea) in unvoted.into_iter().enumerate() {
        render_card(&mut out, &format!("{:>2}.", n + 1), idea, state.is_animating(idea.id));
    }
    out
}

pub fn render_pagination(state: &StoreState) -> String {
    let sizes: Vec<String> = PAGE_SIZES.iter().map(u32::to_string).collect();
    let prev = if state.has_prev_page { "[p] Previous" } else { "    Previous" };
    let next = if state.has_next_page { "[n] Next" } else { "    Next" };
    format!(
        "Items per page: {} (choose {}) | Showing {} ideas on page {} of {}\n{prev}  Page {}  {next}\n",
        state.items_per_page,
        sizes.join("/"),
        state.ideas.len(),
        state.current_page,
        state.total_pages(),
        state.current_page,
    )
}

pub fn render_notification(notification: &Notification) -> String {
    match notification {
        Notification::Success(message) => format!("ok: {message}"),
        Notification::Error(message) => format!("error: {message}"),
    }
}

pub const HELP: &str = "\
commands:
  v N, vote N   vote for idea N in the \"All Ideas\" column
  n, next       next page
  p, prev       previous page
  g N, page N   go to page N
  s N, size N   items per page (5, 10, 20 or 50)
  reset         withdraw all your votes
  r, retry      reload the current page and vote status
  h, help       this text
  q, quit       exit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vote(usize),
    Next,
    Prev,
    Page(u32),
    PageSize(u32),
    Reset,
    Retry,
    Help,
    Quit,
}

impl Command {
    /// Parse one line of input. `None` for anything unrecognised.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?.to_ascii_lowercase();
        let arg = words.next();
        if words.next().is_some() {
            return None;
        }

        match (verb.as_str(), arg) {
            ("v" | "vote", Some(n)) => n.parse().ok().filter(|n| *n > 0).map(Command::Vote),
            ("n" | "next", None) => Some(Command::Next),
            ("p" | "prev", None) => Some(Command::Prev),
            ("g" | "page", Some(n)) => n.parse().ok().filter(|n| *n > 0).map(Command::Page),
            ("s" | "size", Some(n)) => n
                .parse()
                .ok()
                .filter(|n| PAGE_SIZES.contains(n))
                .map(Command::PageSize),
            ("reset", None) => Some(Command::Reset),
            ("r" | "retry", None) => Some(Command::Retry),
            ("h" | "help", None) => Some(Command::Help),
            ("q" | "quit", None) => Some(Command::Quit),
            _ => None,
        }
    }
}
