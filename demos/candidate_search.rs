//! Candidate search example demonstrating debounced queries with pagination.
//!
//! This example shows:
//! - A debounced search box that resets to page 1 on each committed term
//! - A query subscription whose key follows the committed search
//! - Cached pages served without a request when the search comes back
//!
//! Point it at a running Workervet API:
//!
//! ```text
//! WORKERVET_BASE_URL=http://localhost:3000/api/v1 \
//! WORKERVET_TOKEN=... \
//!     cargo run --example candidate_search -- ada
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_stream::wrappers::WatchStream;
use workervet_query::api::{CandidatePage, CandidateParams, Candidates};
use workervet_query::config::{ApiConfig, ConfigError};
use workervet_query::debounce::PageRequest;
use workervet_query::logging;
use workervet_query::prelude::*;
use workervet_query::timer::TokioTimer;

#[derive(Debug)]
enum Message {
    /// The search box committed a new term or page.
    Committed(PageRequest<String>),
    /// Simulated typing finished.
    DoneTyping,
    Candidates(QueryResult<CandidatePage>),
}

struct Flags {
    api: AdminApi,
    search: PagedFilter<String>,
    term: String,
    page_limit: u32,
}

struct CandidateSearch {
    api: AdminApi,
    search: PagedFilter<String>,
    term: String,
    page_limit: u32,
    request: PageRequest<String>,
    typing: bool,
}

impl Application for CandidateSearch {
    type Message = Message;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let commits = WatchStream::new(flags.search.subscribe()).map(Message::Committed);

        // Type the term one character at a time, faster than the debounce delay.
        let search = flags.search.clone();
        let term = flags.term.clone();
        let typing = Command::future(async move {
            for end in 1..=term.len() {
                if term.is_char_boundary(end) {
                    search.input(term[..end].to_string());
                    tokio::time::sleep(Duration::from_millis(60)).await;
                }
            }
            Message::DoneTyping
        });

        let app = Self {
            request: flags.search.current(),
            api: flags.api,
            search: flags.search,
            term: flags.term,
            page_limit: flags.page_limit,
            typing: true,
        };
        (app, Command::batch([Command::stream(commits), typing]))
    }

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Committed(request) => {
                tracing::info!(search = %request.filter, page = request.page, "search committed");
                self.request = request;
                Command::none()
            }
            Message::DoneTyping => {
                self.typing = false;
                Command::none()
            }
            Message::Candidates(result) => {
                if let Some(err) = result.error() {
                    eprintln!("error: {err}");
                    if result.data().is_none() {
                        return Command::effect(Action::Quit);
                    }
                }
                if !result.is_success() || result.is_placeholder {
                    return Command::none();
                }
                let Some(page) = result.data() else {
                    return Command::none();
                };
                if self.typing || self.request.filter != self.term || self.search.is_pending() {
                    return Command::none();
                }
                print_page(&self.request, page);
                Command::effect(Action::Quit)
            }
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Message>> {
        let params = CandidateParams::from_page(&self.request, self.page_limit);
        vec![Subscription::new(self.api.query::<Candidates>(params)).map(Message::Candidates)]
    }
}

fn print_page(request: &PageRequest<String>, page: &CandidatePage) {
    println!(
        "search {:?}: page {} of {} ({} candidates)",
        request.filter, page.meta.page, page.meta.total_pages, page.meta.total
    );
    for candidate in &page.data {
        println!("  {:<24} {}", candidate.full_name, candidate.email);
    }
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    logging::init();

    let config = ApiConfig::from_env()?;
    let term = std::env::args().nth(1).unwrap_or_default();
    let timer = Arc::new(TokioTimer::new());

    let flags = Flags {
        api: AdminApi::from_config(&config, QueryClient::new())?,
        search: PagedFilter::new(timer, config.debounce(), String::new()),
        term,
        page_limit: config.page_limit,
    };
    Runtime::<CandidateSearch>::new(flags).run().await;
    Ok(())
}
