//! State for a quote-search widget. Each widget owns one of these; searches
//! never touch the chat transcript and may overlap a chat turn.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::constants::NO_QUOTES_FOUND;
use crate::gateway::{Gateway, GatewayError};
use crate::models::Quote;

/// Where a search widget lives in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchWidget {
    Composer,
    Panel,
}

impl std::str::FromStr for SearchWidget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "composer" => Ok(SearchWidget::Composer),
            "panel" => Ok(SearchWidget::Panel),
            other => Err(format!("unknown search widget '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum SearchStatus {
    Idle,
    Searching,
    NoResults(&'static str),
    Results,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuoteSearch {
    pub query: String,
    pub results: Vec<Quote>,
    pub searching: bool,
    pub error: Option<String>,
    pub searched: bool,
    #[serde(skip)]
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    pub query: String,
}

impl QuoteSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, query: &str) -> Option<SearchTicket> {
        let query = query.trim();
        if query.is_empty() || self.searching {
            return None;
        }

        self.query = query.to_string();
        self.searching = true;
        self.error = None;
        self.searched = true;
        self.results.clear();

        Some(SearchTicket {
            generation: self.generation,
            query: self.query.clone(),
        })
    }

    pub fn complete(&mut self, ticket: SearchTicket, result: Result<Vec<Quote>, GatewayError>) {
        if ticket.generation != self.generation {
            warn!(query = %ticket.query, "Discarding quote search result for a cleared widget");
            return;
        }

        self.searching = false;
        match result {
            Ok(quotes) => self.results = quotes,
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub fn clear(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    pub fn status(&self) -> SearchStatus {
        if self.searching {
            SearchStatus::Searching
        } else if let Some(error) = &self.error {
            SearchStatus::Failed(error.clone())
        } else if !self.searched {
            SearchStatus::Idle
        } else if self.results.is_empty() {
            SearchStatus::NoResults(NO_QUOTES_FOUND)
        } else {
            SearchStatus::Results
        }
    }
}

pub async fn run(search: &Mutex<QuoteSearch>, gateway: &Gateway, query: &str) -> SearchStatus {
    let ticket = search.lock().await.begin(query);
    let Some(ticket) = ticket else {
        debug!("Ignoring quote search: blank query or search in flight");
        return search.lock().await.status();
    };

    let result = gateway.search_quotes(&ticket.query).await;

    let mut search = search.lock().await;
    search.complete(ticket, result);
    search.status()
}

/// Appends a quote to a composer draft, separated by a blank line.
pub fn insert_quote(draft: &str, quote: &Quote) -> String {
    let citation = format!("\"{}\" - {}", quote.text, quote.source);
    if draft.is_empty() {
        citation
    } else {
        format!("{}\n\n{}", draft, citation).trim().to_string()
    }
}
