use crate::article::Article;
use crate::locate::locate;
use crate::web::{FetchError, FetchHandle, Fetcher, UrlTemplate};
use std::task::Poll;
use thiserror::Error;
use tracing::{debug, span, warn, Level};

/// What the user sees when a page yields no content
pub const CONTENT_ERROR_MESSAGE: &str = "Could not retrieve content.";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not fetch page: {0}")]
    Fetch(#[from] FetchError),
    #[error("could not parse page: {0}")]
    Parse(#[from] html::ParseError),
    #[error("page has no article content")]
    NotFound,
}

impl ContentError {
    pub fn user_message(&self) -> &'static str {
        CONTENT_ERROR_MESSAGE
    }
}

#[derive(Debug)]
pub enum QueryState {
    Pending(FetchHandle),
    Ready(Result<Article, ContentError>),
}

/// One search term and the page fetched for it
#[derive(Debug)]
pub struct Query {
    term: String,
    state: QueryState,
}

fn extract(body: &str) -> Result<Article, ContentError> {
    let dom = html::parse(body)?;
    let root = locate(&dom).ok_or(ContentError::NotFound)?;
    Ok(Article::from_content(root))
}

impl Query {
    pub fn new(term: &str, fetcher: &dyn Fetcher, urls: &UrlTemplate) -> Self {
        let url = urls.page_url(term);
        debug!("Querying {:?} at {}", term, url);
        Self {
            term: term.to_string(),
            state: QueryState::Pending(fetcher.begin(url)),
        }
    }

    /// Checks on the fetch without blocking, extracting the article the first
    /// time it has arrived. Returns whether this call made the query ready.
    pub fn poll(&mut self) -> bool {
        let QueryState::Pending(handle) = &mut self.state else {
            return false;
        };
        let body = match handle.poll() {
            Poll::Pending => return false,
            Poll::Ready(body) => body,
        };
        let span = span!(Level::DEBUG, "Extracting", term = %self.term);
        let _enter = span.enter();
        let result = body.map_err(ContentError::from).and_then(|b| extract(&b));
        if let Err(e) = &result {
            warn!("{}: {}", self.term, e);
        }
        self.state = QueryState::Ready(result);
        true
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, QueryState::Ready(_))
    }

    /// The extracted article, once ready
    pub fn result(&self) -> Option<&Result<Article, ContentError>> {
        match &self.state {
            QueryState::Pending(_) => None,
            QueryState::Ready(result) => Some(result),
        }
    }
}

/// The open queries, oldest first
#[derive(Debug, Default)]
pub struct Queries {
    queries: Vec<Query>,
}

impl Queries {
    pub fn submit(&mut self, term: &str, fetcher: &dyn Fetcher, urls: &UrlTemplate) -> usize {
        self.queries.push(Query::new(term, fetcher, urls));
        self.queries.len() - 1
    }

    /// Polls every pending query once, returning how many became ready
    pub fn tick(&mut self) -> usize {
        self.queries.iter_mut().map(Query::poll).filter(|&ready| ready).count()
    }

    pub fn first(&self) -> Option<&Query> {
        self.queries.first()
    }

    /// Drops a query; a fetch still running for it is abandoned
    pub fn close(&mut self, index: usize) -> Option<Query> {
        (index < self.queries.len()).then(|| self.queries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
