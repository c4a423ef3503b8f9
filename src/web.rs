use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::task::Poll;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, span, warn, Level};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://en.wiktionary.org/wiki/";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not read {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} does not name a local file")]
    NotAFile(Url),
}

/// Turns a search term into the address of its page
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    base: Url,
}

impl UrlTemplate {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base)?,
        })
    }

    /// Appends `term` to the base as a single, percent-encoded path segment
    pub fn page_url(&self, term: &str) -> Url {
        let mut url = self.base.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(term);
            }
            Err(()) => warn!("{} cannot have a path, requesting it unchanged", self.base),
        }
        url
    }
}

/// The receiving end of one fetch running in the background
#[derive(Debug)]
pub struct FetchHandle {
    receiver: Receiver<Result<String, FetchError>>,
}

impl FetchHandle {
    pub fn channel() -> (Sender<Result<String, FetchError>>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }

    /// Checks for the response without blocking.
    ///
    /// A fetch whose sender went away without answering never completes.
    pub fn poll(&mut self) -> Poll<Result<String, FetchError>> {
        match self.receiver.try_recv() {
            Ok(result) => Poll::Ready(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Poll::Pending,
        }
    }
}

pub trait Fetcher {
    /// Starts fetching `url` and returns immediately
    fn begin(&self, url: Url) -> FetchHandle;
}

/// Fetches each page on its own thread
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    fn get_text_resource(client: &reqwest::blocking::Client, url: Url) -> Result<String, FetchError> {
        let span = span!(Level::DEBUG, "Loading resource", url = %url);
        let _enter = span.enter();
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| FetchError::NotAFile(url.clone()))?;
            std::fs::read_to_string(&path).map_err(|source| FetchError::File { path, source })
        } else {
            let response = client.get(url).send()?;
            debug!("Got {}", response.status());
            Ok(response.text()?)
        }
    }
}

impl Fetcher for HttpFetcher {
    fn begin(&self, url: Url) -> FetchHandle {
        let (sender, handle) = FetchHandle::channel();
        let client = self.client.clone();
        thread::spawn(move || {
            let result = Self::get_text_resource(&client, url);
            // The query may have been closed in the meantime
            if sender.send(result).is_err() {
                debug!("Fetch finished after its query was dropped");
            }
        });
        handle
    }
}
