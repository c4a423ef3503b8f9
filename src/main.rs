use crate::display::{loading_indicator, TextRenderer};
use crate::query::Queries;
use crate::web::{FetchError, HttpFetcher, UrlTemplate, DEFAULT_BASE_URL};
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, span, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Splitting of pages into language sections
mod article;
/// Classification of content into renderable blocks
mod blocks;
/// Plain text rendering of articles
mod display;
/// Finding the article body inside a page
mod locate;
/// Fetching and extracting the page for each search term
mod query;
/// Reconstruction of table grids
mod table;
/// Flattening of elements to plain text
mod text;
/// Fetching of resources from the web
mod web;

const HELP: &str = "\
Look up words on Wiktionary

USAGE:
  stol [OPTIONS] <TERM>...

OPTIONS:
  -l, --language <NAME>  Language section to expand [default: English]
      --all              Expand every language section
      --base-url <URL>   Address pages are looked up under [default: https://en.wiktionary.org/wiki/]
      --frame-ms <N>     Milliseconds between polls [default: 16]
  -t, --trace            Log what is going on to stderr
  -h, --help             Print this help
";

struct Args {
    pub terms: Vec<String>,
    pub language: String,
    pub all: bool,
    pub base_url: String,
    pub frame: Duration,
    pub trace: bool,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("could not set up HTTP client: {0}")]
    Client(#[from] FetchError),
}

fn main() -> ExitCode {
    let mut pargs = pico_args::Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return ExitCode::SUCCESS;
    }
    let args = match parse_args(pargs) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, HELP);
            return ExitCode::from(2);
        }
    };
    if args.trace {
        tracing_subscriber::fmt::fmt()
            .with_span_events(FmtSpan::ACTIVE)
            .with_max_level(Level::DEBUG)
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish()
            .init();
        info!("Logger initialized");
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(mut pargs: pico_args::Arguments) -> Result<Args, pico_args::Error> {
    let args = Args {
        language: pargs
            .opt_value_from_str(["-l", "--language"])?
            .unwrap_or_else(|| "English".to_string()),
        all: pargs.contains("--all"),
        base_url: pargs
            .opt_value_from_str("--base-url")?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        frame: Duration::from_millis(pargs.opt_value_from_str("--frame-ms")?.unwrap_or(16)),
        trace: pargs.contains(["--trace", "-t"]),
        terms: pargs
            .finish()
            .into_iter()
            .map(|arg| arg.into_string().map_err(|_| pico_args::Error::NonUtf8Argument))
            .collect::<Result<_, _>>()?,
    };
    if args.terms.is_empty() {
        return Err(pico_args::Error::MissingArgument);
    }
    Ok(args)
}

/// Drives every query to completion, printing each article in the order the
/// terms were given. Returns whether all of them produced content.
fn run(args: &Args) -> Result<bool, StartupError> {
    let urls = UrlTemplate::new(&args.base_url)?;
    let fetcher = HttpFetcher::new()?;
    let renderer = TextRenderer::new(&args.language, args.all);

    let mut queries = Queries::default();
    for term in &args.terms {
        queries.submit(term, &fetcher, &urls);
    }

    let span = span!(Level::DEBUG, "Waiting for queries", count = queries.len());
    let _enter = span.enter();
    let mut all_found = true;
    let mut first = true;
    let mut frame: u64 = 0;
    while !queries.is_empty() {
        queries.tick();
        while let Some(query) = queries.first().filter(|q| q.is_ready()) {
            if !first {
                println!();
            }
            first = false;
            eprint!("\r    \r");
            print!("{}", renderer.query(query, frame));
            all_found &= matches!(query.result(), Some(Ok(article)) if !article.is_empty());
            queries.close(0);
        }
        if !queries.is_empty() {
            eprint!("\r{}", loading_indicator(frame));
            let _ = std::io::stderr().flush();
            std::thread::sleep(args.frame);
            frame += 1;
        }
    }
    Ok(all_found)
}
