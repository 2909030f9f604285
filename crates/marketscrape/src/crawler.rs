use std::collections::HashSet;
use std::time::Duration;

use rand::{Rng, rng};
use scraper::Html;
use url::Url;

use crate::fetcher::PageFetcher;
use crate::parser::{extract_markets, find_next_page};
use crate::types::MarketRecord;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Lower bound of the pause between two page requests.
    pub min_delay: Duration,
    /// Upper bound of the pause between two page requests.
    pub max_delay: Duration,
    /// Stop after this many pages even if a next link is present. `None`
    /// follows next links for as long as the directory offers them.
    pub max_pages: Option<u32>,
    /// Stop when a page links to a next page that was already announced.
    pub stop_on_repeated_link: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(4),
            max_pages: None,
            stop_on_repeated_link: true,
        }
    }
}

impl CrawlConfig {
    pub fn validate(self) -> Result<Self, String> {
        if self.min_delay > self.max_delay {
            return Err(format!(
                "Minimum delay ({:?}) cannot be greater than maximum delay ({:?})",
                self.min_delay, self.max_delay
            ));
        }
        if self.max_pages.is_some_and(|p| p == 0) {
            return Err("Max pages must be greater than 0".to_string());
        }
        Ok(self)
    }
}

/// URL of the `page`th directory page (1-based).
pub fn page_url(base_url: &str, page: u32) -> String {
    format!("{}&page={}", base_url, page)
}

/// Resolves a possibly relative link against the directory URL.
pub fn resolve_link(base_url: &str, href: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => url.into(),
        Err(e) => {
            log::warn!("Could not resolve '{}' against '{}': {}", href, base_url, e);
            href.to_string()
        }
    }
}

#[derive(Debug)]
enum CrawlState {
    Fetching { page: u32 },
    Extracting { page: u32, document: Html },
    Advancing { page: u32, document: Html },
    Done,
}

/// Everything gathered so far. Moved through each step of the crawl.
#[derive(Debug, Default)]
struct Accumulator {
    markets: Vec<MarketRecord>,
    next_links: HashSet<String>,
}

/// Walks the directory page by page until a fetch fails or a page has no
/// next link.
#[derive(Debug)]
pub struct Crawler<F> {
    fetcher: F,
    config: CrawlConfig,
}

impl<F: PageFetcher> Crawler<F> {
    /// Fails when the config does not pass [`CrawlConfig::validate`].
    pub fn new(fetcher: F, config: CrawlConfig) -> Result<Self, String> {
        Ok(Self {
            fetcher,
            config: config.validate()?,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Collects the markets of every reachable page, in page order. A failed
    /// fetch ends the crawl; whatever was gathered before it is returned.
    pub async fn crawl(&self, base_url: &str) -> Vec<MarketRecord> {
        let mut state = CrawlState::Fetching { page: 1 };
        let mut acc = Accumulator::default();

        while !matches!(state, CrawlState::Done) {
            (state, acc) = self.step(base_url, state, acc).await;
        }

        log::info!("Crawl finished with {} market(s)", acc.markets.len());
        acc.markets
    }

    async fn step(
        &self,
        base_url: &str,
        state: CrawlState,
        mut acc: Accumulator,
    ) -> (CrawlState, Accumulator) {
        let next = match state {
            CrawlState::Fetching { page } => {
                if let Some(max) = self.config.max_pages
                    && page > max
                {
                    log::warn!("Reached the page limit ({}), stopping", max);
                    return (CrawlState::Done, acc);
                }

                log::info!("Fetching page {}...", page);
                match self.fetcher.fetch(&page_url(base_url, page)).await {
                    Ok(html) => CrawlState::Extracting {
                        page,
                        document: Html::parse_document(&html),
                    },
                    Err(e) => {
                        log::error!("Failed to fetch page {}: {}", page, e);
                        CrawlState::Done
                    }
                }
            }
            CrawlState::Extracting { page, document } => {
                let markets = extract_markets(&document);
                log::info!("Page {}: {} market(s)", page, markets.len());
                acc.markets.extend(markets);
                CrawlState::Advancing { page, document }
            }
            CrawlState::Advancing { page, document } => match find_next_page(&document) {
                Some(href) => {
                    let next_url = resolve_link(base_url, &href);
                    if !acc.next_links.insert(next_url.clone()) && self.config.stop_on_repeated_link
                    {
                        log::warn!("Next page URL repeats ({}), stopping", next_url);
                        CrawlState::Done
                    } else {
                        log::info!("Next page URL: {}", next_url);
                        self.pause().await;
                        CrawlState::Fetching { page: page + 1 }
                    }
                }
                None => {
                    log::info!("No next page found after page {}", page);
                    CrawlState::Done
                }
            },
            CrawlState::Done => CrawlState::Done,
        };

        (next, acc)
    }

    async fn pause(&self) {
        let (min, max) = (self.config.min_delay, self.config.max_delay);
        if max.is_zero() {
            return;
        }
        let millis = rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
        log::debug!("Sleeping {} ms before the next request", millis);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}
