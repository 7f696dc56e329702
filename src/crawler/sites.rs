//! Per-site extraction and pagination rules for scraped engines.
//!
//! Each scraped engine differs in three ways: how its URL encodes the page
//! offset, how the claimed match count is announced in the DOM, and how a
//! result row maps onto an identifier and a content body. Everything else
//! (caching, page-occupancy checks, retries, truncation) lives in the shared
//! [`super::website::WebsiteCrawler`] and is driven through this trait.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::data::Data;
use crate::error::{CrawlError, CrawlResult};

/// Site-specific pagination and extraction behaviour.
pub trait SiteRules: Send + Sync + 'static {
    /// Short engine name used in logs and cache directory layout.
    fn name(&self) -> &str;

    /// URL template containing the `<<query>>` and `<<offset>>` masks.
    fn url_template(&self) -> &str;

    /// Rows one fully occupied result page carries.
    fn page_size(&self) -> u64;

    /// Concurrency this site tolerates.
    fn thread_limit(&self) -> usize {
        1
    }

    /// Engine-native offset token for a request that should continue after
    /// `items_downloaded` rows.
    fn page_offset(&self, items_downloaded: u64) -> u64;

    /// Total match count the page claims, `None` while unrecognisable (page
    /// still rendering, or layout changed underneath us).
    fn number_matches(&self, html: &str) -> Option<u64>;

    /// All result rows present on the page.
    fn extract_items(&self, html: &str) -> CrawlResult<Vec<Data>>;

    /// Last resort once a page kept the wrong row count through every retry:
    /// either drop the page or keep what was extracted.
    fn settle_inconsistent_page(&self, items: Vec<Data>) -> Vec<Data>;

    /// Page whose markup announces the engine's full corpus size.
    fn data_set_size_url(&self) -> &str;

    /// The corpus size announced on the data-set-size page, `None` while
    /// unrecognisable.
    fn extract_data_set_size(&self, html: &str) -> Option<u64>;
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace([',', '.'], "").parse().ok()
}

// ---------------------------------------------------------------------------
// "Explore" engine: Angular-rendered digital library, 100 rows per page,
// 1-based page numbers in the URL.
// ---------------------------------------------------------------------------

static EXPLORE_NO_RESULTS: Lazy<Selector> =
    Lazy::new(|| selector(r#"li[class="article-list-item no-results ng-scope"]"#));
static EXPLORE_SINGLE_RESULT: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[ng-if="records.length === 1"]"#));
static EXPLORE_MATCH_COUNT: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[class="ng-binding ng-scope"]"#));
static EXPLORE_ITEM: Lazy<Selector> =
    Lazy::new(|| selector(r#"li[class="article-list-item ng-scope"]"#));
static EXPLORE_ITEM_ID: Lazy<Selector> =
    Lazy::new(|| selector(r#"a[class="icon-pdf ng-scope"]"#));
static EXPLORE_ITEM_TITLE: Lazy<Selector> =
    Lazy::new(|| selector(r#"[ng-bind-html="::record.title"]"#));
static EXPLORE_ITEM_ABSTRACT: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[ng-bind-html="::record.abstract"]"#));
static EXPLORE_DATA_SET_SIZE: Lazy<Selector> = Lazy::new(|| {
    selector(r#"a[href="/search/searchresult.jsp?sortType=desc_p_Publication_Year&newsearch=true"]"#)
});

const EXPLORE_DOMAIN: &str = "http://explore.example.org";
const EXPLORE_PAGE_SIZE: u64 = 100;

const EXPLORE_ALL_FIELDS_URL: &str = "http://explore.example.org/search/searchresult.jsp?\
     queryText=<<query>>&rowsPerPage=100&pageNumber=<<offset>>&resultAction=ROWS_PER_PAGE";
const EXPLORE_TITLE_URL: &str = "http://explore.example.org/search/searchresult.jsp?\
     action=search&matchBoolean=true&queryText=(%22Document%20Title%22:<<query>>)\
     &rowsPerPage=100&pageNumber=<<offset>>&resultAction=ROWS_PER_PAGE";
const EXPLORE_ABSTRACT_URL: &str = "http://explore.example.org/search/searchresult.jsp?\
     action=search&matchBoolean=true&queryText=(%22Abstract%22:<<query>>)\
     &rowsPerPage=100&pageNumber=<<offset>>&resultAction=ROWS_PER_PAGE";

/// Rules for the Angular-rendered "explore" digital library.
pub struct ExploreSite {
    url_template: &'static str,
}

impl ExploreSite {
    /// Search across every document field.
    pub fn all_fields() -> Self {
        Self {
            url_template: EXPLORE_ALL_FIELDS_URL,
        }
    }

    /// Restrict the query to document titles.
    pub fn title_only() -> Self {
        Self {
            url_template: EXPLORE_TITLE_URL,
        }
    }

    /// Restrict the query to abstracts.
    pub fn abstract_only() -> Self {
        Self {
            url_template: EXPLORE_ABSTRACT_URL,
        }
    }

    fn extract_item(&self, item: ElementRef<'_>) -> CrawlResult<Data> {
        let id_href = item
            .select(&EXPLORE_ITEM_ID)
            .next()
            .and_then(|a| a.value().attr("href"));
        let title = item.select(&EXPLORE_ITEM_TITLE).next();
        let abstract_text = item
            .select(&EXPLORE_ITEM_ABSTRACT)
            .next()
            .map(|el| collect_text(el));

        let (href, title) = match (id_href, title) {
            (Some(href), Some(title)) => (href.to_string(), title),
            (None, Some(title)) => {
                // Rows without a document link carry the target in the title
                // anchor itself, with tracking parameters appended.
                let href = title.value().attr("href").ok_or_else(|| {
                    CrawlError::fatal("data extraction failure: title row without link")
                })?;
                let href = href.split('&').next().unwrap_or(href);
                (href.to_string(), title)
            }
            _ => {
                return Err(CrawlError::fatal(format!(
                    "data extraction failure: result row lacks both link and title: {}",
                    item.html()
                )));
            }
        };

        let title_text = collect_text(title);
        let content = match abstract_text {
            Some(abstract_text) => format!("{title_text}\n\n{abstract_text}"),
            None => title_text,
        };
        Ok(Data::new(
            Some(format!("{EXPLORE_DOMAIN}{href}")),
            Some(content),
        ))
    }
}

impl SiteRules for ExploreSite {
    fn name(&self) -> &str {
        "explore"
    }

    fn url_template(&self) -> &str {
        self.url_template
    }

    fn page_size(&self) -> u64 {
        EXPLORE_PAGE_SIZE
    }

    fn page_offset(&self, items_downloaded: u64) -> u64 {
        // 1-based page numbers.
        (items_downloaded + self.page_size()) / self.page_size()
    }

    fn number_matches(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        if document.select(&EXPLORE_NO_RESULTS).next().is_some() {
            return Some(0);
        }
        if document.select(&EXPLORE_SINGLE_RESULT).next().is_some() {
            return Some(1);
        }
        let element = document.select(&EXPLORE_MATCH_COUNT).next()?;
        // The banner reads "Displaying results 1-100 of N"; the count is the
        // fifth whitespace-separated token.
        let text = collect_text(element);
        parse_count(text.split_whitespace().nth(4)?)
    }

    fn extract_items(&self, html: &str) -> CrawlResult<Vec<Data>> {
        let document = Html::parse_document(html);
        document
            .select(&EXPLORE_ITEM)
            .map(|item| self.extract_item(item))
            .collect()
    }

    fn settle_inconsistent_page(&self, _items: Vec<Data>) -> Vec<Data> {
        Vec::new()
    }

    fn data_set_size_url(&self) -> &str {
        EXPLORE_DOMAIN
    }

    fn extract_data_set_size(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        let element = document.select(&EXPLORE_DATA_SET_SIZE).next()?;
        parse_count(collect_text(element).trim())
    }
}

// ---------------------------------------------------------------------------
// "Portal" engine: server-rendered digital library, 20 rows per page, row
// cursor doubled by the site's URL template.
// ---------------------------------------------------------------------------

static PORTAL_NO_RESULTS: Lazy<Selector> = Lazy::new(|| selector(r#"font[size="+1"]"#));
static PORTAL_MATCH_COUNT: Lazy<Selector> = Lazy::new(|| selector("b"));
static PORTAL_ITEM_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"a[class="medium-text"]"#));
static PORTAL_ITEM_ABSTRACT: Lazy<Selector> = Lazy::new(|| selector(r#"div[class="abstract2"]"#));
static PORTAL_DATA_SET_SIZE_PARENT: Lazy<Selector> =
    Lazy::new(|| selector(r#"span[class="text10"]"#));
static PORTAL_DATA_SET_SIZE: Lazy<Selector> = Lazy::new(|| selector("strong"));

const PORTAL_DOMAIN: &str = "http://portal.example.org/";
const PORTAL_PAGE_SIZE: u64 = 20;

const PORTAL_ALL_FIELDS_URL: &str =
    "http://portal.example.org/results.cfm?query=<<query>>&start=<<offset>>1&dlr=ALL";
const PORTAL_TITLE_URL: &str = "http://portal.example.org/results.cfm?\
     query=%28Title%3A<<query>>%29&start=<<offset>>1&srt=score%20dsc&dlr=ALL";
const PORTAL_ABSTRACT_URL: &str = "http://portal.example.org/results.cfm?\
     query=%28Abstract%3A<<query>>%29&start=<<offset>>1&srt=score%20dsc&dlr=ALL";
const PORTAL_DATA_SET_SIZE_URL: &str =
    "http://portal.example.org/results.cfm?h=1&query=test&dlr=GUIDE";

/// Rules for the server-rendered "portal" digital library.
pub struct PortalSite {
    url_template: &'static str,
}

impl PortalSite {
    pub fn all_fields() -> Self {
        Self {
            url_template: PORTAL_ALL_FIELDS_URL,
        }
    }

    pub fn title_only() -> Self {
        Self {
            url_template: PORTAL_TITLE_URL,
        }
    }

    pub fn abstract_only() -> Self {
        Self {
            url_template: PORTAL_ABSTRACT_URL,
        }
    }
}

impl SiteRules for PortalSite {
    fn name(&self) -> &str {
        "portal"
    }

    fn url_template(&self) -> &str {
        self.url_template
    }

    fn page_size(&self) -> u64 {
        PORTAL_PAGE_SIZE
    }

    fn page_offset(&self, items_downloaded: u64) -> u64 {
        // Row cursor, doubled by the site's template convention.
        2 * items_downloaded / self.page_size()
    }

    fn number_matches(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        if document.select(&PORTAL_NO_RESULTS).next().is_some() {
            return Some(0);
        }
        let element = document.select(&PORTAL_MATCH_COUNT).next()?;
        parse_count(collect_text(element).trim())
    }

    fn extract_items(&self, html: &str) -> CrawlResult<Vec<Data>> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();
        for title in document.select(&PORTAL_ITEM_TITLE) {
            let href = title.value().attr("href").ok_or_else(|| {
                CrawlError::fatal("data extraction failure: title row without link")
            })?;
            let href = href.split('&').next().unwrap_or(href);
            let title_text = collect_text(title);

            // The abstract lives in a sibling subtree three levels up from
            // the title anchor.
            let abstract_text = title
                .parent()
                .and_then(|n| n.parent())
                .and_then(|n| n.parent())
                .and_then(ElementRef::wrap)
                .and_then(|ancestor| ancestor.select(&PORTAL_ITEM_ABSTRACT).next())
                .map(|el| collect_text(el));

            let content = match abstract_text {
                Some(abstract_text) => format!("{title_text}\n{abstract_text}"),
                None => title_text,
            };
            items.push(Data::new(
                Some(format!("{PORTAL_DOMAIN}{href}")),
                Some(content),
            ));
        }
        Ok(items)
    }

    fn settle_inconsistent_page(&self, items: Vec<Data>) -> Vec<Data> {
        items
    }

    fn data_set_size_url(&self) -> &str {
        PORTAL_DATA_SET_SIZE_URL
    }

    fn extract_data_set_size(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        // The corpus size sits in the second status span's bold figure.
        let parent = document.select(&PORTAL_DATA_SET_SIZE_PARENT).nth(1)?;
        let element = parent.select(&PORTAL_DATA_SET_SIZE).next()?;
        parse_count(collect_text(element).trim())
    }
}

fn collect_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
