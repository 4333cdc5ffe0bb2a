//! Integration tests for the pagination controller
//!
//! These tests drive the full link phase against a scripted, in-memory
//! results site: a search form, paged result lists and a next-page control.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_harvest::browser::{BrowserPage, Selector, WaitState};
use sumi_harvest::config::CrawlerConfig;
use sumi_harvest::crawler::PaginationController;
use sumi_harvest::output::{read_links, LinkFileSink, LINKS_FILE_NAME};
use sumi_harvest::plan::{ElementRef, SearchPlan};
use sumi_harvest::state::CrawlPhase;
use sumi_harvest::HarvestError;
use tempfile::TempDir;

const SUBMIT: &str = "//button[@id='go']";
const NEXT: &str = "a.next";
const DETAIL: &str = "//a[@class='result']";
const ACCEPT_COOKIES: &str = "#accept-cookies";
const SORT_NEWEST: &str = "#sort-newest";

#[derive(Debug, Clone)]
enum SiteElement {
    Control(String),
    Link { page: usize, index: usize },
}

/// Paged results site with scriptable faults and timings
struct ScriptedSite {
    pages: Vec<Vec<String>>,
    current: AtomicUsize,
    next_hidden: bool,
    controls: Vec<String>,
    detail_faults: AtomicUsize,
    detail_waits: AtomicUsize,
    query_faults: AtomicUsize,
    query_calls: AtomicUsize,
    empty_pages_show_results: bool,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    clicks: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedSite {
    fn new(pages: Vec<Vec<&str>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|hrefs| hrefs.into_iter().map(String::from).collect())
                .collect(),
            current: AtomicUsize::new(0),
            next_hidden: false,
            controls: vec![SUBMIT.to_string()],
            detail_faults: AtomicUsize::new(0),
            detail_waits: AtomicUsize::new(0),
            query_faults: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            empty_pages_show_results: false,
            delays: HashMap::new(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Site whose pages each hold `per_page` links
    fn paged(page_count: usize, per_page: usize) -> Self {
        let pages: Vec<Vec<String>> = (0..page_count)
            .map(|p| {
                (0..per_page)
                    .map(|i| format!("/detail/{}-{}", p + 1, i))
                    .collect()
            })
            .collect();
        Self::new(
            pages
                .iter()
                .map(|hrefs| hrefs.iter().map(String::as_str).collect())
                .collect(),
        )
    }

    fn with_hidden_next(mut self) -> Self {
        self.next_hidden = true;
        self
    }

    fn with_control(mut self, query: &str) -> Self {
        self.controls.push(query.to_string());
        self
    }

    fn with_detail_faults(self, faults: usize) -> Self {
        self.detail_faults.store(faults, Ordering::SeqCst);
        self
    }

    fn with_query_faults(self, faults: usize) -> Self {
        self.query_faults.store(faults, Ordering::SeqCst);
        self
    }

    /// The results container stays visible on pages without rows
    fn with_visible_empty_pages(mut self) -> Self {
        self.empty_pages_show_results = true;
        self
    }

    fn with_delay(mut self, href: &str, delay: Duration) -> Self {
        self.delays.insert(href.to_string(), delay);
        self
    }

    fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("missing event {}", event))
    }

    fn page_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn has_next(&self) -> bool {
        !self.next_hidden && self.page_index() + 1 < self.pages.len()
    }
}

#[async_trait]
impl BrowserPage for ScriptedSite {
    type Element = SiteElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.events.lock().unwrap().push(format!("navigate:{}", url));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &Selector,
        _state: WaitState,
        _timeout: Duration,
    ) -> Result<Option<SiteElement>> {
        let query = selector.query.as_str();

        if query == DETAIL {
            self.detail_waits.fetch_add(1, Ordering::SeqCst);
            let faults = self.detail_faults.load(Ordering::SeqCst);
            if faults > 0 {
                self.detail_faults.store(faults - 1, Ordering::SeqCst);
                return Ok(None);
            }
            let visible =
                self.empty_pages_show_results || !self.pages[self.page_index()].is_empty();
            return Ok(visible.then(|| SiteElement::Control(query.to_string())));
        }

        if query == NEXT {
            return Ok(self
                .has_next()
                .then(|| SiteElement::Control(query.to_string())));
        }

        Ok(self
            .controls
            .iter()
            .any(|c| c == query)
            .then(|| SiteElement::Control(query.to_string())))
    }

    async fn query_all(&self, selector: &Selector) -> Result<Vec<SiteElement>> {
        if selector.query != DETAIL {
            return Ok(Vec::new());
        }
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let faults = self.query_faults.load(Ordering::SeqCst);
        if faults > 0 {
            self.query_faults.store(faults - 1, Ordering::SeqCst);
            return Err(anyhow!("Execution context was destroyed"));
        }
        let page = self.page_index();
        Ok((0..self.pages[page].len())
            .map(|index| SiteElement::Link { page, index })
            .collect())
    }

    async fn attribute(&self, element: &SiteElement, name: &str) -> Result<Option<String>> {
        let SiteElement::Link { page, index } = element else {
            return Ok(None);
        };
        if name != "href" {
            return Ok(None);
        }
        let href = self.pages[*page][*index].clone();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("start:{}", href));

        let delay = self
            .delays
            .get(&href)
            .copied()
            .unwrap_or(Duration::from_millis(5));
        tokio::time::sleep(delay).await;

        self.events.lock().unwrap().push(format!("end:{}", href));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(href))
    }

    async fn click(&self, element: &SiteElement) -> Result<()> {
        let SiteElement::Control(query) = element else {
            return Err(anyhow!("links are not clicked"));
        };
        if query == NEXT {
            self.current.fetch_add(1, Ordering::SeqCst);
        }
        self.clicks.lock().unwrap().push(query.clone());
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(format!(
            "https://listings.example.com/search?page={}",
            self.page_index() + 1
        ))
    }

    async fn content(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

fn plan() -> SearchPlan {
    SearchPlan {
        search_page_url: "https://listings.example.com/search".to_string(),
        submit_button: ElementRef::xpath(SUBMIT).described("search button"),
        next_page_button: ElementRef::css(NEXT).described("next page"),
        detail_page_link: ElementRef::xpath(DETAIL).described("result link"),
        pre_search_steps: Vec::new(),
        post_search_steps: Vec::new(),
        skip_search: false,
    }
}

fn config() -> CrawlerConfig {
    CrawlerConfig {
        timeout_ms: 50,
        settle_delay_min_ms: 0,
        settle_delay_max_ms: 0,
        ..CrawlerConfig::default()
    }
}

fn controller(
    site: &Arc<ScriptedSite>,
    plan: SearchPlan,
    config: CrawlerConfig,
    dir: &TempDir,
) -> PaginationController<ScriptedSite> {
    let sink = Arc::new(LinkFileSink::in_dir(dir.path()));
    PaginationController::new(Arc::clone(site), plan, config, sink)
}

async fn saved_links(dir: &TempDir) -> Vec<String> {
    let path = dir.path().join(LINKS_FILE_NAME);
    if !path.exists() {
        return Vec::new();
    }
    let mut links = read_links(&path).await.unwrap();
    links.sort();
    links
}

#[tokio::test]
async fn test_hidden_next_button_ends_after_first_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(3, 2).with_hidden_next());

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pages_visited, 1);
    assert_eq!(crawl.state().phase, CrawlPhase::Done);
    assert_eq!(crawl.state().page, 1);
    assert_eq!(site.clicks(), vec![SUBMIT.to_string()]);
    assert_eq!(
        saved_links(&dir).await,
        vec![
            "https://listings.example.com/detail/1-0".to_string(),
            "https://listings.example.com/detail/1-1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_walks_every_result_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(3, 3));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.links_saved, 9);
    assert_eq!(crawl.state().page, 3);
    assert_eq!(
        site.clicks(),
        vec![SUBMIT.to_string(), NEXT.to_string(), NEXT.to_string()]
    );

    let links = saved_links(&dir).await;
    assert_eq!(links.len(), 9);
    assert!(links.contains(&"https://listings.example.com/detail/3-2".to_string()));

    let raw = std::fs::read_to_string(dir.path().join(LINKS_FILE_NAME)).unwrap();
    assert_eq!(raw.lines().count(), 9);
    assert!(raw.lines().all(|line| line.ends_with(' ')));
    assert!(raw.ends_with(" \n"));
}

#[tokio::test]
async fn test_windows_are_strict_barriers() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        ScriptedSite::paged(1, 6).with_delay("/detail/1-0", Duration::from_millis(200)),
    );
    let config = CrawlerConfig {
        max_concurrent: 3,
        ..config()
    };

    let mut crawl = controller(&site, plan(), config, &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.windows_dispatched, 2);
    assert_eq!(report.links_saved, 6);

    let slow_end = site.position("end:/detail/1-0");
    for second_window in ["start:/detail/1-3", "start:/detail/1-4", "start:/detail/1-5"] {
        assert!(site.position(second_window) > slow_end);
    }
    for fast in ["end:/detail/1-1", "end:/detail/1-2"] {
        assert!(site.position(fast) < slow_end);
    }
}

#[tokio::test]
async fn test_twenty_five_links_run_in_three_windows() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(1, 25));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.windows_dispatched, 3);
    assert_eq!(report.links_dispatched, 25);
    assert_eq!(report.links_saved, 25);
    assert!(site.peak_in_flight.load(Ordering::SeqCst) <= 10);
    assert_eq!(saved_links(&dir).await.len(), 25);
}

#[tokio::test]
async fn test_error_budget_fails_on_tenth_fault() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(2, 2).with_detail_faults(usize::MAX));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let err = crawl.run().await.unwrap_err();

    match err {
        HarvestError::ErrorBudgetExhausted { attempts, source } => {
            assert_eq!(attempts, 10);
            assert!(matches!(*source, HarvestError::ElementNotFound { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(site.detail_waits.load(Ordering::SeqCst), 10);
    assert_eq!(crawl.state().phase, CrawlPhase::Failed);
    assert!(saved_links(&dir).await.is_empty());
}

#[tokio::test]
async fn test_recovers_before_budget_is_spent() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(1, 2).with_detail_faults(9));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.links_saved, 2);
    assert_eq!(crawl.state().consecutive_errors, 9);
}

#[tokio::test]
async fn test_failed_link_query_retries_same_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(1, 2).with_query_faults(1));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.links_saved, 2);
    assert_eq!(crawl.state().consecutive_errors, 1);
    assert_eq!(site.query_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        saved_links(&dir).await,
        vec![
            "https://listings.example.com/detail/1-0".to_string(),
            "https://listings.example.com/detail/1-1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failing_link_query_exhausts_budget() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(2, 2).with_query_faults(usize::MAX));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let err = crawl.run().await.unwrap_err();

    assert!(matches!(
        err,
        HarvestError::ErrorBudgetExhausted { attempts: 10, .. }
    ));
    assert_eq!(site.clicks(), vec![SUBMIT.to_string()]);
    assert!(saved_links(&dir).await.is_empty());
}

#[tokio::test]
async fn test_empty_page_advances_without_dispatching() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        ScriptedSite::new(vec![vec![], vec!["/detail/a", "/detail/b"]])
            .with_visible_empty_pages(),
    );

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.links_dispatched, 2);
    assert_eq!(report.windows_dispatched, 1);
    assert_eq!(crawl.state().page, 2);
    assert_eq!(crawl.state().consecutive_errors, 0);
    assert_eq!(site.clicks(), vec![SUBMIT.to_string(), NEXT.to_string()]);
    assert_eq!(site.query_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        saved_links(&dir).await,
        vec![
            "https://listings.example.com/detail/a".to_string(),
            "https://listings.example.com/detail/b".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_limit_stops_mid_crawl() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(3, 4));
    let config = CrawlerConfig {
        max_concurrent: 4,
        limit: Some(6),
        ..config()
    };

    let mut crawl = controller(&site, plan(), config, &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.links_dispatched, 6);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.windows_dispatched, 2);
    assert_eq!(site.clicks(), vec![SUBMIT.to_string(), NEXT.to_string()]);
    assert_eq!(saved_links(&dir).await.len(), 6);
}

#[tokio::test]
async fn test_repeated_links_are_saved_once() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new(vec![
        vec!["/detail/a", "/detail/b"],
        vec!["/detail/b", "https://listings.example.com/detail/a", "/detail/c"],
    ]));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.links_dispatched, 5);
    assert_eq!(report.links_saved, 3);
    assert_eq!(report.links_skipped, 2);
    assert_eq!(saved_links(&dir).await.len(), 3);
}

#[tokio::test]
async fn test_unusable_hrefs_are_skipped() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::new(vec![vec![
        "/detail/ok",
        "#",
        "javascript:void(0)",
        "   ",
        "JSHandle@node",
    ]]));

    let mut crawl = controller(&site, plan(), config(), &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.links_saved, 1);
    assert_eq!(report.links_skipped, 4);
    assert_eq!(report.links_failed, 0);
    assert_eq!(
        saved_links(&dir).await,
        vec!["https://listings.example.com/detail/ok".to_string()]
    );
}

#[tokio::test]
async fn test_search_steps_run_in_order() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        ScriptedSite::paged(1, 1)
            .with_control(ACCEPT_COOKIES)
            .with_control(SORT_NEWEST),
    );
    let mut plan = plan();
    plan.pre_search_steps = vec![ElementRef::css(ACCEPT_COOKIES)];
    plan.post_search_steps = vec![ElementRef::css(SORT_NEWEST)];

    let mut crawl = controller(&site, plan, config(), &dir);
    crawl.run().await.unwrap();

    assert_eq!(
        site.clicks(),
        vec![
            ACCEPT_COOKIES.to_string(),
            SUBMIT.to_string(),
            SORT_NEWEST.to_string()
        ]
    );
    assert_eq!(
        site.events()[0],
        "navigate:https://listings.example.com/search"
    );
}

#[tokio::test]
async fn test_skip_search_never_clicks_submit() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(ScriptedSite::paged(2, 1).with_control(SORT_NEWEST));
    let mut plan = plan();
    plan.skip_search = true;
    plan.post_search_steps = vec![ElementRef::css(SORT_NEWEST)];

    let mut crawl = controller(&site, plan, config(), &dir);
    let report = crawl.run().await.unwrap();

    assert_eq!(report.pages_visited, 2);
    assert_eq!(
        site.clicks(),
        vec![SORT_NEWEST.to_string(), NEXT.to_string()]
    );
}
