// TestDependencies - in-memory stores and mock services for testing
//
// Everything here implements the same traits as the Postgres/HTTP versions so
// the importer engine and orchestrator run unchanged against memory state.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{BaseAssetDownloader, BaseBookScraper, EventBus, IngestDeps};
use crate::common::{ChapterId, ImportRunId, NovelId, ProposalId, UserId};
use crate::domains::grants::{GrantAmount, GrantKind, GrantLog, GrantStore, GrantUser, TicketGrant};
use crate::domains::import_runs::models::{clamp_list_limit, PROPOSAL_ACCEPTED, PROPOSAL_VOTING};
use crate::domains::import_runs::{
    ImportRun, ImportRunStatus, ImportRunStore, Proposal, ProposalReleased, ProposalStore,
    RunCookieStore, RunOutcome,
};
use crate::domains::importing::slug::disambiguate;
use crate::domains::importing::{
    Checkpoint, ChapterRecord, ImporterRegistry, NovelShell, NovelStore, ProposalImporter,
};
use crate::domains::scraping::{Book, Chapter, ChapterRef, ScrapeError, ScrapeResult};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Book Scraper
// =============================================================================

struct MockScraperState {
    title: String,
    chapters: usize,
    first_number: Option<i32>,
    chapter_titles: bool,
    block_from: Mutex<Option<usize>>,
    fail_with: Option<String>,
    chapter_calls: AtomicUsize,
}

/// Serves a synthetic book at `https://books.test/...` with `n` chapters.
#[derive(Clone)]
pub struct MockBookScraper {
    state: Arc<MockScraperState>,
}

impl MockBookScraper {
    pub fn with_chapters(title: &str, chapters: usize) -> Self {
        Self {
            state: Arc::new(MockScraperState {
                title: title.to_string(),
                chapters,
                first_number: None,
                chapter_titles: true,
                block_from: Mutex::new(None),
                fail_with: None,
                chapter_calls: AtomicUsize::new(0),
            }),
        }
    }

    fn rebuild(self, f: impl FnOnce(&mut MockScraperState)) -> Self {
        let mut state = MockScraperState {
            title: self.state.title.clone(),
            chapters: self.state.chapters,
            first_number: self.state.first_number,
            chapter_titles: self.state.chapter_titles,
            block_from: Mutex::new(*lock(&self.state.block_from)),
            fail_with: self.state.fail_with.clone(),
            chapter_calls: AtomicUsize::new(0),
        };
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Listing declares chapter numbers starting at `first`.
    pub fn with_declared_numbers(self, first: i32) -> Self {
        self.rebuild(|s| s.first_number = Some(first))
    }

    /// Chapter pages carry no title of their own.
    pub fn without_chapter_titles(self) -> Self {
        self.rebuild(|s| s.chapter_titles = false)
    }

    /// Chapters at `index` and later hang until the run is cancelled.
    pub fn block_from(self, index: usize) -> Self {
        self.rebuild(|s| s.block_from = Mutex::new(Some(index)))
    }

    pub fn unblock(&self) {
        *lock(&self.state.block_from) = None;
    }

    /// Every chapter fetch fails with `message`.
    pub fn fail_chapters_with(self, message: &str) -> Self {
        let message = message.to_string();
        self.rebuild(|s| s.fail_with = Some(message))
    }

    pub fn chapter_calls(&self) -> usize {
        self.state.chapter_calls.load(Ordering::SeqCst)
    }

    fn chapter_url(index: usize) -> String {
        format!("https://books.test/chapters/{index}")
    }
}

#[async_trait]
impl BaseBookScraper for MockBookScraper {
    async fn scrape_book(&self, _url: &str) -> ScrapeResult<Book> {
        let chapters = (0..self.state.chapters)
            .map(|i| ChapterRef {
                url: Self::chapter_url(i),
                title: format!("第{}章", i + 1),
                number: self.state.first_number.map(|first| first + i as i32),
            })
            .collect();
        Ok(Book {
            title: self.state.title.clone(),
            cover_url: Some("https://books.test/cover.jpg".to_string()),
            description: Some("简介".to_string()),
            author: Some("作者".to_string()),
            chapters,
            ..Default::default()
        })
    }

    async fn scrape_chapter(&self, url: &str) -> ScrapeResult<Chapter> {
        self.state.chapter_calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = url
            .rsplit('/')
            .next()
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| ScrapeError::parse(url, "unknown chapter"))?;

        let blocked = lock(&self.state.block_from).is_some_and(|from| index >= from);
        if blocked {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &self.state.fail_with {
            return Err(ScrapeError::parse(url, message.clone()));
        }

        Ok(Chapter {
            url: url.to_string(),
            title: if self.state.chapter_titles {
                format!("第{}章 标题", index + 1)
            } else {
                String::new()
            },
            content: format!("第{}章的正文", index + 1),
        })
    }
}

// =============================================================================
// Mock Asset Downloader
// =============================================================================

#[derive(Default)]
pub struct MockAssetDownloader {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl MockAssetDownloader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BaseAssetDownloader for MockAssetDownloader {
    async fn download_cover(&self, url: &str, novel_id: NovelId, _upload_dir: &Path) -> Result<String> {
        lock(&self.calls).push(url.to_string());
        if self.fail {
            anyhow::bail!("cover download {url}: status=404");
        }
        Ok(format!("covers/{novel_id}.jpg"))
    }
}

// =============================================================================
// Memory Novel Store
// =============================================================================

#[derive(Default)]
struct MemoryNovels {
    shells: HashMap<NovelId, NovelShell>,
    chapters: BTreeMap<(NovelId, i32), (ChapterId, ChapterRecord)>,
    chapter_writes: usize,
}

#[derive(Default)]
pub struct MemoryNovelStore {
    inner: Mutex<MemoryNovels>,
}

impl MemoryNovelStore {
    pub fn novel_count(&self) -> usize {
        lock(&self.inner).shells.len()
    }

    pub fn shell(&self, novel_id: NovelId) -> Option<NovelShell> {
        lock(&self.inner).shells.get(&novel_id).cloned()
    }

    pub fn chapter_numbers(&self, novel_id: NovelId) -> Vec<i32> {
        lock(&self.inner)
            .chapters
            .keys()
            .filter(|(id, _)| *id == novel_id)
            .map(|(_, number)| *number)
            .collect()
    }

    pub fn chapter_titles(&self, novel_id: NovelId) -> Vec<Option<String>> {
        lock(&self.inner)
            .chapters
            .iter()
            .filter(|((id, _), _)| *id == novel_id)
            .map(|(_, (_, record))| record.title.clone())
            .collect()
    }

    /// Upserts performed, including ones that updated an existing chapter.
    pub fn chapter_writes(&self) -> usize {
        lock(&self.inner).chapter_writes
    }
}

#[async_trait]
impl NovelStore for MemoryNovelStore {
    async fn create_novel_shell(&self, shell: &NovelShell) -> Result<String> {
        let mut inner = lock(&self.inner);
        let taken = inner
            .shells
            .values()
            .any(|s| s.slug == shell.slug && s.id != shell.id);
        let mut stored = shell.clone();
        if taken {
            stored.slug = disambiguate(&shell.slug, shell.id);
        }
        let slug = stored.slug.clone();
        inner.shells.entry(shell.id).or_insert(stored);
        Ok(slug)
    }

    async fn upsert_chapter(&self, chapter: &ChapterRecord) -> Result<ChapterId> {
        let mut inner = lock(&self.inner);
        if !inner.shells.contains_key(&chapter.novel_id) {
            anyhow::bail!("novel {} does not exist", chapter.novel_id);
        }
        inner.chapter_writes += 1;
        let key = (chapter.novel_id, chapter.number);
        let id = inner
            .chapters
            .get(&key)
            .map(|(id, _)| *id)
            .unwrap_or_else(ChapterId::new);
        inner.chapters.insert(key, (id, chapter.clone()));
        Ok(id)
    }
}

// =============================================================================
// Memory Run Store (runs, run cookies, proposals)
// =============================================================================

#[derive(Default)]
struct MemoryRuns {
    runs: HashMap<ImportRunId, ImportRun>,
    progress: HashMap<ImportRunId, Vec<usize>>,
    cookies: HashMap<ImportRunId, String>,
    proposals: HashMap<ProposalId, Proposal>,
}

#[derive(Default)]
pub struct MemoryRunStore {
    inner: Mutex<MemoryRuns>,
    fail_links: AtomicBool,
}

impl MemoryRunStore {
    pub fn add_proposal(&self, original_link: &str) -> ProposalId {
        self.add_proposal_with_score(original_link, 0)
    }

    pub fn add_proposal_with_score(&self, original_link: &str, vote_score: i64) -> ProposalId {
        let now = Utc::now();
        let proposal = Proposal {
            id: ProposalId::new(),
            original_link: original_link.to_string(),
            status: PROPOSAL_VOTING.to_string(),
            novel_id: None,
            vote_score,
            created_at: now,
            updated_at: now,
        };
        let id = proposal.id;
        lock(&self.inner).proposals.insert(id, proposal);
        id
    }

    /// Make `set_proposal_novel_id` fail.
    pub fn fail_proposal_links(&self) {
        self.fail_links.store(true, Ordering::SeqCst);
    }

    pub fn proposal(&self, id: ProposalId) -> Option<Proposal> {
        lock(&self.inner).proposals.get(&id).cloned()
    }

    pub fn run(&self, id: ImportRunId) -> Option<ImportRun> {
        lock(&self.inner).runs.get(&id).cloned()
    }

    pub fn runs_for_proposal(&self, proposal_id: ProposalId) -> Vec<ImportRun> {
        lock(&self.inner)
            .runs
            .values()
            .filter(|r| r.proposal_id == proposal_id)
            .cloned()
            .collect()
    }

    /// Every `progress_current` value written for the run, in order.
    pub fn progress_history(&self, id: ImportRunId) -> Vec<usize> {
        lock(&self.inner)
            .progress
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn cookie(&self, id: ImportRunId) -> Option<String> {
        lock(&self.inner).cookies.get(&id).cloned()
    }

    fn update(&self, id: ImportRunId, f: impl FnOnce(&mut ImportRun)) {
        if let Some(run) = lock(&self.inner).runs.get_mut(&id) {
            f(run);
            run.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl ImportRunStore for MemoryRunStore {
    async fn create(
        &self,
        id: ImportRunId,
        proposal_id: ProposalId,
        importer_name: &str,
    ) -> Result<ImportRun> {
        let now = Utc::now();
        let mut inner = lock(&self.inner);
        let run = inner.runs.entry(id).or_insert_with(|| ImportRun {
            id,
            proposal_id,
            importer_name: importer_name.to_string(),
            status: ImportRunStatus::Created,
            checkpoint: None,
            progress_current: 0,
            progress_total: 0,
            novel_id: None,
            error_message: None,
            cloudflare_blocked: false,
            started_at: Some(now),
            finished_at: None,
            created_at: now,
            updated_at: now,
        });
        if run.status != ImportRunStatus::PauseRequested {
            run.status = ImportRunStatus::Running;
        }
        run.importer_name = importer_name.to_string();
        run.error_message = None;
        run.cloudflare_blocked = false;
        run.finished_at = None;
        run.updated_at = now;
        Ok(run.clone())
    }

    async fn get_by_id(&self, id: ImportRunId) -> Result<Option<ImportRun>> {
        Ok(self.run(id))
    }

    async fn set_status(&self, id: ImportRunId, status: ImportRunStatus) -> Result<()> {
        self.update(id, |run| run.status = status);
        Ok(())
    }

    async fn update_progress(
        &self,
        id: ImportRunId,
        current: usize,
        total: usize,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        self.update(id, |run| {
            run.progress_current = current as i32;
            run.progress_total = total as i32;
            run.checkpoint = Some(checkpoint.encode());
        });
        lock(&self.inner).progress.entry(id).or_default().push(current);
        Ok(())
    }

    async fn set_novel_id(&self, id: ImportRunId, novel_id: NovelId) -> Result<()> {
        self.update(id, |run| run.novel_id = Some(novel_id));
        Ok(())
    }

    async fn set_result(&self, id: ImportRunId, outcome: RunOutcome) -> Result<()> {
        self.update(id, |run| {
            run.status = outcome.status;
            if outcome.novel_id.is_some() {
                run.novel_id = outcome.novel_id;
            }
            run.error_message = outcome.error_message;
            run.cloudflare_blocked = outcome.cloudflare_blocked;
            run.finished_at = Some(Utc::now());
        });
        Ok(())
    }

    async fn list(&self, status: Option<ImportRunStatus>, limit: Option<i64>) -> Result<Vec<ImportRun>> {
        let mut runs: Vec<ImportRun> = lock(&self.inner)
            .runs
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(clamp_list_limit(limit) as usize);
        Ok(runs)
    }
}

#[async_trait]
impl RunCookieStore for MemoryRunStore {
    async fn get_by_run_id(&self, run_id: ImportRunId) -> Result<Option<String>> {
        Ok(self.cookie(run_id))
    }

    async fn upsert(&self, run_id: ImportRunId, cookie_header: &str) -> Result<()> {
        lock(&self.inner)
            .cookies
            .insert(run_id, cookie_header.to_string());
        Ok(())
    }

    async fn delete(&self, run_id: ImportRunId) -> Result<()> {
        lock(&self.inner).cookies.remove(&run_id);
        Ok(())
    }
}

#[async_trait]
impl ProposalStore for MemoryRunStore {
    async fn get_proposal_by_id(&self, id: ProposalId) -> Result<Option<Proposal>> {
        Ok(self.proposal(id))
    }

    async fn set_proposal_novel_id(&self, id: ProposalId, novel_id: NovelId) -> Result<()> {
        if self.fail_links.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset while linking proposal {id}");
        }
        match lock(&self.inner).proposals.get_mut(&id) {
            Some(proposal) => {
                proposal.novel_id = Some(novel_id);
                Ok(())
            }
            None => anyhow::bail!("proposal {id} not found"),
        }
    }

    async fn accept_top_voting(&self) -> Result<Option<Proposal>> {
        let mut inner = lock(&self.inner);
        let top = inner
            .proposals
            .values()
            .filter(|p| p.status == PROPOSAL_VOTING)
            .max_by(|a, b| {
                a.vote_score
                    .cmp(&b.vote_score)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            })
            .map(|p| p.id);
        let Some(id) = top else {
            return Ok(None);
        };
        let proposal = inner.proposals.get_mut(&id).map(|p| {
            p.status = PROPOSAL_ACCEPTED.to_string();
            p.updated_at = Utc::now();
            p.clone()
        });
        Ok(proposal)
    }
}

// =============================================================================
// Mock Importer
// =============================================================================

/// Importer for `books.test` backed by a [`MockBookScraper`].
pub struct MockImporter {
    scraper: MockBookScraper,
    cookies_seen: Mutex<Vec<Option<String>>>,
}

impl MockImporter {
    pub fn new(scraper: MockBookScraper) -> Self {
        Self {
            scraper,
            cookies_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn cookies_seen(&self) -> Vec<Option<String>> {
        lock(&self.cookies_seen).clone()
    }
}

#[async_trait]
impl ProposalImporter for MockImporter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn hosts(&self) -> &'static [&'static str] {
        &["books.test"]
    }

    fn build_scraper(
        &self,
        cookie_header: Option<&str>,
        _chapters_limit: usize,
    ) -> ScrapeResult<Box<dyn BaseBookScraper>> {
        lock(&self.cookies_seen).push(cookie_header.map(str::to_string));
        Ok(Box::new(self.scraper.clone()))
    }
}

// =============================================================================
// Memory Grant Store
// =============================================================================

#[derive(Default)]
struct MemoryGrants {
    users: Vec<GrantUser>,
    balances: HashMap<(UserId, &'static str), i32>,
    transactions: HashMap<String, i32>,
    logs: HashMap<(GrantKind, NaiveDate), GrantLog>,
}

/// Ledger and grant logs held in memory. Keys behave like the unique
/// `idempotency_key` column.
#[derive(Default)]
pub struct MemoryGrantStore {
    inner: Mutex<MemoryGrants>,
    fail_batches: AtomicBool,
}

impl MemoryGrantStore {
    pub fn add_user(&self, user: GrantUser) -> UserId {
        let id = user.user_id;
        lock(&self.inner).users.push(user);
        id
    }

    pub fn set_balance(&self, user_id: UserId, ticket_type: &'static str, balance: i32) {
        lock(&self.inner)
            .balances
            .insert((user_id, ticket_type), balance);
    }

    pub fn balance(&self, user_id: UserId, ticket_type: &'static str) -> i32 {
        lock(&self.inner)
            .balances
            .get(&(user_id, ticket_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        lock(&self.inner).transactions.len()
    }

    /// Make `user_batch` fail.
    pub fn fail_user_batches(&self) {
        self.fail_batches.store(true, Ordering::SeqCst);
    }

    fn update_log(&self, kind: GrantKind, date: NaiveDate, f: impl FnOnce(&mut GrantLog)) {
        if let Some(log) = lock(&self.inner).logs.get_mut(&(kind, date)) {
            f(log);
        }
    }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
    async fn user_batch(&self, limit: i64, offset: i64) -> Result<Vec<GrantUser>> {
        if self.fail_batches.load(Ordering::SeqCst) {
            anyhow::bail!("users unavailable");
        }
        Ok(lock(&self.inner)
            .users
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn apply(&self, grant: &TicketGrant) -> Result<bool> {
        let mut inner = lock(&self.inner);
        if inner.transactions.contains_key(&grant.idempotency_key) {
            return Ok(false);
        }
        let balance = inner
            .balances
            .entry((grant.user_id, grant.ticket_type))
            .or_insert(0);
        let delta = match grant.amount {
            GrantAmount::Credit(n) => n,
            GrantAmount::SetTo(n) => n - *balance,
        };
        *balance += delta;
        inner
            .transactions
            .insert(grant.idempotency_key.clone(), delta);
        Ok(true)
    }

    async fn start_log(&self, kind: GrantKind, date: NaiveDate) -> Result<()> {
        let log = GrantLog {
            grant_date: date,
            status: "running".to_string(),
            users_processed: 0,
            tickets_granted: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        };
        lock(&self.inner).logs.insert((kind, date), log);
        Ok(())
    }

    async fn complete_log(
        &self,
        kind: GrantKind,
        date: NaiveDate,
        users_processed: i32,
        tickets_granted: i32,
    ) -> Result<()> {
        self.update_log(kind, date, |log| {
            log.status = "completed".to_string();
            log.users_processed = users_processed;
            log.tickets_granted = tickets_granted;
            log.completed_at = Some(Utc::now());
        });
        Ok(())
    }

    async fn fail_log(&self, kind: GrantKind, date: NaiveDate, error: &str) -> Result<()> {
        self.update_log(kind, date, |log| {
            log.status = "failed".to_string();
            log.error_message = Some(error.to_string());
            log.completed_at = Some(Utc::now());
        });
        Ok(())
    }

    async fn latest_log(&self, kind: GrantKind) -> Result<Option<GrantLog>> {
        Ok(lock(&self.inner)
            .logs
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .max_by_key(|((_, date), _)| *date)
            .map(|(_, log)| log.clone()))
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub runs: Arc<MemoryRunStore>,
    pub novels: Arc<MemoryNovelStore>,
    pub assets: Arc<MockAssetDownloader>,
    pub importer: Arc<MockImporter>,
    pub bus: EventBus,
    pub upload_dir: PathBuf,
    pub run_timeout: Duration,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(MemoryRunStore::default()),
            novels: Arc::new(MemoryNovelStore::default()),
            assets: Arc::new(MockAssetDownloader::default()),
            importer: Arc::new(MockImporter::new(MockBookScraper::with_chapters("测试书", 3))),
            bus: EventBus::new(),
            upload_dir: std::env::temp_dir().join("ingest-test-uploads"),
            run_timeout: Duration::from_secs(60),
        }
    }

    /// Set the scraper behind the `books.test` importer
    pub fn mock_scraper(mut self, scraper: MockBookScraper) -> Self {
        self.importer = Arc::new(MockImporter::new(scraper));
        self
    }

    /// Set the asset downloader
    pub fn mock_assets(mut self, assets: MockAssetDownloader) -> Self {
        self.assets = Arc::new(assets);
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Record every `ProposalReleased` published on the bus.
    pub fn capture_released(&self) -> Arc<Mutex<Vec<(ProposalId, NovelId)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        self.bus.on::<ProposalReleased, _, _>(move |event| {
            lock(&sink).push((event.proposal_id, event.novel_id));
            async { Ok(()) }
        });
        seen
    }

    pub fn ingest_deps(&self) -> IngestDeps {
        IngestDeps {
            runs: self.runs.clone(),
            run_cookies: self.runs.clone(),
            proposals: self.runs.clone(),
            novels: self.novels.clone(),
            assets: self.assets.clone(),
            importers: ImporterRegistry::new(vec![self.importer.clone() as Arc<dyn ProposalImporter>]),
            bus: self.bus.clone(),
            upload_dir: self.upload_dir.clone(),
            run_timeout: self.run_timeout,
        }
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
