use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::content::{now_millis, ContentItem, ItemStore, StoreError};
use crate::editor::types::*;
use crate::gemini::{GenerationError, GenerationGateway};

const DRAFT_SUBJECT_FALLBACK: &str = "Generic Topic";
const THUMBNAIL_SUBJECT_FALLBACK: &str = "Generic Content";

type PendingGeneration = Pin<Box<dyn Future<Output = GenerationOutcome> + Send + 'static>>;

struct SessionInner {
    open: bool,
    is_new: bool,
    draft: WorkingDraft,
    tab: EditorTab,
    busy: bool,
    error: Option<String>,
    /// Advanced on every open/commit/discard; a generation result is only
    /// applied while the epoch it started under is current.
    epoch: u64,
}

/// Releases the busy flag when a generation future is dropped before it
/// finishes (aborted task, caller-side timeout).
struct BusyGuard {
    session: EditorSession,
    epoch: u64,
    finished: bool,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.session.lock();
        if inner.busy && inner.epoch == self.epoch {
            inner.busy = false;
            tracing::debug!(epoch = self.epoch, "generation cancelled");
        }
    }
}

/// Edit transaction over one (possibly new) content item.
///
/// Clones share the same session, so a generation task can hold one while
/// the caller keeps editing, commits or discards through another.
#[derive(Clone)]
pub struct EditorSession {
    inner: Arc<Mutex<SessionInner>>,
    gateway: Arc<GenerationGateway>,
}

impl EditorSession {
    pub fn new(gateway: Arc<GenerationGateway>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                open: false,
                is_new: false,
                draft: WorkingDraft::new_at(0),
                tab: EditorTab::Details,
                busy: false,
                error: None,
                epoch: 0,
            })),
            gateway,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start editing a new item with default fields
    pub fn open_new(&self) {
        self.reset(WorkingDraft::new(), true);
    }

    /// Start editing a copy of an existing item
    pub fn open_existing(&self, item: &ContentItem) {
        self.reset(WorkingDraft::from(item), false);
    }

    fn reset(&self, draft: WorkingDraft, is_new: bool) {
        let mut inner = self.lock();
        inner.open = true;
        inner.is_new = is_new;
        inner.draft = draft;
        inner.tab = EditorTab::Details;
        inner.busy = false;
        inner.error = None;
        inner.epoch += 1;
        tracing::debug!(epoch = inner.epoch, is_new, "editor session opened");
    }

    pub fn state(&self) -> SessionState {
        let inner = self.lock();
        match (inner.open, inner.busy) {
            (false, _) => SessionState::Closed,
            (true, false) => SessionState::Idle,
            (true, true) => SessionState::Busy,
        }
    }

    pub fn is_busy(&self) -> bool {
        let inner = self.lock();
        inner.open && inner.busy
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn tab(&self) -> EditorTab {
        self.lock().tab
    }

    pub fn set_tab(&self, tab: EditorTab) {
        self.lock().tab = tab;
    }

    /// Snapshot of the working draft
    pub fn draft(&self) -> WorkingDraft {
        self.lock().draft.clone()
    }

    /// Change working draft fields. Allowed while a generation call runs.
    pub fn edit<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut WorkingDraft),
    {
        let mut inner = self.lock();
        if !inner.open {
            return Err(SessionError::Closed);
        }
        f(&mut inner.draft);
        Ok(())
    }

    // ==================== Generation ====================

    pub async fn generate_draft(&self) -> GenerationOutcome {
        self.run(GenerationKind::Draft).await
    }

    pub async fn generate_thumbnail(&self) -> GenerationOutcome {
        self.run(GenerationKind::Thumbnail).await
    }

    pub async fn suggest_ideas(&self) -> GenerationOutcome {
        self.run(GenerationKind::Ideas).await
    }

    pub async fn run(&self, kind: GenerationKind) -> GenerationOutcome {
        match self.prepare(kind) {
            Ok(pending) => pending.await,
            Err(outcome) => outcome,
        }
    }

    /// Start a generation call on a background task. The session is marked
    /// busy before this returns.
    pub fn spawn(&self, kind: GenerationKind) -> JoinHandle<GenerationOutcome> {
        match self.prepare(kind) {
            Ok(pending) => tokio::spawn(pending),
            Err(outcome) => tokio::spawn(async move { outcome }),
        }
    }

    fn prepare(&self, kind: GenerationKind) -> Result<PendingGeneration, GenerationOutcome> {
        let (epoch, draft) = self.begin(kind)?;
        let session = self.clone();
        let mut guard = BusyGuard {
            session: self.clone(),
            epoch,
            finished: false,
        };

        Ok(Box::pin(async move {
            tracing::debug!(?kind, epoch, "generation started");
            let gateway = &session.gateway;
            let result = match kind {
                GenerationKind::Draft => {
                    gateway
                        .generate_draft(
                            &draft.subject_or(DRAFT_SUBJECT_FALLBACK),
                            draft.content_type,
                            draft.platform,
                            &draft.research_notes,
                        )
                        .await
                }
                GenerationKind::Thumbnail => {
                    gateway
                        .generate_thumbnail(
                            &draft.subject_or(THUMBNAIL_SUBJECT_FALLBACK),
                            draft.platform,
                        )
                        .await
                }
                GenerationKind::Ideas => gateway.suggest_ideas(&draft.research_notes).await,
            };
            let outcome = session.finish(kind, epoch, result);
            guard.finished = true;
            outcome
        }))
    }

    fn begin(&self, kind: GenerationKind) -> Result<(u64, WorkingDraft), GenerationOutcome> {
        let mut inner = self.lock();

        if !inner.open {
            return Err(GenerationOutcome::Closed);
        }
        if inner.busy {
            tracing::debug!(?kind, "generation already in progress");
            return Err(GenerationOutcome::Busy);
        }
        if kind == GenerationKind::Ideas && inner.draft.research_notes.trim().is_empty() {
            let message = "Please add notes first.".to_string();
            inner.error = Some(message.clone());
            return Err(GenerationOutcome::Rejected(message));
        }

        inner.busy = true;
        inner.error = None;
        Ok((inner.epoch, inner.draft.clone()))
    }

    fn finish(
        &self,
        kind: GenerationKind,
        epoch: u64,
        result: Result<String, GenerationError>,
    ) -> GenerationOutcome {
        let mut inner = self.lock();

        if !inner.open || inner.epoch != epoch {
            tracing::info!(?kind, "session closed before generation finished; result dropped");
            return GenerationOutcome::Disregarded;
        }
        inner.busy = false;

        match result {
            Ok(text) => {
                match kind {
                    GenerationKind::Draft => inner.draft.draft_content = text,
                    GenerationKind::Thumbnail => inner.draft.thumbnail_url = Some(text),
                    GenerationKind::Ideas => {
                        let merged = append_ideas(&inner.draft.draft_content, &text);
                        inner.draft.draft_content = merged;
                    }
                }
                GenerationOutcome::Applied
            }
            Err(e) => {
                inner.error = Some(kind.error_message(&e));
                GenerationOutcome::Failed(e)
            }
        }
    }

    // ==================== Commit / discard ====================

    /// Validate and write the working draft to the store, then close.
    pub fn commit(&self, store: &ItemStore) -> Result<ContentItem, SessionError> {
        let mut inner = self.lock();

        if !inner.open {
            return Err(SessionError::Closed);
        }
        if inner.draft.title.trim().is_empty() {
            let message = "Title is required".to_string();
            inner.error = Some(message.clone());
            return Err(SessionError::Validation(message));
        }

        let item = inner.draft.to_item(now_millis());
        let result = store.upsert(item.clone());

        // A save failure still leaves the item in the store's memory
        if matches!(result, Ok(()) | Err(StoreError::Persist(_))) {
            inner.open = false;
            inner.busy = false;
            inner.epoch += 1;
            tracing::info!(id = %item.id, is_new = inner.is_new, "content item committed");
        }

        result?;
        Ok(item)
    }

    /// Close without touching the store
    pub fn discard(&self) {
        let mut inner = self.lock();
        if inner.open {
            tracing::debug!(epoch = inner.epoch, "editor session discarded");
        }
        inner.open = false;
        inner.busy = false;
        inner.error = None;
        inner.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentStatus, ContentType, ItemPersistence, Platform, StorageError};
    use crate::gemini::{
        GatewayConfig, GenerationBackend, ImageRequest, InlineImage, TextRequest,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemoryPersistence {
        saved: Mutex<Vec<ContentItem>>,
    }

    impl ItemPersistence for MemoryPersistence {
        fn load(&self) -> Result<Vec<ContentItem>, StorageError> {
            Ok(self.saved.lock().unwrap().clone())
        }

        fn save(&self, items: &[ContentItem]) -> Result<(), StorageError> {
            *self.saved.lock().unwrap() = items.to_vec();
            Ok(())
        }
    }

    /// Backend whose calls block until `release` is notified (when gated)
    struct FakeBackend {
        credential: bool,
        reply: Result<String, ()>,
        image: Option<InlineImage>,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn replying(text: &str) -> Self {
            Self {
                credential: true,
                reply: Ok(text.to_string()),
                image: None,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for FakeBackend {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn generate_text(&self, _request: TextRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply.clone().map_err(|_| GenerationError::Api {
                status: 503,
                body: "unavailable".to_string(),
            })
        }

        async fn generate_image(
            &self,
            _request: ImageRequest,
        ) -> Result<Option<InlineImage>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.image.clone())
        }
    }

    fn setup(backend: FakeBackend) -> (EditorSession, ItemStore, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let gateway = Arc::new(GenerationGateway::new(
            backend.clone(),
            GatewayConfig {
                text_model: "text".to_string(),
                image_model: "image".to_string(),
                timeout: Duration::from_secs(5),
            },
        ));
        let store = ItemStore::open(Arc::new(MemoryPersistence::default())).unwrap();
        (EditorSession::new(gateway), store, backend)
    }

    fn existing_item() -> ContentItem {
        ContentItem {
            id: "item-1".to_string(),
            title: "Existing".to_string(),
            topic: "Lifetimes".to_string(),
            content_type: ContentType::Article,
            platform: Platform::Substack,
            status: ContentStatus::Research,
            research_notes: "notes".to_string(),
            draft_content: "old draft".to_string(),
            thumbnail_url: Some("https://example.com/a.png".to_string()),
            created_at: 1_000,
            updated_at: 2_000,
        }
    }

    #[test]
    fn test_new_session_commit_creates_item() {
        let (session, store, _) = setup(FakeBackend::replying(""));
        session.open_new();
        session
            .edit(|d| {
                d.title = "Ep 12: Async Rust".to_string();
                d.content_type = ContentType::Video;
                d.platform = Platform::YouTube;
                d.status = ContentStatus::Idea;
            })
            .unwrap();

        let committed = session.commit(&store).unwrap();

        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], committed);
        assert_eq!(items[0].title, "Ep 12: Async Rust");
        assert!(uuid::Uuid::parse_str(&items[0].id).is_ok());
        assert_eq!(items[0].created_at, items[0].updated_at);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_commit_with_empty_title_is_rejected() {
        let (session, store, _) = setup(FakeBackend::replying(""));
        session.open_new();

        let result = session.commit(&store);

        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(session.error().as_deref(), Some("Title is required"));
        assert_eq!(session.state(), SessionState::Idle);

        session.edit(|d| d.title = "   ".to_string()).unwrap();
        assert!(session.commit(&store).is_err());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_commit_existing_replaces_and_keeps_identity() {
        let (session, store, _) = setup(FakeBackend::replying(""));
        let original = existing_item();
        store.upsert(original.clone()).unwrap();

        session.open_existing(&original);
        assert_eq!(session.draft().title, "Existing");
        session.edit(|d| d.status = ContentStatus::Published).unwrap();
        let committed = session.commit(&store).unwrap();

        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(committed.id, "item-1");
        assert_eq!(committed.created_at, 1_000);
        assert!(committed.updated_at >= committed.created_at);
        assert_eq!(items[0].status, ContentStatus::Published);
    }

    #[test]
    fn test_commit_on_closed_session_fails() {
        let (session, store, _) = setup(FakeBackend::replying(""));
        assert!(matches!(session.commit(&store), Err(SessionError::Closed)));
        assert!(matches!(session.edit(|_| {}), Err(SessionError::Closed)));
    }

    #[test]
    fn test_open_resets_tab_and_error() {
        let (session, store, _) = setup(FakeBackend::replying(""));
        session.open_new();
        session.set_tab(EditorTab::Preview);
        let _ = session.commit(&store);

        session.open_existing(&existing_item());
        assert_eq!(session.tab(), EditorTab::Details);
        assert_eq!(session.error(), None);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_draft_generation_overwrites_content() {
        let (session, _, _) = setup(FakeBackend::replying("fresh draft"));
        session.open_existing(&existing_item());

        let outcome = session.generate_draft().await;

        assert!(outcome.is_applied());
        assert_eq!(session.draft().draft_content, "fresh draft");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_ideas_append_to_existing_draft() {
        let (session, _, _) = setup(FakeBackend::replying("1. Video\n2. Article\n3. Short"));
        session.open_existing(&existing_item());

        session.suggest_ideas().await;

        assert_eq!(
            session.draft().draft_content,
            "old draft\n\n---\n\n### AI Ideas Analysis\n1. Video\n2. Article\n3. Short"
        );
    }

    #[tokio::test]
    async fn test_ideas_without_notes_never_calls_backend() {
        let (session, _, backend) = setup(FakeBackend::replying("ideas"));
        session.open_new();

        let outcome = session.suggest_ideas().await;

        assert!(matches!(outcome, GenerationOutcome::Rejected(_)));
        assert_eq!(session.error().as_deref(), Some("Please add notes first."));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_is_data_url_and_commits_verbatim() {
        let mut backend = FakeBackend::replying("a bright desk setup");
        backend.image = Some(InlineImage {
            mime_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        });
        let (session, store, _) = setup(backend);
        session.open_existing(&existing_item());

        assert!(session.generate_thumbnail().await.is_applied());
        let url = session.draft().thumbnail_url.unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw==");

        let committed = session.commit(&store).unwrap();
        assert_eq!(committed.thumbnail_url.as_deref(), Some(url.as_str()));
        assert_eq!(store.get("item-1").unwrap().unwrap().thumbnail_url, Some(url));
    }

    #[tokio::test]
    async fn test_failed_call_keeps_draft_and_sets_error() {
        let mut backend = FakeBackend::replying("");
        backend.reply = Err(());
        let (session, store, _) = setup(backend);
        store.upsert(existing_item()).unwrap();
        session.open_existing(&existing_item());

        let outcome = session.generate_draft().await;

        assert!(matches!(outcome, GenerationOutcome::Failed(GenerationError::Api { .. })));
        assert_eq!(session.draft().draft_content, "old draft");
        assert_eq!(
            session.error().as_deref(),
            Some("Failed to generate draft. Check API Key.")
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(store.get("item-1").unwrap().unwrap(), existing_item());
    }

    #[tokio::test]
    async fn test_missing_credential_reports_distinct_error() {
        let mut backend = FakeBackend::replying("never");
        backend.credential = false;
        let (session, _, backend) = setup(backend);
        session.open_new();

        let outcome = session.generate_draft().await;

        assert!(matches!(
            outcome,
            GenerationOutcome::Failed(GenerationError::MissingCredential)
        ));
        assert_eq!(session.error().as_deref(), Some("API key not configured."));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_trigger_while_busy_is_noop() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::replying("done");
        backend.gate = Some(gate.clone());
        let (session, _, backend) = setup(backend);
        session.open_existing(&existing_item());

        let first = session.spawn(GenerationKind::Draft);
        assert_eq!(session.state(), SessionState::Busy);

        let second = session.generate_thumbnail().await;
        assert!(matches!(second, GenerationOutcome::Busy));

        // Editing unrelated fields stays possible while busy
        session.edit(|d| d.title = "Edited meanwhile".to_string()).unwrap();

        gate.notify_one();
        assert!(first.await.unwrap().is_applied());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.draft().title, "Edited meanwhile");
        assert_eq!(session.draft().draft_content, "done");
    }

    #[tokio::test]
    async fn test_result_after_discard_is_disregarded() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::replying("late draft");
        backend.gate = Some(gate.clone());
        let (session, store, _) = setup(backend);
        store.upsert(existing_item()).unwrap();
        let before = store.list().unwrap();
        session.open_existing(&existing_item());

        let pending = session.spawn(GenerationKind::Draft);
        session.discard();
        gate.notify_one();

        let outcome = pending.await.unwrap();
        assert!(matches!(outcome, GenerationOutcome::Disregarded));
        assert_eq!(store.list().unwrap(), before);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_result_after_reopen_does_not_leak_into_new_draft() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::replying("stale");
        backend.gate = Some(gate.clone());
        let (session, _, _) = setup(backend);
        session.open_existing(&existing_item());

        let pending = session.spawn(GenerationKind::Draft);
        session.discard();
        session.open_new();
        gate.notify_one();

        assert!(matches!(pending.await.unwrap(), GenerationOutcome::Disregarded));
        assert_eq!(session.draft().draft_content, "");
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_generation_releases_session() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::replying("eventually");
        backend.gate = Some(gate.clone());
        let (session, _, _) = setup(backend);
        session.open_existing(&existing_item());

        let pending = session.spawn(GenerationKind::Draft);
        assert_eq!(session.state(), SessionState::Busy);
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.draft().draft_content, "old draft");

        // Dropping a `run` future mid-call releases the session too
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), session.generate_draft()).await;
        assert!(timed_out.is_err());
        assert_eq!(session.state(), SessionState::Idle);

        gate.notify_one();
        assert!(session.generate_draft().await.is_applied());
        assert_eq!(session.draft().draft_content, "eventually");
    }

    #[tokio::test]
    async fn test_generation_on_closed_session() {
        let (session, _, backend) = setup(FakeBackend::replying("x"));
        assert!(matches!(session.generate_draft().await, GenerationOutcome::Closed));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
