//! In-memory stand-ins for every external seam, plus a [`Harness`] that wires
//! them into the real components.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Notify;

use crate::generation_client::types::{
    DimensionScore, GenerateRequest, RemoteStatus, ScoreRequest, TaskStatusReply, WriteRequest,
};
use crate::generation_client::{ChunkStream, GenerationError, GenerationService};
use crate::ids::IdAllocator;
use crate::models::content::{ModuleKind, ModuleSection, ResumeContent, ResumeData};
use crate::models::resume::{
    NewResume, NewScore, ResumeRow, ResumeScoreRow, TargetType, FILE_PATH_PENDING, STATUS_COMPLETED,
};
use crate::notify::{NotificationGuard, SlotLedger};
use crate::persistence::{
    DocumentStore, ObjectStore, PersistencePipeline, ResumeRepository, ResumeTx, StoreError,
};
use crate::relay::StreamRelay;
use crate::scoring::{ScoringEngine, ScoringRules};
use crate::state::AppState;
use crate::tasks::kv::{EphemeralStore, KvError};
use crate::tasks::monitor::TaskMonitor;
use crate::tasks::service::TaskService;
use crate::tasks::store::{TaskRecordStore, TaskStatus};
use crate::tasks::supervisor::Supervisor;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn upstream_error(message: &str) -> GenerationError {
    GenerationError::Api {
        status: 500,
        message: message.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ephemeral store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct KvEntry {
    fields: HashMap<String, String>,
    ttl: Option<Duration>,
}

#[derive(Default)]
struct KvState {
    entries: HashMap<String, KvEntry>,
    field_writes: HashMap<(String, String), usize>,
    failing: bool,
}

/// Expiry is recorded, never enforced.
#[derive(Default)]
pub struct MemoryKv {
    state: Mutex<KvState>,
}

impl MemoryKv {
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        lock(&self.state).entries.get(key).and_then(|e| e.ttl)
    }

    pub fn clear_ttl(&self, key: &str) {
        if let Some(entry) = lock(&self.state).entries.get_mut(key) {
            entry.ttl = None;
        }
    }

    /// Number of `set_field` calls for one field.
    pub fn writes_of(&self, key: &str, field: &str) -> usize {
        lock(&self.state)
            .field_writes
            .get(&(key.to_string(), field.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn fail_all(&self) {
        lock(&self.state).failing = true;
    }

    pub fn recover(&self) {
        lock(&self.state).failing = false;
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, KvState>, KvError> {
        let state = lock(&self.state);
        if state.failing {
            return Err(KvError::Backend("connection refused".into()));
        }
        Ok(state)
    }
}

#[async_trait]
impl EphemeralStore for MemoryKv {
    async fn create(
        &self,
        key: &str,
        fields: &[(&str, String)],
        ttl: Duration,
    ) -> Result<(), KvError> {
        let mut state = self.guard()?;
        let entry = state.entries.entry(key.to_string()).or_default();
        for (name, value) in fields {
            entry.fields.insert(name.to_string(), value.clone());
        }
        entry.ttl = Some(ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        Ok(self
            .guard()?
            .entries
            .get(key)
            .filter(|e| !e.fields.is_empty())
            .map(|e| e.fields.clone()))
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), KvError> {
        let mut state = self.guard()?;
        state
            .entries
            .entry(key.to_string())
            .or_default()
            .fields
            .insert(field.to_string(), value.to_string());
        *state
            .field_writes
            .entry((key.to_string(), field.to_string()))
            .or_default() += 1;
        Ok(())
    }

    async fn refresh_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        if let Some(entry) = self.guard()?.entries.get_mut(key) {
            entry.ttl = Some(ttl);
        }
        Ok(())
    }

    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, KvError> {
        let mut state = self.guard()?;
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        state.entries.insert(
            key.to_string(),
            KvEntry {
                fields: HashMap::new(),
                ttl: Some(ttl),
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), KvError> {
        self.guard()?.entries.remove(key);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation services
// ────────────────────────────────────────────────────────────────────────────

type StatusFn = Box<dyn Fn() -> Result<TaskStatusReply, GenerationError> + Send>;

/// What a scripted write stream does once its chunks run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTail {
    /// Never yields again.
    Pending,
    /// Ends the body.
    Close,
}

struct ScriptedStream {
    chunks: Vec<Bytes>,
    tail: StreamTail,
    dropped: Arc<AtomicBool>,
}

#[derive(Default)]
struct FakeState {
    statuses: VecDeque<Result<TaskStatusReply, GenerationError>>,
    status_fallback: Option<StatusFn>,
    status_calls: usize,
    submit_fails: bool,
    submitted: usize,
    scores: HashMap<ModuleKind, Vec<DimensionScore>>,
    failing_scores: HashSet<ModuleKind>,
    last_score_request: Option<ScoreRequest>,
    write_stream: Option<ScriptedStream>,
    write_stream_fails: bool,
    parsed_resume: Option<ResumeData>,
    parse_fails: bool,
    render_calls: usize,
}

/// Scriptable generation, scoring and data services.
#[derive(Default)]
pub struct FakeGeneration {
    state: Mutex<FakeState>,
}

impl FakeGeneration {
    /// Replies for successive status polls. Once exhausted, polls fall back to
    /// [`always_status`](Self::always_status) or PENDING.
    pub fn script_statuses<I>(&self, replies: I)
    where
        I: IntoIterator<Item = Result<TaskStatusReply, GenerationError>>,
    {
        lock(&self.state).statuses.extend(replies);
    }

    pub fn always_status<F>(&self, reply: F)
    where
        F: Fn() -> Result<TaskStatusReply, GenerationError> + Send + 'static,
    {
        lock(&self.state).status_fallback = Some(Box::new(reply));
    }

    pub fn status_calls(&self) -> usize {
        lock(&self.state).status_calls
    }

    pub fn fail_submit(&self) {
        lock(&self.state).submit_fails = true;
    }

    pub fn set_scores(&self, kind: ModuleKind, dimensions: Vec<DimensionScore>) {
        let mut state = lock(&self.state);
        state.failing_scores.remove(&kind);
        state.scores.insert(kind, dimensions);
    }

    pub fn fail_scoring(&self, kind: ModuleKind) {
        lock(&self.state).failing_scores.insert(kind);
    }

    pub fn last_score_request(&self) -> Option<ScoreRequest> {
        lock(&self.state).last_score_request.clone()
    }

    /// Returns a flag that flips once the stream handed to the relay is dropped.
    pub fn set_write_stream(&self, chunks: Vec<Bytes>, tail: StreamTail) -> Arc<AtomicBool> {
        let dropped = Arc::new(AtomicBool::new(false));
        lock(&self.state).write_stream = Some(ScriptedStream {
            chunks,
            tail,
            dropped: dropped.clone(),
        });
        dropped
    }

    pub fn fail_write_stream(&self) {
        lock(&self.state).write_stream_fails = true;
    }

    /// `None` makes structured extraction fail.
    pub fn set_parsed_resume(&self, data: Option<ResumeData>) {
        let mut state = lock(&self.state);
        state.parse_fails = data.is_none();
        state.parsed_resume = data;
    }

    pub fn render_calls(&self) -> usize {
        lock(&self.state).render_calls
    }
}

struct FakeChunkStream {
    chunks: VecDeque<Bytes>,
    tail: StreamTail,
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl ChunkStream for FakeChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        match self.tail {
            StreamTail::Close => Ok(None),
            StreamTail::Pending => std::future::pending().await,
        }
    }
}

impl Drop for FakeChunkStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationService for FakeGeneration {
    async fn submit_task(&self, _request: &GenerateRequest) -> Result<String, GenerationError> {
        let mut state = lock(&self.state);
        if state.submit_fails {
            return Err(upstream_error("submit rejected"));
        }
        state.submitted += 1;
        Ok(format!("task-{}", state.submitted))
    }

    async fn task_status(&self, _task_id: &str) -> Result<TaskStatusReply, GenerationError> {
        let mut state = lock(&self.state);
        state.status_calls += 1;
        if let Some(reply) = state.statuses.pop_front() {
            return reply;
        }
        match &state.status_fallback {
            Some(reply) => reply(),
            None => Ok(TaskStatusReply {
                status: RemoteStatus::Pending,
                result: None,
            }),
        }
    }

    async fn score_section(
        &self,
        request: &ScoreRequest,
    ) -> Result<Vec<DimensionScore>, GenerationError> {
        let mut state = lock(&self.state);
        state.last_score_request = Some(request.clone());
        let kind = request
            .section
            .keys()
            .next()
            .and_then(|title| ModuleKind::ALL.into_iter().find(|k| k.title() == title))
            .ok_or_else(|| upstream_error("unknown section"))?;
        if state.failing_scores.contains(&kind) {
            return Err(upstream_error("scorer unavailable"));
        }
        Ok(state.scores.get(&kind).cloned().unwrap_or_default())
    }

    async fn open_write_stream(
        &self,
        _request: &WriteRequest,
    ) -> Result<Box<dyn ChunkStream>, GenerationError> {
        let mut state = lock(&self.state);
        if state.write_stream_fails {
            return Err(upstream_error("writer unavailable"));
        }
        let scripted = state.write_stream.take().unwrap_or(ScriptedStream {
            chunks: Vec::new(),
            tail: StreamTail::Close,
            dropped: Arc::new(AtomicBool::new(false)),
        });
        Ok(Box::new(FakeChunkStream {
            chunks: scripted.chunks.into(),
            tail: scripted.tail,
            dropped: scripted.dropped,
        }))
    }

    async fn file_to_markdown(
        &self,
        file_name: &str,
        _content: Bytes,
    ) -> Result<String, GenerationError> {
        Ok(format!("# {file_name}\n"))
    }

    async fn markdown_to_resume(&self, _markdown: &str) -> Result<ResumeData, GenerationError> {
        let state = lock(&self.state);
        if state.parse_fails {
            return Err(GenerationError::Rejected("resume extraction failed".into()));
        }
        Ok(state.parsed_resume.clone().unwrap_or_default())
    }

    async fn render_pdf(&self, _data: &ResumeData, _title: &str) -> Result<Bytes, GenerationError> {
        lock(&self.state).render_calls += 1;
        Ok(Bytes::from_static(b"%PDF-1.4"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Relational store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RepoState {
    resumes: BTreeMap<i64, ResumeRow>,
    scores: Vec<ResumeScoreRow>,
}

impl RepoState {
    fn delete_scores(&mut self, resume_id: i64, kind: ModuleKind) -> u64 {
        let before = self.scores.len();
        self.scores.retain(|s| !owned_by(s, resume_id, kind));
        (before - self.scores.len()) as u64
    }
}

fn owned_by(row: &ResumeScoreRow, resume_id: i64, kind: ModuleKind) -> bool {
    row.resume_id == resume_id
        && ((row.target_type == TargetType::Module.code() && row.target_id == kind.id())
            || (row.target_type == TargetType::Dimension.code()
                && kind.dimension_id_range().contains(&row.target_id)))
}

enum TxOp {
    InsertResume(ResumeRow),
    InsertScores(Vec<ResumeScoreRow>),
    DeleteScores(i64, ModuleKind),
}

/// Transactions buffer their writes and apply them on commit; dropping one
/// discards them.
#[derive(Default)]
pub struct MemoryResumeRepo {
    state: Arc<Mutex<RepoState>>,
}

impl MemoryResumeRepo {
    pub fn resume(&self, id: i64) -> Option<ResumeRow> {
        lock(&self.state).resumes.get(&id).cloned()
    }

    pub fn resume_count(&self) -> usize {
        lock(&self.state).resumes.len()
    }

    /// Score rows ordered by (target_type, target_id).
    pub fn scores(&self, resume_id: i64) -> Vec<ResumeScoreRow> {
        let mut rows: Vec<_> = lock(&self.state)
            .scores
            .iter()
            .filter(|s| s.resume_id == resume_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.target_type, s.target_id));
        rows
    }
}

struct MemoryTx {
    state: Arc<Mutex<RepoState>>,
    ops: Vec<TxOp>,
}

#[async_trait]
impl ResumeRepository for MemoryResumeRepo {
    async fn begin(&self) -> Result<Box<dyn ResumeTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(),
            ops: Vec::new(),
        }))
    }

    async fn find_resume(&self, id: i64) -> Result<Option<ResumeRow>, StoreError> {
        Ok(self.resume(id))
    }

    async fn scores_for(&self, resume_id: i64) -> Result<Vec<ResumeScoreRow>, StoreError> {
        Ok(self.scores(resume_id))
    }

    async fn set_file_path(&self, id: i64, file_path: &str) -> Result<(), StoreError> {
        if let Some(row) = lock(&self.state).resumes.get_mut(&id) {
            row.file_path = file_path.to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ResumeTx for MemoryTx {
    async fn insert_resume(&mut self, resume: &NewResume) -> Result<(), StoreError> {
        let now = Utc::now();
        self.ops.push(TxOp::InsertResume(ResumeRow {
            id: resume.id,
            user_id: resume.user_id,
            tenant_id: resume.tenant_id,
            file_name: resume.file_name.clone(),
            file_path: FILE_PATH_PENDING.to_string(),
            status: STATUS_COMPLETED,
            created_at: now,
            updated_at: now,
        }));
        Ok(())
    }

    async fn insert_module_scores(&mut self, rows: &[NewScore]) -> Result<(), StoreError> {
        let now = Utc::now();
        self.ops.push(TxOp::InsertScores(
            rows.iter()
                .map(|r| ResumeScoreRow {
                    id: r.id,
                    resume_id: r.resume_id,
                    target_id: r.target_id,
                    target_type: r.target_type.code(),
                    label: r.label.clone(),
                    score: r.score,
                    weight: r.weight,
                    created_at: now,
                })
                .collect(),
        ));
        Ok(())
    }

    async fn delete_module_scores(
        &mut self,
        resume_id: i64,
        kind: ModuleKind,
    ) -> Result<u64, StoreError> {
        let committed = lock(&self.state)
            .scores
            .iter()
            .filter(|s| owned_by(s, resume_id, kind))
            .count();
        self.ops.push(TxOp::DeleteScores(resume_id, kind));
        Ok(committed as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        for op in self.ops {
            match op {
                TxOp::InsertResume(row) => {
                    state.resumes.insert(row.id, row);
                }
                TxOp::InsertScores(rows) => state.scores.extend(rows),
                TxOp::DeleteScores(resume_id, kind) => {
                    state.delete_scores(resume_id, kind);
                }
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DocState {
    docs: HashMap<i64, ResumeContent>,
    failing: bool,
    observer: Option<(TaskRecordStore, String)>,
    status_seen: Option<TaskStatus>,
}

#[derive(Default)]
pub struct MemoryDocuments {
    state: Mutex<DocState>,
}

impl MemoryDocuments {
    pub fn get(&self, resume_id: i64) -> Option<ResumeContent> {
        lock(&self.state).docs.get(&resume_id).cloned()
    }

    pub fn fail_writes(&self) {
        lock(&self.state).failing = true;
    }

    /// On the next insert, records the status the task record had at that moment.
    pub fn observe_status(&self, records: TaskRecordStore, task_id: &str) {
        lock(&self.state).observer = Some((records, task_id.to_string()));
    }

    pub fn status_seen_on_insert(&self) -> Option<TaskStatus> {
        lock(&self.state).status_seen
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if lock(&self.state).failing {
            return Err(StoreError::Document("document store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn insert(&self, content: &ResumeContent) -> Result<(), StoreError> {
        self.check_writable()?;
        let observer = lock(&self.state).observer.take();
        if let Some((records, task_id)) = observer {
            let seen = records
                .get(&task_id)
                .await
                .ok()
                .flatten()
                .map(|r| r.status);
            lock(&self.state).status_seen = seen;
        }
        lock(&self.state)
            .docs
            .insert(content.resume_id, content.clone());
        Ok(())
    }

    async fn find(&self, resume_id: i64) -> Result<Option<ResumeContent>, StoreError> {
        Ok(self.get(resume_id))
    }

    async fn replace_module(&self, resume_id: i64, section: &ModuleSection) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = lock(&self.state);
        state
            .docs
            .entry(resume_id)
            .or_insert_with(|| ResumeContent::new(resume_id, Vec::new(), None))
            .upsert_module(section.clone());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ObjectState {
    /// Public URL mapped to (content type, body).
    objects: HashMap<String, (String, Bytes)>,
    failing: bool,
}

#[derive(Default)]
pub struct MemoryObjects {
    state: Mutex<ObjectState>,
}

impl MemoryObjects {
    pub const BASE: &'static str = "http://objects.test/resumes";

    pub fn content_type_of(&self, url: &str) -> Option<String> {
        lock(&self.state).objects.get(url).map(|(ct, _)| ct.clone())
    }

    pub fn fail_uploads(&self) {
        lock(&self.state).failing = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        let url = self.public_url(key);
        let mut state = lock(&self.state);
        if state.failing {
            return Err(StoreError::Object(format!("put_object {key} failed")));
        }
        state.objects.insert(url, (content_type.to_string(), body));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", Self::BASE)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Slot ledger
// ────────────────────────────────────────────────────────────────────────────

/// Parks the next `add_slots` call until released.
#[derive(Default)]
pub struct LedgerGate {
    entered: Notify,
    released: Notify,
}

impl LedgerGate {
    /// Resolves once a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[derive(Default)]
struct LedgerState {
    slots: HashMap<String, i32>,
    calls: usize,
    fail_next: bool,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    gate: Mutex<Option<Arc<LedgerGate>>>,
}

impl MemoryLedger {
    pub fn slots(&self, user_id: &str) -> i32 {
        lock(&self.state).slots.get(user_id).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }

    pub fn fail_next(&self) {
        lock(&self.state).fail_next = true;
    }

    pub fn hold(&self) -> Arc<LedgerGate> {
        let gate = Arc::new(LedgerGate::default());
        *lock(&self.gate) = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SlotLedger for MemoryLedger {
    async fn add_slots(&self, user_id: &str, quantity: i32) -> Result<(), StoreError> {
        lock(&self.state).calls += 1;

        let gate = lock(&self.gate).take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.released.notified().await;
        }

        let mut state = lock(&self.state);
        if std::mem::take(&mut state.fail_next) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        *state.slots.entry(user_id.to_string()).or_default() += quantity;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Harness
// ────────────────────────────────────────────────────────────────────────────

pub const RECORD_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const NOTIFY_SECRET: &str = "test-notify-secret";

/// Real components over in-memory seams.
pub struct Harness {
    pub kv: Arc<MemoryKv>,
    pub records: TaskRecordStore,
    pub generation: Arc<FakeGeneration>,
    pub repo: Arc<MemoryResumeRepo>,
    pub documents: Arc<MemoryDocuments>,
    pub objects: Arc<MemoryObjects>,
    pub ledger: Arc<MemoryLedger>,
    pub supervisor: Supervisor,
    pub ids: Arc<IdAllocator>,
    pub scoring: Arc<ScoringEngine>,
    pub pipeline: PersistencePipeline,
}

impl Harness {
    pub fn new() -> Self {
        let kv = Arc::new(MemoryKv::default());
        let generation = Arc::new(FakeGeneration::default());
        let repo = Arc::new(MemoryResumeRepo::default());
        let documents = Arc::new(MemoryDocuments::default());
        let objects = Arc::new(MemoryObjects::default());
        let supervisor = Supervisor::new();
        let ids = Arc::new(IdAllocator::new(1));
        let scoring = Arc::new(ScoringEngine::new(
            generation.clone(),
            Arc::new(ScoringRules::default()),
        ));
        let pipeline = PersistencePipeline::new(
            repo.clone(),
            documents.clone(),
            objects.clone(),
            scoring.clone(),
            generation.clone(),
            ids.clone(),
            supervisor.clone(),
        );

        Self {
            records: TaskRecordStore::new(kv.clone(), RECORD_TTL),
            kv,
            generation,
            repo,
            documents,
            objects,
            ledger: Arc::new(MemoryLedger::default()),
            supervisor,
            ids,
            scoring,
            pipeline,
        }
    }

    pub fn task_service(&self, poll_interval: Duration, deadline: Duration) -> TaskService {
        let monitor = TaskMonitor::new(
            self.generation.clone(),
            self.records.clone(),
            self.pipeline.clone(),
            poll_interval,
            deadline,
        );
        TaskService::new(
            self.generation.clone(),
            self.records.clone(),
            monitor,
            self.pipeline.clone(),
            self.ids.clone(),
            self.supervisor.clone(),
        )
    }

    pub fn state(&self, poll_interval: Duration, deadline: Duration) -> AppState {
        AppState {
            tasks: self.task_service(poll_interval, deadline),
            pipeline: self.pipeline.clone(),
            scoring: self.scoring.clone(),
            relay: StreamRelay::new(self.generation.clone(), Duration::from_secs(60)),
            notify: Arc::new(NotificationGuard::new(
                self.kv.clone(),
                self.ledger.clone(),
                NOTIFY_SECRET.to_string(),
                Duration::from_secs(86_400),
            )),
            repo: self.repo.clone(),
            documents: self.documents.clone(),
            metrics: prometheus::Registry::new(),
        }
    }
}
