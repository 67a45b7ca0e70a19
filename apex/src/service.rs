//! `ApexService`: the single owner of the embedded DB handle and the
//! subsystem instances built on top of it (spec.md §5 "shared resources",
//! §9 "global state ... replaced by per-service instances with explicit
//! lifecycles"). One instance per open database path.

use std::sync::Arc;

use tracing::info;

use apex_core::config::ApexConfig;
use apex_evidence::EvidenceValidator;
use apex_ranker::Ranker;
use apex_reflection::ReflectionEngine;
use apex_storage::adapter::{RusqliteAdapter, SqlAdapter};
use apex_storage::migrations;
use apex_storage::PatternRepository;
use apex_tasks::TaskStore;

use crate::error::ApexResult;
use crate::requests::{
    DiscoverRequest, DiscoverResponse, ExplainRequest, ExplainResponse, LookupRequest,
    LookupResponse, ReflectionReport, ReflectionRequest, TaskCheckpointRequest,
    TaskCompleteRequest, TaskCreateRequest, TaskResponse, TaskSimilarRequest, TaskSimilarResponse,
    TaskSimilarity, TaskUpdateRequest,
};

pub struct ApexService {
    config: ApexConfig,
    adapter: Arc<dyn SqlAdapter>,
    repository: Arc<PatternRepository>,
    ranker: Ranker,
    reflection: ReflectionEngine,
    tasks: TaskStore,
}

impl ApexService {
    /// Open (or create) the database at `config.db_path`, run pending
    /// migrations, and confirm `schema_meta` and `migrations` agree before
    /// serving a single request (§6 "MUST agree on start-up"). A migration
    /// or schema-drift failure here is fatal, per §7.
    pub fn open(config: ApexConfig) -> ApexResult<Self> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    apex_storage::StorageError::Sqlite { message: e.to_string() }
                })?;
            }
        }
        let adapter = Arc::new(RusqliteAdapter::open(&config.db_path)?);
        Self::build(adapter, config)
    }

    /// Same start-up contract as [`open`](Self::open), against a scratch
    /// in-memory database. Used by tests and short-lived tooling.
    pub fn open_in_memory(config: ApexConfig) -> ApexResult<Self> {
        let adapter = Arc::new(RusqliteAdapter::open_in_memory()?);
        Self::build(adapter, config)
    }

    fn build(adapter: Arc<RusqliteAdapter>, config: ApexConfig) -> ApexResult<Self> {
        let adapter: Arc<dyn SqlAdapter> = adapter;
        adapter.with_connection(|conn| {
            migrations::run_migrations(conn)?;
            migrations::assert_schema_consistent(conn)
        })?;
        info!(db_path = %config.db_path.display(), "apex service opened");

        let repository = Arc::new(PatternRepository::new(adapter.clone()));
        let ranker = Ranker::new(repository.clone(), config.ranking.clone());
        let validator = EvidenceValidator::open(&config.repo_path, config.evidence.clone())?;
        let reflection = ReflectionEngine::new(adapter.clone(), validator, config.reflection_mode);
        let tasks = TaskStore::new(adapter.clone());

        Ok(Self { config, adapter, repository, ranker, reflection, tasks })
    }

    /// Flush and release the underlying database handle (§9 "explicit
    /// lifecycles owned by the caller").
    pub fn close(&self) -> ApexResult<()> {
        Ok(self.adapter.close()?)
    }

    // -- patterns.* -------------------------------------------------------

    /// `patterns.lookup { task?, signals } → { pack }` (§6): rank every
    /// candidate pattern against `signals`, up to the configured candidate
    /// cap, then assemble a budgeted pack from the result (§4.7).
    pub fn patterns_lookup(&self, request: LookupRequest) -> ApexResult<LookupResponse> {
        let ranked = self.ranker.rank(&request.signals, self.config.ranking.candidate_cap)?;
        let builder = apex_pack::PackBuilder::new(self.repository.as_ref(), self.config.pack.clone());
        let task = request.task.unwrap_or_default();
        let pack = builder.build(&task, &ranked, false)?;
        Ok(LookupResponse { pack })
    }

    /// `patterns.discover { signals, k } → ranked[]` (§6): ranking only, no
    /// pack assembly.
    pub fn patterns_discover(&self, request: DiscoverRequest) -> ApexResult<DiscoverResponse> {
        Ok(self.ranker.rank(&request.signals, request.k)?)
    }

    /// `patterns.explain { id_or_alias } → pattern_with_scores` (§6). When
    /// `signals` are supplied, the breakdown is whatever `patterns.discover`
    /// would have produced for this pattern against those signals; `scores`
    /// is `None` either when no signals were given or when the pattern
    /// didn't pass candidate generation for them (e.g. a disjoint language
    /// facet), exactly mirroring what a caller would see via `discover`.
    pub fn patterns_explain(&self, request: ExplainRequest) -> ApexResult<ExplainResponse> {
        let pattern = self
            .repository
            .get(&request.id_or_alias, false)?
            .ok_or_else(|| apex_storage::StorageError::PatternNotFound { id: request.id_or_alias.clone() })?;

        let scores = match &request.signals {
            Some(signals) => {
                let ranked = self.ranker.rank(signals, self.config.ranking.candidate_cap)?;
                ranked
                    .into_iter()
                    .find(|r| r.pattern_id == pattern.id.as_str())
                    .map(|r| r.explain)
            }
            None => None,
        };

        Ok(ExplainResponse { pattern, scores })
    }

    // -- reflect ------------------------------------------------------------

    /// `reflect { request } → { applied_updates[], created_patterns[],
    /// errors[] }` (§4.5, §6). `errors[]` maps to `ReflectionReport::warnings`:
    /// the engine only returns `Ok` when every step of §4.5's pipeline
    /// succeeds (a transaction, rolled back whole on any hard failure), so
    /// the only "errors" a caller sees alongside a successful report are
    /// recoverable per-claim warnings (e.g. a permissive-mode downgrade).
    pub fn reflect(&self, request: ReflectionRequest) -> ApexResult<ReflectionReport> {
        Ok(self.reflection.reflect(request)?)
    }

    // -- tasks.* --------------------------------------------------------

    pub fn tasks_create(&self, request: TaskCreateRequest) -> ApexResult<TaskResponse> {
        Ok(self.tasks.create(request.title, request.intent, request.task_type, request.tags, request.brief)?)
    }

    /// `tasks.update`: advance the phase DAG (§4.8).
    pub fn tasks_update(&self, request: TaskUpdateRequest) -> ApexResult<TaskResponse> {
        Ok(self.tasks.transition_phase(&request.task_id, request.next_phase)?)
    }

    pub fn tasks_checkpoint(&self, request: TaskCheckpointRequest) -> ApexResult<TaskResponse> {
        Ok(self.tasks.checkpoint(&request.task_id, request.brief, request.confidence, request.tags)?)
    }

    pub fn tasks_complete(&self, request: TaskCompleteRequest) -> ApexResult<TaskResponse> {
        Ok(self.tasks.complete(&request.task_id, request.outcome, request.key_learning)?)
    }

    pub fn tasks_similar(&self, request: TaskSimilarRequest) -> ApexResult<TaskSimilarResponse> {
        let neighbors = self
            .tasks
            .similar(&request.task_id, request.limit)?
            .into_iter()
            .map(|(task_id, score)| TaskSimilarity { task_id, score })
            .collect();
        Ok(TaskSimilarResponse { neighbors })
    }
}
