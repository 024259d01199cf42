//! Wires the adapters into the engine and runs one action.

use std::sync::Arc;

use anyhow::Context as _;
use kustforge_application::ports::Clock;
use kustforge_application::use_cases::{RenderTemplatesInput, RollbackTemplateOutput};
use kustforge_application::{
    ApplicationError, CacheStats, RenderTemplates, ResolutionCache, ResolutionEngine,
    ResolverRegistry, RollbackTemplate, SessionManager,
};
use kustforge_domain::{AliasTable, RunOutcome, Template, TemplateId};
use kustforge_infrastructure::{
    FileSnapshotStore, Inventory, InventoryClient, InventoryCredentialProvider, Settings,
    SystemClock, TokioFileSystem, discover_templates, load_alias_table, load_templates,
};
use tracing::{info, warn};

/// Lookup counters for one render run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    /// Resolution cache counters.
    pub cache: CacheStats,
    /// Values held by the cache when the run ended.
    pub cached_values: usize,
    /// Credential exchanges performed.
    pub credential_exchanges: usize,
}

impl LookupStats {
    fn of(engine: &ResolutionEngine) -> Self {
        Self {
            cache: engine.cache().stats(),
            cached_values: engine.cache().len(),
            credential_exchanges: engine.sessions().exchange_count(),
        }
    }
}

/// What a run produced.
#[derive(Debug)]
pub enum RunReport {
    /// Diff or apply finished; the outcome may still be a failure.
    Rendered(RunOutcome, LookupStats),
    /// Rollback results per template.
    RolledBack(Vec<(TemplateId, Result<RollbackTemplateOutput, ApplicationError>)>),
}

impl RunReport {
    /// True if anything failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Rendered(outcome, _) => outcome.is_failure(),
            Self::RolledBack(results) => results.iter().any(|(_, result)| result.is_err()),
        }
    }
}

/// Everything one run needs, built from settings.
pub struct Runner {
    settings: Settings,
    fs: TokioFileSystem,
    clock: Arc<dyn Clock>,
}

impl Runner {
    /// Creates a runner for `settings`.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fs: TokioFileSystem::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Runs the configured action.
    ///
    /// Resolution failures are part of the report, not errors. Errors are
    /// reserved for configuration and storage problems.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, templates or snapshot storage
    /// cannot be read or written.
    pub async fn run(&self) -> anyhow::Result<RunReport> {
        let templates = self.templates().await?;
        info!(
            mode = %self.settings.mode,
            templates = templates.len(),
            root = %self.settings.template_root.display(),
            "starting run"
        );
        let store = Arc::new(self.snapshot_store());

        let Some(mode) = self.settings.mode.apply_mode() else {
            let rollback = RollbackTemplate::new(store);
            let mut results = Vec::with_capacity(templates.len());
            for template in templates {
                let result = rollback.execute(&template.id).await;
                results.push((template.id, result));
            }
            return Ok(RunReport::RolledBack(results));
        };

        let engine = Arc::new(self.engine().await?);
        let outcome = RenderTemplates::new(Arc::clone(&engine), store, Arc::clone(&self.clock))
            .with_history_limit(self.settings.history_limit)
            .execute(RenderTemplatesInput { templates, mode })
            .await
            .context("render failed")?;
        let stats = LookupStats::of(&engine);
        info!(
            hits = stats.cache.hits,
            misses = stats.cache.misses,
            coalesced = stats.cache.coalesced,
            exchanges = stats.credential_exchanges,
            "lookups finished"
        );
        Ok(RunReport::Rendered(outcome, stats))
    }

    async fn templates(&self) -> anyhow::Result<Vec<Template>> {
        let root = &self.settings.template_root;
        let templates = if self.settings.templates.is_empty() {
            discover_templates(&self.fs, root, &[self.settings.state_path()]).await
        } else {
            load_templates(&self.fs, root, &self.settings.templates).await
        };
        templates.with_context(|| format!("cannot load templates under {}", root.display()))
    }

    fn snapshot_store(&self) -> FileSnapshotStore<TokioFileSystem> {
        FileSnapshotStore::new(
            self.fs.clone(),
            self.settings.state_path(),
            self.settings.template_root.clone(),
        )
    }

    async fn engine(&self) -> anyhow::Result<ResolutionEngine> {
        let aliases = match &self.settings.aliases {
            Some(path) => load_alias_table(&self.fs, path).await?,
            None => AliasTable::default(),
        };

        let inventory = match &self.settings.inventory {
            Some(path) => Inventory::load(&self.fs, path).await?,
            None => {
                warn!("no inventory configured, every lookup will fail");
                Inventory::default()
            }
        };
        if let Some(region) = &self.settings.region {
            info!(region = %region, "using region");
        }

        let provider = Arc::new(InventoryCredentialProvider::new(
            inventory.credentials.clone(),
            Arc::clone(&self.clock),
        ));
        let client = Arc::new(InventoryClient::new(Arc::new(inventory)));

        let sessions = SessionManager::new(Arc::new(aliases), provider, Arc::clone(&self.clock))
            .with_refresh_skew(self.settings.refresh_skew());
        let cache =
            ResolutionCache::new(Arc::clone(&self.clock)).with_ttl(self.settings.cache_ttl());

        Ok(ResolutionEngine::new(
            Arc::new(sessions),
            Arc::new(ResolverRegistry::with_defaults(client)),
            Arc::new(cache),
            self.settings.engine_config(),
        ))
    }
}
