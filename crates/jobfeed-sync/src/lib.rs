//! Run orchestration: config, fetch, classify, reconcile, write.

mod audit;
mod reconcile;
mod sitemap;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jobfeed_adapters::{
    AdapterContext, AdapterError, Classifier, DomainPolicy, FeedEntry, FeedSource, RssFeedSource,
    SourceDescriptor,
};
use jobfeed_core::{Candidate, KindCounts};
use jobfeed_storage::{write_atomic, DocumentStore, HttpClientConfig, StoreError};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use audit::{AuditAction, AuditEntry, AuditLog, AUDIT_LOG_CAP};
pub use reconcile::{reconcile, Deduplicator, MergeReport, RetentionCaps, JOB_ID_FLOOR};
pub use sitemap::{render_sitemap, SiteConfig, SITEMAP_NAMESPACE};

pub const CRATE_NAME: &str = "jobfeed-sync";

pub const DEFAULT_FEEDS: [(&str, &str); 2] = [
    ("https://www.fresherslive.com/sarkari-result/rss", "FreshersLive Sarkari Result"),
    ("https://www.indgovtjobs.in/feeds/posts/default?alt=rss", "IndGovtJobs"),
];

/// Process-level settings, read from the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub workspace_root: PathBuf,
    pub data_file: PathBuf,
    pub config_file: PathBuf,
    pub log_file: PathBuf,
    pub sitemap_file: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub source_timeout_secs: u64,
}

impl SyncConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: root.into(),
            data_file: PathBuf::from("js/data.js"),
            config_file: PathBuf::from("jobfeed.yaml"),
            log_file: PathBuf::from("logs.json"),
            sitemap_file: PathBuf::from("sitemap.xml"),
            user_agent: "jobfeed-bot/0.1".to_string(),
            http_timeout_secs: 20,
            source_timeout_secs: 45,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::with_root(
            std::env::var("JOBFEED_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        );
        Self {
            data_file: env_path("JOBFEED_DATA_FILE").unwrap_or(defaults.data_file.clone()),
            config_file: env_path("JOBFEED_CONFIG").unwrap_or(defaults.config_file.clone()),
            log_file: env_path("JOBFEED_LOG_FILE").unwrap_or(defaults.log_file.clone()),
            sitemap_file: env_path("JOBFEED_SITEMAP").unwrap_or(defaults.sitemap_file.clone()),
            user_agent: std::env::var("JOBFEED_USER_AGENT").unwrap_or(defaults.user_agent.clone()),
            http_timeout_secs: env_secs("JOBFEED_HTTP_TIMEOUT_SECS").unwrap_or(defaults.http_timeout_secs),
            source_timeout_secs: env_secs("JOBFEED_SOURCE_TIMEOUT_SECS")
                .unwrap_or(defaults.source_timeout_secs),
            ..defaults
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.resolve(&self.data_file)
    }

    pub fn config_path(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_file)
    }

    pub fn sitemap_path(&self) -> PathBuf {
        self.resolve(&self.sitemap_file)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// The per-run YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub auto_run: bool,
    pub sources: Vec<SourceDescriptor>,
    pub trusted_domains: Vec<String>,
    pub retention: RetentionCaps,
    pub site: SiteConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            auto_run: true,
            sources: DEFAULT_FEEDS
                .iter()
                .map(|(url, name)| SourceDescriptor::new(*url, *name))
                .collect(),
            trusted_domains: Vec::new(),
            retention: RetentionCaps::default(),
            site: SiteConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("parsing run configuration")
    }

    /// A missing file means defaults; anything unparseable is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(text) => Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no run configuration found; using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: usize,
    pub failed_sources: Vec<String>,
    pub fetched_entries: usize,
    pub discarded_entries: usize,
    pub duplicates: usize,
    pub added: KindCounts,
    pub pruned: KindCounts,
    pub totals: KindCounts,
    pub document_path: String,
    pub document_sha256: String,
    pub sitemap_path: String,
}

impl SyncRunSummary {
    pub fn headline(&self) -> String {
        format!(
            "Update complete: {} Jobs, {} Results, {} Admits, {} Exams added.",
            self.added.jobs, self.added.results, self.added.admit_cards, self.added.exams
        )
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Disabled,
    Completed(SyncRunSummary),
}

pub struct SyncPipeline {
    config: SyncConfig,
    feeds: Arc<dyn FeedSource>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let feeds = RssFeedSource::new(HttpClientConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        })?;
        Ok(Self {
            config,
            feeds: Arc::new(feeds),
        })
    }

    pub fn with_feed_source(mut self, feeds: Arc<dyn FeedSource>) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run_once(&self) -> Result<RunOutcome> {
        let run_config = RunConfig::load(&self.config.config_path()).await?;
        if !run_config.auto_run {
            info!("auto_run is off; skipping update");
            return Ok(RunOutcome::Disabled);
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id);
        self.run_enabled(run_id, &run_config)
            .instrument(span)
            .await
            .map(RunOutcome::Completed)
    }

    async fn run_enabled(&self, run_id: Uuid, run_config: &RunConfig) -> Result<SyncRunSummary> {
        let started_at = Utc::now();
        let documents = DocumentStore::new(self.config.data_path());
        let audit = AuditLog::new(self.config.log_path());

        let store = match documents.load().await {
            Ok(store) => store,
            Err(StoreError::Corrupt(err)) => {
                error!(error = %err, "store document is corrupt; aborting without writing");
                let entry = AuditEntry::new(Utc::now(), AuditAction::Abort, err.to_string());
                if let Err(log_err) = audit.append(entry).await {
                    warn!(error = %log_err, "could not record abort in audit log");
                }
                return Err(anyhow::Error::new(err).context("refusing to rewrite a corrupt store document"));
            }
            Err(err) => return Err(err).context("loading store document"),
        };
        info!(totals = ?store.totals(), sources = run_config.sources.len(), "store loaded");

        let classifier = Classifier::new(DomainPolicy::new(&run_config.trusted_domains))
            .context("compiling classifier patterns")?;
        let ctx = AdapterContext {
            run_id,
            fetched_at: started_at,
        };
        let fetched = self.fetch_all(&ctx, &run_config.sources).await;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut failed_sources = Vec::new();
        let mut audit_batch = Vec::new();
        let mut fetched_entries = 0usize;
        let mut discarded_entries = 0usize;

        for (source, result) in run_config.sources.iter().zip(fetched) {
            match result {
                Ok(entries) => {
                    fetched_entries += entries.len();
                    for entry in &entries {
                        match classifier.classify(entry, source) {
                            Some(candidate) => candidates.push(candidate),
                            None => {
                                discarded_entries += 1;
                                warn!(source = %source, title = %entry.title, link = %entry.link, "entry outside trusted domains; discarded");
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "source failed; skipping");
                    failed_sources.push(source.display_name().to_string());
                    audit_batch.push(AuditEntry::new(
                        Utc::now(),
                        AuditAction::SourceError,
                        format!("{source}: {err}"),
                    ));
                }
            }
        }

        let (store, report) = reconcile(store, candidates, &run_config.retention);
        info!(
            added = report.added.total(),
            duplicates = report.duplicates,
            pruned = report.pruned.total(),
            "candidates reconciled"
        );

        let finished_at = Utc::now();
        let saved = documents
            .save(&store, finished_at)
            .await
            .context("writing store document")?;

        let sitemap_path = self.config.sitemap_path();
        let sitemap = render_sitemap(&run_config.site, &store.jobs, finished_at.date_naive());
        write_atomic(&sitemap_path, sitemap.as_bytes())
            .await
            .with_context(|| format!("writing sitemap {}", sitemap_path.display()))?;

        let summary = SyncRunSummary {
            run_id,
            started_at,
            finished_at,
            sources: run_config.sources.len(),
            failed_sources,
            fetched_entries,
            discarded_entries,
            duplicates: report.duplicates,
            added: report.added,
            pruned: report.pruned,
            totals: store.totals(),
            document_path: saved.path.display().to_string(),
            document_sha256: saved.sha256,
            sitemap_path: sitemap_path.display().to_string(),
        };

        audit_batch.insert(
            0,
            AuditEntry::new(finished_at, AuditAction::Update, summary.headline()).with_counts(report.added),
        );
        if let Err(err) = audit.record(audit_batch).await {
            warn!(error = %err, "could not update audit log");
        }

        info!(
            document = %summary.document_path,
            sha256 = %summary.document_sha256,
            "{}",
            summary.headline()
        );
        Ok(summary)
    }

    /// Fetch every source concurrently; results come back in `sources` order.
    async fn fetch_all(
        &self,
        ctx: &AdapterContext,
        sources: &[SourceDescriptor],
    ) -> Vec<Result<Vec<FeedEntry>, AdapterError>> {
        let timeout = self.config.source_timeout();
        let mut tasks = JoinSet::new();
        for (index, source) in sources.iter().cloned().enumerate() {
            let feeds = Arc::clone(&self.feeds);
            let ctx = ctx.clone();
            let span = info_span!("source_fetch", source = %source);
            tasks.spawn(
                async move {
                    let result = match tokio::time::timeout(timeout, feeds.fetch_entries(&ctx, &source)).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::Message(format!(
                            "timed out after {}s",
                            timeout.as_secs()
                        ))),
                    };
                    if let Ok(entries) = &result {
                        info!(entries = entries.len(), "source fetched");
                    }
                    (index, result)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<Result<Vec<FeedEntry>, AdapterError>>> =
            sources.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(err) => warn!(error = %err, "source task did not complete"),
            }
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(AdapterError::Message("source task did not complete".into()))))
            .collect()
    }
}

pub async fn run_sync_once_from_env() -> Result<RunOutcome> {
    let config = SyncConfig::from_env();
    let pipeline = SyncPipeline::new(config)?;
    pipeline.run_once().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_config_fills_missing_sections_with_defaults() {
        let config = RunConfig::from_yaml_str(
            r#"
auto_run: false
sources:
  - url: https://feeds.example.org/rss
    name: Example
    type: private
    organization: Example Corp
retention:
  jobs: 10
"#,
        )
        .unwrap();

        assert!(!config.auto_run);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].organization.as_deref(), Some("Example Corp"));
        assert_eq!(config.retention.jobs, 10);
        assert_eq!(config.retention.results, 30);
        assert!(config.trusted_domains.is_empty());
        assert_eq!(config.site, SiteConfig::default());
    }

    #[test]
    fn empty_yaml_is_the_default_config() {
        let config = RunConfig::from_yaml_str("  \n").unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.auto_run);
        assert_eq!(config.sources.len(), DEFAULT_FEEDS.len());
    }

    #[test]
    fn unparseable_yaml_is_an_error() {
        assert!(RunConfig::from_yaml_str("sources: [unclosed").is_err());
        assert!(RunConfig::from_yaml_str("auto_run: maybe").is_err());
    }

    #[tokio::test]
    async fn missing_config_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let mut config = SyncConfig::with_root("/srv/site");
        assert_eq!(config.data_path(), PathBuf::from("/srv/site/js/data.js"));
        config.log_file = PathBuf::from("/var/log/jobfeed.json");
        assert_eq!(config.log_path(), PathBuf::from("/var/log/jobfeed.json"));
        assert_eq!(config.source_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn headline_lists_kinds_in_display_order() {
        let summary = SyncRunSummary {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sources: 2,
            failed_sources: Vec::new(),
            fetched_entries: 4,
            discarded_entries: 0,
            duplicates: 0,
            added: KindCounts {
                jobs: 1,
                results: 2,
                exams: 3,
                admit_cards: 4,
            },
            pruned: KindCounts::default(),
            totals: KindCounts::default(),
            document_path: "js/data.js".into(),
            document_sha256: String::new(),
            sitemap_path: "sitemap.xml".into(),
        };
        assert_eq!(
            summary.headline(),
            "Update complete: 1 Jobs, 2 Results, 4 Admits, 3 Exams added."
        );
    }
}
