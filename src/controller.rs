// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Controller wiring: HelmRelease watch, cache, and the kube-runtime applier
//! driving reconciles with per-key retry accounting.

use crate::chart::{ArchiveLoader, ChartFetcher, ChartResolver, DigestVerifier, HttpTransport};
use crate::config::Config;
use crate::constants::backoff::{BASE_DELAY_MILLIS, MAX_DELAY_SECS};
use crate::error::{ControllerError, Result};
use crate::kubernetes::{key_for, KubeDeclarationStore, KubeSecretStore};
use crate::reconcilers::{HelmReleaseReconciler, Reconcile};
use crate::release::ReleaseClient;
use crate::types::HelmRelease;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use kube::runtime::controller::{applier, Action, Config as ControllerConfig, Error as ApplierError};
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use kube_runtime::watcher::Config as WatcherConfig;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct Controller {
    client: Client,
    config: Arc<Config>,
    cache: Store<HelmRelease>,
    writer: Writer<HelmRelease>,
    context: Arc<Context>,
    verifies_charts: bool,
}

impl Controller {
    pub fn new(
        client: Client,
        config: Config,
        releases: Arc<dyn ReleaseClient>,
        transport: Arc<dyn HttpTransport>,
        loader: Arc<dyn ArchiveLoader>,
    ) -> Self {
        let config = Arc::new(config);
        let (cache, writer) = reflector::store();

        let mut fetcher = ChartFetcher::new(transport.clone(), loader);
        if config.verify_chart_digest {
            fetcher = fetcher.with_verifier(Arc::new(DigestVerifier));
        }
        let verifies_charts = fetcher.verifies();

        let reconciler = HelmReleaseReconciler::new(
            config.clone(),
            Arc::new(KubeDeclarationStore::new(client.clone(), cache.clone())),
            Arc::new(KubeSecretStore::new(client.clone())),
            releases,
            ChartResolver::new(transport),
            fetcher,
        );

        Self {
            client,
            context: Arc::new(Context::new(Arc::new(reconciler), config.max_retries)),
            config,
            cache,
            writer,
            verifies_charts,
        }
    }

    /// Run until `shutdown` resolves. Reconciles in flight at that point are
    /// finished before this returns; scheduled retries are dropped and picked
    /// up again by the initial list after a restart.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        if !self.verifies_charts {
            warn!("Chart archive verification is disabled, downloaded charts are not checked against the repository index digest");
        }

        let api: Api<HelmRelease> = Api::all(self.client.clone());
        let (triggers, queue) = mpsc::unbounded();
        let watch = tokio::spawn(watch_helm_releases(
            api,
            self.writer,
            self.cache.clone(),
            triggers,
        ));

        info!(
            "Watching HelmReleases with {} workers, reconciles start once the cache has synced",
            self.config.workers
        );
        let reconciles = run_reconciles(self.context, self.cache, queue, self.config.workers);
        tokio::pin!(reconciles);
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut reconciles => {
                warn!("HelmRelease reconcile loop stopped unexpectedly");
                watch.abort();
                return Ok(());
            }
            _ = &mut shutdown => {}
        }

        info!("Shutting down, waiting for in-flight reconciles to finish...");
        // Dropping the watch closes the queue, which drains the applier
        watch.abort();
        reconciles.await;

        info!("Controller stopped");
        Ok(())
    }
}

/// Shared state handed to every reconcile and error policy call
pub struct Context {
    reconciler: Arc<dyn Reconcile>,
    retries: Retries,
}

impl Context {
    pub fn new(reconciler: Arc<dyn Reconcile>, max_retries: u32) -> Self {
        Self {
            reconciler,
            retries: Retries::new(
                max_retries,
                Duration::from_millis(BASE_DELAY_MILLIS),
                Duration::from_secs(MAX_DELAY_SECS),
            ),
        }
    }

    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.retries.base_delay = base_delay;
        self.retries.max_delay = max_delay;
        self
    }
}

/// Consecutive failure counts per `namespace/name` key. The delay before
/// retry `n` (0-based) is `base_delay * 2^n`, capped at `max_delay`.
struct Retries {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

impl Retries {
    fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure. Returns the delay before the next attempt, or `None`
    /// once `max_retries` retries are used up, which also resets the count.
    fn next_retry(&self, key: &str) -> Option<Duration> {
        let mut failures = self.lock();
        let count = failures.entry(key.to_string()).or_insert(0);
        if *count < self.max_retries {
            let delay = self.delay_for(*count);
            *count += 1;
            Some(delay)
        } else {
            failures.remove(key);
            None
        }
    }

    fn forget(&self, key: &str) {
        self.lock().remove(key);
    }

    fn failures(&self, key: &str) -> u32 {
        self.lock().get(key).copied().unwrap_or(0)
    }

    fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        // Counts stay usable if a holder panicked
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn reconcile(release: Arc<HelmRelease>, ctx: Arc<Context>) -> Result<Action> {
    let key = key_for(release.as_ref());
    ctx.reconciler.reconcile(&key).await?;
    ctx.retries.forget(&key);
    Ok(Action::await_change())
}

fn error_policy(release: Arc<HelmRelease>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = key_for(release.as_ref());
    match ctx.retries.next_retry(&key) {
        Some(delay) => {
            warn!(
                permanent = error.is_permanent(),
                "Error reconciling {}, retrying in {:?}: {}", key, delay, error
            );
            Action::requeue(delay)
        }
        None => {
            error!(
                permanent = error.is_permanent(),
                "Giving up on {} after {} retries: {}", key, ctx.retries.max_retries, error
            );
            Action::await_change()
        }
    }
}

/// Objects to reconcile after `event` has been applied to `cache`.
///
/// A relist buffers its objects until `InitDone` swaps them into the cache,
/// so `InitApply` triggers nothing and `InitDone` triggers every cached
/// object. Deletes need no trigger: the object has left the cache.
pub fn triggers_for(
    event: &watcher::Event<HelmRelease>,
    cache: &Store<HelmRelease>,
) -> Vec<ObjectRef<HelmRelease>> {
    match event {
        watcher::Event::Apply(release) => vec![ObjectRef::from_obj(release)],
        watcher::Event::InitDone => cache
            .state()
            .iter()
            .map(|release| ObjectRef::from_obj(release.as_ref()))
            .collect(),
        watcher::Event::Init | watcher::Event::InitApply(_) | watcher::Event::Delete(_) => Vec::new(),
    }
}

/// Feed the cache and send the triggers of every watch event to `triggers`
async fn watch_helm_releases(
    api: Api<HelmRelease>,
    writer: Writer<HelmRelease>,
    cache: Store<HelmRelease>,
    triggers: mpsc::UnboundedSender<ObjectRef<HelmRelease>>,
) {
    let mut stream = reflector::reflector(writer, watcher(api, WatcherConfig::default()))
        .default_backoff()
        .boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                match &event {
                    watcher::Event::Init => debug!("HelmRelease watch (re)listing"),
                    watcher::Event::InitDone => {
                        debug!("HelmRelease watch listing done, {} cached", cache.state().len())
                    }
                    _ => {}
                }
                for obj_ref in triggers_for(&event, &cache) {
                    if triggers.unbounded_send(obj_ref).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!("HelmRelease watch error: {}", e),
        }
    }
}

/// Reconcile triggered objects until `queue` ends and in-flight reconciles
/// finish. Nothing runs before `cache` is ready; at most `workers` objects are
/// reconciled at once and never the same object twice concurrently.
async fn run_reconciles(
    ctx: Arc<Context>,
    cache: Store<HelmRelease>,
    queue: impl Stream<Item = ObjectRef<HelmRelease>>,
    workers: usize,
) {
    let config = ControllerConfig::default().concurrency(u16::try_from(workers).unwrap_or(u16::MAX));

    applier(
        |release, ctx| Box::pin(reconcile(release, ctx)),
        error_policy,
        ctx.clone(),
        cache,
        queue.map(Ok::<_, Infallible>),
        config,
    )
    .for_each(|res| {
        let ctx = ctx.clone();
        async move {
            match res {
                Ok((obj_ref, _)) => debug!("Reconciled {}", obj_ref),
                Err(ApplierError::ReconcilerFailed(e, obj_ref)) => {
                    debug!("Reconcile of {} failed: {}", obj_ref, e)
                }
                Err(ApplierError::ObjectNotFound(obj_ref)) => {
                    // Deleted while a retry was scheduled
                    let key = match &obj_ref.namespace {
                        Some(namespace) => format!("{}/{}", namespace, obj_ref.name),
                        None => obj_ref.name.clone(),
                    };
                    ctx.retries.forget(&key);
                    debug!("{} is gone, skipping", obj_ref);
                }
                Err(e) => warn!("HelmRelease reconcile loop error: {}", e),
            }
        }
    })
    .await;
}
