//! Deployment lifecycle: install, activate, refresh.
//!
//! A deployment moves through `Uninstalled -> Installing -> Installed ->
//! Activating -> Active`. Install pre-warms a generation all-or-nothing;
//! activate flips the current pointer and reclaims superseded
//! generations. Requests keep flowing during both: install writes target
//! a not-yet-current generation, so lookups are unaffected until the
//! pointer moves.

use outpost_client::OriginFetcher;
use outpost_client::origin::resolve;
use outpost_core::{Error, StoreRecord, VersionedStore};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Deployment phase. Generation-carrying states name the epoch they
/// installed or activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninstalled,
    Installing,
    Installed(String),
    Activating,
    Active(String),
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Uninstalled => write!(f, "uninstalled"),
            Phase::Installing => write!(f, "installing"),
            Phase::Installed(generation) => write!(f, "installed({generation})"),
            Phase::Activating => write!(f, "activating"),
            Phase::Active(generation) => write!(f, "active({generation})"),
        }
    }
}

/// Runs the deployment hooks against the store and the origin.
pub struct LifecycleManager {
    store: VersionedStore,
    origin: Arc<dyn OriginFetcher>,
    base: Url,
    phase: Mutex<Phase>,
}

impl LifecycleManager {
    pub fn new(store: VersionedStore, origin: Arc<dyn OriginFetcher>, base: Url) -> Self {
        Self { store, origin, base, phase: Mutex::new(Phase::Uninstalled) }
    }

    /// Current deployment phase.
    pub fn phase(&self) -> Phase {
        self.lock_phase().clone()
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        // The guarded sections only assign; a poisoned lock still holds a
        // valid phase.
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pre-warm `generation` with every manifest entry. All-or-nothing: any
    /// entry failing aborts the install, discards the partial generation,
    /// and restores the prior phase.
    pub async fn install(&self, manifest: &[String], generation: &str) -> Result<(), Error> {
        let prior = {
            let mut phase = self.lock_phase();
            match &*phase {
                Phase::Installing | Phase::Activating => {
                    return Err(Error::Lifecycle(format!("install rejected while {phase}")));
                }
                current => {
                    let prior = current.clone();
                    *phase = Phase::Installing;
                    prior
                }
            }
        };

        tracing::info!("installing generation {} ({} entries)", generation, manifest.len());

        match self.prefetch(manifest, generation).await {
            Ok(()) => {
                *self.lock_phase() = Phase::Installed(generation.to_string());
                tracing::info!("generation {} installed", generation);
                Ok(())
            }
            Err(err) => {
                self.discard_partial(generation).await;
                *self.lock_phase() = prior;
                tracing::warn!("install of generation {} failed: {}", generation, err);
                Err(err)
            }
        }
    }

    /// Fetch every entry fresh (intermediary caches bypassed) and write it
    /// into `generation`. Any 2xx is acceptable pre-warm material; other
    /// statuses abort the install.
    async fn prefetch(&self, manifest: &[String], generation: &str) -> Result<(), Error> {
        for entry in manifest {
            let url = resolve(&self.base, entry).map_err(|e| Error::InstallIncomplete {
                entry: entry.clone(),
                cause: e.to_string(),
            })?;

            let response =
                self.origin.fetch_fresh(&url).await.map_err(|e| Error::InstallIncomplete {
                    entry: entry.clone(),
                    cause: e.to_string(),
                })?;

            if !(200..=299).contains(&response.status) {
                return Err(Error::InstallIncomplete {
                    entry: entry.clone(),
                    cause: format!("origin returned {}", response.status),
                });
            }

            let record = StoreRecord::new(
                generation,
                "GET",
                url.as_str(),
                response.status,
                response.content_type.clone(),
                response.body.to_vec(),
            );
            self.store.put_record(&record).await?;

            tracing::debug!("pre-warmed {} ({} bytes)", url, record.body.len());
        }

        Ok(())
    }

    /// A failed install must leave no trace. The current generation is the
    /// one exception: a failed re-install of the live epoch keeps its
    /// existing records so serving continues from the old content.
    async fn discard_partial(&self, generation: &str) {
        let current = self.store.current_generation().await.ok().flatten();
        if current.as_deref() == Some(generation) {
            return;
        }

        match self.store.delete_generation(generation).await {
            Ok(count) if count > 0 => {
                tracing::info!("discarded partial generation {} ({} records)", generation, count);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("failed to discard partial generation {}: {}", generation, err);
            }
        }
    }

    /// Make `generation` the one lookups address, then reclaim every other
    /// generation. Individual delete failures are logged and skipped; stale
    /// rows are unreachable either way since lookups only ever address the
    /// current generation.
    pub async fn activate(&self, generation: &str) -> Result<(), Error> {
        {
            let mut phase = self.lock_phase();
            match &*phase {
                Phase::Installed(installed) if installed == generation => {
                    *phase = Phase::Activating;
                }
                other => {
                    return Err(Error::Lifecycle(format!(
                        "cannot activate {generation} from {other}"
                    )));
                }
            }
        }

        if let Err(err) = self.store.set_current_generation(generation).await {
            *self.lock_phase() = Phase::Installed(generation.to_string());
            return Err(err);
        }

        match self.store.list_generations().await {
            Ok(generations) => {
                for stale in generations.into_iter().filter(|g| g != generation) {
                    match self.store.delete_generation(&stale).await {
                        Ok(count) => {
                            tracing::info!("dropped stale generation {} ({} records)", stale, count);
                        }
                        Err(err) => {
                            tracing::warn!("failed to drop stale generation {}: {}", stale, err);
                        }
                    }
                }
            }
            Err(err) => tracing::warn!("failed to enumerate generations for cleanup: {}", err),
        }

        *self.lock_phase() = Phase::Active(generation.to_string());
        tracing::info!("generation {} active", generation);

        Ok(())
    }

    /// Best-effort re-fetch of the manifest into the current generation.
    /// Per-entry failures are logged and skipped; returns how many entries
    /// were refreshed. Errors only when no generation is active at all.
    pub async fn refresh(&self, manifest: &[String]) -> Result<usize, Error> {
        let generation = self
            .store
            .current_generation()
            .await?
            .ok_or_else(|| Error::Lifecycle("refresh requires an active generation".to_string()))?;

        let mut refreshed = 0;
        for entry in manifest {
            let url = match resolve(&self.base, entry) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!("refresh skipped {}: {}", entry, err);
                    continue;
                }
            };

            let response = match self.origin.fetch_fresh(&url).await {
                Ok(response) if (200..=299).contains(&response.status) => response,
                Ok(response) => {
                    tracing::warn!("refresh skipped {}: origin returned {}", url, response.status);
                    continue;
                }
                Err(err) => {
                    tracing::warn!("refresh skipped {}: {}", url, err);
                    continue;
                }
            };

            let record = StoreRecord::new(
                generation.as_str(),
                "GET",
                url.as_str(),
                response.status,
                response.content_type.clone(),
                response.body.to_vec(),
            );
            match self.store.put_record(&record).await {
                Ok(()) => refreshed += 1,
                Err(err) => tracing::warn!("refresh write failed for {}: {}", url, err),
            }
        }

        tracing::info!(
            "refreshed {}/{} manifest entries into generation {}",
            refreshed,
            manifest.len(),
            generation
        );

        Ok(refreshed)
    }
}
