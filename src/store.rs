//! Reference persistence adapter on sled
//!
//! Shows the caller side of the normalizer contract: read the current
//! record, normalize the patch against it, merge, and write the result only
//! if nobody else wrote in between. A rejected patch aborts the whole write.
use super::clock::{Clock, SystemClock};
use super::config::{Config, StoreConfig};
use super::error::StoreError;
use super::normalizer::Normalizer;
use super::offspring::{OffspringPatch, OffspringState};
use super::utils;
use anyhow::Context;
use sled::Batch;
use std::sync::Arc;
use tracing::{debug, info};

const OFFSPRING_TREE: &str = "offspring";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OffspringRecord {
    #[n(0)]
    pub id: String, // bech32 `offspring_` id
    #[n(1)]
    pub litter_id: Option<String>,
    #[n(2)]
    pub state: OffspringState,
}

/// A record as read from or written to the store. `revision` is the sha256
/// of the stored bytes and doubles as an optimistic concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOffspring {
    pub record: OffspringRecord,
    pub revision: String,
}

impl OffspringRecord {
    // returns the hash of the record and its contents serialised into cbor
    fn finalise(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

fn decode(bytes: &[u8]) -> anyhow::Result<StoredOffspring> {
    let record: OffspringRecord =
        minicbor::decode(bytes).context("failed to decode stored offspring")?;

    Ok(StoredOffspring {
        record,
        revision: sha256::digest(bytes),
    })
}

pub struct OffspringStore<C: Clock = SystemClock> {
    instance: Arc<sled::Db>,
    tree: sled::Tree,
    normalizer: Normalizer<C>,
    cas_retries: u32,
    flush_on_write: bool,
}

impl OffspringStore<SystemClock> {
    /// Open the database named in `config.store.path` with a wall clock.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let db = sled::open(&config.store.path)
            .with_context(|| format!("failed to open {}", config.store.path.display()))?;
        let normalizer = Normalizer::from_config(&config.normalizer, SystemClock);

        Self::new(Arc::new(db), normalizer, &config.store)
    }
}

impl<C: Clock> OffspringStore<C> {
    pub fn new(
        instance: Arc<sled::Db>,
        normalizer: Normalizer<C>,
        config: &StoreConfig,
    ) -> anyhow::Result<Self> {
        let tree = instance.open_tree(OFFSPRING_TREE)?;

        Ok(Self {
            instance,
            tree,
            normalizer,
            cas_retries: config.cas_retries,
            flush_on_write: config.flush_on_write,
        })
    }

    fn flush(&self) -> anyhow::Result<()> {
        if self.flush_on_write {
            self.instance.flush()?;
        }
        Ok(())
    }

    fn load(&self, id: &str) -> anyhow::Result<(sled::IVec, StoredOffspring)> {
        let bytes = self
            .tree
            .get(id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let stored = decode(&bytes)?;

        Ok((bytes, stored))
    }

    /// Load an offspring by id
    pub fn get(&self, id: &str) -> anyhow::Result<StoredOffspring> {
        self.load(id).map(|(_, stored)| stored)
    }

    /// Create a single offspring, normalizing `patch` against the default state
    pub fn create(
        &self,
        litter_id: Option<&str>,
        patch: &OffspringPatch,
    ) -> anyhow::Result<StoredOffspring> {
        let state = self.normalizer.apply(None, patch)?;
        let record = OffspringRecord {
            id: utils::new_offspring_id()?,
            litter_id: litter_id.map(str::to_string),
            state,
        };
        let (revision, cbor) = record.finalise()?;

        self.tree.insert(record.id.as_bytes(), cbor)?;
        self.flush()?;
        info!(offspring_id = %record.id, %revision, "offspring created");

        Ok(StoredOffspring { record, revision })
    }

    /// Record a litter: `count` offspring in the default state, written together
    pub fn record_litter(
        &self,
        litter_id: &str,
        count: usize,
    ) -> anyhow::Result<Vec<StoredOffspring>> {
        let mut batch = Batch::default();
        let mut created = Vec::with_capacity(count);

        for _ in 0..count {
            let record = OffspringRecord {
                id: utils::new_offspring_id()?,
                litter_id: Some(litter_id.to_string()),
                state: OffspringState::default(),
            };
            let (revision, cbor) = record.finalise()?;
            batch.insert(record.id.as_bytes(), cbor);
            created.push(StoredOffspring { record, revision });
        }

        self.tree.apply_batch(batch)?;
        self.flush()?;
        info!(litter_id, count, "litter recorded");

        Ok(created)
    }

    /// Every offspring recorded under `litter_id`
    pub fn list_litter(&self, litter_id: &str) -> anyhow::Result<Vec<StoredOffspring>> {
        let mut members = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            let stored = decode(&bytes)?;
            if stored.record.litter_id.as_deref() == Some(litter_id) {
                members.push(stored);
            }
        }
        Ok(members)
    }

    /// Normalize `patch` against the stored record and write the merged result.
    ///
    /// With `expected_revision` the write only happens against that exact
    /// revision. Without it, a concurrent writer causes a re-read and a fresh
    /// normalization, up to the configured number of retries.
    pub fn apply_patch(
        &self,
        id: &str,
        patch: &OffspringPatch,
        expected_revision: Option<&str>,
    ) -> anyhow::Result<StoredOffspring> {
        let attempts = self.cas_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let (old, current) = self.load(id)?;

            if let Some(expected) = expected_revision {
                if expected != current.revision {
                    return Err(StoreError::StaleRevision {
                        expected: expected.to_string(),
                        actual: current.revision,
                    }
                    .into());
                }
            }

            let state = self
                .normalizer
                .apply(Some(&current.record.state), patch)
                .with_context(|| format!("patch rejected for offspring {id}"))?;

            if state == current.record.state {
                debug!(offspring_id = id, "patch left offspring unchanged");
                return Ok(current);
            }

            let next = OffspringRecord {
                state,
                ..current.record.clone()
            };
            let (revision, cbor) = next.finalise()?;

            match self
                .tree
                .compare_and_swap(id.as_bytes(), Some(old), Some(cbor))?
            {
                Ok(()) => {
                    self.flush()?;
                    info!(offspring_id = id, %revision, attempt, "offspring updated");
                    return Ok(StoredOffspring {
                        record: next,
                        revision,
                    });
                }
                Err(conflict) => {
                    if let Some(expected) = expected_revision {
                        let actual = conflict
                            .current
                            .map(|bytes| sha256::digest(&bytes[..]))
                            .unwrap_or_default();
                        return Err(StoreError::StaleRevision {
                            expected: expected.to_string(),
                            actual,
                        }
                        .into());
                    }
                    debug!(offspring_id = id, attempt, "concurrent write, retrying");
                }
            }
        }

        Err(StoreError::Contention { attempts }.into())
    }
}
