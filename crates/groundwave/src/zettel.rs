//! zettelkasten index.
//!
//! notes live in the database together with two materialised link tables:
//! forward links as written in each body, and back links as their inverse.
//! readers use an in-memory [`Snapshot`] that is swapped wholesale after
//! every write, so a rebuild in progress never blocks them. writers (ingest
//! and rebuild) take one lock across their database writes and the swap, so
//! a rebuild never rewrites links from a stale note list and snapshots are
//! swapped in write order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use groundwave_db::{Database, GroundwaveDb, ZettelRecord};
use groundwave_org::{
    Access, OrgError, extract_access, extract_date_directive, extract_id, extract_id_links,
    extract_title, validate_uuid,
};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// errors from indexing notes.
#[derive(Debug, Error)]
pub enum ZettelError {
    /// the note has no usable `:ID:`
    #[error("invalid note: {0}")]
    Org(#[from] OrgError),

    #[error(transparent)]
    Db(#[from] groundwave_db::Error),

    /// the notes directory could not be read
    #[error("failed to read notes from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// what listings and link views show of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    #[serde(serialize_with = "serialize_access")]
    pub access: Access,
    pub date: Option<DateTime<Utc>>,
}

fn serialize_access<S: serde::Serializer>(access: &Access, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(access.as_str())
}

impl From<&ZettelRecord> for NoteSummary {
    fn from(z: &ZettelRecord) -> Self {
        Self {
            id: z.id.clone(),
            title: z.title.clone(),
            access: z.access,
            date: z.date,
        }
    }
}

/// a consistent view of the notes and the link graph.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub notes: BTreeMap<String, NoteSummary>,
    pub forward: BTreeMap<String, BTreeSet<String>>,
    pub back: BTreeMap<String, BTreeSet<String>>,
}

impl Snapshot {
    fn summaries<'a>(&'a self, ids: Option<&'a BTreeSet<String>>) -> Vec<NoteSummary> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.notes.get(id).cloned())
            .collect()
    }
}

/// the id links of a body, validated, without self references.
fn link_targets(id: &str, body: &str) -> BTreeSet<String> {
    extract_id_links(body)
        .into_iter()
        .filter(|target| target != id && validate_uuid(target).is_ok())
        .collect()
}

/// build the stored form of a note from its org source.
pub fn parse_note(body: &str) -> Result<ZettelRecord, OrgError> {
    let id = extract_id(body)?;
    validate_uuid(&id)?;
    Ok(ZettelRecord {
        id,
        title: extract_title(body),
        body: body.to_string(),
        access: extract_access(body),
        date: extract_date_directive(body),
        updated_at: Utc::now(),
    })
}

pub struct ZettelIndex {
    db: GroundwaveDb,
    notes_dir: Option<PathBuf>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// held by writers from their first database write through the swap
    writes: tokio::sync::Mutex<()>,
    rebuilds: AtomicU64,
}

impl ZettelIndex {
    pub fn new(db: GroundwaveDb, notes_dir: Option<PathBuf>) -> Self {
        Self {
            db,
            notes_dir,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writes: tokio::sync::Mutex::new(()),
            rebuilds: AtomicU64::new(0),
        }
    }

    /// the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// number of completed rebuilds since startup.
    pub fn completed_rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Acquire)
    }

    /// store one note and its links.
    pub async fn ingest(&self, body: &str) -> Result<ZettelRecord, ZettelError> {
        let note = parse_note(body)?;
        let targets = link_targets(&note.id, body);
        let _writes = self.writes.lock().await;
        self.db.ingest_zettel(&note, &targets).await?;
        debug!(id = %note.id, links = targets.len(), "ingested note");
        self.reload().await?;
        Ok(note)
    }

    /// re-derive the whole link graph from the stored bodies.
    ///
    /// when a notes directory is configured its `*.org` files are imported
    /// first.
    pub async fn rebuild_all(&self) -> Result<(), ZettelError> {
        let _writes = self.writes.lock().await;
        if let Some(dir) = &self.notes_dir {
            self.import_dir(dir).await?;
        }

        let notes = self.db.list_zettels().await?;
        let links: Vec<(String, BTreeSet<String>)> = notes
            .iter()
            .map(|n| (n.id.clone(), link_targets(&n.id, &n.body)))
            .collect();
        self.db.rebuild_links(&links).await?;
        self.reload().await?;

        self.rebuilds.fetch_add(1, Ordering::AcqRel);
        info!(notes = notes.len(), "rebuilt zettel links");
        Ok(())
    }

    async fn import_dir(&self, dir: &Path) -> Result<(), ZettelError> {
        let io = |source| ZettelError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(dir).await.map_err(io)?;
        let mut imported = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(io)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("org") {
                continue;
            }
            let body = match tokio::fs::read_to_string(&path).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable note");
                    continue;
                }
            };
            let note = match parse_note(&body) {
                Ok(note) => note,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping note");
                    continue;
                }
            };
            // links are rewritten wholesale by the caller
            self.db.ingest_zettel(&note, &BTreeSet::new()).await?;
            imported += 1;
        }
        debug!(imported, dir = %dir.display(), "imported notes directory");
        Ok(())
    }

    /// load a fresh snapshot from the database and swap it in. callers hold
    /// the write lock.
    async fn reload(&self) -> Result<(), ZettelError> {
        let notes = self.db.list_zettels().await?;
        let mut snapshot = Snapshot {
            notes: notes
                .iter()
                .map(|n| (n.id.clone(), NoteSummary::from(n)))
                .collect(),
            ..Snapshot::default()
        };
        for (source, target) in self.db.list_forward_links().await? {
            snapshot.forward.entry(source).or_default().insert(target);
        }
        for (target, source) in self.db.list_back_links().await? {
            snapshot.back.entry(target).or_default().insert(source);
        }

        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
        Ok(())
    }

    /// a note with its body.
    pub async fn get(&self, id: &str) -> Result<Option<ZettelRecord>, ZettelError> {
        Ok(self.db.get_zettel(id).await?)
    }

    /// a uniformly sampled note.
    pub fn random(&self) -> Option<NoteSummary> {
        let snapshot = self.snapshot();
        if snapshot.notes.is_empty() {
            return None;
        }
        let pick = rand::rng().random_range(0..snapshot.notes.len());
        snapshot.notes.values().nth(pick).cloned()
    }

    /// notes this note links to.
    pub fn links(&self, id: &str) -> Vec<NoteSummary> {
        let snapshot = self.snapshot();
        snapshot.summaries(snapshot.forward.get(id))
    }

    /// notes linking to this note.
    pub fn backlinks(&self, id: &str) -> Vec<NoteSummary> {
        let snapshot = self.snapshot();
        snapshot.summaries(snapshot.back.get(id))
    }

    /// every note, by title.
    pub fn list(&self) -> Vec<NoteSummary> {
        let mut notes: Vec<NoteSummary> = self.snapshot().notes.values().cloned().collect();
        notes.sort_by(|a, b| a.title.cmp(&b.title));
        notes
    }
}

/// handle for requesting rebuilds from the worker.
#[derive(Clone)]
pub struct RebuildHandle {
    tx: mpsc::Sender<()>,
}

impl RebuildHandle {
    /// ask for a rebuild.
    ///
    /// returns false when one is already queued; the queued run will cover
    /// this request too.
    pub fn trigger(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// spawn the rebuild worker and queue the boot-time rebuild.
///
/// the worker runs one rebuild at a time; requests arriving while one is
/// queued collapse into it.
pub fn spawn_rebuild_worker(
    index: Arc<ZettelIndex>,
    cancel: CancellationToken,
) -> (RebuildHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let handle = RebuildHandle { tx };
    handle.trigger();

    let task = tokio::spawn(async move {
        info!("starting zettel rebuild worker");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = rx.recv() => {
                    if next.is_none() {
                        break;
                    }
                }
            }
            if let Err(e) = index.rebuild_all().await {
                warn!(error = %e, "zettel rebuild failed");
            }
        }
        debug!("zettel rebuild worker stopped");
    });

    (handle, task)
}
