use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CacheError;
use crate::fetch::{storable_header, FetchedDocument};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";
const ANONYMOUS: &str = "anonymous";

/// Root directory holding one sub-directory per named cache.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

/// Metadata file written next to each body
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    owner: String,
    stored_at: DateTime<Utc>,
    response: FetchedDocument,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (creating if needed) the cache called `name`
    pub async fn open(&self, name: &str) -> Result<PersistentCache, CacheError> {
        validate_name(name)?;
        let dir = self.root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(PersistentCache {
            name: name.to_string(),
            dir,
        })
    }

    /// Names of every cache under the root, sorted
    pub async fn names(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        validate_name(name)?;
        match tokio::fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every cache except `keep`, returning the names removed.
    /// Caches left behind by an older version string are orphans.
    pub async fn reap_except(&self, keep: &str) -> Result<Vec<String>, CacheError> {
        let mut reaped = Vec::new();
        for name in self.names().await? {
            if name != keep && self.delete(&name).await? {
                info!("Reaped orphaned cache {}", name);
                reaped.push(name);
            }
        }
        Ok(reaped)
    }
}

/// A named store of full HTTP responses keyed by request URL and by the
/// credentials they were fetched with.
///
/// One agent serves many browsers, so an entry is only visible to requests
/// carrying the same `Cookie` header it was stored under. Requests without
/// cookies share the anonymous partition. Writes have put semantics: storing
/// a key again replaces the previous response. Each file lands through a
/// temp file and a rename.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    name: String,
    dir: PathBuf,
}

impl PersistentCache {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the response stored for `url` under these credentials
    pub async fn match_url(
        &self,
        url: &str,
        credentials: Option<&str>,
    ) -> Result<Option<FetchedDocument>, CacheError> {
        let owner = owner_digest(credentials);
        let meta_path = self.entry_path(url, &owner, META_EXT);
        let raw = match tokio::fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: EntryMeta = serde_json::from_slice(&raw)?;
        if meta.key != url || meta.owner != owner {
            return Err(CacheError::Corrupt(format!("entry for {} holds {}", url, meta.key)));
        }

        let body = match tokio::fs::read(self.entry_path(url, &owner, BODY_EXT)).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::Corrupt(format!("missing body for {}", url)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut response = meta.response;
        response.body = body;
        Ok(Some(response))
    }

    /// Store a response under `url` for these credentials. Non-success
    /// responses are refused and `Ok(false)` is returned. `Set-Cookie` is
    /// never stored.
    pub async fn put(
        &self,
        url: &str,
        credentials: Option<&str>,
        response: &FetchedDocument,
    ) -> Result<bool, CacheError> {
        if !response.is_success() {
            debug!("Refusing to cache {} response for {}", response.status, url);
            return Ok(false);
        }

        let owner = owner_digest(credentials);
        let meta = EntryMeta {
            key: url.to_string(),
            owner: owner.clone(),
            stored_at: Utc::now(),
            // The body lives in its own file
            response: FetchedDocument {
                url: response.url.clone(),
                status: response.status,
                headers: response
                    .headers
                    .iter()
                    .filter(|(name, _)| storable_header(name))
                    .cloned()
                    .collect(),
                body: Vec::new(),
                fetched_at: response.fetched_at,
            },
        };

        // Body first: an entry exists once its metadata does
        self.write_atomic(&self.entry_path(url, &owner, BODY_EXT), &response.body)
            .await?;
        self.write_atomic(&self.entry_path(url, &owner, META_EXT), &serde_json::to_vec(&meta)?)
            .await?;

        debug!(cache = %self.name, url, bytes = response.body.len(), "Stored response");
        Ok(true)
    }

    pub async fn delete(&self, url: &str, credentials: Option<&str>) -> Result<bool, CacheError> {
        let owner = owner_digest(credentials);
        let existed = remove_if_exists(&self.entry_path(url, &owner, META_EXT)).await?;
        remove_if_exists(&self.entry_path(url, &owner, BODY_EXT)).await?;
        Ok(existed)
    }

    /// Request URLs of every stored entry, sorted. A URL stored under
    /// several credentials appears once per entry.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let raw = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<EntryMeta>(&raw) {
                Ok(meta) => keys.push(meta.key),
                Err(e) => debug!("Skipping unreadable entry {}: {}", path.display(), e),
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Remove every entry for every owner, returning how many there were
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(META_EXT) => {
                    if remove_if_exists(&path).await? {
                        removed += 1;
                    }
                }
                Some(BODY_EXT) => {
                    remove_if_exists(&path).await?;
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    fn entry_path(&self, url: &str, owner: &str, ext: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update([0u8]);
        hasher.update(url.as_bytes());
        self.dir.join(format!("{:x}.{}", hasher.finalize(), ext))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Partition an entry belongs to: a digest of the `Cookie` header, so raw
/// session ids never reach the disk
fn owner_digest(credentials: Option<&str>) -> String {
    match credentials.filter(|c| !c.trim().is_empty()) {
        Some(cookie) => format!("{:x}", Sha256::digest(cookie.as_bytes())),
        None => ANONYMOUS.to_string(),
    }
}

fn validate_name(name: &str) -> Result<(), CacheError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}
