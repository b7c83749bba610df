//! In-memory object store
//!
//! A process-local stand-in for an S3 endpoint, used by tests and by local runs
//! without a storage backend. It models only what the adapters observe: buckets,
//! objects, paginated listing and multipart uploads.

use crate::credentials::ResolvedCredentials;
use crate::factory::ClientFactory;
use crate::traits::{
    BucketClient, BucketInfo, ObjectInfo, ObjectPage, StorageError, StorageResult, UploadedPart,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{SecondsFormat, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_MAX_KEYS: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: String,
    last_modified: String,
}

#[derive(Debug, Default)]
struct StoredBucket {
    created: String,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, StoredBucket>,
    uploads: HashMap<String, PendingUpload>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn etag_of(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

/// Shared backing state; every client built from the same store sees the same data.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
    next_upload: AtomicU64,
}

impl MemoryObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.lock().buckets.keys().cloned().collect()
    }

    /// Multipart uploads that were neither completed nor aborted.
    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    fn put(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<String> {
        let mut state = self.lock();
        let stored = state.buckets.get_mut(bucket).ok_or_else(|| {
            StorageError::UploadFailed(format!("NoSuchBucket: {}", bucket))
        })?;
        let etag = etag_of(&data);
        stored.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag: etag.clone(),
                last_modified: now(),
            },
        );
        Ok(etag)
    }
}

/// Client over a [`MemoryObjectStore`].
pub struct MemoryBucketClient {
    store: Arc<MemoryObjectStore>,
    credentials: ResolvedCredentials,
}

impl MemoryBucketClient {
    pub fn new(store: Arc<MemoryObjectStore>, credentials: ResolvedCredentials) -> Self {
        Self { store, credentials }
    }

    fn signed_url(&self, method: &str, bucket: &str, key: &str, expires_in: Duration) -> String {
        let endpoint = self
            .credentials
            .endpoint
            .as_deref()
            .unwrap_or("memory://local");
        format!(
            "{}/{}/{}?X-Method={}&X-Credential={}&X-Expires={}",
            endpoint.trim_end_matches('/'),
            bucket,
            key,
            method,
            self.credentials.access_key_id,
            expires_in.as_secs()
        )
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    async fn list_buckets(&self) -> StorageResult<Vec<BucketInfo>> {
        Ok(self
            .store
            .lock()
            .buckets
            .iter()
            .map(|(name, bucket)| BucketInfo {
                name: name.clone(),
                creation_date: Some(bucket.created.clone()),
            })
            .collect())
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut state = self.store.lock();
        if state.buckets.contains_key(bucket) {
            return Err(StorageError::BackendError(format!(
                "BucketAlreadyOwnedByYou: {}",
                bucket
            )));
        }
        state.buckets.insert(
            bucket.to_string(),
            StoredBucket {
                created: now(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut state = self.store.lock();
        match state.buckets.get(bucket) {
            None => Err(StorageError::DeleteFailed(format!("NoSuchBucket: {}", bucket))),
            Some(b) if !b.objects.is_empty() => Err(StorageError::DeleteFailed(format!(
                "BucketNotEmpty: {}",
                bucket
            ))),
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_keys: Option<i32>,
    ) -> StorageResult<ObjectPage> {
        let state = self.store.lock();
        let stored = state
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BackendError(format!("NoSuchBucket: {}", bucket)))?;

        let limit = max_keys
            .and_then(|m| usize::try_from(m).ok())
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_MAX_KEYS);
        let prefix = prefix.unwrap_or("");

        let mut matching = stored
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.map_or(true, |after| key.as_str() > after));

        let objects: Vec<ObjectInfo> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as i64,
                last_modified: Some(object.last_modified.clone()),
                etag: object.etag.clone(),
            })
            .collect();

        let is_truncated = matching.next().is_some();
        let next_continuation_token = if is_truncated {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
            is_truncated,
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(self.signed_url("GET", bucket, key, expires_in))
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(self.signed_url("PUT", bucket, key, expires_in))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut state = self.store.lock();
        let stored = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::DeleteFailed(format!("NoSuchBucket: {}", bucket)))?;
        // S3 reports success for keys that do not exist.
        stored.objects.remove(key);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
        body: Bytes,
    ) -> StorageResult<Option<String>> {
        self.store.put(bucket, key, body).map(Some)
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
    ) -> StorageResult<String> {
        let mut state = self.store.lock();
        if !state.buckets.contains_key(bucket) {
            return Err(StorageError::UploadFailed(format!("NoSuchBucket: {}", bucket)));
        }
        let upload_id = format!(
            "upload-{}",
            self.store.next_upload.fetch_add(1, Ordering::Relaxed) + 1
        );
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<UploadedPart> {
        let mut state = self.store.lock();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::UploadFailed(format!("NoSuchUpload: {}", upload_id)))?;
        let etag = etag_of(&body);
        upload.parts.insert(part_number, body);
        Ok(UploadedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> StorageResult<Option<String>> {
        let upload = self
            .store
            .lock()
            .uploads
            .remove(upload_id)
            .ok_or_else(|| StorageError::UploadFailed(format!("NoSuchUpload: {}", upload_id)))?;

        let mut data = BytesMut::new();
        for part in &parts {
            let chunk = upload.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::UploadFailed(format!("InvalidPart: {}", part.part_number))
            })?;
            data.extend_from_slice(chunk);
        }

        let etag = self.store.put(&upload.bucket, &upload.key, data.freeze())?;
        Ok(Some(format!("{}-{}", etag.trim_end_matches('"'), parts.len()) + "\""))
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.store.lock().uploads.remove(upload_id);
        Ok(())
    }
}

/// Factory handing out [`MemoryBucketClient`]s over one shared store.
///
/// Remembers the credentials of every client it built so callers can check
/// which key pair a request ended up using.
#[derive(Default)]
pub struct MemoryClientFactory {
    store: Arc<MemoryObjectStore>,
    issued: Mutex<Vec<ResolvedCredentials>>,
}

impl MemoryClientFactory {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            issued: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> Arc<MemoryObjectStore> {
        self.store.clone()
    }

    pub fn issued(&self) -> Vec<ResolvedCredentials> {
        match self.issued.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ClientFactory for MemoryClientFactory {
    fn build(&self, credentials: &ResolvedCredentials) -> StorageResult<Arc<dyn BucketClient>> {
        match self.issued.lock() {
            Ok(mut guard) => guard.push(credentials.clone()),
            Err(poisoned) => poisoned.into_inner().push(credentials.clone()),
        }
        Ok(Arc::new(MemoryBucketClient::new(
            self.store.clone(),
            credentials.clone(),
        )))
    }
}
