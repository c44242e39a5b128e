//! Folder path resolution
//!
//! Turns a slash-delimited path such as `"notes/2024/images"` into the id of
//! the innermost folder, creating missing segments top-down from `root`.
//! Every resolved prefix is cached for the resolver's lifetime.

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::{DriveClient, FOLDER_MIME_TYPE};
use crate::DriveResult;

/// Drive alias for the user's root folder
pub const ROOT_FOLDER_ID: &str = "root";

/// Splits a path on `/` and drops empty segments
///
/// `"A//B/"`, `"/A/B"` and `"A/B"` all yield `["A", "B"]`.
pub fn normalize_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Escapes a value for use inside a single-quoted Drive query literal
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds the search for a non-trashed folder named `name` directly under `parent_id`
pub fn build_folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id),
        FOLDER_MIME_TYPE
    )
}

/// Resolves folder paths to ids with an in-memory cache
///
/// Cache keys are cumulative paths (`"/A"`, `"/A/B"`). Entries are never
/// invalidated; a folder deleted remotely keeps its stale id until the
/// resolver is dropped. Misses are resolved one at a time, so concurrent
/// uploads in this process never create the same folder twice.
pub struct FolderResolver {
    client: DriveClient,
    cache: DashMap<String, String>,
    create_lock: Mutex<()>,
}

impl FolderResolver {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            cache: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// Returns the id of the folder at `path`, creating missing segments
    ///
    /// An empty path (or `"/"`) is the root folder and needs no network call.
    pub async fn ensure_folder(&self, access_token: &str, path: &str) -> DriveResult<String> {
        let segments = normalize_path(path);
        if segments.is_empty() {
            return Ok(ROOT_FOLDER_ID.to_string());
        }

        let full_key = cache_key(&segments);
        if let Some(id) = self.cached(&full_key) {
            debug!(path = %full_key, folder_id = %id, "Folder cache hit");
            return Ok(id);
        }

        let _guard = self.create_lock.lock().await;

        let mut parent_id = ROOT_FOLDER_ID.to_string();
        for depth in 1..=segments.len() {
            let key = cache_key(&segments[..depth]);

            // Another caller may have resolved this prefix while we waited
            if let Some(id) = self.cached(&key) {
                parent_id = id;
                continue;
            }

            let name = segments[depth - 1];
            let id = self.find_or_create(access_token, name, &parent_id).await?;
            self.cache.insert(key, id.clone());
            parent_id = id;
        }

        Ok(parent_id)
    }

    async fn find_or_create(&self, access_token: &str, name: &str, parent_id: &str) -> DriveResult<String> {
        let query = build_folder_query(name, parent_id);
        let existing = self.client.search_files(access_token, &query).await?;

        if let Some(folder) = existing.into_iter().next() {
            debug!(name, folder_id = %folder.id, "Found existing folder");
            return Ok(folder.id);
        }

        let id = self.client.create_folder(access_token, name, parent_id).await?;
        info!(name, parent_id, folder_id = %id, "Created folder");
        Ok(id)
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached path prefixes
    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    /// Returns the cached id for `path`, if resolved before
    pub fn cached_id(&self, path: &str) -> Option<String> {
        let segments = normalize_path(path);
        if segments.is_empty() {
            return Some(ROOT_FOLDER_ID.to_string());
        }
        self.cached(&cache_key(&segments))
    }
}

fn cache_key(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut key, segment| {
        key.push('/');
        key.push_str(segment);
        key
    })
}
