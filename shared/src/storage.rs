use std::path::Path as LocalPath;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, trace};
use url::Url;

use crate::errors::StorageError;

pub const INPUT_DIRECTORY: &str = "input";
pub const OUTPUT_DIRECTORY: &str = "output";
pub const SCENE_OBJECT_NAME: &str = "render.pov";
pub const RESULT_OBJECT_NAME: &str = "result";
const CHUNK_DESCRIPTOR_PREFIX: &str = "file";


/// Layout of one render run inside a storage container.
///
/// ```text
/// <base>/render.pov       scene description
/// <base>/input/file<n>    one chunk descriptor per worker task
/// <base>/output/result    merged animation
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageNamespace {
    base_url: Url,
}

impl StorageNamespace {
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|error| StorageError::InvalidLocation(format!("{base_url}: {error}")))?;

        if !base_url.path().ends_with('/') {
            let directory_path = format!("{}/", base_url.path());
            base_url.set_path(&directory_path);
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn input_prefix(&self) -> &'static str {
        INPUT_DIRECTORY
    }

    pub fn output_prefix(&self) -> &'static str {
        OUTPUT_DIRECTORY
    }

    pub fn scene_key(&self) -> String {
        SCENE_OBJECT_NAME.to_string()
    }

    pub fn chunk_descriptor_key(&self, ordinal: usize) -> String {
        format!("{INPUT_DIRECTORY}/{CHUNK_DESCRIPTOR_PREFIX}{ordinal}")
    }

    pub fn result_key(&self) -> String {
        format!("{OUTPUT_DIRECTORY}/{RESULT_OBJECT_NAME}")
    }

    pub fn input_url(&self) -> String {
        format!("{}{INPUT_DIRECTORY}/", self.base_url)
    }

    pub fn output_url(&self) -> String {
        format!("{}{OUTPUT_DIRECTORY}/", self.base_url)
    }

    pub fn scene_url(&self) -> String {
        format!("{}{SCENE_OBJECT_NAME}", self.base_url)
    }
}

/// Ordinal of a chunk descriptor key such as `input/file12`, used to keep
/// descriptors in submission order when listing them back.
pub fn chunk_descriptor_ordinal(key: &str) -> Option<usize> {
    key.rsplit('/')
        .next()
        .and_then(|name| name.strip_prefix(CHUNK_DESCRIPTOR_PREFIX))
        .and_then(|ordinal| ordinal.parse().ok())
}


/// The small set of object-storage operations a render run needs.
///
/// Keys are `/`-delimited and relative to the client's root.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Keys of all objects below `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn put(&self, key: &str, contents: Vec<u8>) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes one object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an object (not a directory) is stored under exactly `key`.
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Removes every object below `prefix`, plus a directory marker object named `prefix`.
    async fn clear_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let keys = self.list(prefix).await?;
        debug!(prefix, objects = keys.len(), "Clearing storage prefix.");

        for key in keys {
            self.delete(&key).await?;
        }

        // On a local filesystem the prefix itself is a directory, not a marker.
        if self.object_exists(prefix).await? {
            self.delete(prefix).await?;
        }

        Ok(())
    }

    async fn upload_file(&self, key: &str, local_path: &LocalPath) -> Result<(), StorageError> {
        let contents = tokio::fs::read(local_path)
            .await
            .map_err(|source| StorageError::LocalFile {
                path: local_path.to_path_buf(),
                source,
            })?;

        self.put(key, contents).await
    }

    async fn download_to_file(&self, key: &str, local_path: &LocalPath) -> Result<(), StorageError> {
        let contents = self.get(key).await?;

        tokio::fs::write(local_path, contents)
            .await
            .map_err(|source| StorageError::LocalFile {
                path: local_path.to_path_buf(),
                source,
            })
    }
}


/// [`StorageClient`] backed by any `object_store` implementation.
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    root: Path,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, root: Path) -> Self {
        Self { store, root }
    }

    /// Opens the container behind a URL such as `s3://bucket/renders/` or
    /// `file:///var/renders/`; the URL's path becomes the client's root.
    pub fn from_url(location: &str) -> Result<Self, StorageError> {
        let url = Url::parse(location)
            .map_err(|error| StorageError::InvalidLocation(format!("{location}: {error}")))?;

        let (store, root) = object_store::parse_url(&url)
            .map_err(|error| StorageError::InvalidLocation(format!("{location}: {error}")))?;

        Ok(Self::new(Arc::from(store), root))
    }

    fn resolve(&self, key: &str) -> Path {
        let key_path = Path::from(key);
        self.root.parts().chain(key_path.parts()).collect()
    }

    fn relative_key(&self, location: &Path) -> String {
        match location.prefix_match(&self.root) {
            Some(parts) => parts
                .map(|part| part.as_ref().to_string())
                .collect::<Vec<_>>()
                .join("/"),
            None => location.to_string(),
        }
    }

    fn storage_error(key: &str, source: object_store::Error) -> StorageError {
        StorageError::ObjectStore {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageClient for ObjectStoreClient {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let location = self.resolve(prefix);
        let mut listing = self.store.list(Some(&location));

        let mut keys = Vec::new();
        while let Some(entry) = listing.next().await {
            match entry {
                Ok(meta) => keys.push(self.relative_key(&meta.location)),
                Err(object_store::Error::NotFound { .. }) => continue,
                Err(error) => return Err(Self::storage_error(prefix, error)),
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn put(&self, key: &str, contents: Vec<u8>) -> Result<(), StorageError> {
        trace!(key, bytes = contents.len(), "Uploading object.");

        self.store
            .put(&self.resolve(key), contents.into())
            .await
            .map_err(|error| Self::storage_error(key, error))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        trace!(key, "Downloading object.");

        let result = self
            .store
            .get(&self.resolve(key))
            .await
            .map_err(|error| Self::storage_error(key, error))?;

        let contents = result
            .bytes()
            .await
            .map_err(|error| Self::storage_error(key, error))?;

        Ok(contents.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.store.delete(&self.resolve(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(error) => Err(Self::storage_error(key, error)),
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        let location = self.resolve(key);

        let mut parts: Vec<_> = location.parts().collect();
        if parts.pop().is_none() {
            return Ok(false);
        }
        let parent: Path = parts.into_iter().collect();
        let parent = (!parent.as_ref().is_empty()).then_some(parent);

        // Directories show up as common prefixes, never as objects.
        match self.store.list_with_delimiter(parent.as_ref()).await {
            Ok(listing) => Ok(listing
                .objects
                .iter()
                .any(|meta| meta.location == location)),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(error) => Err(Self::storage_error(key, error)),
        }
    }
}
