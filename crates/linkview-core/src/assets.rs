//! Asset resolution for mesh and texture references
//!
//! Models reference meshes with whatever path their authoring tool produced
//! (`package://robot/meshes/arm.STL`, `..\meshes\arm.stl`, `meshes/arm.stl`).
//! [`AssetSet`] maps those references onto the files a user actually supplied,
//! trying progressively looser matches:
//!
//! 1. direct - the reference is a key as-is
//! 2. normalized - scheme, `./`, leading `/`, backslashes and `..` removed
//! 3. case-insensitive - normalized and lowercased
//! 4. suffix - one path ends with the other on a `/` boundary

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loadable content for one resolved reference
#[derive(Debug, Clone)]
pub struct AssetHandle {
    /// Key the reference resolved to
    pub path: String,
    pub bytes: Arc<[u8]>,
}

impl AssetHandle {
    /// Lowercased file extension of the resolved path, if any
    pub fn extension(&self) -> Option<String> {
        extension(&self.path)
    }
}

/// Maps a mesh reference string to a loadable handle
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Option<AssetHandle>;
}

/// Lowercased extension of a path or reference
pub fn extension(path: &str) -> Option<String> {
    let file = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Normalize a reference for comparison
pub fn normalize_path(reference: &str) -> String {
    let mut path = reference.trim().replace('\\', "/");
    for scheme in ["package://", "model://", "file://"] {
        if let Some(rest) = path.strip_prefix(scheme) {
            path = rest.to_string();
            break;
        }
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// In-memory set of supplied asset files
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    files: HashMap<String, Arc<[u8]>>,
    /// normalized key -> original key
    normalized: HashMap<String, String>,
    /// lowercased normalized key -> original key
    lowercase: HashMap<String, String>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        let path = path.into();
        let normalized = normalize_path(&path);
        self.lowercase.insert(normalized.to_lowercase(), path.clone());
        self.normalized.insert(normalized, path.clone());
        self.files.insert(path, bytes.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Load every file under `root`, keyed by its `/`-separated relative path
    pub fn from_dir(root: &Path) -> std::io::Result<Self> {
        let mut set = Self::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let bytes = std::fs::read(&path)?;
                set.insert(key, bytes);
            }
        }
        debug!(root = %root.display(), files = set.len(), "Loaded asset directory");
        Ok(set)
    }

    fn handle(&self, key: &str) -> Option<AssetHandle> {
        self.files.get(key).map(|bytes| AssetHandle {
            path: key.to_string(),
            bytes: bytes.clone(),
        })
    }

    fn suffix_match(&self, normalized_lower: &str) -> Option<&String> {
        let on_boundary = |long: &str, short: &str| {
            long.len() > short.len()
                && long.ends_with(short)
                && long.as_bytes()[long.len() - short.len() - 1] == b'/'
        };

        // Supplied file is deeper than the reference: shortest such key wins,
        // ties go to the lexically first key
        let deeper = self
            .lowercase
            .iter()
            .filter(|(key, _)| on_boundary(key, normalized_lower))
            .min_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        if let Some((_, original)) = deeper {
            return Some(original);
        }

        // Reference carries extra prefix (package name): longest key wins
        self.lowercase
            .iter()
            .filter(|(key, _)| on_boundary(normalized_lower, key))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, original)| original)
    }
}

impl AssetResolver for AssetSet {
    fn resolve(&self, reference: &str) -> Option<AssetHandle> {
        if let Some(handle) = self.handle(reference) {
            return Some(handle);
        }

        let normalized = normalize_path(reference);
        if normalized.is_empty() {
            return None;
        }
        if let Some(key) = self.normalized.get(&normalized) {
            return self.handle(key);
        }

        let lower = normalized.to_lowercase();
        if let Some(key) = self.lowercase.get(&lower) {
            return self.handle(key);
        }

        let key = self.suffix_match(&lower)?;
        debug!(reference, resolved = %key, "Resolved asset by suffix");
        self.handle(key)
    }
}
