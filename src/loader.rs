//! Template sources for `templatePath` directives.

use futures::future::{self, BoxFuture};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::LoadError;

/// Resolves a template path to its markup.
pub trait TemplateLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, LoadError>>;
}

/// `/a/b.html`, `./a/b.html` and `a\b.html` all name `a/b.html`.
fn normalize_key(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut key = path.as_str();
    loop {
        if let Some(rest) = key.strip_prefix("./") {
            key = rest;
        } else if let Some(rest) = key.strip_prefix('/') {
            key = rest;
        } else {
            break;
        }
    }
    key.to_string()
}

/// In-memory templates keyed by normalized path.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<String, String>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, template: impl Into<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(normalize_key(path), template.into());
        }
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&normalize_key(path)).cloned())
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.entries
            .write()
            .ok()
            .and_then(|mut entries| entries.remove(&normalize_key(path)))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(&normalize_key(path)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateLoader for TemplateCache {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, LoadError>> {
        let result = self
            .get(path)
            .ok_or_else(|| LoadError::NotFound(path.to_string()));
        Box::pin(future::ready(result))
    }
}

/// Loads templates from a list of directories, first match wins.
///
/// Every successful read is kept in an internal [`TemplateCache`].
#[derive(Debug, Default)]
pub struct FileTemplateLoader {
    dirs: Vec<PathBuf>,
    cache: TemplateCache,
}

impl FileTemplateLoader {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            cache: TemplateCache::new(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Reads every `.html` file below the template directories into the
    /// cache. Returns how many templates were cached.
    pub fn preload(&self) -> usize {
        let mut count = 0;
        for dir in &self.dirs {
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() || path.extension().map_or(true, |ext| ext != "html") {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(dir) else {
                    continue;
                };
                let key = relative.to_string_lossy();
                // Earlier directories shadow later ones.
                if self.cache.contains(&key) {
                    continue;
                }
                match fs::read_to_string(path) {
                    Ok(template) => {
                        self.cache.put(&key, template);
                        count += 1;
                    }
                    Err(e) => warn!(path = %path.display(), "failed to preload template: {}", e),
                }
            }
        }
        debug!(count, "preloaded templates");
        count
    }

    fn read(&self, path: &str) -> Result<String, LoadError> {
        if let Some(template) = self.cache.get(path) {
            return Ok(template);
        }

        let key = normalize_key(path);
        if Path::new(&key)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(LoadError::NotFound(path.to_string()));
        }

        for dir in &self.dirs {
            let candidate = dir.join(&key);
            if !candidate.is_file() {
                continue;
            }
            let template = fs::read_to_string(&candidate).map_err(|source| LoadError::Io {
                path: candidate.clone(),
                source,
            })?;
            self.cache.put(&key, template.clone());
            return Ok(template);
        }

        Err(LoadError::NotFound(path.to_string()))
    }
}

impl TemplateLoader for FileTemplateLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, LoadError>> {
        Box::pin(future::ready(self.read(path)))
    }
}
