//! Template resources for `<include>` blocks.
//!
//! A [`ResourceLoader`] turns a resource name into template text. The
//! [`TemplateLoader`] wraps one and caches the parsed result, so each resource
//! is parsed once and can be shared by concurrent renders.

use crate::error::{Result, TemplateError};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tplkit_ast::{ParseOptions, TemplateBlockBinder};
use tracing::{debug, trace};

/// Source of template text, looked up by name.
pub trait ResourceLoader: Send + Sync {
    /// Return the text of the named template, or
    /// [`TemplateError::ResourceNotFound`] when there is none.
    fn load_template(&self, name: &str) -> Result<String>;

    /// The name under which `name` is cached and tracked for cycles. Names
    /// that load the same template must map to the same canonical name.
    fn canonical_name(&self, name: &str) -> String {
        strip_root(name).to_string()
    }
}

/// Resource names may start with `/`; it means the same as no slash.
pub(crate) fn strip_root(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Loads templates from files below a root directory.
///
/// Names are `/`-separated paths relative to the root (a leading `/` is
/// allowed). Names that would escape the root are rejected.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
    extension: Option<String>,
}

impl FileSystemLoader {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().canonicalize().map_err(|e| TemplateError::ResourceLoad {
            name: root.as_ref().display().to_string(),
            source: e,
        })?;
        Ok(Self {
            root,
            extension: None,
        })
    }

    /// Append `extension` to names that do not already have one.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_template_path(&self, name: &str) -> Result<PathBuf> {
        validate_resource_name(name)?;

        let mut path = self.root.clone();
        for segment in strip_root(name).split('/') {
            path.push(segment);
        }

        self.ensure_within_root(name, &path)?;
        Ok(path)
    }

    fn ensure_within_root(&self, name: &str, path: &Path) -> Result<()> {
        // Symlinks may still point outside the root.
        let Ok(resolved) = path.canonicalize() else {
            return Ok(());
        };
        if resolved.starts_with(&self.root) {
            return Ok(());
        }
        Err(TemplateError::ResourceLoad {
            name: name.to_string(),
            source: io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is outside the template root", resolved.display()),
            ),
        })
    }
}

impl ResourceLoader for FileSystemLoader {
    fn load_template(&self, name: &str) -> Result<String> {
        let name = self.canonical_name(name);
        let name = name.as_str();
        let path = self.resolve_template_path(name)?;
        trace!(name, path = %path.display(), "resolving template file");

        if !path.is_file() {
            return Err(TemplateError::ResourceNotFound {
                name: name.to_string(),
            });
        }

        fs::read_to_string(&path).map_err(|e| TemplateError::ResourceLoad {
            name: name.to_string(),
            source: e,
        })
    }

    /// Strips the leading `/` and appends the configured extension when the
    /// last segment has none.
    fn canonical_name(&self, name: &str) -> String {
        let name = strip_root(name);
        match &self.extension {
            Some(extension) if !name.is_empty() => {
                let last = name.rsplit('/').next().unwrap_or(name);
                if Path::new(last).extension().is_none() {
                    format!("{name}.{extension}")
                } else {
                    name.to_string()
                }
            }
            _ => name.to_string(),
        }
    }
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryLoader::insert`].
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        self.templates
            .insert(strip_root(&name).to_string(), source.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load_template(&self, name: &str) -> Result<String> {
        self.templates
            .get(strip_root(name))
            .cloned()
            .ok_or_else(|| TemplateError::ResourceNotFound {
                name: name.to_string(),
            })
    }
}

/// Caching front of a [`ResourceLoader`].
pub struct TemplateLoader {
    resources: Box<dyn ResourceLoader>,
    options: ParseOptions,
    cache: RwLock<HashMap<String, Arc<TemplateBlockBinder>>>,
}

impl TemplateLoader {
    pub fn new(resources: impl ResourceLoader + 'static, options: ParseOptions) -> Self {
        Self {
            resources: Box::new(resources),
            options,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// See [`ResourceLoader::canonical_name`].
    pub fn canonical_name(&self, name: &str) -> String {
        self.resources.canonical_name(name)
    }

    /// Load and parse a template, reusing an earlier parse of the same
    /// canonical name.
    pub fn load(&self, name: &str) -> Result<Arc<TemplateBlockBinder>> {
        let name = self.canonical_name(name);
        let name = name.as_str();
        if let Some(binder) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            trace!(name, "include cache hit");
            return Ok(Arc::clone(binder));
        }

        debug!(name, "loading template resource");
        let source = self.resources.load_template(name)?;
        let binder = Arc::new(tplkit_ast::parse_with_options(&source, &self.options)?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let cached = cache.entry(name.to_string()).or_insert(binder);
        Ok(Arc::clone(cached))
    }

    /// Number of parsed templates in the cache.
    pub fn cached_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for TemplateLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateLoader")
            .field("options", &self.options)
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}

/// Reject names that are empty or could step outside the loader root.
fn validate_resource_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| TemplateError::ResourceLoad {
        name: name.to_string(),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid resource name: {reason}"),
        ),
    };

    if name.contains('\\') || name.contains(':') {
        return Err(invalid("contains '\\' or ':'"));
    }

    let trimmed = name.strip_prefix('/').unwrap_or(name);
    if trimmed.is_empty() {
        return Err(invalid("empty name"));
    }

    for segment in trimmed.split('/') {
        if !is_valid_segment(segment) {
            return Err(invalid(&format!("bad segment '{segment}'")));
        }
    }

    Ok(())
}

fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() || segment == "." || segment == ".." {
        return false;
    }
    segment
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_resource_name("/components/card").is_ok());
        assert!(validate_resource_name("a/b/c.tpl").is_ok());
        assert!(validate_resource_name("header-v2").is_ok());
    }

    #[test]
    fn test_validate_name_invalid() {
        assert!(validate_resource_name("").is_err());
        assert!(validate_resource_name("/").is_err());
        assert!(validate_resource_name("/with/../traversal").is_err());
        assert!(validate_resource_name("/with//double").is_err());
        assert!(validate_resource_name("c:/windows").is_err());
        assert!(validate_resource_name("a\\b").is_err());
        assert!(validate_resource_name("sp ace").is_err());
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with("a", "A");
        assert_eq!(loader.load_template("a").unwrap(), "A");
        assert!(matches!(
            loader.load_template("b"),
            Err(TemplateError::ResourceNotFound { .. })
        ));
    }

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl ResourceLoader for CountingLoader {
        fn load_template(&self, name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("template {name}"))
        }
    }

    #[test]
    fn test_parsed_templates_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = TemplateLoader::new(
            CountingLoader {
                calls: Arc::clone(&calls),
            },
            ParseOptions::default(),
        );

        let first = loader.load("x").unwrap();
        let second = loader.load("x").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.cached_len(), 1);

        loader.clear_cache();
        loader.load("x").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_equivalent_names_share_cache_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = TemplateLoader::new(
            CountingLoader {
                calls: Arc::clone(&calls),
            },
            ParseOptions::default(),
        );

        let plain = loader.load("a").unwrap();
        let rooted = loader.load("/a").unwrap();
        assert!(Arc::ptr_eq(&plain, &rooted));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.cached_len(), 1);
    }

    #[test]
    fn test_filesystem_canonical_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let plain = FileSystemLoader::new(dir.path()).unwrap();
        assert_eq!(plain.canonical_name("/a"), "a");
        assert_eq!(plain.canonical_name("a"), "a");

        let with_ext = plain.with_extension("tpl");
        assert_eq!(with_ext.canonical_name("/dir/a"), "dir/a.tpl");
        assert_eq!(with_ext.canonical_name("dir/a.tpl"), "dir/a.tpl");
        assert_eq!(with_ext.canonical_name("v1.2/a"), "v1.2/a.tpl");
    }

    #[test]
    fn test_memory_loader_ignores_leading_slash() {
        let loader = MemoryLoader::new().with("/card", "C");
        assert_eq!(loader.load_template("card").unwrap(), "C");
        assert_eq!(loader.load_template("/card").unwrap(), "C");
        assert_eq!(loader.canonical_name("/card"), "card");
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let loader = TemplateLoader::new(
            MemoryLoader::new().with("bad", "<if cond:'x'>"),
            ParseOptions::default(),
        );
        assert!(matches!(loader.load("bad"), Err(TemplateError::Parse(_))));
        assert_eq!(loader.cached_len(), 0);
    }
}
