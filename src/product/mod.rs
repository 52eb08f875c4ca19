//! The [`Product`] type: a real file paired with a virtual destination.
//!
//! Products are the currency of the whole engine. Expansion produces them,
//! jobs consume and emit them, and digests fingerprint them. A product's
//! identity is its `(src, dst)` pair; metadata rides along without affecting
//! equality or hashing, so a metadata-only update never looks like a
//! different file to the cache.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::paths::absolutize;
use crate::value::{Meta, Value};


/// An immutable file reference with a virtual destination and metadata.
#[derive(Clone)]
pub struct Product {
    src: PathBuf,
    dst: String,
    meta: Arc<Meta>,
}

impl Product {
    /// Creates a product whose destination is the file name of `src`.
    pub fn new(src: impl AsRef<Path>) -> Self {
        Self::create(src, None::<String>, Meta::new())
    }

    /// Creates a product with an explicit destination.
    pub fn with_dst(src: impl AsRef<Path>, dst: impl Into<String>) -> Self {
        Self::create(src, Some(dst), Meta::new())
    }

    /// Creates a product from all of its parts.
    ///
    /// `src` is made absolute against the current directory right away. When
    /// `dst` is `None` it defaults to the base name of `src`.
    pub fn create(src: impl AsRef<Path>, dst: Option<impl Into<String>>, meta: Meta) -> Self {
        let src = absolutize(src.as_ref(), None);
        let dst = match dst {
            Some(dst) => dst.into(),
            None => default_dst(&src),
        };
        Self {
            src,
            dst,
            meta: Arc::new(meta),
        }
    }

    pub(crate) fn from_parts(src: PathBuf, dst: String, meta: Arc<Meta>) -> Self {
        Self { src, dst, meta }
    }

    /// Absolute path of the real file.
    pub fn src(&self) -> &Path {
        &self.src
    }

    /// Virtual, slash-separated destination path.
    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Looks up a single metadata entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Returns a new product with `values` merged over the current metadata.
    pub fn update(&self, values: Meta) -> Self {
        let mut meta = (*self.meta).clone();
        meta.extend(values);
        Self {
            src: self.src.clone(),
            dst: self.dst.clone(),
            meta: Arc::new(meta),
        }
    }

    /// Rebuilds the product through `transform`.
    ///
    /// Any `None` returned by the transform keeps the original component, so
    /// relocating a product never loses its metadata.
    pub fn map<F>(&self, transform: F) -> Self
    where
        F: FnOnce(&Path, &str, &Meta) -> (Option<PathBuf>, Option<String>, Option<Meta>),
    {
        let (src, dst, meta) = transform(&self.src, &self.dst, &self.meta);
        Self {
            src: src
                .map(|src| absolutize(src, None))
                .unwrap_or_else(|| self.src.clone()),
            dst: dst.unwrap_or_else(|| self.dst.clone()),
            meta: meta.map(Arc::new).unwrap_or_else(|| Arc::clone(&self.meta)),
        }
    }

    /// Replaces the file name of `dst`, keeping its directory.
    pub fn rename(&self, new_name: &str) -> Self {
        self.rename_with(|_| new_name.to_string())
    }

    /// Like [`Product::rename`], deriving the new name from the old one.
    pub fn rename_with<F>(&self, rename: F) -> Self
    where
        F: FnOnce(&str) -> String,
    {
        let new_dst = match self.dst.rsplit_once('/') {
            Some((dir, name)) => format!("{dir}/{}", rename(name)),
            None => rename(&self.dst),
        };
        self.map(|_, _, _| (None, Some(new_dst), None))
    }

    /// File name component of `dst`.
    pub fn basename(&self) -> &str {
        self.dst.rsplit('/').next().unwrap_or(&self.dst)
    }

    /// Tells whether `src` ends with `.<ext>`.
    ///
    /// The check runs against the real file, not the destination.
    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.src
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.len() > ext.len() && name.ends_with(&format!(".{ext}")))
    }

    /// Whether `src` currently exists. Never consulted by the cache.
    pub fn exists(&self) -> bool {
        self.src.exists()
    }

    /// Merges `meta` into every product of `products`.
    pub fn with_meta(products: &[Product], meta: &Meta) -> Vec<Product> {
        products.iter().map(|p| p.update(meta.clone())).collect()
    }
}

fn default_dst(src: &Path) -> String {
    src.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src && self.dst == other.dst
    }
}

impl Eq for Product {}

impl Hash for Product {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.src.hash(state);
        self.dst.hash(state);
    }
}

impl fmt::Debug for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Product[src='{}', dst='{}', meta={}]",
            self.src.display(),
            self.dst,
            Value::Map((*self.meta).clone())
        )
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.src.display())
    }
}
