//! Expansion of product expressions into flat product lists.
//!
//! An [`Expr`] is anything that can name files: a product, a path, a list
//! of expressions, an `expr => filter` mapping, a closure, or a reference to
//! a task's output bucket. [`Expander`] resolves an expression into a flat
//! `Vec<Product>`; every shape has exactly one rule.
//!
//! | Shape | Result |
//! |---|---|
//! | `Empty` | `[]` |
//! | `Product` | itself |
//! | `List` | concatenation of each element's expansion, at any depth |
//! | `Path` | the file, or every file below the directory; missing paths warn and yield `[]` |
//! | `Filtered` | each key expanded then passed through its filter |
//! | `Callable` | whatever the closure returns |
//! | `Task` | the referenced bucket, if visible from the context task |

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Result, StevedoreError};
use crate::filter::Filter;
use crate::logging::Logger;
use crate::paths::{absolutize, to_slash};
use crate::product::Product;
use crate::task::ContextTask;

/// Closure expression: receives an expander bound to the same context.
pub type ExprFn = dyn Fn(&Expander<'_>) -> Result<Vec<Product>> + Send + Sync;

/// A product expression.
#[derive(Clone, Default)]
pub enum Expr {
    #[default]
    Empty,
    Product(Product),
    List(Vec<Expr>),
    /// A file or directory, relative to [`ExpandOptions::base_dir`].
    Path(PathBuf),
    /// Ordered `expr => filter` entries; results are concatenated in order.
    Filtered(Vec<(Expr, Filter)>),
    Callable(Arc<ExprFn>),
    Task(TaskRef),
}

/// A reference to task output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// The bucket of one task.
    Named(String),
    /// The buckets of every direct and transitive prerequisite of the
    /// context task.
    Prerequisites,
}

impl Expr {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Expr::Path(path.into())
    }

    /// A single `expr => filter` entry.
    pub fn filtered(expr: impl Into<Expr>, filter: impl Into<Filter>) -> Self {
        Expr::Filtered(vec![(expr.into(), filter.into())])
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Expander<'_>) -> Result<Vec<Product>> + Send + Sync + 'static,
    {
        Expr::Callable(Arc::new(f))
    }

    pub fn task(name: impl Into<String>) -> Self {
        Expr::Task(TaskRef::Named(name.into()))
    }

    pub fn prerequisites() -> Self {
        Expr::Task(TaskRef::Prerequisites)
    }

    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => f.write_str("Empty"),
            Expr::Product(p) => f.debug_tuple("Product").field(p).finish(),
            Expr::List(items) => f.debug_tuple("List").field(items).finish(),
            Expr::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Expr::Filtered(entries) => f.debug_tuple("Filtered").field(entries).finish(),
            Expr::Callable(_) => f.write_str("Callable(..)"),
            Expr::Task(task) => f.debug_tuple("Task").field(task).finish(),
        }
    }
}

impl From<Product> for Expr {
    fn from(product: Product) -> Self {
        Expr::Product(product)
    }
}

impl From<&str> for Expr {
    fn from(path: &str) -> Self {
        Expr::Path(PathBuf::from(path))
    }
}

impl From<String> for Expr {
    fn from(path: String) -> Self {
        Expr::Path(PathBuf::from(path))
    }
}

impl From<&Path> for Expr {
    fn from(path: &Path) -> Self {
        Expr::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Expr {
    fn from(path: PathBuf) -> Self {
        Expr::Path(path)
    }
}

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::list(items)
    }
}

impl<T: Into<Expr>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Expr::Empty)
    }
}

/// Options shared by every rule of one expansion.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    base_dir: Option<PathBuf>,
}

impl ExpandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that relative paths resolve against (defaults to the
    /// process working directory).
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

/// Resolves expressions in a fixed context.
#[derive(Clone)]
pub struct Expander<'a> {
    context: Option<ContextTask<'a>>,
    options: ExpandOptions,
    log: Logger,
}

impl<'a> Expander<'a> {
    pub fn new(context: Option<ContextTask<'a>>, options: ExpandOptions, log: Logger) -> Self {
        Self {
            context,
            options,
            log,
        }
    }

    pub fn context(&self) -> Option<ContextTask<'a>> {
        self.context
    }

    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    pub fn expand(&self, expr: &Expr) -> Result<Vec<Product>> {
        let mut out = Vec::new();
        self.expand_into(expr, &mut out)?;
        Ok(out)
    }

    fn expand_into(&self, expr: &Expr, out: &mut Vec<Product>) -> Result<()> {
        match expr {
            Expr::Empty => {}
            Expr::Product(product) => out.push(product.clone()),
            Expr::List(items) => {
                for item in items {
                    self.expand_into(item, out)?;
                }
            }
            Expr::Path(path) => out.extend(self.expand_path(path)?),
            Expr::Filtered(entries) => {
                for (expr, filter) in entries {
                    let products = self.expand(expr)?;
                    out.extend(filter.apply(products, self)?);
                }
            }
            Expr::Callable(f) => out.extend(f(self)?),
            Expr::Task(task) => out.extend(self.expand_task(task)?),
        }
        Ok(())
    }

    fn expand_path(&self, expr: &Path) -> Result<Vec<Product>> {
        let path = absolutize(expr, self.options.base_dir());
        if !path.exists() {
            self.log.warn(format!(
                "'{}' does not exist. Can't expand path",
                expr.display()
            ));
            return Ok(Vec::new());
        }

        if path.is_dir() {
            expand_dir(&path)
        } else {
            Ok(vec![Product::new(path)])
        }
    }

    fn expand_task(&self, task: &TaskRef) -> Result<Vec<Product>> {
        let Some(context) = self.context else {
            return Err(StevedoreError::Dependency {
                target: describe(task),
                context: "<none>".to_string(),
            });
        };
        let scheduler = context.scheduler();

        match task {
            TaskRef::Named(target) => {
                let bucket = scheduler
                    .bucket(target)
                    .ok_or_else(|| StevedoreError::UnknownTask(target.clone()))?;
                if !context.can_see(target) {
                    return Err(StevedoreError::Dependency {
                        target: target.clone(),
                        context: context.name().to_string(),
                    });
                }
                Ok(bucket)
            }
            TaskRef::Prerequisites => Ok(scheduler
                .all_prerequisites(context.name())
                .iter()
                .filter_map(|name| scheduler.bucket(name))
                .flatten()
                .collect()),
        }
    }
}

fn describe(task: &TaskRef) -> String {
    match task {
        TaskRef::Named(name) => name.clone(),
        TaskRef::Prerequisites => "<prerequisites>".to_string(),
    }
}

/// Every file below `root`, with `dst` relative to `root`.
///
/// Entries are sorted by file name so results are reproducible on one
/// platform; callers must not rely on the order across platforms.
pub(crate) fn expand_dir(root: &Path) -> Result<Vec<Product>> {
    let mut products = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            StevedoreError::io(path, err.into())
        })?;

        if !entry.path().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or_else(|_| entry.path());
        products.push(Product::with_dst(entry.path(), to_slash(relative)?));
    }
    Ok(products)
}

/// Expands `expr` with the default logger.
pub fn expand(
    expr: &Expr,
    context: Option<ContextTask<'_>>,
    options: &ExpandOptions,
) -> Result<Vec<Product>> {
    Expander::new(context, options.clone(), Logger::default()).expand(expr)
}

#[cfg(test)]
mod tests;
