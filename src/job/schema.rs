use std::fmt;

use crate::error::{Result, StevedoreError};
use crate::expand::Expr;
use crate::value::Value;

/// How an argument slot is bound and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Expands to exactly one product.
    Product,
    /// Expands to any number of products; any change triggers a rebuild.
    Products,
    /// Expands to any number of products; changes are reported as a delta
    /// and never trigger a rebuild on their own.
    IncrementalProducts,
    /// An opaque value, compared structurally.
    Option,
}

impl ArgKind {
    pub fn is_incremental(self) -> bool {
        self == ArgKind::IncrementalProducts
    }

    pub(crate) fn expects(self) -> &'static str {
        match self {
            ArgKind::Product => "a single product expression",
            ArgKind::Products | ArgKind::IncrementalProducts => "a product expression",
            ArgKind::Option => "an option value",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArgKind::Product => "product",
            ArgKind::Products => "products",
            ArgKind::IncrementalProducts => "incremental products",
            ArgKind::Option => "option",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    name: String,
    kind: ArgKind,
}

impl ArgSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }
}

/// The ordered argument slots of a job type.
///
/// Schemas compose: a derived job starts from its base schema and
/// [`extend`](Schema::extend)s it. Redeclaring a name replaces the slot's
/// kind in place, so declaration order stays that of the first declaration.
///
/// ```
/// use stevedore::job::{ArgKind, Schema};
///
/// let base = Schema::new().option("content").option("filename");
/// let json = base.clone().extend(&Schema::new().option("pretty"));
/// assert_eq!(json.len(), 3);
/// assert_eq!(json.get("content").map(|a| a.kind()), Some(ArgKind::Option));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    args: Vec<ArgSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, kind: ArgKind) -> Self {
        let name = name.into();
        match self.args.iter_mut().find(|spec| spec.name == name) {
            Some(spec) => spec.kind = kind,
            None => self.args.push(ArgSpec { name, kind }),
        }
        self
    }

    pub fn product(self, name: impl Into<String>) -> Self {
        self.arg(name, ArgKind::Product)
    }

    pub fn products(self, name: impl Into<String>) -> Self {
        self.arg(name, ArgKind::Products)
    }

    pub fn incremental(self, name: impl Into<String>) -> Self {
        self.arg(name, ArgKind::IncrementalProducts)
    }

    pub fn option(self, name: impl Into<String>) -> Self {
        self.arg(name, ArgKind::Option)
    }

    /// Appends the slots of `other`, overriding same-named slots.
    pub fn extend(self, other: &Schema) -> Self {
        other
            .args
            .iter()
            .fold(self, |schema, spec| schema.arg(spec.name.clone(), spec.kind))
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn get(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|spec| spec.name == name)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// A job is stateful iff it declares at least one slot.
    pub fn is_stateful(&self) -> bool {
        !self.is_empty()
    }

    /// Whether any slot is incremental. Incremental jobs manage their own
    /// working directory.
    pub fn is_incremental(&self) -> bool {
        self.args.iter().any(|spec| spec.kind.is_incremental())
    }
}

/// A single argument passed to a job.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Bound to product slots; expanded before fingerprinting.
    Expr(Expr),
    /// Bound to option slots as is.
    Value(Value),
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Arg::Expr(expr)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

/// Named job arguments in the order they were given.
#[derive(Debug, Clone, Default)]
pub struct Args {
    entries: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value with the same name.
    pub fn set(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.insert(name, arg);
        self
    }

    pub fn expr(self, name: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.set(name, Arg::Expr(expr.into()))
    }

    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Arg::Value(value.into()))
    }

    pub fn insert(&mut self, name: impl Into<String>, arg: impl Into<Arg>) {
        let name = name.into();
        let arg = arg.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = arg,
            None => self.entries.push((name, arg)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, arg)| arg)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arg> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Arguments after a job's setup step.
#[derive(Debug, Clone)]
pub enum Setup {
    /// Names must match the schema exactly: unknown and missing names are
    /// both rejected before anything is bound.
    Synthetic(Args),
    /// Produced by a job's own setup. Unknown names are rejected; slots left
    /// unset bind as an empty expression or a null option.
    Custom(Args),
}

impl Schema {
    /// Orders `setup` by declaration, validating names.
    pub(crate) fn bind(&self, job: &str, setup: Setup) -> Result<Vec<(&ArgSpec, Arg)>> {
        let (mut args, strict) = match setup {
            Setup::Synthetic(args) => (args, true),
            Setup::Custom(args) => (args, false),
        };

        let unknown: Vec<String> = args
            .names()
            .filter(|name| self.get(name).is_none())
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(StevedoreError::UnknownArguments {
                job: job.to_string(),
                names: unknown,
            });
        }

        if strict {
            let missing: Vec<String> = self
                .args
                .iter()
                .filter(|spec| !args.contains(&spec.name))
                .map(|spec| spec.name.clone())
                .collect();
            if !missing.is_empty() {
                return Err(StevedoreError::MissingArguments {
                    job: job.to_string(),
                    names: missing,
                });
            }
        }

        Ok(self
            .args
            .iter()
            .map(|spec| {
                let arg = args.remove(&spec.name).unwrap_or_else(|| match spec.kind {
                    ArgKind::Option => Arg::Value(Value::Null),
                    _ => Arg::Expr(Expr::Empty),
                });
                (spec, arg)
            })
            .collect())
    }
}
