//! Product filters used by `expr => filter` expansion.
//!
//! A string filter has the form `[[new_base:]old_base:]glob` and always
//! operates on product destinations:
//!
//! 1. with `old_base`, keep only products whose `dst` lies under it
//! 2. strip the `old_base/` prefix from `dst`
//! 3. match the remainder against `glob` (a leading `!` negates the match)
//! 4. with `new_base`, prepend it to the stripped `dst`
//!
//! So `"out:src:**/*.json"` selects every JSON file below `src/` and moves
//! it below `out/` in one step.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StevedoreError};
use crate::expand::Expander;
use crate::glob::Glob;
use crate::paths::join_slash;
use crate::product::Product;

/// Closure filter: receives the expanded products and an expander bound to
/// the same context, returns the filtered list.
pub type FilterFn = dyn Fn(Vec<Product>, &Expander<'_>) -> Result<Vec<Product>> + Send + Sync;

/// The right-hand side of a filtered expression.
#[derive(Clone)]
pub enum Filter {
    /// A `[[new_base:]old_base:]glob` string, parsed when applied.
    Spec(String),
    /// An arbitrary product transformation.
    Fn(Arc<FilterFn>),
}

impl Filter {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Vec<Product>, &Expander<'_>) -> Result<Vec<Product>> + Send + Sync + 'static,
    {
        Filter::Fn(Arc::new(f))
    }

    pub(crate) fn apply(
        &self,
        products: Vec<Product>,
        expander: &Expander<'_>,
    ) -> Result<Vec<Product>> {
        match self {
            Filter::Spec(spec) => Ok(FilterSpec::parse(spec)?.apply(&products)),
            Filter::Fn(f) => f(products, expander),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            Filter::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl From<&str> for Filter {
    fn from(spec: &str) -> Self {
        Filter::Spec(spec.to_string())
    }
}

impl From<String> for Filter {
    fn from(spec: String) -> Self {
        Filter::Spec(spec)
    }
}

/// A parsed string filter.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    new_base: Option<String>,
    old_base: Option<String>,
    glob: Glob,
    negated: bool,
    old_base_glob: Option<Glob>,
    under_old_base: Option<Glob>,
}

impl FilterSpec {
    /// Parses `[[new_base:]old_base:]glob`.
    ///
    /// Empty base components are treated as absent, so `"out::*.txt"` only
    /// rebases and `":*.txt"` is the same as `"*.txt"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (new_base, old_base, glob) = split_spec(spec);
        if glob.is_empty() || glob == "!" {
            return Err(StevedoreError::InvalidFilter {
                filter: spec.to_string(),
                message: "glob part is empty".to_string(),
            });
        }

        let (negated, glob) = match glob.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, glob),
        };

        let non_empty = |s: Option<&str>| {
            s.filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
        };
        let new_base = non_empty(new_base);
        let old_base = non_empty(old_base);
        let old_base_glob = old_base.as_deref().map(Glob::new).transpose()?;
        let under_old_base = old_base
            .as_deref()
            .map(|base| Glob::new(&format!("{base}/**/*")))
            .transpose()?;

        Ok(Self {
            new_base,
            old_base,
            glob: Glob::new(glob)?,
            negated,
            old_base_glob,
            under_old_base,
        })
    }

    pub fn new_base(&self) -> Option<&str> {
        self.new_base.as_deref()
    }

    pub fn old_base(&self) -> Option<&str> {
        self.old_base.as_deref()
    }

    pub fn glob(&self) -> &str {
        self.glob.pattern()
    }

    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Tests a destination path that already had `old_base` stripped.
    pub fn matches(&self, dst: &str) -> bool {
        self.glob.is_match(dst) != self.negated
    }

    /// Selects, strips and rebases `products`, preserving their order.
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        products
            .iter()
            .filter_map(|product| {
                let stripped = match (&self.old_base_glob, &self.under_old_base) {
                    (Some(base), Some(under)) => {
                        if !under.is_match(product.dst()) {
                            return None;
                        }
                        strip_base(product.dst(), base)?
                    }
                    _ => product.dst().to_string(),
                };

                if !self.matches(&stripped) {
                    return None;
                }

                let dst = match &self.new_base {
                    Some(base) => join_slash(base, &stripped),
                    None => stripped,
                };
                Some(product.map(|_, _, _| (None, Some(dst), None)))
            })
            .collect()
    }
}

fn split_spec(spec: &str) -> (Option<&str>, Option<&str>, &str) {
    let mut parts = spec.splitn(3, ':');
    let first = parts.next().unwrap_or_default();
    match (parts.next(), parts.next()) {
        (None, _) => (None, None, first),
        (Some(glob), None) => (None, Some(first), glob),
        (Some(old_base), Some(glob)) => (Some(first), Some(old_base), glob),
    }
}

/// Drops the shortest leading run of segments of `dst` that matches `base`.
///
/// `base` may contain `**`, so the number of stripped segments depends on
/// `dst` rather than on `base`.
fn strip_base(dst: &str, base: &Glob) -> Option<String> {
    dst.match_indices('/')
        .map(|(i, _)| i)
        .find(|&i| base.is_match(&dst[..i]))
        .map(|i| dst[i + 1..].to_string())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn products() -> Vec<Product> {
        ["xml/foo.xml", "bar/1.json", "bar2.json", "png/foo.json", "bar/one.png"]
            .iter()
            .map(|f| Product::with_dst(f, *f))
            .collect()
    }

    fn filter(spec: &str) -> Vec<Product> {
        FilterSpec::parse(spec).unwrap().apply(&products())
    }

    #[test]
    fn test_parse_components() {
        let cases = [
            ("**/*", None, None, "**/*"),
            ("old_base:**/*", None, Some("old_base"), "**/*"),
            ("new_base::**/*", Some("new_base"), None, "**/*"),
            (
                "new_base/foo:old_base/bar:files/*.{xml,yml,json}",
                Some("new_base/foo"),
                Some("old_base/bar"),
                "files/*.{xml,yml,json}",
            ),
        ];
        for (input, new_base, old_base, glob) in cases {
            let spec = FilterSpec::parse(input).unwrap();
            assert_eq!(spec.new_base(), new_base, "{input}");
            assert_eq!(spec.old_base(), old_base, "{input}");
            assert_eq!(spec.glob(), glob, "{input}");
        }
    }

    #[test]
    fn test_parse_rejects_empty_glob() {
        for input in ["", "base:", "a:b:", "!"] {
            assert!(
                matches!(
                    FilterSpec::parse(input),
                    Err(StevedoreError::InvalidFilter { .. })
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn test_glob_match() {
        assert!(filter("**/*.jpeg").is_empty());
        assert_eq!(filter("**/*.xml").len(), 1);
        assert_eq!(filter("!**/*.json").len(), 2);
        assert_eq!(filter("png/*").len(), 1);
        assert_eq!(filter("**/foo.json").len(), 1);
    }

    #[test]
    fn test_remove_old_base() {
        assert!(filter("jpeg/**").is_empty());
        assert_eq!(filter("png:**/*")[0].dst(), "foo.json");
    }

    #[test]
    fn test_add_new_base() {
        let filtered = filter("json::**/foo.json");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].dst(), "json/png/foo.json");
    }

    #[test]
    fn test_select_relocate_and_rebase() {
        let products = vec![
            Product::with_dst("a/1.json", "a/1.json"),
            Product::with_dst("b/2.json", "b/2.json"),
        ];

        let moved = FilterSpec::parse("out:a:**/*").unwrap().apply(&products);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].dst(), "out/1.json");
        assert_eq!(moved[0].src(), products[0].src());

        let none = FilterSpec::parse("!**/*.json").unwrap().apply(&products);
        assert!(none.is_empty());
    }

    #[test]
    fn test_nested_old_base() {
        let products = vec![Product::with_dst("x", "src/main/java/A.java")];
        let filtered = FilterSpec::parse("classes:src/main:**/*.java")
            .unwrap()
            .apply(&products);
        assert_eq!(filtered[0].dst(), "classes/java/A.java");
    }

    #[test]
    fn test_recursive_old_base() {
        let products = vec![
            Product::with_dst("x", "gems/core/lib/core.rb"),
            Product::with_dst("y", "lib/top.rb"),
            Product::with_dst("z", "gems/core/spec/core_spec.rb"),
        ];
        let filtered = FilterSpec::parse("out:**/lib:*.rb")
            .unwrap()
            .apply(&products);
        let dsts: Vec<&str> = filtered.iter().map(Product::dst).collect();
        assert_eq!(dsts, vec!["out/core.rb", "out/top.rb"]);

        let wildcard = FilterSpec::parse("src/*:**/*")
            .unwrap()
            .apply(&[Product::with_dst("w", "src/main/a/B.java")]);
        assert_eq!(wildcard[0].dst(), "a/B.java");
    }

    proptest! {
        #[test]
        fn prop_negation_partitions(name in "[a-z]{1,8}", ext in "(json|xml|png)") {
            let products = vec![Product::with_dst("p", format!("{name}.{ext}"))];
            let positive = FilterSpec::parse("*.json").unwrap().apply(&products);
            let negative = FilterSpec::parse("!*.json").unwrap().apply(&products);
            prop_assert_eq!(positive.len() + negative.len(), 1);
        }

        #[test]
        fn prop_plain_glob_keeps_dst(dir in "[a-z]{1,5}", name in "[a-z]{1,5}") {
            let dst = format!("{dir}/{name}.txt");
            let products = vec![Product::with_dst("p", dst.clone())];
            let filtered = FilterSpec::parse("**/*").unwrap().apply(&products);
            prop_assert_eq!(filtered.len(), 1);
            prop_assert_eq!(filtered[0].dst(), dst.as_str());
        }
    }
}
