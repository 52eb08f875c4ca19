use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::error::StevedoreError;
use crate::expand::{ExpandOptions, Expander, Expr, expand};
use crate::filter::Filter;
use crate::logging::Logger;
use crate::product::Product;
use crate::task::{ContextTask, TaskGraph};
use crate::value::{Value, meta};

fn tree() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("src/nested")).unwrap();
    fs::create_dir_all(root.join("src/empty")).unwrap();
    fs::write(root.join("src/a.json"), "{}").unwrap();
    fs::write(root.join("src/b.xml"), "<b/>").unwrap();
    fs::write(root.join("src/nested/c.json"), "[]").unwrap();
    fs::write(root.join("single.txt"), "one").unwrap();
    temp_dir
}

fn options(root: &Path) -> ExpandOptions {
    ExpandOptions::new().with_base_dir(root)
}

fn quiet(options: ExpandOptions) -> Expander<'static> {
    Expander::new(None, options, Logger::silent())
}

fn dsts(products: &[Product]) -> Vec<&str> {
    products.iter().map(Product::dst).collect()
}

#[test]
fn test_empty_and_product() {
    let expander = quiet(ExpandOptions::default());
    assert!(expander.expand(&Expr::Empty).unwrap().is_empty());
    assert!(expander.expand(&Expr::from(None::<Product>)).unwrap().is_empty());

    let product = Product::create("a.txt", Some("x/a.txt"), meta([("k", 1)]));
    let expanded = expander.expand(&product.clone().into()).unwrap();
    assert_eq!(expanded, vec![product]);
    assert_eq!(expanded[0].get("k"), Some(&Value::Int(1)));
}

#[test]
fn test_expansion_of_products_is_a_fixed_point() {
    let expander = quiet(ExpandOptions::default());
    let products = vec![Product::new("a"), Product::with_dst("b", "dir/b")];

    let once = expander.expand(&Expr::from(products.clone())).unwrap();
    let twice = expander.expand(&Expr::from(once.clone())).unwrap();
    assert_eq!(once, products);
    assert_eq!(twice, once);
}

#[test]
fn test_nested_lists_flatten() {
    let expander = quiet(ExpandOptions::default());
    let product = Product::new("deep.txt");
    let nested = Expr::list([Expr::list([Expr::list([product.clone()])]), Expr::Empty]);
    assert_eq!(expander.expand(&nested).unwrap(), vec![product]);
}

#[test]
fn test_file_path_expands_to_single_product() {
    let temp_dir = tree();
    let expanded = quiet(options(temp_dir.path()))
        .expand(&"single.txt".into())
        .unwrap();
    assert_eq!(expanded.len(), 1);
    assert_eq!(expanded[0].src(), temp_dir.path().join("single.txt"));
    assert_eq!(expanded[0].dst(), "single.txt");
}

#[test]
fn test_directory_expands_to_files_relative_to_root() {
    let temp_dir = tree();
    let expanded = quiet(options(temp_dir.path()))
        .expand(&"src".into())
        .unwrap();

    assert_eq!(dsts(&expanded), vec!["a.json", "b.xml", "nested/c.json"]);
    assert!(expanded.iter().all(|p| p.src().is_absolute()));
    assert_eq!(expanded[2].src(), temp_dir.path().join("src/nested/c.json"));
}

#[test]
fn test_missing_path_is_not_fatal() {
    let temp_dir = tree();
    let expanded = quiet(options(temp_dir.path()))
        .expand(&"does/not/exist".into())
        .unwrap();
    assert!(expanded.is_empty());
}

#[test]
fn test_filtered_entries_concatenate_in_order() {
    let temp_dir = tree();
    let expr = Expr::Filtered(vec![
        (Expr::from("src"), Filter::from("**/*.json")),
        (Expr::from("src"), Filter::from("xml::*.xml")),
    ]);
    let expanded = quiet(options(temp_dir.path())).expand(&expr).unwrap();
    assert_eq!(dsts(&expanded), vec!["a.json", "nested/c.json", "xml/b.xml"]);
}

#[test]
fn test_filter_rebases_directory_output() {
    let temp_dir = tree();
    let expr = Expr::filtered("src", "out:nested:**/*");
    let expanded = quiet(options(temp_dir.path())).expand(&expr).unwrap();
    assert_eq!(dsts(&expanded), vec!["out/c.json"]);
}

#[test]
fn test_invalid_filter_is_fatal() {
    let expr = Expr::filtered(Product::new("a"), "out:base:");
    let err = quiet(ExpandOptions::default()).expand(&expr).unwrap_err();
    assert!(matches!(err, StevedoreError::InvalidFilter { .. }));
}

#[test]
fn test_callable_filter_and_expression() {
    let temp_dir = tree();
    let tag = Filter::func(|products, _| {
        Ok(Product::with_meta(&products, &meta([("tagged", true)])))
    });
    let expr = Expr::list([
        Expr::filtered("single.txt", tag),
        Expr::func(|expander| expander.expand(&"src/b.xml".into())),
    ]);

    let expanded = quiet(options(temp_dir.path())).expand(&expr).unwrap();
    assert_eq!(dsts(&expanded), vec!["single.txt", "b.xml"]);
    assert_eq!(expanded[0].get("tagged"), Some(&Value::Bool(true)));
    assert!(expanded[1].get("tagged").is_none());
}

#[test]
fn test_task_reference_requires_visibility() {
    let mut graph = TaskGraph::new();
    graph
        .define("fetch", Vec::<String>::new())
        .define("compile", ["fetch"])
        .define("docs", Vec::<String>::new());
    let options = ExpandOptions::default();
    graph
        .push("fetch", Product::new("lib.jar"), &options, Logger::silent())
        .unwrap();
    graph
        .push("docs", Product::new("index.html"), &options, Logger::silent())
        .unwrap();

    let context = ContextTask::new(&graph, "compile");
    let visible = expand(&Expr::task("fetch"), Some(context), &options).unwrap();
    assert_eq!(visible, vec![Product::new("lib.jar")]);

    let err = expand(&Expr::task("docs"), Some(context), &options).unwrap_err();
    match err {
        StevedoreError::Dependency { target, context } => {
            assert_eq!(target, "docs");
            assert_eq!(context, "compile");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = expand(&Expr::task("ghost"), Some(context), &options).unwrap_err();
    assert!(matches!(err, StevedoreError::UnknownTask(_)));

    let err = expand(&Expr::task("fetch"), None, &options).unwrap_err();
    assert!(matches!(err, StevedoreError::Dependency { .. }));
}

#[test]
fn test_prerequisite_outputs() {
    let mut graph = TaskGraph::new();
    graph
        .define("fetch", Vec::<String>::new())
        .define("generate", ["fetch"])
        .define("compile", ["generate"]);
    let options = ExpandOptions::default();
    graph
        .push("fetch", Product::new("a.jar"), &options, Logger::silent())
        .unwrap();
    graph
        .push("generate", Product::new("b.java"), &options, Logger::silent())
        .unwrap();

    let context = ContextTask::new(&graph, "compile");
    let expanded = expand(&Expr::prerequisites(), Some(context), &options).unwrap();
    assert_eq!(expanded, vec![Product::new("b.java"), Product::new("a.jar")]);
}

#[test]
fn test_push_sees_own_bucket() {
    let mut graph = TaskGraph::new();
    graph.define("pack", Vec::<String>::new());
    let options = ExpandOptions::default();
    graph
        .push("pack", Product::new("first"), &options, Logger::silent())
        .unwrap();
    let bucket = graph
        .push("pack", Expr::task("pack"), &options, Logger::silent())
        .unwrap();
    assert_eq!(bucket.len(), 2);
}
