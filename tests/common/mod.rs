#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use assert_fs::prelude::*;
use stevedore::error::{Result, StevedoreError};
use stevedore::expand::Expr;
use stevedore::job::{Job, JobContext, RunEnv, Schema};
use stevedore::logging::Logger;
use stevedore::product::Product;

/// A project tree with a few sources:
///
/// ```text
/// src/App.java
/// src/util/Strings.java
/// res/config.json
/// res/i18n/en.json
/// ```
pub fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("src/App.java")
        .write_str("class App { }")
        .unwrap();
    temp.child("src/util/Strings.java")
        .write_str("class Strings { }")
        .unwrap();
    temp.child("res/config.json")
        .write_str("{\"debug\": false}")
        .unwrap();
    temp.child("res/i18n/en.json")
        .write_str("{\"hello\": \"Hello\"}")
        .unwrap();
    temp
}

pub fn silent() -> RunEnv<'static> {
    RunEnv::new().with_log(Logger::silent())
}

pub fn job_dir(temp: &TempDir, name: &str) -> PathBuf {
    temp.child("build").child(name).path().to_path_buf()
}

/// Concatenates its `srcs` into `bundle.txt`, counting build runs.
#[derive(Default)]
pub struct Bundle {
    pub runs: usize,
}

impl Job for Bundle {
    fn schema(&self) -> Schema {
        Schema::new().products("srcs").option("header")
    }

    fn build(&mut self, ctx: &mut JobContext<'_>) -> Result<Expr> {
        self.runs += 1;
        let mut text = ctx
            .option("header")?
            .as_str()
            .map(|h| format!("{h}\n"))
            .unwrap_or_default();
        for product in ctx.products("srcs")? {
            text.push_str(&read(product.src())?);
            text.push('\n');
        }
        let out = ctx.job_path("bundle.txt");
        fs::write(&out, text).map_err(|source| StevedoreError::IoError {
            path: out.clone(),
            source,
        })?;
        Ok(Product::new(out).into())
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| StevedoreError::IoError {
        path: path.to_path_buf(),
        source,
    })
}
