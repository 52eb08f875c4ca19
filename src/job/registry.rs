use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StevedoreError};
use crate::job::{Args, Job, JobOutcome, RunEnv, run};

/// Creates a fresh job instance for every run.
pub type JobFactory = Box<dyn Fn() -> Box<dyn Job> + Send + Sync>;

/// Job types by call name.
///
/// Registration is explicit; nothing is discovered at runtime.
///
/// ```
/// use stevedore::job::{JobRegistry, call_name};
/// use stevedore::jobs::TextJob;
///
/// let mut registry = JobRegistry::new();
/// registry.register_default::<TextJob>();
/// assert_eq!(call_name::<TextJob>(), "text");
/// assert!(registry.contains("text"));
/// ```
#[derive(Default)]
pub struct JobRegistry {
    factories: BTreeMap<String, JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Registers `J` under the name synthesized from its type name.
    pub fn register_default<J>(&mut self) -> &mut Self
    where
        J: Job + Default + 'static,
    {
        self.register(call_name::<J>(), || Box::new(J::default()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered call names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Job>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| StevedoreError::UnknownJob(name.to_string()))
    }

    /// Creates job `name`, allocates its next working directory and runs it.
    pub fn run(
        &self,
        name: &str,
        dirs: &mut JobDirs,
        args: Args,
        env: &RunEnv<'_>,
    ) -> Result<JobOutcome> {
        let mut job = self.create(name)?;
        let job_dir = dirs.next(name)?;
        run(job.as_mut(), name, &job_dir, args, env)
    }
}

/// Allocates job working directories inside one task directory.
///
/// Directories are `<task_dir>/<job>-NNN`, numbered per job name in call
/// order. A task that calls its jobs in the same order on every run therefore
/// gets the same directories, and with them the same manifests.
#[derive(Debug, Clone)]
pub struct JobDirs {
    task_dir: PathBuf,
    counters: HashMap<String, u32>,
}

impl JobDirs {
    pub fn new(task_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_dir: task_dir.into(),
            counters: HashMap::new(),
        }
    }

    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    /// Returns and creates the next directory for `job`.
    pub fn next(&mut self, job: &str) -> Result<PathBuf> {
        let counter = self.counters.entry(job.to_string()).or_insert(0);
        let dir = self.task_dir.join(format!("{job}-{counter:03}"));
        *counter += 1;

        fs::create_dir_all(&dir).map_err(|source| StevedoreError::io(&dir, source))?;
        Ok(dir)
    }
}

/// Call name of job type `J`: the type name without its module path,
/// generic arguments and `Job` suffix, in snake_case.
pub fn call_name<J: ?Sized>() -> String {
    let full = std::any::type_name::<J>();
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    let short = match short.strip_suffix("Job") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => short,
    };
    snake_case(short)
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
