//! The boundary to the task scheduler.
//!
//! Scheduling itself lives outside this crate. Expansion only needs two
//! things from it: the prerequisites of a task (to enforce dependency
//! visibility) and the accumulated output bucket of a task.
//! [`TaskGraph`] is a small in-memory implementation used by embedders that
//! drive tasks themselves, and by the tests.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{Result, StevedoreError};
use crate::expand::{Expr, ExpandOptions, Expander};
use crate::logging::Logger;
use crate::product::Product;

/// Read access to the task graph of an external scheduler.
pub trait Scheduler {
    /// Direct prerequisites of `task`, or `None` for an unknown task.
    fn prerequisites(&self, task: &str) -> Option<Vec<String>>;

    /// Accumulated output products of `task`, or `None` for an unknown task.
    fn bucket(&self, task: &str) -> Option<Vec<Product>>;

    /// Direct and transitive prerequisites of `task` in discovery order.
    ///
    /// Cycles are tolerated; each task is reported once and `task` itself is
    /// never included.
    fn all_prerequisites(&self, task: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::from([task.to_string()]);
        let mut ordered = Vec::new();
        let mut queue: VecDeque<String> = self
            .prerequisites(task)
            .unwrap_or_default()
            .into_iter()
            .collect();

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            queue.extend(self.prerequisites(&name).unwrap_or_default());
            ordered.push(name);
        }
        ordered
    }
}

/// The task an expansion runs on behalf of.
#[derive(Clone, Copy)]
pub struct ContextTask<'a> {
    scheduler: &'a dyn Scheduler,
    name: &'a str,
}

impl<'a> ContextTask<'a> {
    pub fn new(scheduler: &'a dyn Scheduler, name: &'a str) -> Self {
        Self { scheduler, name }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn scheduler(&self) -> &'a dyn Scheduler {
        self.scheduler
    }

    /// Whether `target` is this task or one of its prerequisites.
    pub fn can_see(&self, target: &str) -> bool {
        target == self.name
            || self
                .scheduler
                .all_prerequisites(self.name)
                .iter()
                .any(|name| name == target)
    }
}

#[derive(Debug, Default)]
struct TaskNode {
    prerequisites: Vec<String>,
    bucket: Vec<Product>,
}

/// In-memory task graph with bucket accumulation.
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<String, TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with its direct prerequisites, replacing any earlier
    /// declaration but keeping its bucket.
    pub fn define<I, S>(&mut self, name: &str, prerequisites: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self.tasks.entry(name.to_string()).or_default();
        node.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Expands `expr` in the context of task `name` and appends the result
    /// to its bucket.
    pub fn push(
        &mut self,
        name: &str,
        expr: impl Into<Expr>,
        options: &ExpandOptions,
        log: Logger,
    ) -> Result<&[Product]> {
        if !self.contains(name) {
            return Err(StevedoreError::UnknownTask(name.to_string()));
        }

        let expanded = {
            let context = ContextTask::new(&*self, name);
            Expander::new(Some(context), options.clone(), log).expand(&expr.into())?
        };

        let node = self
            .tasks
            .get_mut(name)
            .ok_or_else(|| StevedoreError::UnknownTask(name.to_string()))?;
        node.bucket.extend(expanded);
        Ok(node.bucket.as_slice())
    }
}

impl Scheduler for TaskGraph {
    fn prerequisites(&self, task: &str) -> Option<Vec<String>> {
        self.tasks.get(task).map(|node| node.prerequisites.clone())
    }

    fn bucket(&self, task: &str) -> Option<Vec<Product>> {
        self.tasks.get(task).map(|node| node.bucket.clone())
    }
}
