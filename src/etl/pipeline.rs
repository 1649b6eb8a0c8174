//! Minimal ordered-step executor for tabular transforms.

use crate::error::EtlError;
use crate::table::Table;
use std::fmt::Write as _;
use tracing::debug;

type StepFn = Box<dyn Fn(Table) -> Result<Table, EtlError> + Send + Sync>;

struct Step {
    name: String,
    func: StepFn,
}

/// Applies named transform steps strictly in order to a single table.
///
/// Each step either returns a table with the same or an extended row/column
/// set, or fails; the first error propagates immediately with no
/// partial-result recovery. Step names exist only for diagnostics.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn step<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(Table) -> Result<Table, EtlError> + Send + Sync + 'static,
    {
        self.steps.push(Step {
            name: name.to_string(),
            func: Box::new(func),
        });
        self
    }

    pub fn compose(&self, table: Table) -> Result<Table, EtlError> {
        let mut result = table;
        for step in &self.steps {
            debug!(step = %step.name, rows = result.len(), "running pipeline step");
            result = (step.func)(result)?;
        }
        Ok(result)
    }

    /// Human-readable step listing for logs.
    #[must_use]
    pub fn schema(&self) -> String {
        let mut out = String::from("Pipeline schema:");
        for (num, step) in self.steps.iter().enumerate() {
            let _ = write!(out, "\n{}. {}", num + 1, step.name);
        }
        out
    }
}
