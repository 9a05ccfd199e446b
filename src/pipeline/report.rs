//! Per-stage accounting of fan-out tasks and recovered failures.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProviderError;

/// One recovered task failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Concept or paper the task was about.
    pub subject: String,
    /// Call shape that failed.
    pub call: String,
    /// Whether the reply arrived but could not be decoded.
    pub parse: bool,
    pub message: String,
}

/// Summary of one fan-out stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    /// Fan-out tasks issued.
    pub tasks: usize,
    pub failures: Vec<TaskFailure>,
}

impl StageReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            tasks: 0,
            failures: Vec::new(),
        }
    }

    /// Count a task and unwrap its result, recording and logging a failure
    /// and substituting `T::default()` for it.
    pub fn settle<T: Default>(
        &mut self,
        subject: &str,
        result: Result<T, ProviderError>,
    ) -> T {
        self.tasks += 1;
        match result {
            Ok(value) => value,
            Err(err) => {
                self.record_failure(subject, &err);
                T::default()
            }
        }
    }

    /// Count a task whose error is handled by the caller.
    pub fn record_failure(&mut self, subject: &str, err: &ProviderError) {
        warn!(stage = %self.stage, subject, error = %err, "task failed, continuing without it");
        self.failures.push(TaskFailure {
            subject: subject.to_string(),
            call: err.call().to_string(),
            parse: err.is_parse(),
            message: err.to_string(),
        });
    }

    pub fn succeeded(&self) -> usize {
        self.tasks.saturating_sub(self.failures.len())
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parse = self.failures.iter().filter(|x| x.parse).count();
        write!(
            f,
            "{}: {}/{} tasks ok",
            self.stage,
            self.succeeded(),
            self.tasks
        )?;
        if !self.failures.is_empty() {
            write!(
                f,
                " ({} call failures, {} unparseable replies)",
                self.failures.len() - parse,
                parse
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_substitutes_default_on_error() {
        let mut report = StageReport::new("seminal");
        let ok: Vec<u32> = report.settle("a", Ok(vec![1, 2]));
        let failed: Vec<u32> = report.settle(
            "b",
            Err(ProviderError::Parse {
                call: "seminal-works",
                subject: "b".into(),
                message: "bad json".into(),
            }),
        );
        assert_eq!(ok, [1, 2]);
        assert!(failed.is_empty());
        assert_eq!(report.tasks, 2);
        assert_eq!(report.succeeded(), 1);
        assert!(report.failures[0].parse);
        assert_eq!(
            report.to_string(),
            "seminal: 1/2 tasks ok (0 call failures, 1 unparseable replies)"
        );
    }
}
