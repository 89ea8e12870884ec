use crate::error::{ErrorKind, ScriptError};
use crate::options::Options;
use std::time::{Duration, Instant};

/// Per-execution work budget: a visit counter, a depth ceiling, and a
/// monotonic deadline. Every statement and expression entry runs one
/// check, so the worst-case overshoot past a deadline is the cost of a
/// single node.
pub(crate) struct Budget {
    visits: u32,
    max_visits: u32,
    max_depth: u32,
    started: Instant,
    deadline: Option<Instant>,
}

impl Budget {
    pub(crate) fn new(options: &Options) -> Self {
        let started = Instant::now();
        let deadline = if options.timeout_milliseconds > 0 {
            Some(started + Duration::from_millis(options.timeout_milliseconds))
        } else {
            None
        };
        Self {
            visits: 0,
            max_visits: options.max_node_visits,
            max_depth: options.max_depth,
            started,
            deadline,
        }
    }

    /// Statement-level checks pass depth 0; expression-level checks pass
    /// the evaluator's current recursion depth.
    pub(crate) fn check(&mut self, depth: u32, line: u32, column: u32) -> Result<(), ScriptError> {
        self.visits += 1;
        if self.visits > self.max_visits {
            return Err(ScriptError::new(
                ErrorKind::MaxVisitsExceeded,
                format!("script exceeded {} node visits", self.max_visits),
                line,
                column,
            ));
        }
        if depth > self.max_depth {
            return Err(ScriptError::new(
                ErrorKind::MaxDepthExceeded,
                format!("script exceeded nesting depth {}", self.max_depth),
                line,
                column,
            ));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(ScriptError::new(
                    ErrorKind::ExecutionTimeout,
                    format!(
                        "script exceeded the {} ms execution budget",
                        (deadline - self.started).as_millis()
                    ),
                    line,
                    column,
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
