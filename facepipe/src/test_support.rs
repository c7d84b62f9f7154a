//! Test-only scripted implementations of the executor and probe seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::Result;

use crate::core::plan::TaskSpec;
use crate::core::poll::Probe;
use crate::io::tasks::{TaskContext, TaskExecutor};

/// Probe that becomes ready on a predetermined attempt.
#[derive(Debug)]
pub struct ScriptedProbe {
    ready_at: u32,
    checks: Cell<u32>,
}

impl ScriptedProbe {
    /// Ready on check number `attempt` (1-indexed) and every check after.
    pub fn ready_at(attempt: u32) -> Self {
        Self {
            ready_at: attempt,
            checks: Cell::new(0),
        }
    }

    /// Never becomes ready.
    pub fn never() -> Self {
        Self::ready_at(u32::MAX)
    }

    /// Number of checks performed so far.
    pub fn checks(&self) -> u32 {
        self.checks.get()
    }
}

impl Probe for ScriptedProbe {
    fn check(&self) -> bool {
        let n = self.checks.get() + 1;
        self.checks.set(n);
        n >= self.ready_at
    }
}

/// Executor that replays scripted pass/fail outcomes and records every call.
#[derive(Debug, Default)]
pub struct ScriptedTaskExecutor {
    outcomes: RefCell<VecDeque<bool>>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl ScriptedTaskExecutor {
    /// Every execution passes.
    pub fn passing() -> Self {
        Self::default()
    }

    /// Replay `outcomes` in order; executions beyond the script pass.
    pub fn with_outcomes(outcomes: Vec<bool>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Names of the tasks executed, in call order.
    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Recorded `(name, args)` pairs, in call order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl TaskExecutor for ScriptedTaskExecutor {
    fn exec(&self, task: &TaskSpec, _ctx: &TaskContext) -> Result<bool> {
        self.calls
            .borrow_mut()
            .push((task.name.clone(), task.args.clone()));
        Ok(self.outcomes.borrow_mut().pop_front().unwrap_or(true))
    }
}
