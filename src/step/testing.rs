//! Spy steps for unit tests.

use super::{BuildContext, EventSink, LaunchContext, Step};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of step calls such as `"prepare:a"` or `"execute:b"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Fault,
}

impl Behavior {
    fn apply(self, what: &str) -> Result<bool> {
        match self {
            Behavior::Succeed => Ok(true),
            Behavior::Fail => Ok(false),
            Behavior::Fault => Err(anyhow::anyhow!("{what} exploded")),
        }
    }
}

/// A step whose stages do exactly what it is told and record that they ran.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    name: String,
    prepare: Behavior,
    execute: Behavior,
    log: CallLog,
}

impl ScriptedStep {
    pub fn new(name: &str, prepare: Behavior, execute: Behavior) -> Self {
        Self {
            name: name.to_string(),
            prepare,
            execute,
            log: CallLog::new(),
        }
    }

    pub fn ok(name: &str) -> Self {
        Self::new(name, Behavior::Succeed, Behavior::Succeed)
    }

    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn into_step(self) -> Arc<dyn Step> {
        Arc::new(self)
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self, _build: &mut BuildContext, _events: &dyn EventSink) -> Result<bool> {
        self.log.record(format!("prepare:{}", self.name));
        self.prepare.apply(&self.name)
    }

    async fn execute(
        &self,
        _build: &mut BuildContext,
        _launch: &LaunchContext,
        _events: &dyn EventSink,
    ) -> Result<bool> {
        self.log.record(format!("execute:{}", self.name));
        self.execute.apply(&self.name)
    }
}
