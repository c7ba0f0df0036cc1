// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Owner of every pipeline stage and its thread.

use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::command::Command;
use crate::error::{RadioError, RadioResult};
use crate::mailbox::{Mailbox, MailboxRegistry};
use crate::stage::{run_stage, Stage, StageOutcome, StageState};

struct Entry {
    name: String,
    state: StageState,
    stage: Option<Box<dyn Stage>>,
    handle: Option<JoinHandle<StageOutcome>>,
}

/// Registers stages, subscribes them, starts one thread per stage and
/// joins them at shutdown.
#[derive(Default)]
pub struct ThreadRegistry {
    entries: Vec<Entry>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: Box<dyn Stage>) {
        let name = stage.name().to_string();
        debug!("registered stage {}", name);
        self.entries.push(Entry {
            name,
            state: StageState::Created,
            stage: Some(stage),
            handle: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn state(&self, name: &str) -> Option<StageState> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.state)
    }

    pub fn subscribe_all(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()> {
        for entry in &mut self.entries {
            if let Some(stage) = entry.stage.as_mut() {
                stage.subscribe(mailboxes)?;
                entry.state = StageState::Subscribed;
            }
        }
        Ok(())
    }

    /// Start every subscribed stage on its own named thread.
    pub fn start_all(&mut self) -> RadioResult<()> {
        for entry in &mut self.entries {
            if entry.state != StageState::Subscribed {
                continue;
            }
            let Some(mut stage) = entry.stage.take() else {
                continue;
            };
            let handle = thread::Builder::new()
                .name(entry.name.clone())
                .spawn(move || run_stage(&mut *stage))
                .map_err(|e| RadioError::runtime(entry.name.clone(), e.to_string()))?;
            entry.handle = Some(handle);
            entry.state = StageState::Running;
        }
        info!("started {} stage thread(s)", self.running_count());
        Ok(())
    }

    fn running_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == StageState::Running)
            .count()
    }

    /// Wait for every started stage to finish.
    pub fn join_all(&mut self) -> Vec<(String, StageOutcome)> {
        let mut outcomes = Vec::new();
        for entry in &mut self.entries {
            let Some(handle) = entry.handle.take() else {
                continue;
            };
            // run_stage catches panics; a join error means the thread
            // died outside of it.
            let outcome = handle
                .join()
                .unwrap_or_else(|_| StageOutcome::Panicked("thread join failed".into()));
            if outcome != StageOutcome::Completed {
                error!("stage {} ended abnormally: {:?}", entry.name, outcome);
            }
            entry.state = StageState::Joined;
            outcomes.push((entry.name.clone(), outcome));
        }
        outcomes
    }

    /// Post `SET STOP` and join everything.
    pub fn shutdown(&mut self, cmd: &Mailbox<Command>) -> Vec<(String, StageOutcome)> {
        for entry in &mut self.entries {
            if entry.state == StageState::Running {
                entry.state = StageState::Stopping;
            }
        }
        info!("shutting down {} stage(s)", self.entries.len());
        cmd.put(Command::stop());
        self.join_all()
    }
}
