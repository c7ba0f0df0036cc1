// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline stages and the wrapper their threads run in.
//!
//! A stage owns its mailbox subscriptions, polls them from `run`, and
//! returns from `run` only after it has seen `SET STOP`. Commands it does
//! not understand are ignored.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::command::{CmdType, Command};
use crate::error::RadioResult;
use crate::mailbox::MailboxRegistry;

/// Sleep between polls when a stage found nothing to do.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Name of the mailbox every stage takes commands from.
pub const CMD_MAILBOX: &str = "cmd";

/// Lifecycle of a registered stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Created,
    Subscribed,
    Running,
    Stopping,
    Joined,
}

/// How a stage's thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    Failed(String),
    Panicked(String),
}

pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Attach to the mailboxes this stage reads and writes.
    fn subscribe(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()>;

    /// Stage main loop. Must return once `SET STOP` has been processed.
    fn run(&mut self) -> RadioResult<()>;

    fn exec_set_command(&mut self, _cmd: &Command) -> RadioResult<()> {
        Ok(())
    }

    fn exec_get_command(&mut self, _cmd: &Command) -> RadioResult<()> {
        Ok(())
    }

    fn exec_rep_command(&mut self, _cmd: &Command) -> RadioResult<()> {
        Ok(())
    }

    fn exec_command(&mut self, cmd: &Command) -> RadioResult<()> {
        match cmd.cmd {
            CmdType::Set => self.exec_set_command(cmd),
            CmdType::Get => self.exec_get_command(cmd),
            CmdType::Rep => self.exec_rep_command(cmd),
            CmdType::None => Ok(()),
        }
    }

    /// Run one command, logging a rejected one instead of stopping.
    /// Returns true when the command was `SET STOP`.
    fn handle_command(&mut self, cmd: &Command) -> bool {
        if let Err(e) = self.exec_command(cmd) {
            warn!("{}: {} rejected: {}", self.name(), cmd, e);
        }
        cmd.is_stop()
    }
}

/// Run a stage to completion on the current thread.
///
/// Errors and panics out of `run` end the stage; they are logged here
/// and never restart it.
pub fn run_stage(stage: &mut dyn Stage) -> StageOutcome {
    hook_sigsegv();
    let name = stage.name().to_string();
    info!(stage = %name, "starting");

    let result = panic::catch_unwind(AssertUnwindSafe(|| stage.run()));
    match result {
        Ok(Ok(())) => {
            info!(stage = %name, "terminated");
            StageOutcome::Completed
        }
        Ok(Err(e)) => {
            error!(stage = %name, "terminated on error: {}", e);
            StageOutcome::Failed(e.to_string())
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            error!(stage = %name, "panicked: {}", msg);
            StageOutcome::Panicked(msg)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Print a banner on SIGSEGV before letting the default action kill the
/// process. Installed once per process.
///
/// This replaces the Rust runtime's own SIGSEGV handler, so a stack
/// overflow no longer prints "has overflowed its stack" and only the
/// banner and the plain segfault remain.
#[cfg(unix)]
pub fn hook_sigsegv() {
    use std::sync::Once;

    static HOOK: Once = Once::new();

    extern "C" fn banner(sig: libc::c_int) {
        const MSG: &[u8] = b"\n-----------\n-----------\n a pipeline stage caught SIGSEGV\n-----------\n-----------\n";
        // SAFETY: write, signal and raise are async-signal-safe.
        unsafe {
            libc::write(libc::STDERR_FILENO, MSG.as_ptr().cast(), MSG.len());
            libc::signal(sig, libc::SIG_DFL);
            libc::raise(sig);
        }
    }

    HOOK.call_once(|| {
        // SAFETY: the sigaction struct is fully initialised before use and
        // the handler only calls async-signal-safe functions.
        unsafe {
            let mut act: libc::sigaction = std::mem::zeroed();
            libc::sigemptyset(&mut act.sa_mask);
            act.sa_sigaction = banner as extern "C" fn(libc::c_int) as libc::sighandler_t;
            act.sa_flags = 0;
            if libc::sigaction(libc::SIGSEGV, &act, std::ptr::null_mut()) != 0 {
                warn!("could not install SIGSEGV handler");
            }
        }
    });
}

#[cfg(not(unix))]
pub fn hook_sigsegv() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CmdTarget;
    use crate::error::RadioError;

    #[derive(Default)]
    struct Recorder {
        sets: usize,
        gets: usize,
        reps: usize,
        fail_on_get: bool,
    }

    impl Stage for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn subscribe(&mut self, _mailboxes: &MailboxRegistry) -> RadioResult<()> {
            Ok(())
        }

        fn run(&mut self) -> RadioResult<()> {
            if self.fail_on_get {
                return Err(RadioError::runtime("recorder", "device gone"));
            }
            Ok(())
        }

        fn exec_set_command(&mut self, _cmd: &Command) -> RadioResult<()> {
            self.sets += 1;
            Ok(())
        }

        fn exec_get_command(&mut self, _cmd: &Command) -> RadioResult<()> {
            self.gets += 1;
            if self.fail_on_get {
                return Err(RadioError::runtime("recorder", "no"));
            }
            Ok(())
        }

        fn exec_rep_command(&mut self, _cmd: &Command) -> RadioResult<()> {
            self.reps += 1;
            Ok(())
        }
    }

    struct Panicker;

    impl Stage for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }

        fn subscribe(&mut self, _mailboxes: &MailboxRegistry) -> RadioResult<()> {
            Ok(())
        }

        fn run(&mut self) -> RadioResult<()> {
            panic!("boom");
        }
    }

    #[test]
    fn test_exec_command_dispatches_on_type() {
        let mut stage = Recorder::default();
        stage.exec_command(&Command::set(CmdTarget::RxMode)).unwrap();
        stage
            .exec_command(&Command::new(CmdType::Get, CmdTarget::RxAfGain))
            .unwrap();
        stage
            .exec_command(&Command::new(CmdType::Rep, CmdTarget::RxAfGain))
            .unwrap();
        stage
            .exec_command(&Command::new(CmdType::None, CmdTarget::NullCmd))
            .unwrap();
        assert_eq!((stage.sets, stage.gets, stage.reps), (1, 1, 1));
    }

    #[test]
    fn test_handle_command_swallows_errors_and_spots_stop() {
        let mut stage = Recorder {
            fail_on_get: true,
            ..Default::default()
        };
        assert!(!stage.handle_command(&Command::new(CmdType::Get, CmdTarget::RxMode)));
        assert!(stage.handle_command(&Command::stop()));
        assert!(!stage.handle_command(&Command::new(CmdType::Rep, CmdTarget::Stop)));
    }

    #[test]
    fn test_run_stage_reports_outcome() {
        assert_eq!(run_stage(&mut Recorder::default()), StageOutcome::Completed);

        let mut failing = Recorder {
            fail_on_get: true,
            ..Default::default()
        };
        assert_eq!(
            run_stage(&mut failing),
            StageOutcome::Failed("recorder: device gone".into())
        );

        assert_eq!(run_stage(&mut Panicker), StageOutcome::Panicked("boom".into()));
    }
}
