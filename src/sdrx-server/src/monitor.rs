// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Console view of the command bus and the spectrum feed.

use std::thread;

use tracing::{debug, info};

use sdrx_core::{
    CmdType, Command, MailboxRegistry, RadioError, RadioResult, Stage, Subscriber, CMD_MAILBOX,
    POLL_INTERVAL,
};
use sdrx_rx::{SpectrumFrame, SPECTRUM_MAILBOX};

/// Logs every reply seen on the command mailbox and a one-line summary
/// of each spectrum frame.
#[derive(Default)]
pub struct CommandMonitor {
    cmd: Option<Subscriber<Command>>,
    spectrum: Option<Subscriber<SpectrumFrame>>,
    replies: u64,
    frames: u64,
}

impl CommandMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for CommandMonitor {
    fn name(&self) -> &str {
        "CommandMonitor"
    }

    fn subscribe(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()> {
        self.cmd = Some(Subscriber::attach(&mailboxes.get::<Command>(CMD_MAILBOX)?));
        // The spectrum feed is optional.
        if mailboxes.contains(SPECTRUM_MAILBOX) {
            self.spectrum = Some(Subscriber::attach(
                &mailboxes.get::<SpectrumFrame>(SPECTRUM_MAILBOX)?,
            ));
        }
        Ok(())
    }

    fn run(&mut self) -> RadioResult<()> {
        let Some(cmd_rx) = self.cmd.take() else {
            return Err(RadioError::runtime("CommandMonitor", "not subscribed"));
        };
        let spectrum_rx = self.spectrum.take();
        loop {
            let mut did_work = false;
            if let Some(cmd) = cmd_rx.get() {
                did_work = true;
                if cmd.is_stop() {
                    break;
                }
                if cmd.cmd == CmdType::Rep {
                    self.replies += 1;
                    info!("{}", cmd);
                } else {
                    debug!("{}", cmd);
                }
            }
            if let Some(frame) = spectrum_rx.as_ref().and_then(|rx| rx.get()) {
                did_work = true;
                self.frames += 1;
                if let Some((idx, level)) = frame.peak() {
                    debug!(
                        "spectrum #{}: peak {:.1} dB at {:.0} Hz",
                        frame.seq,
                        level,
                        frame.bin_freq(idx)
                    );
                }
            }
            if !did_work {
                thread::sleep(POLL_INTERVAL);
            }
        }
        info!(
            "CommandMonitor: {} replies, {} spectrum frames",
            self.replies, self.frames
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::{CmdTarget, StageOutcome, ThreadRegistry};

    #[test]
    fn test_monitor_counts_replies_until_stop() {
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        let mut monitor = CommandMonitor::new();
        monitor.subscribe(&mailboxes).unwrap();
        assert!(monitor.spectrum.is_none());

        cmd.put(Command::with_int(CmdType::Rep, CmdTarget::RxAfFilter, 2));
        cmd.put(Command::with_int(CmdType::Set, CmdTarget::RxMode, 1));
        cmd.put(Command::stop());
        assert!(monitor.run().is_ok());
        assert_eq!(monitor.replies, 1);
    }

    #[test]
    fn test_monitor_runs_under_registry() {
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        let frames = mailboxes.create::<SpectrumFrame>(SPECTRUM_MAILBOX).unwrap();

        let mut registry = ThreadRegistry::new();
        registry.add(Box::new(CommandMonitor::new()));
        registry.subscribe_all(&mailboxes).unwrap();
        registry.start_all().unwrap();
        frames.put(SpectrumFrame {
            seq: 1,
            center_freq: 0.0,
            span: 48_000.0,
            bins: vec![-80.0, -20.0, -80.0, -80.0],
        });
        let outcomes = registry.shutdown(&cmd);
        assert_eq!(
            outcomes,
            vec![("CommandMonitor".to_string(), StageOutcome::Completed)]
        );
    }
}
