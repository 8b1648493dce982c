//! Hardware stand-ins for exercising the reader without a chip attached

use crate::bus::BusSession;
use crate::classifier::Launcher;
use crate::signal::SignalSource;
use crate::Trf7960Log;
use core::fmt::Arguments;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::error::Error;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Answers register reads from canned values and records every frame sent
#[derive(Default)]
pub struct ScriptedBus {
    pub sent: Vec<Vec<u8>>,
    /// Replies to continuous IRQ status reads, in order; 0 once exhausted
    pub irq_statuses: VecDeque<u8>,
    pub fifo_status: u8,
    /// Reply to the FIFO read, address byte slot included
    pub fifo: Vec<u8>,
    pub rssi: u8,
    pub short_transfer: bool,
}

impl ScriptedBus {
    pub fn new() -> ScriptedBus {
        ScriptedBus::default()
    }

    pub fn sent_fifo_read(&self) -> bool {
        self.sent.iter().any(|frame| frame[0] == 0x7f)
    }
}

impl BusSession for ScriptedBus {
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize, Box<dyn Error>> {
        self.sent.push(tx.to_vec());

        match tx[0] {
            0x6c => rx[1] = self.irq_statuses.pop_front().unwrap_or(0),
            0x5c => rx[1] = self.fifo_status,
            0x4f => rx[1] = self.rssi,
            0x7f => {
                let n = rx.len().min(self.fifo.len());

                rx[..n].copy_from_slice(&self.fifo[..n]);
            }
            _ => (),
        }

        if self.short_transfer {
            Ok(tx.len() - 1)
        } else {
            Ok(tx.len())
        }
    }
}

/// IRQ line whose polled levels are scripted; the unbounded wait always succeeds
#[derive(Default)]
pub struct ScriptedIrq {
    pub levels: VecDeque<bool>,
    pub polls: usize,
    pub waits: usize,
    /// Slice passed to each bounded poll
    pub slices: Vec<Duration>,
}

impl SignalSource for ScriptedIrq {
    fn is_asserted(&mut self) -> Result<bool, Box<dyn Error>> {
        self.polls += 1;
        Ok(self.levels.pop_front().unwrap_or(false))
    }

    fn wait_asserted(&mut self) -> Result<(), Box<dyn Error>> {
        self.waits += 1;
        Ok(())
    }

    fn poll_asserted(&mut self, slice: Duration) -> Result<bool, Box<dyn Error>> {
        self.slices.push(slice);
        self.is_asserted()
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub launches: Vec<(PathBuf, Vec<OsString>)>,
    pub fail: bool,
}

impl Launcher for RecordingLauncher {
    fn launch(&mut self, program: &Path, args: &[OsString]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }

        self.launches.push((program.to_path_buf(), args.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLog {
    outputs: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
    debugs: RefCell<Vec<String>>,
}

impl RecordingLog {
    pub fn outputs(&self) -> Vec<String> {
        self.outputs.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    pub fn debugs(&self) -> Vec<String> {
        self.debugs.borrow().clone()
    }
}

impl Trf7960Log for RecordingLog {
    fn output(self: &Self, args: Arguments) {
        self.outputs.borrow_mut().push(args.to_string());
    }
    fn warning(self: &Self, args: Arguments) {
        self.warnings.borrow_mut().push(args.to_string());
    }
    fn error(self: &Self, args: Arguments) {
        self.errors.borrow_mut().push(args.to_string());
    }
    fn debug(self: &Self, args: Arguments) {
        self.debugs.borrow_mut().push(args.to_string());
    }
}
