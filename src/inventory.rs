//! One ISO15693 single slot inventory per round, repeated forever.
//!
//! ```text
//! Init -> Armed -> AwaitIrq -> ReadStatus -+-> ReadUid -+-> Cleanup
//!                                          +------------+
//! ```
//!
//! Bus failures end the loop. Everything the tag or the chip can get wrong
//! ends the round early at `Cleanup` and the next round starts from a fresh
//! software reset.

use crate::bus::BusSession;
use crate::classifier::{Dispatcher, Launcher, TagAction};
use crate::codec::{FifoStatus, INVENTORY_RESPONSE_LEN};
use crate::config::ReaderConfig;
use crate::register::IRQ_END_OF_TX;
use crate::signal::{SignalSource, StatusIndicator};
use crate::trf7960::Trf7960;
use crate::uid::Uid;
use crate::{debug, Trf7960Log};
use std::error::Error;
use std::thread;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundState {
    Init,
    Armed,
    AwaitIrq,
    ReadStatus,
    ReadUid,
    Cleanup,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The IRQ after arming was not end of TX
    Skipped { irq_status: u8 },
    /// No response IRQ within the poll budget
    TimedOut,
    /// The FIFO did not hold exactly one inventory response
    NoValidTag { fifo: FifoStatus },
    Captured { uid: Uid, action: TagAction },
}

impl RoundOutcome {
    pub fn triggered(&self) -> bool {
        matches!(
            self,
            RoundOutcome::Captured {
                action: TagAction::TriggerStream,
                ..
            }
        )
    }
}

/// What one detection attempt has seen so far
#[derive(Debug)]
pub struct InventoryRound {
    timeout: u32,
    irq_status: u8,
    rx_irq_status: Option<u8>,
    fifo: Option<FifoStatus>,
    captured: Option<(Uid, TagAction)>,
}

impl InventoryRound {
    fn new(timeout: u32) -> InventoryRound {
        InventoryRound {
            timeout,
            irq_status: 0,
            rx_irq_status: None,
            fifo: None,
            captured: None,
        }
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// IRQ status read once the tag response arrived
    pub fn rx_irq_status(&self) -> Option<u8> {
        self.rx_irq_status
    }

    pub fn outcome(&self) -> RoundOutcome {
        if let Some((uid, action)) = self.captured {
            RoundOutcome::Captured { uid, action }
        } else if let Some(fifo) = self.fifo {
            RoundOutcome::NoValidTag { fifo }
        } else if self.irq_status != IRQ_END_OF_TX {
            RoundOutcome::Skipped {
                irq_status: self.irq_status,
            }
        } else {
            RoundOutcome::TimedOut
        }
    }
}

pub struct InventoryStateMachine<'a, B, S, I, L>
where
    B: BusSession,
    S: SignalSource,
    I: StatusIndicator,
    L: Launcher,
{
    log: &'a dyn Trf7960Log,
    config: ReaderConfig,
    chip: Trf7960<B>,
    irq: S,
    indicator: I,
    dispatcher: Dispatcher<'a, L>,
}

impl<'a, B, S, I, L> InventoryStateMachine<'a, B, S, I, L>
where
    B: BusSession,
    S: SignalSource,
    I: StatusIndicator,
    L: Launcher,
{
    pub fn new(
        log: &'a dyn Trf7960Log,
        config: ReaderConfig,
        chip: Trf7960<B>,
        irq: S,
        indicator: I,
        dispatcher: Dispatcher<'a, L>,
    ) -> Self {
        InventoryStateMachine {
            log,
            config,
            chip,
            irq,
            indicator,
            dispatcher,
        }
    }

    pub fn chip(&self) -> &Trf7960<B> {
        &self.chip
    }

    pub fn irq(&self) -> &S {
        &self.irq
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a, L> {
        &self.dispatcher
    }

    /// Runs rounds until the bus fails
    pub fn run(&mut self) -> Result<()> {
        loop {
            let round = self.run_round()?;

            self.pause_after(&round.outcome());
        }
    }

    pub fn run_round(&mut self) -> Result<InventoryRound> {
        let mut round = InventoryRound::new(self.config.irq_poll_budget);
        let mut state = RoundState::Init;

        loop {
            state = match state {
                RoundState::Init => {
                    self.indicator.set(true);
                    self.initialize()?;
                    RoundState::Armed
                }
                RoundState::Armed => {
                    self.chip.start_inventory()?;
                    RoundState::AwaitIrq
                }
                RoundState::AwaitIrq => {
                    self.irq.wait_asserted()?;
                    RoundState::ReadStatus
                }
                RoundState::ReadStatus => {
                    round.irq_status = self.chip.read_irq_status()?;

                    if round.irq_status == IRQ_END_OF_TX {
                        RoundState::ReadUid
                    } else {
                        debug!(self.log, "no tag, IRQ status {:#04x}", round.irq_status);
                        RoundState::Cleanup
                    }
                }
                RoundState::ReadUid => {
                    self.read_uid(&mut round)?;
                    RoundState::Cleanup
                }
                RoundState::Cleanup => {
                    self.cleanup()?;
                    break;
                }
            };
        }

        Ok(round)
    }

    pub fn pause_after(&self, outcome: &RoundOutcome) {
        thread::sleep(self.config.inter_round_delay);

        if outcome.triggered() {
            thread::sleep(self.config.trigger_cooldown);
        }
    }

    fn initialize(&mut self) -> Result<()> {
        self.chip.soft_reset()?;
        self.chip.enter_idle()?;
        self.chip.configure_iso15693()?;
        thread::sleep(self.config.iso_settle_delay);
        self.chip.set_system_clock()?;
        self.chip.set_no_response_wait_time()?;
        // Clears anything left pending by the reset
        self.chip.read_irq_status()?;

        Ok(())
    }

    fn read_uid(&mut self, round: &mut InventoryRound) -> Result<()> {
        self.chip.reset_fifo()?;

        if !self.wait_for_response(round)? {
            debug!(self.log, "timed out waiting for the tag");
            return Ok(());
        }

        let rx_irq_status = self.chip.read_irq_status()?;

        round.rx_irq_status = Some(rx_irq_status);

        if rx_irq_status != self.config.expected_rx_irq_status {
            debug!(
                self.log,
                "IRQ status {:#04x}, expected {:#04x}",
                rx_irq_status,
                self.config.expected_rx_irq_status
            );
        }

        let fifo = self.chip.read_fifo_status()?;

        round.fifo = Some(fifo);

        if fifo.overflow || fifo.byte_count as usize != INVENTORY_RESPONSE_LEN {
            debug!(
                self.log,
                "{} bytes in FIFO{}, no tag this round",
                fifo.byte_count,
                if fifo.overflow { " (overflow)" } else { "" }
            );
            return Ok(());
        }

        let uid = self.chip.read_inventory_uid()?;
        let action = self.dispatcher.dispatch(&uid);

        round.captured = Some((uid, action));
        self.indicator.set(false);

        Ok(())
    }

    /// Bounded poll of the IRQ line, one budget unit per unasserted poll
    fn wait_for_response(&mut self, round: &mut InventoryRound) -> Result<bool> {
        while round.timeout > 0 {
            if self.irq.poll_asserted(self.config.irq_poll_slice)? {
                return Ok(true);
            }

            round.timeout -= 1;
        }

        Ok(false)
    }

    /// Puts the chip back in a known state, whatever happened this round
    fn cleanup(&mut self) -> Result<()> {
        self.chip.reset_fifo()?;

        let rssi = self.chip.read_rssi()?;

        debug!(self.log, "rssi: {}", rssi);

        self.chip.reset_fifo()?;
        self.chip.block_receiver()?;
        self.chip.drain_irq_status()?;
        self.chip.turn_off_transmitter()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KNOWN_TAGS;
    use crate::mock::{RecordingLauncher, RecordingLog, ScriptedBus, ScriptedIrq};
    use crate::trf7960::Trf7960Error;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use std::time::{Duration, Instant};

    type TestMachine<'a> =
        InventoryStateMachine<'a, ScriptedBus, ScriptedIrq, (), RecordingLauncher>;

    const TRIGGER_UID: [u8; 8] = [0xe0, 0x07, 0x00, 0x00, 0x03, 0x92, 0xa2, 0x86];

    fn init_frames() -> Vec<Vec<u8>> {
        vec![
            vec![0x83],
            vec![0x80],
            vec![0x20, 0x21, 0x02, 0x00, 0x00, 0xc1, 0xbb],
            vec![0x09, 0x21],
            vec![0x07, 0x13],
            vec![0x6c, 0x00, 0x00],
            vec![0x8f, 0x91, 0x3d, 0x00, 0x30, 0x26, 0x01, 0x00],
            vec![0x6c, 0x00, 0x00],
        ]
    }

    fn cleanup_frames() -> Vec<Vec<u8>> {
        vec![
            vec![0x8f],
            vec![0x4f, 0x00],
            vec![0x8f],
            vec![0x96],
            vec![0x4c, 0x00],
            vec![0x00, 0x01],
        ]
    }

    /// Inventory response as it sits in the FIFO read reply: address slot,
    /// flags, DSFID, then the UID least significant byte first
    fn fifo_reply(uid: [u8; 8]) -> Vec<u8> {
        let mut reply = vec![0x00, 0x00, 0x00];

        reply.extend(uid.iter().rev());
        reply
    }

    fn tag_bus(rx_irq_status: u8, fifo_status: u8, uid: [u8; 8]) -> ScriptedBus {
        let mut bus = ScriptedBus::new();

        bus.irq_statuses.extend([0x00, IRQ_END_OF_TX, rx_irq_status]);
        bus.fifo_status = fifo_status;
        bus.fifo = fifo_reply(uid);
        bus
    }

    fn responding_irq() -> ScriptedIrq {
        let mut irq = ScriptedIrq::default();

        irq.levels.push_back(true);
        irq
    }

    fn quick_config() -> ReaderConfig {
        ReaderConfig {
            inter_round_delay: Duration::ZERO,
            trigger_cooldown: Duration::ZERO,
            iso_settle_delay: Duration::ZERO,
            ..ReaderConfig::default()
        }
    }

    fn machine<'a>(
        log: &'a RecordingLog,
        config: ReaderConfig,
        bus: ScriptedBus,
        irq: ScriptedIrq,
        uid_log: PathBuf,
    ) -> TestMachine<'a> {
        let dispatcher = Dispatcher::new(
            log,
            KNOWN_TAGS,
            RecordingLauncher::default(),
            PathBuf::from("/usr/bin/stream"),
            vec!["rppal_trf7960".into()],
            uid_log,
        );

        InventoryStateMachine::new(log, config, Trf7960::new(bus), irq, (), dispatcher)
    }

    #[test]
    fn skips_to_cleanup_when_status_is_not_end_of_tx() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let uid_log = dir.path().join("uid.txt");
        let mut bus = ScriptedBus::new();

        bus.irq_statuses.extend([0x00, 0x02]);

        let mut machine = machine(&log, quick_config(), bus, ScriptedIrq::default(), uid_log.clone());
        let round = machine.run_round().unwrap();

        assert_eq!(round.outcome(), RoundOutcome::Skipped { irq_status: 0x02 });
        assert_eq!(round.rx_irq_status(), None);

        let mut expected = init_frames();

        expected.extend(cleanup_frames());
        assert_eq!(machine.chip().bus().sent, expected);
        assert_eq!(machine.irq().waits, 1);
        assert_eq!(machine.irq().polls, 0);
        assert!(!uid_log.exists());
    }

    #[test]
    fn times_out_after_exactly_the_poll_budget() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let mut bus = ScriptedBus::new();

        bus.irq_statuses.extend([0x00, IRQ_END_OF_TX]);

        let mut machine = machine(&log, quick_config(), bus, ScriptedIrq::default(), dir.path().join("uid.txt"));
        let round = machine.run_round().unwrap();

        assert_eq!(round.outcome(), RoundOutcome::TimedOut);
        assert_eq!(round.timeout(), 0);
        assert_eq!(round.rx_irq_status(), None);
        assert_eq!(machine.irq().polls, 1000);

        let mut expected = init_frames();

        expected.push(vec![0x8f]);
        expected.extend(cleanup_frames());
        assert_eq!(machine.chip().bus().sent, expected);
        assert!(!machine.chip().bus().sent_fifo_read());
    }

    #[test]
    fn response_on_the_last_poll_still_counts() {
        let log = RecordingLog::default();
        let mut irq = ScriptedIrq::default();

        irq.levels.extend(std::iter::repeat(false).take(999));
        irq.levels.push_back(true);

        let dir = tempdir().unwrap();
        let uid_log = dir.path().join("uid.txt");
        let mut machine = machine(&log, quick_config(), tag_bus(0x40, 10, [1; 8]), irq, uid_log.clone());
        let round = machine.run_round().unwrap();

        assert_eq!(machine.irq().polls, 1000);
        assert_eq!(round.timeout(), 1);
        assert!(matches!(round.outcome(), RoundOutcome::Captured { .. }));
    }

    #[test]
    fn only_ten_fifo_bytes_make_a_uid() {
        for count in [0u8, 9, 11] {
            let log = RecordingLog::default();
            let dir = tempdir().unwrap();
            let uid_log = dir.path().join("uid.txt");
            let mut machine = machine(
                &log,
                quick_config(),
                tag_bus(0x40, count, TRIGGER_UID),
                responding_irq(),
                uid_log.clone(),
            );
            let round = machine.run_round().unwrap();

            assert_eq!(
                round.outcome(),
                RoundOutcome::NoValidTag {
                    fifo: FifoStatus {
                        byte_count: count,
                        overflow: false
                    }
                }
            );
            assert!(!machine.chip().bus().sent_fifo_read());
            assert!(machine.dispatcher().launcher().launches.is_empty());
            assert!(!uid_log.exists());
        }
    }

    #[test]
    fn fifo_overflow_is_not_a_tag() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let mut machine = machine(
            &log,
            quick_config(),
            tag_bus(0x40, 0x8a, TRIGGER_UID),
            responding_irq(),
            dir.path().join("uid.txt"),
        );
        let round = machine.run_round().unwrap();

        assert!(matches!(round.outcome(), RoundOutcome::NoValidTag { .. }));
        assert!(!machine.chip().bus().sent_fifo_read());
    }

    #[test]
    fn trigger_tag_starts_the_stream_once() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let uid_log = dir.path().join("uid.txt");
        let mut machine = machine(
            &log,
            quick_config(),
            tag_bus(0x40, 10, TRIGGER_UID),
            responding_irq(),
            uid_log.clone(),
        );
        let round = machine.run_round().unwrap();
        let outcome = round.outcome();

        assert_eq!(
            outcome,
            RoundOutcome::Captured {
                uid: Uid::new(TRIGGER_UID),
                action: TagAction::TriggerStream
            }
        );
        assert!(outcome.triggered());
        assert_eq!(machine.dispatcher().launcher().launches.len(), 1);
        assert_eq!(std::fs::read_to_string(&uid_log).unwrap(), "E00700000392A286\n");

        let mut expected = init_frames();

        expected.extend([
            vec![0x8f],
            vec![0x6c, 0x00, 0x00],
            vec![0x5c, 0x00],
            vec![0x7f, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        ]);
        expected.extend(cleanup_frames());
        assert_eq!(machine.chip().bus().sent, expected);
    }

    #[test]
    fn trigger_round_adds_the_cooldown() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let config = ReaderConfig {
            inter_round_delay: Duration::from_millis(5),
            trigger_cooldown: Duration::from_millis(50),
            ..quick_config()
        };
        let machine = machine(&log, config, ScriptedBus::new(), ScriptedIrq::default(), dir.path().join("uid.txt"));
        let triggered = RoundOutcome::Captured {
            uid: Uid::new(TRIGGER_UID),
            action: TagAction::TriggerStream,
        };

        let start = Instant::now();
        machine.pause_after(&triggered);
        assert!(start.elapsed() >= Duration::from_millis(55));

        let start = Instant::now();
        machine.pause_after(&RoundOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn unexpected_rx_status_is_only_reported() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let uid_log = dir.path().join("uid.txt");
        // 0x80 here where end of RX is expected
        let mut machine = machine(
            &log,
            quick_config(),
            tag_bus(0x80, 10, [0x11; 8]),
            responding_irq(),
            uid_log.clone(),
        );
        let round = machine.run_round().unwrap();

        assert_eq!(
            round.outcome(),
            RoundOutcome::Captured {
                uid: Uid::new([0x11; 8]),
                action: TagAction::LogOnly
            }
        );
        assert_eq!(round.rx_irq_status(), Some(0x80));
        assert!(log
            .debugs()
            .contains(&"IRQ status 0x80, expected 0x40".to_string()));
        assert!(machine.dispatcher().launcher().launches.is_empty());
    }

    #[test]
    fn expected_rx_status_is_configurable() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let uid_log = dir.path().join("uid.txt");
        let config = ReaderConfig {
            expected_rx_irq_status: 0x80,
            ..quick_config()
        };
        let mut machine = machine(&log, config, tag_bus(0x80, 10, [0x22; 8]), responding_irq(), uid_log.clone());

        machine.run_round().unwrap();
        assert!(!log.debugs().iter().any(|line| line.starts_with("IRQ status")));
    }

    #[test]
    fn empty_rounds_leave_the_chip_in_the_same_state() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let mut bus = ScriptedBus::new();

        for _ in 0..3 {
            bus.irq_statuses.extend([0x00, 0x01]);
        }

        let mut machine = machine(&log, quick_config(), bus, ScriptedIrq::default(), dir.path().join("uid.txt"));

        for _ in 0..3 {
            assert_eq!(
                machine.run_round().unwrap().outcome(),
                RoundOutcome::Skipped { irq_status: 0x01 }
            );
        }

        let sent = &machine.chip().bus().sent;
        let per_round = init_frames().len() + cleanup_frames().len();

        assert_eq!(sent.len(), 3 * per_round);

        for round in sent.chunks(per_round) {
            assert_eq!(round, &sent[..per_round]);
            assert_eq!(&round[init_frames().len()..], cleanup_frames().as_slice());
        }
    }

    #[test]
    fn every_poll_waits_one_slice() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let mut bus = ScriptedBus::new();

        bus.irq_statuses.extend([0x00, IRQ_END_OF_TX]);

        let config = ReaderConfig {
            irq_poll_slice: Duration::from_micros(75),
            ..quick_config()
        };
        let mut machine = machine(&log, config, bus, ScriptedIrq::default(), dir.path().join("uid.txt"));

        assert_eq!(machine.run_round().unwrap().outcome(), RoundOutcome::TimedOut);

        let slices = &machine.irq().slices;

        assert_eq!(slices.len(), 1000);
        assert!(slices.iter().all(|slice| *slice == Duration::from_micros(75)));
    }

    #[test]
    fn only_the_trigger_tag_is_triggered() {
        let captured = |action| RoundOutcome::Captured {
            uid: Uid::new(TRIGGER_UID),
            action,
        };

        assert!(captured(TagAction::TriggerStream).triggered());
        assert!(!captured(TagAction::LogOnly).triggered());
        assert!(!captured(TagAction::Label("Joker")).triggered());
        assert!(!RoundOutcome::TimedOut.triggered());
        assert!(!RoundOutcome::Skipped { irq_status: 0x02 }.triggered());
        assert!(!RoundOutcome::NoValidTag {
            fifo: FifoStatus {
                byte_count: 0,
                overflow: false
            }
        }
        .triggered());
    }

    #[test]
    fn short_transfer_ends_the_loop() {
        let log = RecordingLog::default();
        let dir = tempdir().unwrap();
        let mut bus = ScriptedBus::new();

        bus.short_transfer = true;

        let mut machine = machine(&log, quick_config(), bus, ScriptedIrq::default(), dir.path().join("uid.txt"));
        let err = machine.run().unwrap_err();

        assert!(err.downcast_ref::<Trf7960Error>().is_some());
        assert_eq!(machine.chip().bus().sent, vec![vec![0x83]]);
    }
}
