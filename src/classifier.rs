use crate::uid::Uid;
use crate::{output, warning, Trf7960Log};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TagAction {
    /// Unknown tag, print its UID
    LogOnly,
    /// Known tag, print its label
    Label(&'static str),
    /// Start the video stream program
    TriggerStream,
}

pub struct KnownTagTable {
    entries: &'static [(Uid, TagAction)],
}

impl KnownTagTable {
    pub const fn new(entries: &'static [(Uid, TagAction)]) -> KnownTagTable {
        KnownTagTable { entries }
    }

    pub fn classify(&self, uid: &Uid) -> TagAction {
        self.entries
            .iter()
            .find(|(known, _)| known == uid)
            .map_or(TagAction::LogOnly, |(_, action)| *action)
    }
}

const KNOWN_TAG_ENTRIES: &[(Uid, TagAction)] = &[
    (
        Uid::new([0xe0, 0x07, 0x00, 0x00, 0x14, 0xe0, 0x89, 0x2b]),
        TagAction::Label("Joker"),
    ),
    (
        Uid::new([0xe0, 0x07, 0x00, 0x00, 0x14, 0xe0, 0x89, 0x2c]),
        TagAction::Label("Queen of Spade"),
    ),
    (
        Uid::new([0xe0, 0x07, 0x00, 0x00, 0x30, 0x92, 0x81, 0x13]),
        TagAction::Label("King of Diamond"),
    ),
    (
        Uid::new([0xe0, 0x07, 0x00, 0x00, 0x03, 0x92, 0xa2, 0x86]),
        TagAction::TriggerStream,
    ),
];

pub const KNOWN_TAGS: KnownTagTable = KnownTagTable::new(KNOWN_TAG_ENTRIES);

/// Starts a program without waiting for it
pub trait Launcher {
    fn launch(&mut self, program: &Path, args: &[OsString]) -> io::Result<()>;
}

pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    /// `args` is a full argument vector; its first entry becomes the child's argv[0]
    fn launch(&mut self, program: &Path, args: &[OsString]) -> io::Result<()> {
        let mut command = Command::new(program);

        if let Some((arg0, rest)) = args.split_first() {
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.arg0(arg0);
            }
            command.args(rest);
        }

        // The child is never waited on
        command.spawn()?;

        Ok(())
    }
}

pub struct Dispatcher<'a, L: Launcher> {
    log: &'a dyn Trf7960Log,
    table: KnownTagTable,
    launcher: L,
    stream_program: PathBuf,
    args: Vec<OsString>,
    uid_log: PathBuf,
}

impl<'a, L: Launcher> Dispatcher<'a, L> {
    pub fn new(
        log: &'a dyn Trf7960Log,
        table: KnownTagTable,
        launcher: L,
        stream_program: PathBuf,
        args: Vec<OsString>,
        uid_log: PathBuf,
    ) -> Dispatcher<'a, L> {
        Dispatcher {
            log,
            table,
            launcher,
            stream_program,
            args,
            uid_log,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    /// Records the UID, then acts on it. Nothing here stops the inventory loop.
    pub fn dispatch(&mut self, uid: &Uid) -> TagAction {
        if let Err(err) = fs::write(&self.uid_log, format!("{}\n", uid)) {
            warning!(self.log, "unable to write {}: {}", self.uid_log.display(), err);
        }

        let action = self.table.classify(uid);

        match action {
            TagAction::Label(label) => output!(self.log, "{}!", label),
            TagAction::TriggerStream => {
                output!(self.log, "Sheng: Start video stream");

                if let Err(err) = self.launcher.launch(&self.stream_program, &self.args) {
                    warning!(
                        self.log,
                        "unable to start {}: {}",
                        self.stream_program.display(),
                        err
                    );
                }
            }
            TagAction::LogOnly => {
                output!(self.log, "UID:");
                output!(self.log, "{}", uid);
            }
        }

        action
    }
}
