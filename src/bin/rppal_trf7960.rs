use core::fmt::Arguments;
use rppal_trf7960::{error, Trf7960Log, Trf7960Tool};
use std::cell::Cell;
use termion::{color, style};

struct Trf7960Logger {
    color: Cell<bool>,
}

impl Trf7960Logger {
    fn new() -> Trf7960Logger {
        Trf7960Logger {
            color: Cell::new(true),
        }
    }
}

impl Trf7960Log for Trf7960Logger {
    fn output(self: &Self, args: Arguments) {
        println!("{}", args);
    }
    fn warning(self: &Self, args: Arguments) {
        if self.color.get() {
            eprintln!(
                "{}warning: {}{}",
                color::Fg(color::Yellow),
                args,
                color::Fg(color::Reset)
            );
        } else {
            eprintln!("warning: {}", args);
        }
    }
    fn error(self: &Self, args: Arguments) {
        if self.color.get() {
            eprintln!(
                "{}error: {}{}",
                color::Fg(color::Red),
                args,
                color::Fg(color::Reset)
            );
        } else {
            eprintln!("error: {}", args);
        }
    }
    fn debug(self: &Self, args: Arguments) {
        if self.color.get() {
            println!("{}{}{}", style::Faint, args, style::Reset);
        } else {
            println!("{}", args);
        }
    }
    fn use_color(self: &Self, enabled: bool) {
        self.color.set(enabled);
    }
}

fn main() {
    let logger = Trf7960Logger::new();

    if let Err(error) = Trf7960Tool::new(&logger).run(std::env::args_os()) {
        error!(logger, "{}", error);
        std::process::exit(1);
    }
}
