//! Terminal simulator for the `card-uid` reader loop.
//!
//! Presents scripted cards to the real [`Reader`] through the
//! [`CardSource`] seam, draws frames to stdout and exits through the
//! short-Back path once the script is exhausted.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use clap::{App, Arg};

use core::task::Poll;

use card_uid::reader::{Error, InputQueue, Step};
use card_uid::{CardSource, CardUid, CountDown, Notifier, Screen};
use card_uid::{Frame, InputEvent, InputKind, Key, Reader};

const PROGRAM: Option<&'static str> = option_env!("CARGO_PKG_NAME");
const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
const DESCRIPTION: Option<&'static str> = option_env!("CARGO_PKG_DESCRIPTION");

/// Presents each scripted card after a fixed number of idle polls.
struct ScriptedSource {
    /// Remaining cards, last element is presented first.
    cards: Vec<CardUid>,
    idle_ticks: u32,
    countdown: u32,
}

impl ScriptedSource {
    fn new(mut cards: Vec<CardUid>, idle_ticks: u32) -> Self {
        cards.reverse();
        ScriptedSource {
            cards,
            idle_ticks,
            countdown: idle_ticks,
        }
    }
}

impl CardSource for ScriptedSource {
    type Error = Infallible;

    fn poll_card(&mut self) -> Poll<Result<CardUid, Self::Error>> {
        if self.cards.is_empty() {
            return Poll::Pending;
        }
        if self.countdown > 0 {
            self.countdown -= 1;
            return Poll::Pending;
        }
        self.countdown = self.idle_ticks;
        Poll::Ready(Ok(self.cards.pop().unwrap()))
    }
}

/// Prints a line per frame change; unchanged frames stay quiet.
#[derive(Default)]
struct TerminalScreen {
    last: Option<String>,
}

impl Screen for TerminalScreen {
    type Error = Infallible;

    fn draw(&mut self, frame: Frame<'_>) -> Result<(), Self::Error> {
        let line = match frame {
            Frame::Waiting => String::from("Waiting for card..."),
            Frame::Card { text } => format!("UID: {}", text),
        };
        if self.last.as_deref() != Some(line.as_str()) {
            println!("{}", line);
            self.last = Some(line);
        }
        Ok(())
    }
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn card_detected(&mut self) {
        log::info!("card detected, haptic pulse");
    }
}

/// Wall-clock countdown over `Instant`.
struct SysTimer {
    deadline: Instant,
}

impl SysTimer {
    fn new() -> Self {
        SysTimer {
            deadline: Instant::now(),
        }
    }
}

impl CountDown for SysTimer {
    type Time = Duration;

    fn start<T>(&mut self, count: T)
    where
        T: Into<Duration>,
    {
        self.deadline = Instant::now() + count.into();
    }

    fn wait(&mut self) -> nb::Result<(), Infallible> {
        if Instant::now() >= self.deadline {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

fn parse_uid(hex: &str) -> Option<CardUid> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for pair in hex.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    CardUid::from_bytes(&bytes).ok()
}

fn main() {
    env_logger::init();

    let matches = App::new(PROGRAM.unwrap_or("mock-reader"))
        .version(VERSION.unwrap_or("unknown"))
        .about(DESCRIPTION.unwrap_or(""))
        .arg(
            Arg::with_name("uid")
                .short("u")
                .long("uid")
                .value_name("HEX")
                .help("UID presented to the reader, hex digits without separators (repeatable)")
                .takes_value(true)
                .multiple(true),
        )
        .arg(
            Arg::with_name("ticks")
                .short("t")
                .long("ticks")
                .value_name("N")
                .help("Idle ticks between presented cards")
                .takes_value(true),
        )
        .get_matches();

    let cards: Vec<CardUid> = match matches.values_of("uid") {
        Some(values) => values
            .map(|v| parse_uid(v).unwrap_or_else(|| panic!("invalid UID: {}", v)))
            .collect(),
        None => vec![CardUid::from_bytes(&[0x04, 0xA1, 0x3F, 0x22]).unwrap()],
    };
    let idle_ticks: u32 = matches
        .value_of("ticks")
        .map_or(3, |v| v.parse().expect("ticks must be a number"));

    // one extra tick so the last card gets drawn before the Back press
    let script_steps = (cards.len() as u32) * (idle_ticks + 1) + 1;

    let mut queue = InputQueue::new();
    let (mut handle, events) = queue.split();

    let mut reader = Reader::new(
        ScriptedSource::new(cards, idle_ticks),
        TerminalScreen::default(),
        LogNotifier,
        SysTimer::new(),
        events,
    );

    let tick = Duration::from_millis(100);
    let mut steps = 0u32;
    loop {
        match reader.step(tick) {
            Ok(Step::Exit) => break,
            Ok(Step::Continue) => {}
            Err(Error::Source(e)) => match e {},
            Err(Error::Screen(e)) => match e {},
        }
        steps += 1;
        if steps == script_steps {
            log::info!("script exhausted, pressing Back");
            handle
                .push(InputEvent {
                    key: Key::Back,
                    kind: InputKind::Short,
                })
                .ok();
        }
    }

    println!("Exited.");
}
