use core::fmt::Write;
use core::str::FromStr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ScheduleError};
use crate::pump::OperatingMode;
use crate::schedule::{Interval, TimeOfDay, Weekdays};

pub mod status;

/// Inbound command queue from the console into the service task.
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, 4> = Channel::new();

/// Outcome of the last queued command, sent back once the service task has
/// applied or rejected it. The console waits for it before answering.
pub static REPLIES: Channel<CriticalSectionRawMutex, Result<(), ScheduleError>, 1> = Channel::new();

pub const REPLY_LEN: usize = 48;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Pause,
    Resume,
    SetMode(OperatingMode),
    SetThreshold(u16),
    AddInterval(Interval),
    RemoveInterval(u8),
    ClearIntervals,
    Report,
}

impl Command {
    /// Parses one console line. Grammar:
    ///
    /// ```text
    /// toggle | pause | resume | status
    /// mode <manual|scheduled|automatic>
    /// threshold <level>
    /// interval add <hh:mm> <hh:mm> <days>
    /// interval del <index>
    /// interval clear
    /// ```
    ///
    /// Days are seven characters, Sunday first, a letter of `SMTWTFS` to
    /// select the day or `-` to skip it, e.g. `-MTWTF-` for workdays.
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseError::UnknownCommand)?;

        let command = match verb {
            "toggle" => Command::Toggle,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "status" => Command::Report,
            "mode" => Command::SetMode(next_word(&mut words)?.parse()?),
            "threshold" => Command::SetThreshold(parse_number(next_word(&mut words)?)?),
            "interval" => match next_word(&mut words)? {
                "add" => {
                    let start = parse_time(next_word(&mut words)?)?;
                    let stop = parse_time(next_word(&mut words)?)?;
                    let days = parse_days(next_word(&mut words)?)?;
                    Command::AddInterval(Interval::new(start, stop, days))
                }
                "del" => Command::RemoveInterval(parse_number(next_word(&mut words)?)?),
                "clear" => Command::ClearIntervals,
                _ => return Err(ParseError::UnknownCommand),
            },
            _ => return Err(ParseError::UnknownCommand),
        };

        if words.next().is_some() {
            return Err(ParseError::InvalidArgument);
        }
        Ok(command)
    }
}

/// Console answer for one applied command.
pub fn reply_line(result: &Result<(), ScheduleError>) -> String<REPLY_LEN> {
    let mut line = String::new();
    match result {
        Ok(()) => {
            line.push_str("ok").ok();
        }
        Err(err) => {
            write!(line, "error: {}", err).ok();
        }
    }
    line
}

fn next_word<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, ParseError> {
    words.next().ok_or(ParseError::MissingArgument)
}

fn parse_number<T: FromStr>(word: &str) -> Result<T, ParseError> {
    word.parse().map_err(|_| ParseError::InvalidArgument)
}

fn parse_time(word: &str) -> Result<TimeOfDay, ParseError> {
    let (hour, minute) = word.split_once(':').ok_or(ParseError::InvalidArgument)?;
    let hour: u8 = parse_number(hour)?;
    let minute: u8 = parse_number(minute)?;
    if hour > 23 || minute > 59 {
        return Err(ParseError::InvalidArgument);
    }
    Ok(TimeOfDay::new(hour, minute))
}

const DAY_LETTERS: [char; 7] = ['S', 'M', 'T', 'W', 'T', 'F', 'S'];

fn parse_days(word: &str) -> Result<Weekdays, ParseError> {
    if word.chars().count() != DAY_LETTERS.len() {
        return Err(ParseError::InvalidArgument);
    }
    let mut bits = 0u8;
    for (position, (given, expected)) in word.chars().zip(DAY_LETTERS).enumerate() {
        if given == '-' {
            continue;
        }
        if given.eq_ignore_ascii_case(&expected) {
            bits |= 1 << position;
        } else {
            return Err(ParseError::InvalidArgument);
        }
    }
    Ok(Weekdays::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_verbs_parse() {
        assert_eq!(Command::parse("toggle"), Ok(Command::Toggle));
        assert_eq!(Command::parse("pause"), Ok(Command::Pause));
        assert_eq!(Command::parse("resume"), Ok(Command::Resume));
        assert_eq!(Command::parse("status"), Ok(Command::Report));
        assert_eq!(Command::parse("  toggle  "), Ok(Command::Toggle));
    }

    #[test]
    fn mode_takes_a_mode_name() {
        assert_eq!(
            Command::parse("mode automatic"),
            Ok(Command::SetMode(OperatingMode::Automatic))
        );
        assert_eq!(Command::parse("mode"), Err(ParseError::MissingArgument));
        assert_eq!(
            Command::parse("mode off"),
            Err(ParseError::InvalidArgument)
        );
    }

    #[test]
    fn threshold_takes_a_level() {
        assert_eq!(
            Command::parse("threshold 512"),
            Ok(Command::SetThreshold(512))
        );
        assert_eq!(
            Command::parse("threshold many"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("threshold 70000"),
            Err(ParseError::InvalidArgument)
        );
    }

    #[test]
    fn interval_add_parses_window_and_days() {
        let command = Command::parse("interval add 06:00 06:30 -M--T--").unwrap();
        assert_eq!(
            command,
            Command::AddInterval(Interval::new(
                TimeOfDay::new(6, 0),
                TimeOfDay::new(6, 30),
                Weekdays::MONDAY | Weekdays::THURSDAY,
            ))
        );
        // Day letters are case-insensitive.
        assert_eq!(
            Command::parse("interval add 06:00 06:30 smtwtfs").unwrap(),
            Command::AddInterval(Interval::new(
                TimeOfDay::new(6, 0),
                TimeOfDay::new(6, 30),
                Weekdays::EVERY_DAY,
            ))
        );
    }

    #[test]
    fn interval_add_rejects_bad_fields() {
        assert_eq!(
            Command::parse("interval add 24:00 06:30 SMTWTFS"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("interval add 06:00 06:61 SMTWTFS"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("interval add 0600 0630 SMTWTFS"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("interval add 06:00 06:30 SMTW"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("interval add 06:00 06:30 XMTWTFS"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("interval add 06:00"),
            Err(ParseError::MissingArgument)
        );
    }

    #[test]
    fn interval_del_and_clear() {
        assert_eq!(
            Command::parse("interval del 3"),
            Ok(Command::RemoveInterval(3))
        );
        assert_eq!(
            Command::parse("interval clear"),
            Ok(Command::ClearIntervals)
        );
        assert_eq!(
            Command::parse("interval drop 3"),
            Err(ParseError::UnknownCommand)
        );
    }

    #[test]
    fn junk_is_rejected() {
        assert_eq!(Command::parse(""), Err(ParseError::UnknownCommand));
        assert_eq!(Command::parse("water"), Err(ParseError::UnknownCommand));
        assert_eq!(
            Command::parse("toggle now"),
            Err(ParseError::InvalidArgument)
        );
    }

    #[test]
    fn replies_carry_the_command_outcome() {
        assert_eq!(reply_line(&Ok(())).as_str(), "ok");
        assert_eq!(
            reply_line(&Err(ScheduleError::CapacityExceeded)).as_str(),
            "error: interval table is full"
        );
        assert_eq!(
            reply_line(&Err(ScheduleError::IndexOutOfRange)).as_str(),
            "error: no interval at that index"
        );
    }

    #[test]
    fn commands_survive_the_json_wire_format() {
        let command = Command::AddInterval(Interval::new(
            TimeOfDay::new(19, 45),
            TimeOfDay::new(20, 15),
            Weekdays::FRIDAY,
        ));
        let encoded = serde_json::to_string(&command).unwrap();
        let decoded: Command = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, command);

        let encoded = serde_json::to_string(&Command::SetThreshold(512)).unwrap();
        assert_eq!(encoded, r#"{"SetThreshold":512}"#);
    }
}
