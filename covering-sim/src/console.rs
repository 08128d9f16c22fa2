use std::str::FromStr;

use covering_core::{Axis, Command, Direction, Percent100ths};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Empty input")]
    Empty,

    #[error("Unknown command '{0}', try 'help'")]
    UnknownCommand(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// One line typed on the simulator console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  lift | tilt               select the active axis
  up | down                 continuous move of the active axis
  step up | step down       single step of the active axis
  stop                      stop every axis in motion
  goto <axis> <0..=10000>   move an axis to a position
  status                    print positions and status
  quit";

impl FromStr for ConsoleInput {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ConsoleError::Empty);
        };

        let input = match head.to_ascii_lowercase().as_str() {
            "lift" => ConsoleInput::Command(Command::SelectAxis(Axis::Lift)),
            "tilt" => ConsoleInput::Command(Command::SelectAxis(Axis::Tilt)),
            "stop" => ConsoleInput::Command(Command::Stop),
            "status" => ConsoleInput::Status,
            "help" | "?" => ConsoleInput::Help,
            "quit" | "exit" => ConsoleInput::Quit,
            "step" => {
                let direction = parse_next::<Direction>(&mut words, "direction")?;
                ConsoleInput::Command(Command::SingleStep(direction))
            }
            "goto" => {
                let axis = parse_next::<Axis>(&mut words, "axis")?;
                let raw = parse_next::<u16>(&mut words, "position")?;
                let position = Percent100ths::try_from(raw)
                    .map_err(|e| ConsoleError::InvalidArgument(e.to_string()))?;
                ConsoleInput::Command(Command::GoToPosition { axis, position })
            }
            other => match other.parse::<Direction>() {
                Ok(direction) => ConsoleInput::Command(Command::ContinuousMove(direction)),
                Err(_) => return Err(ConsoleError::UnknownCommand(other.into())),
            },
        };

        match words.next() {
            Some(extra) => Err(ConsoleError::InvalidArgument(format!(
                "unexpected '{extra}'"
            ))),
            None => Ok(input),
        }
    }
}

fn parse_next<'a, T>(
    words: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, ConsoleError>
where
    T: FromStr,
    T::Err: ToString,
{
    words
        .next()
        .ok_or(ConsoleError::MissingArgument(name))?
        .parse()
        .map_err(|e: T::Err| ConsoleError::InvalidArgument(e.to_string()))
}
