use std::str::FromStr;

use super::error::TelescopeError;
use crate::astro::{parse_dec, parse_ra};
use crate::attribute::AccessLevel;

pub const USAGE: &str = "\
Commands (case sensitive):
  Tell                 print the current status
  AZEL az el           track a fixed azimuth/elevation in degrees
  RADEC ra dec [name]  track a sidereal target (ra as hh:mm:ss or degrees)
  Off az_off el_off    set pointing offsets in degrees
  Start                start the control loop
  Halt                 stop the control loop and the antenna
  Exit                 terminate the controller
  help, ?              print this text";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Tell,
    AzEl {
        az: f64,
        el: f64,
    },
    RaDec {
        ra_deg: f64,
        dec_deg: f64,
        source: Option<String>,
    },
    Offset {
        az_off: f64,
        el_off: f64,
    },
    Start,
    Halt,
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, TelescopeError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Err(TelescopeError::UnknownCommand(String::new()));
        };
        let args: Vec<&str> = tokens.collect();

        match name {
            "help" | "?" => Ok(Command::Help),
            "Tell" => expect_args("Tell", &args, 0).map(|_| Command::Tell),
            "Start" => expect_args("Start", &args, 0).map(|_| Command::Start),
            "Halt" => expect_args("Halt", &args, 0).map(|_| Command::Halt),
            "Exit" => expect_args("Exit", &args, 0).map(|_| Command::Exit),
            "AZEL" => {
                expect_args("AZEL", &args, 2)?;
                Ok(Command::AzEl {
                    az: parse_number(args[0])?,
                    el: parse_number(args[1])?,
                })
            }
            "Off" => {
                expect_args("Off", &args, 2)?;
                Ok(Command::Offset {
                    az_off: parse_number(args[0])?,
                    el_off: parse_number(args[1])?,
                })
            }
            "RADEC" => {
                if !(2..=3).contains(&args.len()) {
                    return Err(TelescopeError::WrongArgumentCount {
                        command: "RADEC",
                        expected: "2 or 3".to_string(),
                        actual: args.len(),
                    });
                }
                Ok(Command::RaDec {
                    ra_deg: parse_ra(args[0])?,
                    dec_deg: parse_dec(args[1])?,
                    source: args.get(2).map(|s| s.to_string()),
                })
            }
            other => Err(TelescopeError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Tell => "Tell",
            Command::AzEl { .. } => "AZEL",
            Command::RaDec { .. } => "RADEC",
            Command::Offset { .. } => "Off",
            Command::Start => "Start",
            Command::Halt => "Halt",
            Command::Exit => "Exit",
        }
    }

    pub fn required_level(&self) -> AccessLevel {
        match self {
            Command::Exit => AccessLevel::Admin,
            _ => AccessLevel::Operator,
        }
    }
}

impl FromStr for Command {
    type Err = TelescopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

fn expect_args(command: &'static str, args: &[&str], count: usize) -> Result<(), TelescopeError> {
    if args.len() != count {
        return Err(TelescopeError::WrongArgumentCount {
            command,
            expected: count.to_string(),
            actual: args.len(),
        });
    }
    Ok(())
}

fn parse_number(token: &str) -> Result<f64, TelescopeError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TelescopeError::InvalidArgument(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("Tell").unwrap(), Command::Tell);
        assert_eq!(
            Command::parse("AZEL 100 45").unwrap(),
            Command::AzEl { az: 100.0, el: 45.0 }
        );
        assert_eq!(
            Command::parse("  Off 0.1   -0.2 ").unwrap(),
            Command::Offset {
                az_off: 0.1,
                el_off: -0.2
            }
        );
        assert_eq!(Command::parse("?").unwrap(), Command::Help);
        assert_eq!(Command::parse("Halt").unwrap(), Command::Halt);
    }

    #[test]
    fn radec_accepts_sexagesimal_and_name() {
        match Command::parse("RADEC 05:34:31.9 22:00:52 CrabNebula").unwrap() {
            Command::RaDec {
                ra_deg,
                dec_deg,
                source,
            } => {
                assert!((ra_deg - 83.6329).abs() < 1e-3);
                assert!((dec_deg - 22.0144).abs() < 1e-3);
                assert_eq!(source.as_deref(), Some("CrabNebula"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Command::parse("RADEC 83.6 22.0").unwrap(),
            Command::RaDec { source: None, .. }
        ));
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert!(matches!(
            Command::parse("azel 100 45"),
            Err(TelescopeError::UnknownCommand(name)) if name == "azel"
        ));
        assert!(matches!(
            Command::parse("tell"),
            Err(TelescopeError::UnknownCommand(_))
        ));
    }

    #[test]
    fn argument_count_must_match() {
        assert!(matches!(
            Command::parse("AZEL 100"),
            Err(TelescopeError::WrongArgumentCount {
                command: "AZEL",
                actual: 1,
                ..
            })
        ));
        assert!(matches!(
            Command::parse("Tell now"),
            Err(TelescopeError::WrongArgumentCount { .. })
        ));
        assert!(matches!(
            Command::parse("RADEC 1 2 3 4"),
            Err(TelescopeError::WrongArgumentCount { actual: 4, .. })
        ));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            Command::parse("AZEL abc 45"),
            Err(TelescopeError::InvalidArgument(t)) if t == "abc"
        ));
        assert!(Command::parse("Off NaN 0").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn exit_needs_admin() {
        assert_eq!(Command::Exit.required_level(), AccessLevel::Admin);
        assert_eq!(Command::Tell.required_level(), AccessLevel::Operator);
    }
}
