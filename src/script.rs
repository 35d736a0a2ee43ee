//! Line-oriented actions for driving a session from a terminal or a file.
//!
//! Each line is one action. Anything that is not a driver action is
//! parsed as a toolbar command, so `bold`, `margins narrow` and
//! `page-vertical bottom` all work as-is.

use doctor_core::{Command, CommandError, KeyPress};
use std::str::FromStr;
use std::time::Duration;

/// One step of a play-through.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Command(Command),
    /// Selects the character range `start..end`
    Select(usize, usize),
    Cursor(usize),
    SelectAll,
    Type(String),
    Key(KeyPress),
    /// Selects a floating object
    Click(String),
    /// Clicks the empty page, dropping the object selection
    ClickPage,
    /// Drags an object by a screen-space offset
    Drag { id: String, dx: f64, dy: f64 },
    Wait(Duration),
    Continue,
    Restart,
    Level(usize),
    Show,
    Snapshot,
    Levels,
    /// Lists keyboard shortcuts
    Keys,
    Help,
    Exit,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("'{action}' expects {expected}")]
    Usage {
        action: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Command(#[from] CommandError),
}

fn number<T: FromStr>(arg: Option<&str>, action: &'static str, expected: &'static str) -> Result<T, ActionError> {
    arg.and_then(|a| a.parse().ok())
        .ok_or(ActionError::Usage { action, expected })
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();

        let action = match head.to_ascii_lowercase().as_str() {
            "select" => {
                let start = number(args.next(), "select", "two offsets")?;
                let end = number(args.next(), "select", "two offsets")?;
                Action::Select(start, end)
            }
            "cursor" => Action::Cursor(number(args.next(), "cursor", "an offset")?),
            "select-all" => Action::SelectAll,
            "type" => Action::Type(rest.to_string()),
            "key" => Action::Key(KeyPress::parse(rest).ok_or(ActionError::Usage {
                action: "key",
                expected: "a chord like ctrl+b",
            })?),
            "click" if rest.is_empty() => Action::ClickPage,
            "click" => Action::Click(rest.to_string()),
            "drag" => {
                let usage = "an object id and an x/y offset";
                let id = args
                    .next()
                    .ok_or(ActionError::Usage { action: "drag", expected: usage })?
                    .to_string();
                let dx = number(args.next(), "drag", usage)?;
                let dy = number(args.next(), "drag", usage)?;
                Action::Drag { id, dx, dy }
            }
            "wait" => Action::Wait(Duration::from_millis(number(args.next(), "wait", "milliseconds")?)),
            "continue" => Action::Continue,
            "restart" => Action::Restart,
            "level" => Action::Level(number(args.next(), "level", "a level index")?),
            "show" => Action::Show,
            "snapshot" => Action::Snapshot,
            "levels" => Action::Levels,
            "keys" => Action::Keys,
            "help" | "?" => Action::Help,
            "exit" | "quit" => Action::Exit,
            _ => Action::Command(line.parse()?),
        };
        Ok(action)
    }
}

pub const HELP: &str = "\
actions:
  select A B | cursor N | select-all | type TEXT | key CHORD
  click [ID] | drag ID DX DY | wait MS
  continue | restart | level N | levels | keys | show | snapshot | exit
commands:
  bold italic underline heading N title normal
  align-left align-center align-right bullets toc
  image SRC delete-image wrap MODE margins PRESET
  page-number page-vertical V page-horizontal H page-confirm page-cancel page-remove
  zoom-in zoom-out zoom-reset tab ID";

#[cfg(test)]
mod tests {
    use super::*;
    use doctor_core::{Key, Margins, Modifiers};

    #[test]
    fn test_driver_actions() {
        assert_eq!("select 3 9".parse::<Action>().unwrap(), Action::Select(3, 9));
        assert_eq!("type  hello world".parse::<Action>().unwrap(), Action::Type("hello world".into()));
        assert_eq!(
            "drag img-bakery 240 0".parse::<Action>().unwrap(),
            Action::Drag {
                id: "img-bakery".into(),
                dx: 240.0,
                dy: 0.0
            }
        );
        assert_eq!("wait 500".parse::<Action>().unwrap(), Action::Wait(Duration::from_millis(500)));
        assert_eq!("click".parse::<Action>().unwrap(), Action::ClickPage);
        assert_eq!(
            "key ctrl+b".parse::<Action>().unwrap(),
            Action::Key(KeyPress::new(Key::Char('b'), Modifiers::CTRL))
        );
    }

    #[test]
    fn test_commands_fall_through() {
        assert_eq!(
            "margins narrow".parse::<Action>().unwrap(),
            Action::Command(Command::SetMargins(Margins::Narrow))
        );
        assert!(matches!(
            "launch rockets".parse::<Action>(),
            Err(ActionError::Command(CommandError::UnknownCommand(_)))
        ));
    }

    #[test]
    fn test_usage_errors() {
        assert!(matches!(
            "select 3".parse::<Action>(),
            Err(ActionError::Usage { action: "select", .. })
        ));
        assert!(matches!("wait soon".parse::<Action>(), Err(ActionError::Usage { .. })));
    }
}
