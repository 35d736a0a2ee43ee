//! Toolbar commands.
//!
//! ## Learning: The Command Pattern
//!
//! Every ribbon button and shortcut becomes a [`Command`] value. Values
//! can be parsed from a script line, bound to a key chord, or logged,
//! and a single dispatcher interprets them (see `dispatch.rs`).

use std::fmt;
use std::str::FromStr;

use crate::floating::WrapMode;
use crate::state::{HorizontalPosition, Margins, VerticalPosition};

/// Built-in simulator commands.
///
/// New ribbon buttons may add variants, so matches should keep a `_` arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    // Inline styles
    Bold,
    Italic,
    Underline,

    // Block styles
    Heading { level: u8 },
    Title,
    Normal,
    AlignLeft,
    AlignCenter,
    AlignRight,
    BulletList,

    // Insert
    InsertImage { source: String },
    TableOfContents,

    // Page numbers
    PageNumber,
    ChoosePageNumberVertical(VerticalPosition),
    ChoosePageNumberHorizontal(HorizontalPosition),
    ConfirmPageNumber,
    CancelPageNumber,
    RemovePageNumbers,

    // Layout
    SetMargins(Margins),
    SetWrapMode(WrapMode),
    DeleteImage,

    // View
    ZoomIn,
    ZoomOut,
    ZoomReset,
    SetTab { tab: String },
}

impl Command {
    /// Returns the command's display name.
    pub fn display_name(&self) -> &str {
        match self {
            Command::Bold => "Bold",
            Command::Italic => "Italic",
            Command::Underline => "Underline",
            Command::Heading { level: 1 } => "Heading 1",
            Command::Heading { level: 2 } => "Heading 2",
            Command::Heading { .. } => "Heading 3",
            Command::Title => "Title",
            Command::Normal => "Normal",
            Command::AlignLeft => "Align Left",
            Command::AlignCenter => "Center",
            Command::AlignRight => "Align Right",
            Command::BulletList => "Bullets",
            Command::InsertImage { .. } => "Picture",
            Command::TableOfContents => "Table of Contents",
            Command::PageNumber => "Page Number",
            Command::ChoosePageNumberVertical(_) => "Page Number Row",
            Command::ChoosePageNumberHorizontal(_) => "Page Number Column",
            Command::ConfirmPageNumber => "Apply Page Numbers",
            Command::CancelPageNumber => "Cancel",
            Command::RemovePageNumbers => "Remove Page Numbers",
            Command::SetMargins(_) => "Margins",
            Command::SetWrapMode(_) => "Wrap Text",
            Command::DeleteImage => "Delete Picture",
            Command::ZoomIn => "Zoom In",
            Command::ZoomOut => "Zoom Out",
            Command::ZoomReset => "100%",
            Command::SetTab { .. } => "Switch Tab",
        }
    }

    /// Returns true for commands that may change what a level checks.
    pub fn affects_success(&self) -> bool {
        !matches!(
            self,
            Command::ZoomIn
                | Command::ZoomOut
                | Command::ZoomReset
                | Command::SetTab { .. }
                | Command::PageNumber
                | Command::ChoosePageNumberVertical(_)
                | Command::ChoosePageNumberHorizontal(_)
                | Command::CancelPageNumber
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Parses the textual command names used by scripts and key bindings.
///
/// ```text
/// bold | italic | underline | heading 1 | title | normal
/// align-left | align-center | align-right | bullets
/// image <source> | toc | page-number | page-vertical <top|bottom>
/// page-horizontal <left|center|right> | page-confirm | page-cancel
/// page-remove | margins <narrow|normal|wide> | wrap <mode>
/// delete-image | zoom-in | zoom-out | zoom-reset | tab <id>
/// ```
impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))?
            .to_ascii_lowercase();
        let arg = parts.collect::<Vec<_>>().join(" ");
        let invalid = |reason: String| CommandError::InvalidArgument {
            command: name.clone(),
            reason,
        };

        let command = match name.as_str() {
            "bold" => Command::Bold,
            "italic" => Command::Italic,
            "underline" => Command::Underline,
            "heading" | "h" => {
                let level: u8 = arg.parse().map_err(|_| invalid(format!("bad level '{arg}'")))?;
                if !(1..=3).contains(&level) {
                    return Err(invalid(format!("level {level} is not 1-3")));
                }
                Command::Heading { level }
            }
            "heading1" | "h1" => Command::Heading { level: 1 },
            "heading2" | "h2" => Command::Heading { level: 2 },
            "heading3" | "h3" => Command::Heading { level: 3 },
            "title" => Command::Title,
            "normal" => Command::Normal,
            "align-left" => Command::AlignLeft,
            "align-center" => Command::AlignCenter,
            "align-right" => Command::AlignRight,
            "bullets" | "bullet-list" => Command::BulletList,
            "image" | "insert-image" => {
                if arg.is_empty() {
                    return Err(invalid("missing source".to_string()));
                }
                Command::InsertImage { source: arg }
            }
            "toc" => Command::TableOfContents,
            "page-number" => Command::PageNumber,
            "page-vertical" => Command::ChoosePageNumberVertical(arg.parse().map_err(invalid)?),
            "page-horizontal" => Command::ChoosePageNumberHorizontal(arg.parse().map_err(invalid)?),
            "page-confirm" => Command::ConfirmPageNumber,
            "page-cancel" => Command::CancelPageNumber,
            "page-remove" => Command::RemovePageNumbers,
            "margins" => Command::SetMargins(arg.parse().map_err(invalid)?),
            "wrap" => Command::SetWrapMode(arg.parse().map_err(invalid)?),
            "delete-image" => Command::DeleteImage,
            "zoom-in" => Command::ZoomIn,
            "zoom-out" => Command::ZoomOut,
            "zoom-reset" => Command::ZoomReset,
            "tab" => {
                if arg.is_empty() {
                    return Err(invalid("missing tab id".to_string()));
                }
                Command::SetTab { tab: arg }
            }
            _ => return Err(CommandError::UnknownCommand(s.trim().to_string())),
        };
        Ok(command)
    }
}

/// User-input errors. The message is what the user gets to see.
///
/// None of these change any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Select or click inside the text you want to convert")]
    NoEligibleBlock,

    #[error("Add at least one Heading 1 before inserting a table of contents")]
    NoHeadings,

    #[error("Choose {missing} before applying page numbers")]
    IncompletePageNumberPosition { missing: &'static str },

    #[error("Open the page number menu first")]
    PickerClosed,

    #[error("Select a picture first")]
    NoObjectSelected,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument for {command}: {reason}")]
    InvalidArgument { command: String, reason: String },
}
