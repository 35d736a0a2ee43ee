//! Level definitions and the built-in case pack.
//!
//! A level is authored data: the starting document, the starting
//! objects, a narrative shown to the player, and a [`Goal`]. Packs can
//! also be loaded from TOML:
//!
//! ```toml
//! [[levels]]
//! id = "margins"
//! title = "Room to breathe"
//! initial_content = "<p>Too much white space.</p>"
//!
//! [levels.narrative]
//! sender = "Sam"
//! complaint = "My report wastes paper."
//!
//! [levels.goal]
//! type = "margins"
//! value = "narrow"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::floating::{FloatingObject, ObjectKind, Point, Size, WrapMode};
use crate::state::{HorizontalPosition, Margins, VerticalPosition};

/// Display-only story fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Narrative {
    pub sender: String,
    pub avatar: String,
    pub complaint: String,
    pub hint: String,
    pub instruction: String,
}

/// What a level checks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Goal {
    /// The image wraps text (square or tight) and sits right of `min_x`.
    ImageReflow { image_id: String, min_x: f64 },
    /// At least `min` Heading 1 blocks.
    HeadingCount { min: usize },
    /// A table of contents block exists.
    TableOfContents,
    Margins { value: Margins },
    /// Page numbers are on at exactly this position.
    PageNumber {
        vertical: VerticalPosition,
        horizontal: HorizontalPosition,
    },
    /// Page numbers on, the title phrase present, and a Heading 1 containing the word.
    Final {
        title_phrase: String,
        heading_word: String,
    },
}

/// One scripted case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub narrative: Narrative,
    pub initial_content: String,
    #[serde(default)]
    pub initial_images: Vec<FloatingObject>,
    pub goal: Goal,
}

/// An ordered list of levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPack {
    pub levels: Vec<LevelConfig>,
}

impl LevelPack {
    /// Parses a pack from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, LevelError> {
        let pack: Self = toml::from_str(content)?;
        if pack.levels.is_empty() {
            return Err(LevelError::Empty);
        }
        Ok(pack)
    }

    /// Loads a pack from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, LevelError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The six built-in cases.
    pub fn builtin() -> Self {
        Self {
            levels: vec![
                image_reflow_level(),
                headings_level(),
                toc_level(),
                margins_level(),
                page_number_level(),
                final_level(),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LevelConfig> {
        self.levels.get(index)
    }
}

impl Default for LevelPack {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Level pack errors.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Level pack contains no levels")]
    Empty,
}

fn narrative(sender: &str, complaint: &str, hint: &str, instruction: &str) -> Narrative {
    Narrative {
        sender: sender.to_string(),
        avatar: format!("{}.png", sender.to_lowercase()),
        complaint: complaint.to_string(),
        hint: hint.to_string(),
        instruction: instruction.to_string(),
    }
}

fn image_reflow_level() -> LevelConfig {
    LevelConfig {
        id: "image-reflow".to_string(),
        title: "The photo in the way".to_string(),
        narrative: narrative(
            "Noor",
            "The photo of our bakery covers half of my text!",
            "Pictures can float over text or let the text flow around them.",
            "Set the picture to square wrapping and drag it to the right side of the page.",
        ),
        initial_content: "<h1>Bakery Noor</h1>\
            <p>Every morning at five the ovens go on and the first loaves come out \
            before the street wakes up.</p>\
            <p>We bake sourdough, rye and sweet buns, and on Saturdays the famous \
            apple pie.</p>"
            .to_string(),
        initial_images: vec![FloatingObject {
            id: "img-bakery".to_string(),
            kind: ObjectKind::Image,
            source: "bakery.jpg".to_string(),
            position: Point::new(60.0, 120.0),
            size: Size::new(200.0, 150.0),
            wrap: WrapMode::Front,
        }],
        goal: Goal::ImageReflow {
            image_id: "img-bakery".to_string(),
            min_x: 250.0,
        },
    }
}

fn headings_level() -> LevelConfig {
    LevelConfig {
        id: "headings".to_string(),
        title: "A wall of text".to_string(),
        narrative: narrative(
            "Daan",
            "My essay looks like one long block. Nobody can find anything.",
            "Headings are a style, not just big bold letters.",
            "Make Introduction, Method and Conclusion a Heading 1.",
        ),
        initial_content: "<p>Introduction</p>\
            <p>This essay is about recycling at our school.</p>\
            <p>Method</p>\
            <p>We counted the bins in every classroom for two weeks.</p>\
            <p>Conclusion</p>\
            <p>Most paper still ends up in the wrong bin.</p>"
            .to_string(),
        initial_images: Vec::new(),
        goal: Goal::HeadingCount { min: 3 },
    }
}

fn toc_level() -> LevelConfig {
    LevelConfig {
        id: "table-of-contents".to_string(),
        title: "Where is chapter two?".to_string(),
        narrative: narrative(
            "Lotte",
            "My tutor wants a table of contents and I typed one by hand. It is wrong again.",
            "A generated table of contents is built from your headings.",
            "Place the cursor at the top and insert a table of contents.",
        ),
        initial_content: "<p class=\"title\">Volcanoes</p>\
            <h1>How volcanoes form</h1><p>Deep under the crust rock melts.</p>\
            <h1>Famous eruptions</h1><p>Vesuvius buried Pompeii in 79 AD.</p>\
            <h1>Living near a volcano</h1><p>The soil is very fertile.</p>"
            .to_string(),
        initial_images: Vec::new(),
        goal: Goal::TableOfContents,
    }
}

fn margins_level() -> LevelConfig {
    LevelConfig {
        id: "margins".to_string(),
        title: "Running out of paper".to_string(),
        narrative: narrative(
            "Sem",
            "My poster has to fit on one page but the edges are so wide.",
            "Margins are on the Layout tab.",
            "Set the margins to narrow.",
        ),
        initial_content: "<h1>School fair</h1>\
            <p>Saturday from ten to four on the square behind the gym.</p>\
            <p>Games, music, food and a second-hand book market.</p>"
            .to_string(),
        initial_images: Vec::new(),
        goal: Goal::Margins {
            value: Margins::Narrow,
        },
    }
}

fn page_number_level() -> LevelConfig {
    LevelConfig {
        id: "page-numbers".to_string(),
        title: "Which page was that?".to_string(),
        narrative: narrative(
            "Mila",
            "I dropped my printed report and now the pages are mixed up.",
            "Page numbers go on every page at once.",
            "Add page numbers at the bottom, in the center.",
        ),
        initial_content: "<h1>Report</h1>\
            <p>Our class visited the water treatment plant.</p>\
            <p>We learned how rain water becomes drinking water.</p>"
            .to_string(),
        initial_images: Vec::new(),
        goal: Goal::PageNumber {
            vertical: VerticalPosition::Bottom,
            horizontal: HorizontalPosition::Center,
        },
    }
}

fn final_level() -> LevelConfig {
    LevelConfig {
        id: "final".to_string(),
        title: "The big hand-in".to_string(),
        narrative: narrative(
            "Jesse",
            "Tomorrow is the deadline and my report still looks like a shopping list.",
            "Use everything you learned so far.",
            "Keep the title, make Summary a Heading 1 and add page numbers.",
        ),
        initial_content: "<p>Space Travel Report</p>\
            <p>Summary</p>\
            <p>People have been to the moon but never to Mars.</p>\
            <p>Sources</p>\
            <p>Library books and the space agency website.</p>"
            .to_string(),
        initial_images: Vec::new(),
        goal: Goal::Final {
            title_phrase: "space travel report".to_string(),
            heading_word: "summary".to_string(),
        },
    }
}
