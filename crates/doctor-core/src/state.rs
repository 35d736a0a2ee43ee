//! Simulator view state: zoom, margins, tabs and page numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::command::CommandError;
use crate::config::ZoomConfig;

/// Ribbon tab shown when a level starts.
pub const TAB_START: &str = "start";
/// Ribbon tab with wrap and margin controls.
pub const TAB_LAYOUT: &str = "layout";

/// Margin presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margins {
    #[default]
    Normal,
    Narrow,
    Wide,
}

impl Margins {
    pub fn as_str(self) -> &'static str {
        match self {
            Margins::Normal => "normal",
            Margins::Narrow => "narrow",
            Margins::Wide => "wide",
        }
    }
}

impl FromStr for Margins {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Margins::Normal),
            "narrow" => Ok(Margins::Narrow),
            "wide" => Ok(Margins::Wide),
            other => Err(format!("unknown margins '{other}'")),
        }
    }
}

impl fmt::Display for Margins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalPosition {
    Top,
    Bottom,
}

impl FromStr for VerticalPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(VerticalPosition::Top),
            "bottom" => Ok(VerticalPosition::Bottom),
            other => Err(format!("unknown vertical position '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalPosition {
    Left,
    Center,
    Right,
}

impl FromStr for HorizontalPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(HorizontalPosition::Left),
            "center" | "centre" => Ok(HorizontalPosition::Center),
            "right" => Ok(HorizontalPosition::Right),
            other => Err(format!("unknown horizontal position '{other}'")),
        }
    }
}

/// Where page numbers are drawn on every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageNumberPosition {
    pub vertical: VerticalPosition,
    pub horizontal: HorizontalPosition,
}

impl PageNumberPosition {
    pub fn new(vertical: VerticalPosition, horizontal: HorizontalPosition) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }
}

/// The two-axis page number selector.
///
/// Nothing becomes active until both axes are chosen and confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageNumberPicker {
    pub vertical: Option<VerticalPosition>,
    pub horizontal: Option<HorizontalPosition>,
}

impl PageNumberPicker {
    pub fn confirm(&self) -> Result<PageNumberPosition, CommandError> {
        match (self.vertical, self.horizontal) {
            (Some(v), Some(h)) => Ok(PageNumberPosition::new(v, h)),
            (None, _) => Err(CommandError::IncompletePageNumberPosition { missing: "top or bottom" }),
            (_, None) => Err(CommandError::IncompletePageNumberPosition {
                missing: "left, center or right",
            }),
        }
    }
}

/// View state of the simulated word processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorState {
    /// Zoom in percent
    pub zoom: u16,
    pub margins: Margins,
    pub orientation: Orientation,
    pub paper: PaperSize,
    /// Ribbon tab id
    pub active_tab: String,
    /// Active page number placement, if page numbers are on
    pub page_numbers: Option<PageNumberPosition>,
    /// Open page number selector
    pub picker: Option<PageNumberPicker>,
}

impl SimulatorState {
    /// Fresh state for a level load.
    pub fn new(zoom: &ZoomConfig) -> Self {
        Self {
            zoom: zoom.initial,
            margins: Margins::Normal,
            orientation: Orientation::Portrait,
            paper: PaperSize::A4,
            active_tab: TAB_START.to_string(),
            page_numbers: None,
            picker: None,
        }
    }

    /// Zoom as a scale factor.
    pub fn scale(&self) -> f64 {
        f64::from(self.zoom) / 100.0
    }

    pub fn zoomed_in(&self, zoom: &ZoomConfig) -> Self {
        Self {
            zoom: self.zoom.saturating_add(zoom.step).clamp(zoom.min, zoom.max),
            ..self.clone()
        }
    }

    pub fn zoomed_out(&self, zoom: &ZoomConfig) -> Self {
        Self {
            zoom: self.zoom.saturating_sub(zoom.step).clamp(zoom.min, zoom.max),
            ..self.clone()
        }
    }

    pub fn page_numbers_active(&self) -> bool {
        self.page_numbers.is_some()
    }
}

impl Default for SimulatorState {
    fn default() -> Self {
        Self::new(&ZoomConfig::default())
    }
}
