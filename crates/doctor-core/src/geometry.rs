//! Page geometry: padding box and page count.
//!
//! Everything here is a pure function of margins, floating objects and
//! the measured content height. Nothing is cached; the surface calls
//! [`PageGeometry::compute`] on every render.
//!
//! ## Square Wrap
//!
//! Text reflow around a `square` object is approximated by widening the
//! page padding on the side the object sits on:
//!
//! ```text
//!  page_width
//! ├──────────────────────────────┤
//! │ base │   text   │ ▓▓▓image▓▓ │   centre right of middle:
//! │      │          │            │   right = page_width - x + clearance
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{MarginConfig, PageConfig};
use crate::floating::{FloatingObject, WrapMode};
use crate::state::Margins;

/// Padding per side in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Width left for text on a page of `page_width`.
    pub fn content_width(&self, page_width: f64) -> f64 {
        (page_width - self.left - self.right).max(0.0)
    }
}

impl MarginConfig {
    /// Base padding for a margin preset.
    pub fn base(&self, margins: Margins) -> f64 {
        match margins {
            Margins::Narrow => self.narrow,
            Margins::Normal => self.normal,
            Margins::Wide => self.wide,
        }
    }
}

/// Computes the padding box for the given margins and objects.
///
/// Only `square` objects push text aside. An object whose centre is
/// exactly on the page centre counts as left of it.
pub fn compute_padding(
    margins: &MarginConfig,
    preset: Margins,
    objects: &[FloatingObject],
    page_width: f64,
) -> Padding {
    let mut padding = Padding::uniform(margins.base(preset));
    let middle = page_width / 2.0;

    for object in objects.iter().filter(|o| o.wrap == WrapMode::Square) {
        if object.center_x() > middle {
            let required = page_width - object.position.x + margins.wrap_clearance;
            padding.right = padding.right.max(required);
        } else {
            let required = object.right() + margins.wrap_clearance;
            padding.left = padding.left.max(required);
        }
    }

    padding
}

/// Number of pages needed for `rendered_height` pixels of content.
///
/// Always at least one page. Negative or non-finite heights count as empty.
pub fn compute_page_count(rendered_height: f64, page_height: f64) -> usize {
    if !(page_height.is_finite() && page_height > 0.0) {
        return 1;
    }
    let height = if rendered_height.is_finite() {
        rendered_height.max(0.0)
    } else {
        0.0
    };
    let pages = (height.max(page_height) / page_height).ceil();
    (pages as usize).max(1)
}

/// Derived page layout for one render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub padding: Padding,
    pub page_count: usize,
}

impl PageGeometry {
    pub fn compute(
        page: &PageConfig,
        margins: &MarginConfig,
        preset: Margins,
        objects: &[FloatingObject],
        rendered_height: f64,
    ) -> Self {
        Self {
            padding: compute_padding(margins, preset, objects, page.width),
            page_count: compute_page_count(rendered_height, page.height),
        }
    }

    /// Total height of the page stack including gaps.
    pub fn stack_height(&self, page: &PageConfig) -> f64 {
        let count = self.page_count as f64;
        count * page.height + (count - 1.0).max(0.0) * page.gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floating::{ObjectKind, Point, Size};

    const PAGE_WIDTH: f64 = 794.0;
    const PAGE_HEIGHT: f64 = 1123.0;

    fn object(x: f64, width: f64, wrap: WrapMode) -> FloatingObject {
        FloatingObject {
            id: "img".to_string(),
            kind: ObjectKind::Image,
            source: String::new(),
            position: Point::new(x, 100.0),
            size: Size::new(width, 150.0),
            wrap,
        }
    }

    #[test]
    fn test_base_padding_per_preset() {
        let margins = MarginConfig::default();
        assert_eq!(compute_padding(&margins, Margins::Narrow, &[], PAGE_WIDTH), Padding::uniform(20.0));
        assert_eq!(compute_padding(&margins, Margins::Normal, &[], PAGE_WIDTH), Padding::uniform(50.0));
        assert_eq!(compute_padding(&margins, Margins::Wide, &[], PAGE_WIDTH), Padding::uniform(80.0));
    }

    #[test]
    fn test_square_object_on_the_right() {
        let margins = MarginConfig::default();
        let objects = [object(500.0, 200.0, WrapMode::Square)];
        let padding = compute_padding(&margins, Margins::Normal, &objects, PAGE_WIDTH);
        assert_eq!(padding.right, PAGE_WIDTH - 500.0 + 10.0);
        assert_eq!(padding.left, 50.0);
        assert_eq!(padding.top, 50.0);
    }

    #[test]
    fn test_square_object_on_the_left() {
        let margins = MarginConfig::default();
        let objects = [object(60.0, 200.0, WrapMode::Square)];
        let padding = compute_padding(&margins, Margins::Normal, &objects, PAGE_WIDTH);
        assert_eq!(padding.left, 270.0);
        assert_eq!(padding.right, 50.0);
    }

    #[test]
    fn test_other_wrap_modes_do_not_reflow() {
        let margins = MarginConfig::default();
        for wrap in [WrapMode::Tight, WrapMode::None, WrapMode::Behind, WrapMode::Front] {
            let objects = [object(500.0, 200.0, wrap)];
            let padding = compute_padding(&margins, Margins::Normal, &objects, PAGE_WIDTH);
            assert_eq!(padding, Padding::uniform(50.0), "{wrap}");
        }
    }

    #[test]
    fn test_largest_requirement_wins() {
        let margins = MarginConfig::default();
        let objects = [
            object(600.0, 100.0, WrapMode::Square),
            object(450.0, 200.0, WrapMode::Square),
        ];
        let padding = compute_padding(&margins, Margins::Narrow, &objects, PAGE_WIDTH);
        assert_eq!(padding.right, PAGE_WIDTH - 450.0 + 10.0);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(compute_page_count(0.0, PAGE_HEIGHT), 1);
        assert_eq!(compute_page_count(PAGE_HEIGHT, PAGE_HEIGHT), 1);
        assert_eq!(compute_page_count(PAGE_HEIGHT + 1.0, PAGE_HEIGHT), 2);
        assert_eq!(compute_page_count(3.0 * PAGE_HEIGHT, PAGE_HEIGHT), 3);
        assert_eq!(compute_page_count(f64::NAN, PAGE_HEIGHT), 1);
        assert_eq!(compute_page_count(500.0, 0.0), 1);
    }

    #[test]
    fn test_stack_height_includes_gaps() {
        let page = PageConfig::default();
        let geometry = PageGeometry::compute(
            &page,
            &MarginConfig::default(),
            Margins::Normal,
            &[],
            2.5 * page.height,
        );
        assert_eq!(geometry.page_count, 3);
        assert_eq!(geometry.stack_height(&page), 3.0 * page.height + 2.0 * page.gap);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn padding_grows_with_width_at_fixed_right_edge(
                right_edge in 0.0f64..794.0,
                width in 0.0f64..400.0,
                extra in 0.0f64..200.0,
            ) {
                let margins = MarginConfig::default();
                let narrow_width = width.min(right_edge);
                let wide_width = (width + extra).min(right_edge);
                let narrow = [object(right_edge - narrow_width, narrow_width, WrapMode::Square)];
                let wide = [object(right_edge - wide_width, wide_width, WrapMode::Square)];

                let before = compute_padding(&margins, Margins::Normal, &narrow, PAGE_WIDTH);
                let after = compute_padding(&margins, Margins::Normal, &wide, PAGE_WIDTH);

                prop_assert!(after.left >= margins.normal);
                prop_assert!(after.right >= margins.normal);
                let before_max = before.left.max(before.right);
                let after_max = after.left.max(after.right);
                prop_assert!(after_max + 1e-9 >= before_max);
            }

            #[test]
            fn page_count_is_total_and_monotone(a in 0.0f64..1e7, b in 0.0f64..1e7) {
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                let low_pages = compute_page_count(low, PAGE_HEIGHT);
                let high_pages = compute_page_count(high, PAGE_HEIGHT);
                prop_assert!(low_pages >= 1);
                prop_assert!(high_pages >= low_pages);
            }
        }
    }
}
