/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The resolved style of an element as far as box layout is concerned.
//!
//! Cascade and inheritance happen elsewhere; layout only reads these
//! values, and they do not change while a box is being laid out.

use app_units::Au;
use euclid::num::Zero;

use crate::geom::{AuExt, Sides};
use crate::margin::CollapsibleMargin;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Display {
    None,
    #[default]
    Block,
    Inline,
    ListItem,
    Table,
    TableRowGroup,
    TableRow,
    TableCell,
    TableCaption,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Float {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Clear {
    #[default]
    None,
    Left,
    Right,
    Both,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Scroll,
    Auto,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BoxSizing {
    #[default]
    ContentBox,
    BorderBox,
}

/// A length, a percentage of the containing block (`0.5` is 50%), or auto.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Size {
    #[default]
    Auto,
    Length(Au),
    Percentage(f32),
}

impl Size {
    pub fn is_auto(&self) -> bool {
        matches!(self, Size::Auto)
    }

    /// `None` for auto, and for percentages of an unbounded or unknown
    /// containing block.
    pub fn resolve(&self, containing: Option<Au>) -> Option<Au> {
        match *self {
            Size::Auto => None,
            Size::Length(length) => Some(length),
            Size::Percentage(percentage) => containing
                .filter(|containing| !containing.is_unbounded())
                .map(|containing| containing.scale_by(percentage)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LengthPercentage {
    Length(Au),
    Percentage(f32),
}

impl Default for LengthPercentage {
    fn default() -> Self {
        LengthPercentage::Length(Au::zero())
    }
}

impl LengthPercentage {
    /// Percentages of an unbounded containing block resolve to zero.
    pub fn resolve(&self, containing: Au) -> Au {
        match *self {
            LengthPercentage::Length(length) => length,
            LengthPercentage::Percentage(_) if containing.is_unbounded() => Au::zero(),
            LengthPercentage::Percentage(percentage) => containing.scale_by(percentage),
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, LengthPercentage::Percentage(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Margin {
    pub value: Size,
    /// Set for margins that come from the element's default style rather
    /// than from an author.
    pub unspecified: bool,
}

impl Margin {
    pub fn length(value: Au) -> Self {
        Margin {
            value: Size::Length(value),
            unspecified: false,
        }
    }

    pub fn unspecified(value: Au) -> Self {
        Margin {
            value: Size::Length(value),
            unspecified: true,
        }
    }

    pub fn auto() -> Self {
        Margin {
            value: Size::Auto,
            unspecified: false,
        }
    }

    /// Percentages resolve against the containing block width; auto and
    /// unresolvable percentages are zero.
    pub fn resolve(&self, containing_width: Au) -> Au {
        self.value
            .resolve(Some(containing_width))
            .unwrap_or_else(Au::zero)
    }

    pub fn collapsible(&self, containing_width: Au) -> CollapsibleMargin {
        CollapsibleMargin {
            value: self.resolve(containing_width),
            is_percentage: matches!(self.value, Size::Percentage(_)),
            is_unspecified: self.unspecified,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedStyle {
    pub display: Display,
    pub position: Position,
    pub float: Float,
    pub clear: Clear,
    pub overflow: Overflow,
    pub box_sizing: BoxSizing,
    pub width: Size,
    pub height: Size,
    pub min_width: Size,
    pub max_width: Size,
    pub min_height: Size,
    pub max_height: Size,
    pub margin: Sides<Margin>,
    pub padding: Sides<LengthPercentage>,
    pub border: Sides<Au>,
    pub inset: Sides<Size>,
    pub z_index: Option<i32>,
    pub line_height: Au,
    /// Line height of the first formatted line, when a first-line style
    /// applies to this block.
    pub first_line_height: Option<Au>,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        ResolvedStyle {
            display: Display::Block,
            position: Position::Static,
            float: Float::None,
            clear: Clear::None,
            overflow: Overflow::Visible,
            box_sizing: BoxSizing::ContentBox,
            width: Size::Auto,
            height: Size::Auto,
            min_width: Size::Auto,
            max_width: Size::Auto,
            min_height: Size::Auto,
            max_height: Size::Auto,
            margin: Sides::all(Margin::default()),
            padding: Sides::all(LengthPercentage::default()),
            border: Sides::zero(),
            inset: Sides::all(Size::Auto),
            z_index: None,
            line_height: Au::from_px(20),
            first_line_height: None,
        }
    }
}

impl ResolvedStyle {
    pub fn inline() -> Self {
        ResolvedStyle {
            display: Display::Inline,
            ..Default::default()
        }
    }

    pub fn is_absolutely_positioned(&self) -> bool {
        matches!(self.position, Position::Absolute | Position::Fixed)
    }

    pub fn is_positioned(&self) -> bool {
        self.position != Position::Static
    }

    pub fn is_floating(&self) -> bool {
        self.float != Float::None && !self.is_absolutely_positioned()
    }

    pub fn is_out_of_flow(&self) -> bool {
        self.is_floating() || self.is_absolutely_positioned()
    }

    pub fn is_inline_level(&self) -> bool {
        self.display == Display::Inline && !self.is_out_of_flow()
    }

    /// Boxes for this style own a float registry.
    pub fn establishes_formatting_context(&self) -> bool {
        self.is_out_of_flow() ||
            self.overflow != Overflow::Visible ||
            matches!(
                self.display,
                Display::Table | Display::TableCell | Display::TableCaption
            )
    }

    /// Boxes for this style own a stacking context.
    pub fn establishes_stacking_context(&self) -> bool {
        self.is_positioned() && self.z_index.is_some()
    }

    /// Whether replacing `old` by this style changes which kind of box the
    /// element needs.
    pub fn requires_rebuild_from(&self, old: &ResolvedStyle) -> bool {
        self.display != old.display ||
            self.is_floating() != old.is_floating() ||
            self.is_absolutely_positioned() != old.is_absolutely_positioned() ||
            self.establishes_formatting_context() != old.establishes_formatting_context() ||
            self.establishes_stacking_context() != old.establishes_stacking_context()
    }

    pub fn padding(&self, containing_width: Au) -> Sides<Au> {
        self.padding.map(|padding| padding.resolve(containing_width))
    }

    pub fn margin(&self, containing_width: Au) -> Sides<Au> {
        self.margin.map(|margin| margin.resolve(containing_width))
    }

    /// Horizontal margins, skipping percentages. Used by the width-range
    /// calculation.
    pub fn nonpercent_horizontal_margin(&self) -> Au {
        let length = |margin: Margin| match margin.value {
            Size::Length(length) => length,
            _ => Au::zero(),
        };
        length(self.margin.left) + length(self.margin.right)
    }
}
