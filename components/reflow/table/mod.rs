/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tables.
//!
//! Column widths come from the cell width ranges of the previous pass. The
//! cells of a pass report their ranges again; if those changed, the table
//! asks for another pass so that the widths converge. Distributing the
//! available width over the columns is delegated to a [`TableSizer`].
//!
//! Row groups and rows stack vertically without margins. A row is as tall
//! as its tallest cell, and every cell is stretched to the row height once
//! the row finishes.

use app_units::Au;
use euclid::num::Zero;
use log::{debug, trace};
use smallvec::SmallVec;

use crate::ReflowError;
use crate::box_tree::BoxKind;
use crate::context::ReflowContext;
use crate::dom::NodeId;
use crate::flow::{ChildStart, Placement, bounds_in_parent, contains_stop_target, propagate, resolve_edges, skip_branch, start_box};
use crate::geom::Sides;
use crate::reflow_state::{RowState, TableState};
use crate::sizing::ContentSizes;

/// Width constraints of one column, gathered from its cells.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColumnWidths {
    pub min: Au,
    pub max: Au,
    /// The widest width specified on a cell of the column.
    pub desired: Option<Au>,
}

impl ColumnWidths {
    /// The width the column would take with unlimited room.
    pub fn preferred(&self) -> Au {
        self.desired.unwrap_or(self.max).max(self.min)
    }

    fn merge(&mut self, other: &ColumnWidths) {
        self.min = self.min.max(other.min);
        self.max = self.max.max(other.max);
        self.desired = match (self.desired, other.desired) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Turns column constraints into used column widths.
pub trait TableSizer {
    /// Column widths for a table whose content box may be `available` wide,
    /// or exactly `specified` wide when its width is not auto.
    fn distribute(&self, columns: &[ColumnWidths], available: Au, specified: Option<Au>) -> SmallVec<[Au; 8]>;
}

/// Automatic table layout: columns get their minimum width, then grow
/// toward their preferred width in proportion to how much they can grow.
/// Room left after that is shared in proportion to the preferred widths.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoTableSizer;

fn scale(amount: Au, numerator: Au, denominator: Au) -> Au {
    if denominator <= Au::zero() {
        return Au::zero();
    }
    Au((amount.0 as i64 * numerator.0 as i64 / denominator.0 as i64) as i32)
}

impl TableSizer for AutoTableSizer {
    fn distribute(&self, columns: &[ColumnWidths], available: Au, specified: Option<Au>) -> SmallVec<[Au; 8]> {
        let total_min = columns.iter().fold(Au::zero(), |sum, column| sum + column.min);
        let total_preferred = columns
            .iter()
            .fold(Au::zero(), |sum, column| sum + column.preferred());
        let target = match specified {
            Some(width) => width,
            None => available.min(total_preferred),
        }
        .max(total_min);

        let mut widths: SmallVec<[Au; 8]> = if target >= total_preferred {
            let extra = target - total_preferred;
            columns
                .iter()
                .map(|column| column.preferred() + scale(extra, column.preferred(), total_preferred))
                .collect()
        } else {
            let room = target - total_min;
            let growth = total_preferred - total_min;
            columns
                .iter()
                .map(|column| column.min + scale(room, column.preferred() - column.min, growth))
                .collect()
        };

        // Rounding leftovers go to the last column.
        let used = widths.iter().fold(Au::zero(), |sum, width| sum + *width);
        if let Some(last) = widths.last_mut() {
            if used < target && total_preferred > Au::zero() {
                *last += target - used;
            }
        }
        widths
    }
}

/// Shrink-to-fit content width of a table with an auto width.
pub(crate) fn auto_width(ctx: &ReflowContext, table: NodeId, available: Au) -> Au {
    let columns = &ctx.boxes[table].flow.columns;
    ctx.services
        .table_sizer
        .distribute(columns, available, None)
        .iter()
        .fold(Au::zero(), |sum, width| sum + *width)
}

/// Set up the column widths of a table that starts layout.
pub(crate) fn begin_table(ctx: &mut ReflowContext, table: NodeId) {
    let style = ctx.style(table);
    let content_width = ctx.boxes.state(table).content_width;
    let specified = (!style.width.is_auto()).then_some(content_width);
    let columns = ctx
        .services
        .table_sizer
        .distribute(&ctx.boxes[table].flow.columns, content_width, specified);
    trace!("Columns of {:?}: {:?}", table, columns);
    ctx.boxes.state_mut(table).table = Some(TableState {
        columns,
        constraints: SmallVec::new(),
    });
}

fn table_of(ctx: &ReflowContext, node: NodeId) -> Option<NodeId> {
    ctx.document
        .ancestors(node)
        .find(|ancestor| ctx.boxes.get(*ancestor).is_some_and(|layout_box| layout_box.kind == BoxKind::Table))
}

/// Start a row group or a row. They are laid out every time their table is.
pub(crate) fn begin_row_like(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) -> Result<ChildStart, ReflowError> {
    let state = ctx.boxes.state(parent);
    let (x, y, width, bfc_root) = (
        state.content_x,
        state.content_y,
        state.content_width,
        state.bfc_root,
    );
    let (bfc_x, bfc_y) = (state.bfc_x + x, state.bfc_y + y);

    let layout_box = &mut ctx.boxes[child];
    layout_box.margin = Sides::zero();
    layout_box.border = Sides::zero();
    layout_box.padding = Sides::zero();
    layout_box.flow.bfc_x = bfc_x;
    layout_box.flow.bfc_y = bfc_y;
    let kind = layout_box.kind;
    start_box(
        ctx,
        child,
        Placement {
            x,
            y,
            width,
            containing_width: width,
            bfc_root,
            bfc_x,
            bfc_y,
            definite_height: None,
        },
    )?;

    if kind == BoxKind::TableRow {
        let Some(table) = table_of(ctx, child) else {
            return Ok(ChildStart::Started);
        };
        ctx.boxes.state_mut(child).row = Some(RowState {
            table,
            column: 0,
            x: Au::zero(),
            height: Au::zero(),
            cells: SmallVec::new(),
        });
    }
    Ok(ChildStart::Started)
}

/// Put a cell into the next column of its row.
pub(crate) fn begin_cell(ctx: &mut ReflowContext, row: NodeId, cell: NodeId) -> Result<ChildStart, ReflowError> {
    let Some(row_state) = ctx.boxes.state(row).row.clone() else {
        return Ok(ChildStart::Done);
    };
    let table = row_state.table;
    let width = ctx
        .boxes
        .state(table)
        .table
        .as_ref()
        .and_then(|table| table.columns.get(row_state.column).copied())
        .unwrap_or_else(Au::zero);
    let containing_width = ctx.boxes.state(table).content_width;
    let (x, y) = (row_state.x, Au::zero());
    let (row_bfc_x, row_bfc_y, bfc_root) = {
        let state = ctx.boxes.state(row);
        (state.bfc_x, state.bfc_y, state.bfc_root)
    };

    ctx.allocation_point()?;
    if let Some(row_state) = ctx.boxes.state_mut(row).row.as_mut() {
        row_state.x += width;
        row_state.column += 1;
        row_state.cells.push(cell);
    }

    resolve_edges(ctx, cell, containing_width);
    let document = ctx.document;
    let layout_box = &ctx.boxes[cell];
    let reuse = layout_box.flow.laid_out_in_pass != 0 &&
        !document.dirty(cell).is_dirty() &&
        layout_box.width == width &&
        layout_box.flow.containing_width == containing_width &&
        !ctx.options.paged &&
        !contains_stop_target(ctx, cell);

    let layout_box = &mut ctx.boxes[cell];
    layout_box.margin = Sides::zero();
    layout_box.flow.bfc_x = row_bfc_x + x;
    layout_box.flow.bfc_y = row_bfc_y + y;
    if reuse {
        trace!("Reusing cell {:?}", cell);
        layout_box.x = x;
        layout_box.y = y;
        layout_box.height = layout_box.flow.natural_height;
        skip_branch(ctx, None, cell)?;
        propagate(ctx, cell)?;
        return Ok(ChildStart::Done);
    }

    start_box(
        ctx,
        cell,
        Placement {
            x,
            y,
            width,
            containing_width,
            bfc_root,
            bfc_x: row_bfc_x + x,
            bfc_y: row_bfc_y + y,
            definite_height: None,
        },
    )?;
    Ok(ChildStart::Started)
}

/// A cell finished: grow the row and report the cell's width range to the
/// table.
pub(crate) fn after_cell(ctx: &mut ReflowContext, row: NodeId, cell: NodeId) -> Result<(), ReflowError> {
    let style = ctx.style(cell);
    let layout_box = &ctx.boxes[cell];
    let height = layout_box.height;
    let outer = layout_box.flow.outer_sizes;
    let constraint = ColumnWidths {
        min: outer.min_content,
        max: outer.max_content,
        desired: (!style.width.is_auto()).then_some(outer.max_content),
    };

    let Some(row_state) = ctx.boxes.state_mut(row).row.as_mut() else {
        return Ok(());
    };
    row_state.height = row_state.height.max(height);
    let table = row_state.table;
    let Some(column) = row_state.cells.iter().position(|candidate| *candidate == cell) else {
        return Ok(());
    };

    ctx.allocation_point()?;
    let Some(table_state) = ctx.boxes.state_mut(table).table.as_mut() else {
        return Ok(());
    };
    if table_state.constraints.len() <= column {
        table_state.constraints.resize(column + 1, ColumnWidths::default());
    }
    table_state.constraints[column].merge(&constraint);
    Ok(())
}

/// Stretch every cell of a finished row to the row height.
pub(crate) fn stretch_cells(ctx: &mut ReflowContext, row: NodeId) {
    let Some(row_state) = ctx.boxes.state(row).row.clone() else {
        return;
    };
    for cell in row_state.cells {
        let layout_box = &mut ctx.boxes[cell];
        let growth = row_state.height - layout_box.height;
        if growth > Au::zero() {
            layout_box.height = row_state.height;
            layout_box.bounding_box.reduce(growth, Au::zero(), Au::zero());
        }
        let bounds = bounds_in_parent(layout_box);
        ctx.boxes.state_mut(row).children_bounds.union_with(&bounds);
    }
}

/// A row or row group finished: the next one goes below it.
pub(crate) fn after_row_like(ctx: &mut ReflowContext, parent: NodeId, child: NodeId) {
    let layout_box = &ctx.boxes[child];
    let bottom = layout_box.y + layout_box.height;
    let bounds = bounds_in_parent(layout_box);
    let state = ctx.boxes.state_mut(parent);
    state.content_y = state.content_y.max(bottom);
    state.has_in_flow_content = true;
    state.children_bounds.union_with(&bounds);
}

/// Compare the column constraints of this pass with the last one, and
/// report the table's width range.
pub(crate) fn finish_table(ctx: &mut ReflowContext, table: NodeId) -> Result<(), ReflowError> {
    let Some(table_state) = ctx.boxes.state_mut(table).table.take() else {
        return Ok(());
    };
    let constraints = table_state.constraints;
    let sizes = constraints.iter().fold(ContentSizes::zero(), |sizes, column| ContentSizes {
        min_content: sizes.min_content + column.min,
        max_content: sizes.max_content + column.preferred(),
    });
    ctx.boxes.state_mut(table).content_sizes.max_assign(sizes);

    let layout_box = &mut ctx.boxes[table];
    if layout_box.flow.columns != constraints {
        debug!("Columns of {:?} changed", table);
        layout_box.flow.columns = constraints;
        ctx.request_another_pass(table)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(value: i32) -> Au {
        Au::from_px(value)
    }

    fn column(min: i32, max: i32) -> ColumnWidths {
        ColumnWidths {
            min: px(min),
            max: px(max),
            desired: None,
        }
    }

    #[test]
    fn narrow_tables_interpolate_between_min_and_max() {
        let columns = [column(10, 110), column(20, 20), column(30, 130)];
        let widths = AutoTableSizer.distribute(&columns, px(160), None);
        assert_eq!(widths.as_slice(), &[px(60), px(20), px(80)]);
    }

    #[test]
    fn auto_tables_stop_at_their_preferred_width() {
        let columns = [column(10, 50), column(10, 70)];
        let widths = AutoTableSizer.distribute(&columns, px(500), None);
        assert_eq!(widths.as_slice(), &[px(50), px(70)]);
    }

    #[test]
    fn specified_widths_share_the_extra_room() {
        let columns = [column(10, 50), column(10, 150)];
        let widths = AutoTableSizer.distribute(&columns, px(500), Some(px(400)));
        assert_eq!(widths.as_slice(), &[px(100), px(300)]);
    }

    #[test]
    fn never_below_the_minimum() {
        let columns = [column(40, 100), column(60, 100)];
        let widths = AutoTableSizer.distribute(&columns, px(50), None);
        assert_eq!(widths.as_slice(), &[px(40), px(60)]);
    }

    #[test]
    fn desired_widths_win_over_content() {
        let mut desired = column(10, 200);
        desired.desired = Some(px(80));
        let widths = AutoTableSizer.distribute(&[desired, column(10, 20)], px(1000), None);
        assert_eq!(widths.as_slice(), &[px(80), px(20)]);
    }
}
