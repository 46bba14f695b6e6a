/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Reflow passes.
//!
//! [`ReflowDriver`] owns the box tree of one document. Each call to
//! [`ReflowDriver::reflow`] either starts a pass or continues a suspended
//! one. A pass that completes may ask for more passes, for example when a
//! shrink-to-fit width changed; those run within the same call, up to the
//! configured limit.

use app_units::Au;
use log::{debug, trace, warn};

use crate::bounding_box::AbsoluteBoundingBox;
use crate::box_tree::{BoxCapabilities, BoxTree};
use crate::context::{PassState, ReflowContext, ReflowServices, ResumeCursor};
use crate::dom::{Document, NodeId};
use crate::incremental::DamageList;
use crate::options::ReflowOptions;
use crate::query::LayoutQuery;
use crate::{LayoutStatus, QueryError, ReflowError, flow};

/// How a call to [`ReflowDriver::reflow`] ended.
#[derive(Debug)]
pub enum ReflowOutcome {
    /// Layout is up to date. The damage covers every area, in document
    /// coordinates, whose painting changed since the previous complete pass.
    Complete(DamageList),
    /// The time budget ran out. Geometry cannot be queried until a later
    /// call completes the pass.
    Suspended(ResumeCursor),
    /// A partial pass reached its target. Boxes after it keep their previous
    /// geometry and their ancestors stay dirty.
    Stopped(DamageList),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DriverStatus {
    Idle,
    Suspended,
    /// The last pass failed; its partial results are not trusted.
    Failed,
}

/// What to do with the boxes of a pass that does not complete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Recovery {
    /// Keep what was finished; only boxes still in progress lay out again.
    KeepFinished,
    /// Forget the whole pass.
    Discard,
}

pub struct ReflowDriver {
    options: ReflowOptions,
    boxes: BoxTree,
    pass: PassState,
    status: DriverStatus,
    last_pass_id: u32,
    /// Passes run for the current call, including the first.
    passes_in_call: u32,
    consecutive_yields: u32,
    budget_scale: u32,
    /// Viewport of the last pass that started.
    viewport: Option<(Au, Au)>,
    /// Damage of the passes of the current call.
    damage: DamageList,
}

impl ReflowDriver {
    pub fn new(options: ReflowOptions) -> Self {
        ReflowDriver {
            options,
            boxes: BoxTree::new(),
            pass: PassState::default(),
            status: DriverStatus::Idle,
            last_pass_id: 0,
            passes_in_call: 0,
            consecutive_yields: 0,
            budget_scale: 1,
            viewport: None,
            damage: DamageList::default(),
        }
    }

    pub fn options(&self) -> &ReflowOptions {
        &self.options
    }

    /// Changes apply to the next pass that starts.
    pub fn options_mut(&mut self) -> &mut ReflowOptions {
        &mut self.options
    }

    pub fn is_suspended(&self) -> bool {
        self.status == DriverStatus::Suspended
    }

    pub fn resume_cursor(&self) -> Option<ResumeCursor> {
        self.pass.cursor
    }

    /// Bring the layout of `document` up to date, or continue a suspended
    /// pass. The document must not change while a pass is suspended, unless
    /// the pass is [abandoned](Self::abandon) first.
    pub fn reflow(&mut self, document: &Document, services: ReflowServices) -> Result<ReflowOutcome, ReflowError> {
        self.run(document, services, None)
    }

    /// Lay out in document order until `target` is reached, without laying
    /// out `target` itself.
    pub fn reflow_until(
        &mut self,
        document: &Document,
        services: ReflowServices,
        target: NodeId,
    ) -> Result<ReflowOutcome, ReflowError> {
        self.run(document, services, Some(target))
    }

    /// Drop a suspended pass. Everything it touched lays out again on the
    /// next pass.
    pub fn abandon(&mut self, document: &Document) {
        if self.status != DriverStatus::Suspended {
            return;
        }
        debug!("Abandoning reflow pass {}", self.pass.pass_id);
        self.recover(document, Recovery::Discard);
        self.status = DriverStatus::Idle;
    }

    /// Geometry of the last complete pass.
    pub fn query<'a>(&'a self, document: &'a Document) -> Result<LayoutQuery<'a>, QueryError> {
        match self.status {
            DriverStatus::Idle => Ok(LayoutQuery::new(document, &self.boxes)),
            DriverStatus::Suspended => Err(QueryError::ReflowInProgress),
            DriverStatus::Failed => Err(QueryError::LayoutOutOfDate),
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "ReflowDriver::reflow",
            skip_all,
            fields(servo_profiling = true),
            level = "trace"
        )
    )]
    fn run(
        &mut self,
        document: &Document,
        services: ReflowServices,
        stop_before: Option<NodeId>,
    ) -> Result<ReflowOutcome, ReflowError> {
        if self.status != DriverStatus::Suspended {
            self.damage = DamageList::default();
            self.passes_in_call = 0;
            let needed = self
                .begin_pass(document, stop_before)
                .inspect_err(|_| self.fail(document))?;
            if !needed {
                trace!("Nothing to lay out");
                self.end_pass(document).inspect_err(|_| self.fail(document))?;
                self.status = DriverStatus::Idle;
                return Ok(ReflowOutcome::Complete(self.damage.take()));
            }
        }

        loop {
            let status = self
                .run_slice(document, services)
                .inspect_err(|_| self.fail(document))?;

            match status {
                LayoutStatus::Yield => {
                    self.consecutive_yields += 1;
                    if self.consecutive_yields % self.options.yield_increase_rate.max(1) == 0 {
                        self.budget_scale = self.budget_scale.saturating_mul(2);
                        debug!("Reflow budget scaled to {}x", self.budget_scale);
                    }
                    self.status = DriverStatus::Suspended;
                    let cursor = self.pass.cursor.unwrap_or(ResumeCursor {
                        parent: document.root(),
                        next_child: None,
                        start_position: Au(0),
                    });
                    return Ok(ReflowOutcome::Suspended(cursor));
                },
                LayoutStatus::Continue => {
                    self.consecutive_yields = 0;
                    self.budget_scale = 1;
                    self.end_pass(document).inspect_err(|_| self.fail(document))?;

                    let relayout = std::mem::take(&mut self.pass.relayout);
                    if relayout.is_empty() {
                        self.status = DriverStatus::Idle;
                        return Ok(ReflowOutcome::Complete(self.damage.take()));
                    }
                    for node in &relayout {
                        if document.is_connected(*node) {
                            document.mark_dirty(*node);
                        }
                    }
                    if self.passes_in_call >= self.options.max_passes_per_reflow {
                        warn!(
                            "Layout did not converge after {} passes; {} boxes stay dirty",
                            self.passes_in_call,
                            relayout.len()
                        );
                        self.status = DriverStatus::Idle;
                        return Ok(ReflowOutcome::Complete(self.damage.take()));
                    }
                    debug!("Running another pass for {} boxes", relayout.len());
                    self.begin_pass(document, stop_before)
                        .inspect_err(|_| self.fail(document))?;
                },
                LayoutStatus::Stop | LayoutStatus::EndFirstLine => {
                    debug!("Pass {} stopped early", self.pass.pass_id);
                    self.consecutive_yields = 0;
                    self.budget_scale = 1;
                    self.recover(document, Recovery::KeepFinished);
                    self.end_pass(document).inspect_err(|_| self.fail(document))?;
                    self.status = DriverStatus::Idle;
                    return Ok(ReflowOutcome::Stopped(self.damage.take()));
                },
            }
        }
    }

    /// Start a pass. Returns whether anything needs layout.
    fn begin_pass(&mut self, document: &Document, stop_before: Option<NodeId>) -> Result<bool, ReflowError> {
        self.last_pass_id += 1;
        self.passes_in_call += 1;
        self.pass = PassState {
            pass_id: self.last_pass_id,
            stop_before,
            ..Default::default()
        };
        debug!("Starting reflow pass {}", self.last_pass_id);

        for removed in document.take_removed() {
            if !document.is_connected(removed.node) {
                self.prune(document, removed.node, removed.former_parent)?;
            }
        }

        let root = document.root();
        if self.options.nonincremental_layout {
            document.mark_subtree_dirty(root);
        }
        let viewport = self.options.viewport_size();
        if self.viewport != Some(viewport) {
            if self.viewport.is_some() {
                debug!("Viewport changed to {:?}", viewport);
            }
            document.mark_subtree_dirty(root);
            self.viewport = Some(viewport);
        }
        Ok(document.dirty(root).is_dirty() || !self.boxes.contains(root))
    }

    /// Drop the boxes of a subtree that left the document.
    fn prune(&mut self, document: &Document, node: NodeId, former_parent: NodeId) -> Result<(), ReflowError> {
        let mut removed_float = false;
        let mut stack = Vec::new();
        stack.try_reserve(8)?;
        stack.push(node);
        while let Some(current) = stack.pop() {
            if let Some(layout_box) = self.boxes.remove(current) {
                trace!("Pruning the box of {:?}", current);
                removed_float |= layout_box.is(BoxCapabilities::FLOATING);
                if let Some(bounds) = layout_box.flow.doc_bounds {
                    self.pass.damage.add(bounds)?;
                }
            }
            let children = document.children(current);
            stack.try_reserve(children.len())?;
            stack.extend(children.iter().copied());
        }

        if removed_float {
            let bfc_root = std::iter::once(former_parent)
                .chain(document.ancestors(former_parent))
                .find(|ancestor| {
                    self.boxes
                        .get(*ancestor)
                        .is_some_and(|layout_box| layout_box.is(BoxCapabilities::FORMATTING_CONTEXT_ROOT))
                });
            if let Some(registry) = bfc_root.and_then(|root| self.boxes.registry_mut(root)) {
                registry.enable_full_bfc_reflow();
            }
        }
        Ok(())
    }

    fn run_slice(&mut self, document: &Document, services: ReflowServices) -> Result<LayoutStatus, ReflowError> {
        let budget = self
            .options
            .time_budget()
            .map(|budget| budget.saturating_mul(self.budget_scale));
        let root = document.root();
        let mut ctx = ReflowContext::new(
            document,
            &mut self.boxes,
            services,
            &self.options,
            &mut self.pass,
            budget,
        );
        if !ctx.boxes.has_state(root) && !flow::start_root(&mut ctx)? {
            return Ok(LayoutStatus::Continue);
        }
        flow::layout(&mut ctx, root)
    }

    /// Turn the boxes damaged by the pass into rectangles, and refresh the
    /// document-space bounds the next pass compares against.
    fn end_pass(&mut self, document: &Document) -> Result<(), ReflowError> {
        let damaged = std::mem::take(&mut self.pass.damaged);
        for node in &damaged {
            if let Some(bounds) = self.boxes.get(*node).and_then(|layout_box| layout_box.flow.doc_bounds) {
                self.pass.damage.add(bounds)?;
            }
        }
        self.refresh_document_bounds(document)?;
        for node in &damaged {
            if let Some(bounds) = self.boxes.get(*node).and_then(|layout_box| layout_box.flow.doc_bounds) {
                self.pass.damage.add(bounds)?;
            }
        }

        for rect in self.pass.damage.rects() {
            self.damage.add(*rect)?;
        }
        debug!(
            "Reflow pass {} done: {} boxes damaged, {} rectangles",
            self.pass.pass_id,
            damaged.len(),
            self.damage.len()
        );
        Ok(())
    }

    fn refresh_document_bounds(&mut self, document: &Document) -> Result<(), ReflowError> {
        let mut stack = Vec::new();
        stack.try_reserve(16)?;
        stack.push((document.root(), Au(0), Au(0)));
        while let Some((node, parent_x, parent_y)) = stack.pop() {
            let Some(layout_box) = self.boxes.get_mut(node) else {
                continue;
            };
            let x = parent_x + layout_box.x;
            let y = parent_y + layout_box.y;
            let mut bounds =
                AbsoluteBoundingBox::from_relative(&layout_box.bounding_box, layout_box.width, layout_box.height);
            bounds.translate(x, y);
            layout_box.flow.doc_bounds = Some(bounds.bounding_rect());

            let children = document.children(node);
            stack.try_reserve(children.len())?;
            stack.extend(children.iter().map(|child| (*child, x, y)));
        }
        Ok(())
    }

    fn fail(&mut self, document: &Document) {
        warn!("Reflow pass {} failed: out of memory", self.pass.pass_id);
        self.recover(document, Recovery::Discard);
        self.status = DriverStatus::Failed;
    }

    /// Clean up after a pass that will not complete. Dirtiness carries the
    /// work over to the next pass.
    fn recover(&mut self, document: &Document, recovery: Recovery) {
        let pass_id = self.pass.pass_id;
        for (node, layout_box) in self.boxes.iter_mut() {
            let in_progress = layout_box.reflow_state.take().is_some();
            let finished = layout_box.flow.laid_out_in_pass == pass_id;
            if in_progress || (recovery == Recovery::Discard && finished) {
                document.mark_dirty(node);
            }
            if recovery == Recovery::Discard && (in_progress || finished) {
                layout_box.flow.laid_out_in_pass = 0;
            }
            if let Some(registry) = layout_box.float_registry.as_mut().filter(|registry| registry.is_in_reflow()) {
                registry.abort(document);
            }
            if let Some(stacking) = layout_box.stacking.as_mut().filter(|stacking| stacking.is_in_reflow()) {
                stacking.finish(document);
            }
        }
        self.pass.cursor = None;
        if recovery == Recovery::Discard {
            self.pass.damaged.clear();
            self.pass.relayout.clear();
        }
    }
}
