/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::Cell;
use std::time::Duration;

use app_units::Au;
use euclid::default::{Point2D, Rect, Size2D};
use reflow::{
    Clear, DamageList, Display, Document, Float, FloatSide, Margin, NodeId, Position, QueryError,
    ReflowClock, ReflowDriver, ReflowError, ReflowOptions, ReflowOutcome, ReflowServices,
    ResolvedStyle, Size, WordFragment,
};

fn px(value: i32) -> Au {
    Au::from_px(value)
}

fn rect(x: i32, y: i32, width: i32, height: i32) -> Rect<Au> {
    Rect::new(Point2D::new(px(x), px(y)), Size2D::new(px(width), px(height)))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn block(height: i32) -> ResolvedStyle {
    ResolvedStyle {
        height: Size::Length(px(height)),
        ..Default::default()
    }
}

fn words(widths: &[i32]) -> Vec<WordFragment> {
    widths.iter().map(|width| WordFragment::new(px(*width))).collect()
}

fn append(document: &mut Document, parent: NodeId, style: ResolvedStyle) -> NodeId {
    let node = document.create_element(style);
    document.append_child(parent, node);
    node
}

fn append_text(document: &mut Document, parent: NodeId, words: Vec<WordFragment>) -> NodeId {
    let node = document.create_text(words);
    document.append_child(parent, node);
    node
}

fn complete(driver: &mut ReflowDriver, document: &Document) -> DamageList {
    match driver.reflow(document, ReflowServices::default()) {
        Ok(ReflowOutcome::Complete(damage)) => damage,
        other => panic!("expected a complete pass, got {:?}", other),
    }
}

fn border_box(driver: &ReflowDriver, document: &Document, node: NodeId) -> Rect<Au> {
    driver.query(document).unwrap().border_box(node).unwrap()
}

/// Advances by a millisecond every time it is read.
#[derive(Default)]
struct SteppingClock {
    ticks: Cell<u64>,
}

impl ReflowClock for SteppingClock {
    fn now(&self) -> Duration {
        self.ticks.set(self.ticks.get() + 1);
        Duration::from_millis(self.ticks.get())
    }
}

#[test]
fn blocks_stack_in_document_order() {
    init_logging();
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let first = append(&mut document, root, block(10));
    let second = append(&mut document, root, block(20));
    let third = append(&mut document, root, block(30));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    let damage = complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, first), rect(0, 0, 800, 10));
    assert_eq!(border_box(&driver, &document, second), rect(0, 10, 800, 20));
    assert_eq!(border_box(&driver, &document, third), rect(0, 30, 800, 30));
    assert_eq!(border_box(&driver, &document, root), rect(0, 0, 800, 60));
    assert!(damage.covers(px(10), px(55)));
    assert!(!damage.covers(px(810), px(5)));
}

#[test]
fn a_clean_document_produces_no_damage() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    append(&mut document, root, block(10));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);
    assert!(complete(&mut driver, &document).is_empty());
}

#[test]
fn a_taller_block_pushes_its_followers_down() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let first = append(&mut document, root, block(10));
    let second = append(&mut document, root, block(20));
    let third = append(&mut document, root, block(30));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    document.set_style(second, block(40));
    let damage = complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, first), rect(0, 0, 800, 10));
    assert_eq!(border_box(&driver, &document, third), rect(0, 50, 800, 30));
    assert_eq!(border_box(&driver, &document, root).size.height, px(80));
    assert!(damage.covers(px(400), px(75)));
    assert!(!damage.covers(px(400), px(85)));
}

#[test]
fn margins_collapse_through_an_empty_block() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let mut first_style = block(20);
    first_style.margin.bottom = Margin::length(px(10));
    append(&mut document, root, first_style);
    append(&mut document, root, ResolvedStyle::default());
    let mut third_style = block(20);
    third_style.margin.top = Margin::length(px(-5));
    let third = append(&mut document, root, third_style);

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, third), rect(0, 25, 800, 20));
    assert_eq!(border_box(&driver, &document, root).size.height, px(45));
}

#[test]
fn lines_flow_beside_a_float() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let float = append(
        &mut document,
        root,
        ResolvedStyle {
            float: Float::Left,
            width: Size::Length(px(100)),
            height: Size::Length(px(50)),
            ..Default::default()
        },
    );
    let text = append_text(&mut document, root, words(&[300, 300, 300]));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, float), rect(0, 0, 100, 50));
    assert_eq!(border_box(&driver, &document, text), rect(100, 0, 600, 40));
    assert_eq!(border_box(&driver, &document, root).size.height, px(50));

    let query = driver.query(&document).unwrap();
    let last = query.last_float(root).unwrap().unwrap();
    assert_eq!(last.node, float);
    assert_eq!(last.side, FloatSide::Left);
    assert_eq!(last.margin_box, rect(0, 0, 100, 50));
    assert_eq!(query.lowest_float_bottom(root, Clear::Left).unwrap(), Some(px(50)));
}

#[test]
fn shrink_to_fit_floats_converge_over_passes() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let float = append(
        &mut document,
        root,
        ResolvedStyle {
            float: Float::Left,
            ..Default::default()
        },
    );
    append_text(
        &mut document,
        float,
        vec![
            WordFragment::spaced(px(40), px(10)),
            WordFragment::new(px(60)),
        ],
    );

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, float), rect(0, 0, 110, 20));
}

#[test]
fn the_first_line_uses_its_own_height() {
    let mut document = Document::new(ResolvedStyle {
        first_line_height: Some(px(30)),
        ..Default::default()
    });
    let root = document.root();
    let text = append_text(&mut document, root, words(&[300, 300, 300]));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, text), rect(0, 0, 600, 50));
    assert_eq!(border_box(&driver, &document, root).size.height, px(50));
}

#[test]
fn absolutely_positioned_boxes_use_their_containing_block() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let container = append(
        &mut document,
        root,
        ResolvedStyle {
            position: Position::Relative,
            height: Size::Length(px(200)),
            ..Default::default()
        },
    );
    let mut inner_style = ResolvedStyle {
        position: Position::Absolute,
        width: Size::Length(px(50)),
        height: Size::Length(px(30)),
        ..Default::default()
    };
    inner_style.inset.left = Size::Length(px(10));
    inner_style.inset.top = Size::Length(px(20));
    let inner = append(&mut document, container, inner_style);

    let mut corner_style = ResolvedStyle {
        position: Position::Absolute,
        width: Size::Length(px(100)),
        height: Size::Length(px(50)),
        ..Default::default()
    };
    corner_style.inset.right = Size::Length(px(10));
    corner_style.inset.bottom = Size::Length(px(10));
    let corner = append(&mut document, root, corner_style);

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, inner), rect(10, 20, 50, 30));
    assert_eq!(border_box(&driver, &document, corner), rect(690, 540, 100, 50));

    let query = driver.query(&document).unwrap();
    assert_eq!(query.offset_parent(inner).unwrap(), Some(container));
    assert_eq!(query.offset_rect(inner).unwrap(), rect(10, 20, 50, 30));
    assert_eq!(query.bounding_rect(root).unwrap(), rect(0, 0, 800, 590));
    assert_eq!(query.paint_order(root).unwrap(), vec![container, inner, corner]);
}

#[test]
fn paint_order_follows_z_index_then_tree_order() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let positioned = |z_index| ResolvedStyle {
        position: Position::Relative,
        z_index,
        height: Size::Length(px(10)),
        ..Default::default()
    };
    let raised = append(&mut document, root, positioned(Some(2)));
    let lowered = append(&mut document, root, positioned(Some(-1)));
    let auto = append(&mut document, root, positioned(None));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    let query = driver.query(&document).unwrap();
    assert_eq!(query.paint_order(root).unwrap(), vec![lowered, auto, raised]);
}

#[test]
fn table_columns_settle_on_the_cell_widths() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let display = |display| ResolvedStyle {
        display,
        ..Default::default()
    };
    let table = append(&mut document, root, display(Display::Table));
    let row = append(&mut document, table, display(Display::TableRow));
    let first = append(&mut document, row, display(Display::TableCell));
    let second = append(&mut document, row, display(Display::TableCell));
    append_text(&mut document, first, words(&[100]));
    append_text(&mut document, second, words(&[200]));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, table), rect(0, 0, 300, 20));
    assert_eq!(border_box(&driver, &document, first), rect(0, 0, 100, 20));
    assert_eq!(border_box(&driver, &document, second), rect(100, 0, 200, 20));
}

#[test]
fn removed_elements_lose_their_boxes() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let first = append(&mut document, root, block(10));
    let second = append(&mut document, root, block(20));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    document.remove_child(root, first);
    let damage = complete(&mut driver, &document);

    assert_eq!(border_box(&driver, &document, second), rect(0, 0, 800, 20));
    assert!(damage.covers(px(5), px(25)));
    let query = driver.query(&document).unwrap();
    assert_eq!(query.border_box(first).unwrap_err(), QueryError::NoLayoutBox(first));
}

#[test]
fn a_new_viewport_relays_everything() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let child = append(&mut document, root, block(10));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    driver.options_mut().viewport_width = 400;
    complete(&mut driver, &document);
    assert_eq!(border_box(&driver, &document, child), rect(0, 0, 400, 10));
}

fn sectioned_document() -> (Document, Vec<NodeId>) {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let mut nodes = vec![root];
    for _ in 0..4 {
        let section = append(&mut document, root, ResolvedStyle::default());
        nodes.push(section);
        for _ in 0..3 {
            let paragraph = append(&mut document, section, ResolvedStyle::default());
            let spaced = (0..5).map(|_| WordFragment::spaced(px(100), px(10))).collect();
            let text = append_text(&mut document, paragraph, spaced);
            nodes.push(paragraph);
            nodes.push(text);
        }
    }
    (document, nodes)
}

fn sliced_options() -> ReflowOptions {
    ReflowOptions {
        max_reflow_time_ms: Some(1),
        yield_check_interval: 1,
        yield_increase_rate: 1000,
        ..Default::default()
    }
}

#[test]
fn a_suspended_pass_resumes_to_the_same_layout() {
    init_logging();
    let (reference_document, nodes) = sectioned_document();
    let mut reference = ReflowDriver::new(ReflowOptions::default());
    complete(&mut reference, &reference_document);

    let (document, _) = sectioned_document();
    let clock = SteppingClock::default();
    let mut driver = ReflowDriver::new(sliced_options());
    let mut suspensions = 0;
    loop {
        match driver.reflow(&document, ReflowServices::with_clock(&clock)).unwrap() {
            ReflowOutcome::Suspended(_) => {
                suspensions += 1;
                assert!(driver.is_suspended());
                assert_eq!(driver.query(&document).err(), Some(QueryError::ReflowInProgress));
                assert!(suspensions < 1000);
            },
            ReflowOutcome::Complete(_) => break,
            ReflowOutcome::Stopped(_) => panic!("nothing asked the pass to stop"),
        }
    }

    assert!(suspensions > 0);
    for node in nodes {
        assert_eq!(
            border_box(&driver, &document, node),
            border_box(&reference, &reference_document, node),
            "{:?}",
            node
        );
    }
    assert_eq!(border_box(&driver, &document, document.root()).size.height, px(240));
}

#[test]
fn an_abandoned_pass_starts_over() {
    let (document, nodes) = sectioned_document();
    let clock = SteppingClock::default();
    let mut driver = ReflowDriver::new(sliced_options());
    let outcome = driver.reflow(&document, ReflowServices::with_clock(&clock)).unwrap();
    assert!(matches!(outcome, ReflowOutcome::Suspended(_)));

    driver.abandon(&document);
    assert!(!driver.is_suspended());
    driver.options_mut().max_reflow_time_ms = None;
    complete(&mut driver, &document);

    let mut reference = ReflowDriver::new(ReflowOptions::default());
    complete(&mut reference, &document);
    for node in nodes {
        assert_eq!(border_box(&driver, &document, node), border_box(&reference, &document, node));
    }
}

#[test]
fn running_out_of_memory_keeps_the_work_for_later() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let first = append(&mut document, root, block(10));
    let second = append(&mut document, root, block(20));

    let mut driver = ReflowDriver::new(ReflowOptions {
        simulate_allocation_failure_after: Some(3),
        ..Default::default()
    });
    let error = driver.reflow(&document, ReflowServices::default()).unwrap_err();
    assert_eq!(error, ReflowError::OutOfMemory);
    assert_eq!(driver.query(&document).err(), Some(QueryError::LayoutOutOfDate));
    assert!(document.dirty(root).is_dirty());

    driver.options_mut().simulate_allocation_failure_after = None;
    complete(&mut driver, &document);
    assert_eq!(border_box(&driver, &document, first), rect(0, 0, 800, 10));
    assert_eq!(border_box(&driver, &document, second), rect(0, 10, 800, 20));
}

#[test]
fn a_partial_pass_stops_before_its_target() {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let first = append(&mut document, root, block(10));
    let second = append(&mut document, root, block(10));
    let third = append(&mut document, root, block(10));

    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    document.set_style(first, block(30));
    document.set_style(third, block(50));
    let outcome = driver
        .reflow_until(&document, ReflowServices::default(), third)
        .unwrap();
    assert!(matches!(outcome, ReflowOutcome::Stopped(_)));
    assert_eq!(border_box(&driver, &document, second), rect(0, 30, 800, 10));
    assert_eq!(border_box(&driver, &document, third), rect(0, 20, 800, 10));
    assert!(document.dirty(third).is_dirty());

    complete(&mut driver, &document);
    assert_eq!(border_box(&driver, &document, third), rect(0, 40, 800, 50));
    assert_eq!(border_box(&driver, &document, root).size.height, px(90));
}

fn floated(float: Float, width: i32, height: i32) -> ResolvedStyle {
    ResolvedStyle {
        float,
        width: Size::Length(px(width)),
        height: Size::Length(px(height)),
        ..Default::default()
    }
}

/// Sections whose floats reach into the sections that follow them.
fn floated_document(float_height: i32, spacer_height: i32) -> (Document, Vec<NodeId>) {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let mut nodes = vec![root];

    let first = append(&mut document, root, ResolvedStyle::default());
    let left = append(&mut document, first, floated(Float::Left, 100, float_height));
    let first_text = append_text(&mut document, first, words(&[300, 300, 300]));
    nodes.extend([first, left, first_text]);

    let second = append(&mut document, root, ResolvedStyle::default());
    let right = append(&mut document, second, floated(Float::Right, 150, 30));
    let second_text = append_text(&mut document, second, words(&[200, 200, 200, 200]));
    nodes.extend([second, right, second_text]);

    let spacer = append(&mut document, root, block(spacer_height));
    nodes.push(spacer);

    let last = append(&mut document, root, ResolvedStyle::default());
    let last_text = append_text(
        &mut document,
        last,
        (0..6).map(|_| WordFragment::spaced(px(150), px(10))).collect(),
    );
    nodes.extend([last, last_text]);
    (document, nodes)
}

fn assert_same_layout(
    driver: &ReflowDriver,
    document: &Document,
    reference: &ReflowDriver,
    reference_document: &Document,
    nodes: &[NodeId],
) {
    let query = driver.query(document).unwrap();
    let reference_query = reference.query(reference_document).unwrap();
    for node in nodes {
        assert_eq!(
            query.border_box(*node).unwrap(),
            reference_query.border_box(*node).unwrap(),
            "{:?}",
            node
        );
        assert_eq!(
            query.bounding_rect(*node).unwrap(),
            reference_query.bounding_rect(*node).unwrap(),
            "{:?}",
            node
        );
    }
    let root = document.root();
    assert_eq!(
        query.last_float(root).unwrap(),
        reference_query.last_float(root).unwrap()
    );
    assert_eq!(
        query.lowest_float_bottom(root, Clear::Both).unwrap(),
        reference_query.lowest_float_bottom(root, Clear::Both).unwrap()
    );
}

fn fresh_layout(document: &Document) -> ReflowDriver {
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, document);
    driver
}

#[test]
fn a_clean_pass_over_floats_and_text_produces_no_damage() {
    let (document, nodes) = floated_document(60, 10);
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);
    let first_pass: Vec<_> = nodes
        .iter()
        .map(|node| border_box(&driver, &document, *node))
        .collect();

    assert!(complete(&mut driver, &document).is_empty());
    let second_pass: Vec<_> = nodes
        .iter()
        .map(|node| border_box(&driver, &document, *node))
        .collect();
    assert_eq!(first_pass, second_pass);
}

#[test]
fn reused_sections_keep_their_floats() {
    init_logging();
    let (mut document, nodes) = floated_document(60, 10);
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    // Only the spacer changes; the sections above it are reused and their
    // floats have to go back into the registry of the root.
    let spacer = nodes[7];
    document.set_style(spacer, block(40));
    let damage = complete(&mut driver, &document);
    assert!(!damage.is_empty());

    let (fresh_document, _) = floated_document(60, 40);
    let reference = fresh_layout(&fresh_document);
    assert_same_layout(&driver, &document, &reference, &fresh_document, &nodes);
    assert_eq!(
        driver
            .query(&document)
            .unwrap()
            .last_float(document.root())
            .unwrap()
            .map(|float| float.node),
        Some(nodes[5])
    );
}

#[test]
fn a_resized_float_moves_the_content_after_it() {
    let (mut document, nodes) = floated_document(60, 10);
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    document.set_style(nodes[2], floated(Float::Left, 100, 90));
    complete(&mut driver, &document);

    let (fresh_document, _) = floated_document(90, 10);
    let reference = fresh_layout(&fresh_document);
    assert_same_layout(&driver, &document, &reference, &fresh_document, &nodes);
    assert_eq!(
        driver
            .query(&document)
            .unwrap()
            .lowest_float_bottom(document.root(), Clear::Left)
            .unwrap(),
        Some(px(90))
    );
}

#[test]
fn a_suspended_pass_over_floats_resumes_to_the_same_layout() {
    init_logging();
    let (mut document, nodes) = floated_document(60, 10);
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    document.set_style(nodes[7], block(25));
    *driver.options_mut() = sliced_options();

    let clock = SteppingClock::default();
    let mut suspensions = 0;
    loop {
        match driver.reflow(&document, ReflowServices::with_clock(&clock)).unwrap() {
            ReflowOutcome::Suspended(_) => {
                suspensions += 1;
                assert!(suspensions < 1000);
            },
            ReflowOutcome::Complete(_) => break,
            ReflowOutcome::Stopped(_) => panic!("nothing asked the pass to stop"),
        }
    }
    assert!(suspensions > 0);

    let (fresh_document, _) = floated_document(60, 25);
    let reference = fresh_layout(&fresh_document);
    assert_same_layout(&driver, &document, &reference, &fresh_document, &nodes);
}

fn kind_change_document(subject_style: ResolvedStyle) -> (Document, Vec<NodeId>) {
    let mut document = Document::new(ResolvedStyle::default());
    let root = document.root();
    let before = append(&mut document, root, block(10));
    let subject = append(&mut document, root, subject_style);
    let subject_text = append_text(&mut document, subject, words(&[50, 50]));
    let after_text = append_text(&mut document, root, words(&[300, 300, 300]));
    let after = append(&mut document, root, block(10));
    (document, vec![root, before, subject, subject_text, after_text, after])
}

#[test]
fn changing_the_kind_of_a_box_rebuilds_it() {
    init_logging();
    let block_style = block(20);
    let float_style = floated(Float::Left, 100, 20);
    let inline_style = ResolvedStyle::inline();

    let (mut document, nodes) = kind_change_document(block_style.clone());
    let subject = nodes[2];
    let mut driver = ReflowDriver::new(ReflowOptions::default());
    complete(&mut driver, &document);

    for style in [float_style, inline_style, block_style] {
        document.set_style(subject, style.clone());
        assert!(document.dirty(subject).needs_rebuild());
        complete(&mut driver, &document);

        let (fresh_document, _) = kind_change_document(style);
        let reference = fresh_layout(&fresh_document);
        assert_same_layout(&driver, &document, &reference, &fresh_document, &nodes);
        assert!(!document.dirty(nodes[4]).is_dirty());
    }
}
