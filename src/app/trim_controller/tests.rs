// Unit tests for the trim controller

use super::*;

/// 10 px per second over a 45 s source
fn controller() -> TrimController {
    TrimController::new(
        45.0,
        TrimConstraints::default(),
        TimelineGeometry::new(0.0, 450.0, 20.0),
    )
    .unwrap()
}

fn at(x: f64) -> Point {
    Point::new(x, 12.0)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Single seek target, if the commands are exactly one seek
fn seek_target(commands: &[PreviewCommand]) -> Option<f64> {
    match commands {
        [PreviewCommand::Seek(t)] => Some(*t),
        _ => None,
    }
}

#[test]
fn test_initial_range_is_capped() {
    let controller = controller();
    assert_eq!(controller.range().start(), 0.0);
    assert_eq!(controller.range().end(), 30.0);
    assert!(controller.needs_trim(MediaKind::Video));
    assert!(!controller.needs_trim(MediaKind::Image));
}

#[test]
fn test_unknown_duration_is_rejected() {
    let result = TrimController::new(
        0.0,
        TrimConstraints::default(),
        TimelineGeometry::new(0.0, 450.0, 20.0),
    );
    assert!(matches!(result, Err(DomainError::UnsupportedSource(_))));
}

#[test]
fn test_grab_pauses_only_playing_preview() {
    let mut controller = controller();
    assert_eq!(
        controller.pointer_down(DragHandle::End, at(300.0), true),
        vec![PreviewCommand::Pause]
    );
    controller.pointer_up();
    assert!(controller
        .pointer_down(DragHandle::End, at(300.0), false)
        .is_empty());
}

#[test]
fn test_right_handle_drag_seeks_to_end() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::End, at(300.0), true);
    assert_eq!(controller.active_handle(), Some(DragHandle::End));

    let commands = controller.pointer_move(at(120.0));
    assert!(close(seek_target(&commands).unwrap(), 12.0));
    assert!(close(controller.range().end(), 12.0));
    assert_eq!(controller.range().start(), 0.0);
}

#[test]
fn test_left_handle_cannot_pass_right_handle() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::Start, at(0.0), false);
    controller.pointer_move(at(440.0));
    assert!(close(controller.range().start(), 29.0));
    assert_eq!(controller.range().end(), 30.0);
}

#[test]
fn test_pan_then_left_handle_respects_max_segment() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::Bar, at(150.0), false);
    let commands = controller.pointer_move(at(270.0));
    assert!(close(seek_target(&commands).unwrap(), 12.0));
    assert!(close(controller.range().end(), 42.0));
    assert!(close(controller.range().span(), 30.0));
    controller.pointer_up();

    controller.pointer_down(DragHandle::Start, at(120.0), false);
    controller.pointer_move(at(0.0));
    assert!(close(controller.range().start(), 12.0));
    assert!(close(controller.range().end(), 42.0));
}

#[test]
fn test_release_seeks_to_start_and_plays() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::Start, at(0.0), true);
    controller.pointer_move(at(50.0));
    let start = controller.range().start();
    assert!(close(start, 5.0));
    assert_eq!(
        controller.pointer_up(),
        vec![PreviewCommand::Seek(start), PreviewCommand::Play]
    );
    assert!(!controller.is_dragging());
    assert!(controller.pointer_up().is_empty());
}

#[test]
fn test_move_without_gesture_is_ignored() {
    let mut controller = controller();
    assert!(controller.pointer_move(at(100.0)).is_empty());
    assert_eq!(controller.range().end(), 30.0);
}

#[test]
fn test_collapsed_widget_makes_moves_noops() {
    let mut controller = TrimController::new(
        45.0,
        TrimConstraints::default(),
        TimelineGeometry::new(0.0, 0.0, 20.0),
    )
    .unwrap();
    controller.pointer_down(DragHandle::End, at(10.0), false);
    assert!(controller.pointer_move(at(100.0)).is_empty());
    assert_eq!(controller.range().end(), 30.0);
}

#[test]
fn test_loop_check_resets_to_start() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::Bar, at(0.0), false);
    controller.pointer_move(at(250.0));
    controller.pointer_up();
    let range = controller.range();
    assert!(close(range.start(), 10.0));

    assert!(controller.on_time_update(20.0, false).is_empty());
    assert_eq!(
        controller.on_time_update(range.end(), false),
        vec![PreviewCommand::Seek(range.start())]
    );
    assert_eq!(
        controller.on_time_update(3.0, true),
        vec![PreviewCommand::Seek(range.start()), PreviewCommand::Play]
    );
}

#[test]
fn test_loop_check_leaves_user_pause_alone() {
    let mut controller = controller();
    assert!(!controller.is_looping());
    assert_eq!(
        controller.on_time_update(35.0, true),
        vec![PreviewCommand::Seek(0.0)]
    );

    assert_eq!(
        controller.start_looping(),
        vec![PreviewCommand::Seek(0.0), PreviewCommand::Play]
    );
    assert_eq!(
        controller.on_time_update(35.0, true),
        vec![PreviewCommand::Seek(0.0), PreviewCommand::Play]
    );

    assert_eq!(controller.stop_looping(), vec![PreviewCommand::Pause]);
    assert_eq!(
        controller.on_time_update(35.0, true),
        vec![PreviewCommand::Seek(0.0)]
    );
}

#[test]
fn test_loop_check_suspended_while_dragging() {
    let mut controller = controller();
    controller.pointer_down(DragHandle::End, at(300.0), true);
    assert!(controller.on_time_update(44.0, true).is_empty());
}

#[test]
fn test_selection_box_tracks_range() {
    let mut controller = controller();
    let (left, width) = controller.selection_box();
    assert_eq!(left, 0.0);
    assert!(close(width, 300.0));

    controller.set_geometry(TimelineGeometry::new(0.0, 900.0, 20.0));
    let (left, width) = controller.selection_box();
    assert_eq!(left, 0.0);
    assert!(close(width, 600.0));
}

#[test]
fn test_select_reaches_requested_window() {
    let mut controller = controller();
    let range = controller.select(35.0, 40.0);
    assert!(close(range.start(), 35.0));
    assert!(close(range.end(), 40.0));

    let range = controller.select(5.0, 12.0);
    assert!(close(range.start(), 5.0));
    assert!(close(range.end(), 12.0));
}

#[test]
fn test_select_clamps_to_constraints() {
    let mut controller = controller();
    let range = controller.select(2.0, 44.0);
    assert!(close(range.span(), 30.0));
    assert!(range.satisfies(controller.constraints()));

    let range = controller.select(10.0, 10.2);
    assert!(close(range.span(), 1.0));
    assert!(close(range.start(), 10.0));
}
