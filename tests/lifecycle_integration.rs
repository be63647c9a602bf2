//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Lifecycle binding driven from channels and control threads
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anr_pulse::event_loop::EventLoop;
use anr_pulse::{
    BlockedThreadDetector, BlockedThreadEvent, DetectorBuilder, LifecycleBinding, LifecycleEvent,
    ThreadAccessor,
};
use crossbeam::channel;

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn detector_for(ui: &anr_pulse::event_loop::LoopHandle) -> Arc<BlockedThreadDetector> {
    Arc::new(
        DetectorBuilder::for_loop(ui)
            .listener(|_event: BlockedThreadEvent| {})
            .no_exemption()
            .threshold(Duration::from_millis(200))
            .inspection_interval(Duration::from_millis(40))
            .thread_name_prefix("lifecycle-test")
            .build()
            .unwrap(),
    )
}

#[test]
fn test_forwarded_events_pause_and_resume() {
    let (ui, ui_worker) = EventLoop::spawn("lifecycle-ui").unwrap();
    let binding = LifecycleBinding::new(detector_for(&ui));
    binding.start(Duration::ZERO).unwrap();

    let (events, rx) = channel::unbounded();
    let forwarder = binding.forward(rx).unwrap();
    assert_eq!(forwarder.thread().name(), Some("lifecycle-test-lifecycle"));

    events.send(LifecycleEvent::Background).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !binding.detector().is_running()));

    events.send(LifecycleEvent::Foreground).unwrap();
    assert!(wait_until(Duration::from_secs(2), || binding.detector().is_running()));

    drop(events);
    forwarder.join().unwrap();

    binding.stop();
    assert!(!binding.detector().is_running());
    ui.quit().unwrap();
    ui_worker.join().unwrap();
}

#[test]
fn test_events_posted_to_control_thread() {
    let (ui, ui_worker) = EventLoop::spawn("lifecycle-monitored").unwrap();
    let (control, control_worker) = EventLoop::spawn("lifecycle-control").unwrap();

    let binding = LifecycleBinding::with_control_thread(detector_for(&ui), control.clone());
    binding.start(Duration::ZERO).unwrap();

    // Raised off the control thread: applied asynchronously
    binding.on_event(LifecycleEvent::Background).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !binding.detector().is_running()));

    // Raised on the control thread: applied inline
    let (done_tx, done_rx) = channel::bounded(1);
    let inline = binding.clone();
    control
        .post(Box::new(move || {
            inline.on_event(LifecycleEvent::Foreground).unwrap();
            done_tx.send(inline.detector().is_running()).unwrap();
        }))
        .unwrap();
    assert!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap());

    binding.stop();
    control.quit().unwrap();
    control_worker.join().unwrap();
    ui.quit().unwrap();
    ui_worker.join().unwrap();
}

#[test]
fn test_post_failure_surfaces_as_error() {
    let (ui, ui_worker) = EventLoop::spawn("lifecycle-orphaned").unwrap();
    let (control, control_worker) = EventLoop::spawn("lifecycle-dead-control").unwrap();
    control.quit().unwrap();
    control_worker.join().unwrap();

    let binding = LifecycleBinding::with_control_thread(detector_for(&ui), control);
    binding.start(Duration::ZERO).unwrap();

    let err = binding.on_event(LifecycleEvent::Background).unwrap_err();
    assert!(matches!(err, anr_pulse::DetectorError::Post(_)));
    assert!(binding.detector().is_running());

    binding.stop();
    ui.quit().unwrap();
    ui_worker.join().unwrap();
}

#[test]
fn test_background_while_blocked_suppresses_report() {
    let (ui, ui_worker) = EventLoop::spawn("lifecycle-blocked").unwrap();
    let (tx, reports) = channel::unbounded();
    let detector = Arc::new(
        DetectorBuilder::for_loop(&ui)
            .listener(tx)
            .no_exemption()
            .threshold(Duration::from_millis(400))
            .inspection_interval(Duration::from_millis(50))
            .build()
            .unwrap(),
    );
    let binding = LifecycleBinding::new(detector);

    ui.post(Box::new(|| thread::sleep(Duration::from_millis(900))))
        .unwrap();
    binding.start(Duration::ZERO).unwrap();
    thread::sleep(Duration::from_millis(100));
    binding.on_event(LifecycleEvent::Background).unwrap();

    assert!(reports.recv_timeout(Duration::from_millis(1000)).is_err());

    binding.stop();
    ui.quit().unwrap();
    ui_worker.join().unwrap();
}
