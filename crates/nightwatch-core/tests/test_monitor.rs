#[allow(dead_code)]
mod common;

use std::fs;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use common::{full_sidecar, FakeClock, NightBuilder, RecordingRunner, NIGHT};
use nightwatch_core::clock::Clock;
use nightwatch_core::layout::tonight_link;
use nightwatch_core::monitor::{DispatchOutcome, Monitor, MonitorState};

// ---------------------------------------------------------------------------
// Single polls
// ---------------------------------------------------------------------------

#[test]
fn test_new_object_frame_dispatched_once() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        assert_eq!(monitor.tick().unwrap(), 0);

        night.add_frame(1, Some("OBJECT"));
        assert_eq!(monitor.tick().unwrap(), 1);
        assert_eq!(monitor.tick().unwrap(), 0);
        assert_eq!(monitor.summary().succeeded, 1);
        assert_eq!(monitor.state(), MonitorState::Idle);
    }
    assert_eq!(runner.names(), vec!["IMG0_0001"]);
    // Settle wait only, the sidecar was already there.
    assert_eq!(*clock.slept.borrow(), vec![Duration::from_secs(5)]);
}

#[test]
fn test_frames_present_at_start_are_not_dispatched() {
    let night = NightBuilder::new();
    night.add_frame(1, Some("OBJECT"));
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        assert_eq!(monitor.tick().unwrap(), 0);
    }
    assert!(runner.calls.is_empty());
}

#[test]
fn test_dark_frame_is_skipped() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        night.add_frame(1, Some("DARK"));
        assert_eq!(monitor.tick().unwrap(), 1);
        assert_eq!(monitor.summary().skipped, 1);
        assert_eq!(monitor.summary().dispatched(), 0);
    }
    assert!(runner.calls.is_empty());
}

#[test]
fn test_new_frames_dispatched_in_index_order() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        for i in [12, 3, 7] {
            night.add_frame(i, Some("OBJECT"));
        }
        fs::write(night.layout.raw_dir.join("notes.txt"), b"x").unwrap();
        assert_eq!(monitor.tick().unwrap(), 3);
    }
    assert_eq!(runner.names(), vec!["IMG0_0003", "IMG0_0007", "IMG0_0012"]);
}

#[test]
fn test_clobber_only_on_first_dispatch() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, true).unwrap();
        night.add_frame(1, Some("FLAT"));
        night.add_frame(2, Some("OBJECT"));
        monitor.tick().unwrap();
        night.add_frame(3, Some("OBJECT"));
        monitor.tick().unwrap();
    }
    assert_eq!(
        runner.calls,
        vec![("IMG0_0002".to_string(), true), ("IMG0_0003".to_string(), false)]
    );
}

#[test]
fn test_failed_dispatch_does_not_stop_polling() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    runner.outcome = DispatchOutcome::TimedOut;
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        night.add_frame(1, Some("OBJECT"));
        night.add_frame(2, Some("OBJECT"));
        assert_eq!(monitor.tick().unwrap(), 2);
        assert_eq!(monitor.summary().timed_out, 2);

        // Failed frames stay seen; the next poll does not retry them.
        night.add_frame(3, Some("OBJECT"));
        assert_eq!(monitor.tick().unwrap(), 1);
        assert_eq!(monitor.tick().unwrap(), 0);
        assert_eq!(monitor.summary().new_frames, 3);
    }
    assert_eq!(runner.names(), vec!["IMG0_0001", "IMG0_0002", "IMG0_0003"]);
}

#[cfg(unix)]
#[test]
fn test_tick_points_tonight_link_at_night_table() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
    let link = tonight_link(&night.config.layout, &night.config.telescope);

    // No rows yet, so nothing to point at.
    monitor.tick().unwrap();
    assert!(fs::symlink_metadata(&link).is_err());

    let html = night.aggregates().html;
    fs::create_dir_all(html.parent().unwrap()).unwrap();
    fs::write(&html, "<table>\n").unwrap();
    monitor.tick().unwrap();
    assert_eq!(fs::read_link(&link).unwrap(), html);
}

// ---------------------------------------------------------------------------
// Late sidecars
// ---------------------------------------------------------------------------

#[test]
fn test_sidecar_written_during_retry_wait_is_used() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let sidecar = night.layout.sidecar_for("IMG0_0001");
    clock.on_sleep(move |slept, _| {
        if slept == Duration::from_secs(10) {
            fs::write(&sidecar, full_sidecar("OBJECT")).unwrap();
        }
    });
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        night.add_frame(1, None);
        monitor.tick().unwrap();
    }
    assert_eq!(runner.names(), vec!["IMG0_0001"]);
    assert_eq!(
        *clock.slept.borrow(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[test]
fn test_sidecar_never_written_gives_up_after_schedule() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        night.add_frame(1, None);
        monitor.tick().unwrap();
        assert_eq!(monitor.summary().skipped, 1);
    }
    assert!(runner.calls.is_empty());
    // settle + 10 + 20
    assert_eq!(clock.total_slept(), Duration::from_secs(35));
}

#[test]
fn test_sidecar_without_image_type_is_retried_then_skipped() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let mut runner = RecordingRunner::new();
    {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false).unwrap();
        night.add_frame(1, None);
        night.write_sidecar(1, "TARGET: Field 3\n");
        monitor.tick().unwrap();
    }
    assert!(runner.calls.is_empty());
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

#[test]
fn test_run_stops_at_deadline() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let start = clock.now();
    let raw = night.layout.raw_dir.join("IMG0_0001.CR2");
    let sidecar = night.layout.sidecar_for("IMG0_0001");
    clock.on_sleep(move |_, now| {
        if now == start + ChronoDuration::seconds(3) {
            fs::write(&sidecar, full_sidecar("OBJECT")).unwrap();
            fs::write(&raw, b"raw").unwrap();
        }
    });
    let mut runner = RecordingRunner::new();
    let summary = {
        let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false)
            .unwrap()
            .with_deadline(start + ChronoDuration::seconds(10));
        let summary = monitor.run().unwrap();
        assert_eq!(monitor.state(), MonitorState::Finished);
        summary
    };
    assert_eq!(summary.new_frames, 1);
    assert_eq!(summary.succeeded, 1);
    assert!(clock.now() >= start + ChronoDuration::seconds(10));
    assert_eq!(runner.names(), vec!["IMG0_0001"]);
}

#[test]
fn test_run_past_deadline_does_nothing() {
    let night = NightBuilder::new();
    let clock = FakeClock::new();
    let start = clock.now();
    let mut runner = RecordingRunner::new();
    let mut monitor = Monitor::new(&night.config, NIGHT, &mut runner, &clock, false)
        .unwrap()
        .with_deadline(start);
    let summary = monitor.run().unwrap();
    assert_eq!(summary.ticks, 0);
    assert_eq!(monitor.state(), MonitorState::Finished);
}
