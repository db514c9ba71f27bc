//! Time-proportioning accuracy under irregular loop timing.

use proptest::prelude::*;
use rims_io::TimeProportioning;

const WINDOW: u64 = 5_000;

/// Integrate on-time the way the relay sees it: the output holds its level
/// until the next loop iteration.
fn on_time(duty: f64, steps: &[u64], windows: u64) -> (u64, u64) {
    let mut tp = TimeProportioning::new(WINDOW, 0).unwrap();
    tp.set_duty(duty);
    let end = windows * WINDOW;
    let mut now = 0;
    let mut on = 0;
    let mut i = 0;
    while now < end {
        let step = steps[i % steps.len()].min(end - now);
        if tp.refresh(now) {
            on += step;
        }
        assert_eq!(tp.window_start_ms() % WINDOW, 0, "window start drifted");
        now += step;
        i += 1;
    }
    (on, end)
}

#[test]
fn half_duty_one_ms_ticks() {
    let (on, total) = on_time(2_500.0, &[1], 10);
    assert_eq!(total, 50_000);
    let fraction = on as f64 / total as f64;
    assert!((fraction - 0.5).abs() <= 1.0 / WINDOW as f64);
}

#[test]
fn jittery_loop_keeps_fraction() {
    // 7, 13 and 29 ms steps never line up with the window edges.
    let (on, total) = on_time(1_250.0, &[7, 13, 29, 13], 20);
    let fraction = on as f64 / total as f64;
    assert!((fraction - 0.25).abs() < 0.01, "fraction {fraction}");
}

proptest! {
    #[test]
    fn fraction_matches_duty(
        duty in 0_u64..=WINDOW,
        steps in prop::collection::vec(1_u64..=25, 1..16),
    ) {
        let windows = 12;
        let (on, total) = on_time(duty as f64, &steps, windows);
        let expected = duty * windows;
        let max_step = *steps.iter().max().unwrap();
        // At most one loop step of error at each on/off edge per window.
        let slack = 2 * max_step * windows;
        prop_assert!(on.abs_diff(expected) <= slack, "on {} expected {} of {}", on, expected, total);
        if duty == 0 {
            prop_assert_eq!(on, 0);
        }
        if duty == WINDOW {
            prop_assert_eq!(on, total);
        }
    }
}
