// Publish decision tests: trigger conditions, boundaries, rates and state updates

mod common;

use common::{policy, sample};
use energy_monitor::sampler::{DeltaReference, PreviousState, Trigger, TriggerPolicy};

#[test]
fn test_identical_samples_do_not_trigger() {
    let base = sample(10.0, 5_000, 7_000, 1000.0);
    let mut state = PreviousState::baseline(&base);
    assert!(state.tick(&sample(10.0, 5_000, 7_000, 1005.0), &policy()).is_none());
    assert!(state.tick(&sample(10.0, 5_000, 7_000, 1010.0), &policy()).is_none());
}

#[test]
fn test_cpu_diff_equal_to_threshold_does_not_trigger() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(15.0, 0, 0, 1005.0), &policy());
    assert_eq!(eval.cpu_diff, 5.0);
    assert_eq!(eval.trigger, None);
}

#[test]
fn test_cpu_diff_just_above_threshold_triggers() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(15.01, 0, 0, 1005.0), &policy());
    assert_eq!(eval.trigger, Some(Trigger::CpuChange));
}

#[test]
fn test_cpu_drop_counts_as_change() {
    let state = PreviousState::baseline(&sample(40.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(30.0, 0, 0, 1005.0), &policy());
    assert_eq!(eval.cpu_diff, 10.0);
    assert_eq!(eval.trigger, Some(Trigger::CpuChange));
}

#[test]
fn test_interval_equal_to_max_triggers() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(10.0, 0, 0, 1060.0), &policy());
    assert_eq!(eval.interval, 60.0);
    assert_eq!(eval.trigger, Some(Trigger::MaxInterval));
}

#[test]
fn test_interval_just_below_max_does_not_trigger() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(10.0, 0, 0, 1059.99), &policy());
    assert_eq!(eval.trigger, None);
}

#[test]
fn test_net_threshold_is_strict_for_both_directions() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let p = policy();

    let at = state.evaluate(&sample(10.0, 102_400, 102_400, 1005.0), &p);
    assert_eq!(at.trigger, None);

    let recv = state.evaluate(&sample(10.0, 102_401, 0, 1005.0), &p);
    assert_eq!(recv.trigger, Some(Trigger::RecvChange));

    let sent = state.evaluate(&sample(10.0, 0, 102_401, 1005.0), &p);
    assert_eq!(sent.trigger, Some(Trigger::SentChange));
}

#[test]
fn test_first_matching_trigger_is_reported() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(50.0, 1 << 30, 1 << 30, 1100.0), &policy());
    assert_eq!(eval.trigger, Some(Trigger::MaxInterval));

    let eval = state.evaluate(&sample(50.0, 1 << 30, 1 << 30, 1005.0), &policy());
    assert_eq!(eval.trigger, Some(Trigger::CpuChange));
}

#[test]
fn test_rate_is_diff_over_interval_in_kib() {
    let state = PreviousState::baseline(&sample(10.0, 1_000, 2_000, 1000.0));
    let eval = state.evaluate(&sample(10.0, 301_000, 2_500, 1007.0), &policy());
    assert_eq!(eval.recv_diff, 300_000);
    assert_eq!(eval.sent_diff, 500);
    assert_eq!(eval.recv_rate, 300_000.0 / 7.0 / 1024.0);
    assert_eq!(eval.sent_rate, 500.0 / 7.0 / 1024.0);

    let decision = state.decide(&sample(10.0, 301_000, 2_500, 1007.0), &policy()).unwrap();
    assert_eq!(decision.trigger, Trigger::RecvChange);
    assert_eq!(decision.snapshot.net.recv, 41.9);
    assert_eq!(decision.snapshot.net.sent, 0.1);
}

#[test]
fn test_quiet_host_publishes_once_at_max_interval_with_zero_rates() {
    let mut state = PreviousState::baseline(&sample(10.0, 8_000, 9_000, 1000.0));
    let p = policy();
    let mut published = Vec::new();
    for step in 1..=12 {
        let ts = 1000.0 + 5.0 * step as f64;
        if let Some(decision) = state.tick(&sample(10.0, 8_000, 9_000, ts), &p) {
            published.push((ts, decision));
        }
    }
    assert_eq!(published.len(), 1);
    let (ts, decision) = &published[0];
    assert_eq!(*ts, 1060.0);
    assert_eq!(decision.trigger, Trigger::MaxInterval);
    assert_eq!(decision.snapshot.net.recv, 0.0);
    assert_eq!(decision.snapshot.net.sent, 0.0);
    assert_eq!(decision.snapshot.net.total.recv, 8_000);
    assert_eq!(decision.snapshot.timestamp, 1060);
    assert_eq!(state.last_publish_time, 1060.0);
}

#[test]
fn test_cpu_jump_publishes_immediately_with_rates_over_the_window() {
    let mut state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let decision = state
        .tick(&sample(16.0, 5 * 1024, 10 * 1024, 1005.0), &policy())
        .expect("cpu jump should trigger");
    assert_eq!(decision.trigger, Trigger::CpuChange);
    assert_eq!(decision.snapshot.cpu, 16.0);
    assert_eq!(decision.snapshot.net.recv, 1.0);
    assert_eq!(decision.snapshot.net.sent, 2.0);
    assert_eq!(state.cpu_percent, 16.0);
    assert_eq!(state.last_publish_time, 1005.0);
}

#[test]
fn test_last_publish_reference_accumulates_small_changes() {
    let mut state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let p = policy();
    assert!(state.tick(&sample(12.0, 0, 0, 1005.0), &p).is_none());
    assert!(state.tick(&sample(14.0, 0, 0, 1010.0), &p).is_none());
    assert_eq!(state.cpu_percent, 10.0);
    assert_eq!(state.sample_timestamp, 1000.0);

    let decision = state.tick(&sample(16.0, 0, 0, 1015.0), &p).unwrap();
    assert_eq!(decision.trigger, Trigger::CpuChange);
}

#[test]
fn test_last_sample_reference_moves_every_tick() {
    let mut state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let p = TriggerPolicy {
        delta_reference: DeltaReference::LastSample,
        ..policy()
    };
    assert!(state.tick(&sample(12.0, 60_000, 0, 1005.0), &p).is_none());
    assert!(state.tick(&sample(14.0, 120_000, 0, 1010.0), &p).is_none());
    assert!(state.tick(&sample(16.0, 180_000, 0, 1015.0), &p).is_none());
    assert_eq!(state.cpu_percent, 16.0);
    assert_eq!(state.bytes_received, 180_000);
    assert_eq!(state.last_publish_time, 1000.0);

    // Time trigger still counts from the last publish; rates use the last tick's window.
    let decision = state.tick(&sample(16.0, 190_240, 0, 1060.0), &p).unwrap();
    assert_eq!(decision.trigger, Trigger::MaxInterval);
    assert_eq!(decision.snapshot.net.recv, 0.2);
}

#[test]
fn test_counter_reset_yields_zero_diff() {
    let state = PreviousState::baseline(&sample(10.0, 900_000, 900_000, 1000.0));
    let eval = state.evaluate(&sample(10.0, 10, 20, 1005.0), &policy());
    assert_eq!(eval.recv_diff, 0);
    assert_eq!(eval.sent_diff, 0);
    assert_eq!(eval.recv_rate, 0.0);
    assert_eq!(eval.trigger, None);
}

#[test]
fn test_non_positive_window_yields_zero_rates() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let eval = state.evaluate(&sample(30.0, 500_000, 0, 1000.0), &policy());
    assert_eq!(eval.recv_rate, 0.0);
    assert_eq!(eval.trigger, Some(Trigger::CpuChange));
}

#[test]
fn test_decide_leaves_state_untouched() {
    let state = PreviousState::baseline(&sample(10.0, 0, 0, 1000.0));
    let before = state;
    assert!(state.decide(&sample(90.0, 0, 0, 1005.0), &policy()).is_some());
    assert_eq!(state, before);
}

#[test]
fn test_trigger_names() {
    assert_eq!(Trigger::MaxInterval.to_string(), "max_interval");
    assert_eq!(Trigger::CpuChange.as_str(), "cpu_change");
    assert_eq!(Trigger::RecvChange.as_str(), "recv_change");
    assert_eq!(Trigger::SentChange.as_str(), "sent_change");
}
