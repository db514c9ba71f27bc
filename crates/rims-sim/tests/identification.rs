use rims_regulator::{IdentSchedule, IdentState, IdentStep, RegulatorConfig};
use rims_sim::{PlantParams, Scenario, SimEventKind, run_identification};

#[test]
fn default_schedule_runs_to_completion() {
    let report =
        run_identification(RegulatorConfig::default(), &Scenario::default(), None).unwrap();

    assert!(report.finished);
    assert_eq!(report.final_state, IdentState::Finished);
    assert!(report.alarm_sounded);
    assert!(report.acknowledged);
    assert_eq!(report.ui.ident_screens, 1);
    assert_eq!(report.ui.duty_percent, Some(0));

    // 50 % for ten minutes plus 100 % for ten minutes.
    assert!(
        (report.heater_on_s - 900.0).abs() < 15.0,
        "heater on {} s",
        report.heater_on_s
    );
    assert!((1_790..=1_801).contains(&report.records.len()));

    // Twenty litres of water gain about 21 K, then cool slowly.
    let params = PlantParams::default();
    let peak = report.max_temperature_c - params.initial_c;
    assert!(peak > 18.0 && peak < 22.0, "rise {peak}");
    assert!(report.final_temperature_c < report.max_temperature_c);
}

#[test]
fn response_trace_follows_steps() {
    let report =
        run_identification(RegulatorConfig::default(), &Scenario::default(), None).unwrap();
    let duty_at = |t: f64| {
        report
            .records
            .iter()
            .find(|r| r.elapsed_s >= t)
            .map(|r| r.duty)
            .unwrap()
    };
    assert_eq!(duty_at(10.0), 2_500);
    assert_eq!(duty_at(700.0), 5_000);
    assert_eq!(duty_at(1_300.0), 0);

    let pv_at = |t: f64| {
        report
            .records
            .iter()
            .find(|r| r.elapsed_s >= t)
            .map(|r| r.process_value)
            .unwrap()
    };
    assert!(pv_at(600.0) > pv_at(10.0));
    assert!(pv_at(1_200.0) > pv_at(600.0));
    assert!(pv_at(1_790.0) < pv_at(1_200.0));
}

#[test]
fn pump_stop_zeroes_duty() {
    let mut config = RegulatorConfig::default();
    config.ident = IdentSchedule {
        steps: vec![IdentStep {
            at_s: 0,
            duty_percent: 100,
        }],
        duration_s: 120,
    };
    let scenario = Scenario::default()
        .with_event(30.0, SimEventKind::PumpStop)
        .with_event(90.0, SimEventKind::PumpStart);
    let report = run_identification(config, &scenario, None).unwrap();

    assert!(report.finished);
    let stopped: Vec<_> = report
        .records
        .iter()
        .filter(|r| (40.0..85.0).contains(&r.elapsed_s))
        .collect();
    assert!(!stopped.is_empty());
    assert!(stopped.iter().all(|r| r.duty == 0 && r.flow_lpm == 0.0));
    assert!(report.heater_on_s < 90.0);
}

#[test]
fn short_max_time_is_rejected() {
    let scenario = Scenario {
        max_s: 600,
        ..Scenario::default()
    };
    assert!(run_identification(RegulatorConfig::default(), &scenario, None).is_err());
}
