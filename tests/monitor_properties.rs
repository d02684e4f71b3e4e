// tests/monitor_properties.rs

mod common;

use proptest::prelude::*;

use pocket_cloud_server::engine::{MonitorEvent, ProcessNotification, ServiceMonitor};
use pocket_cloud_server::types::{ExitRecord, ServiceState};

use crate::common::ManualHandle;

#[derive(Debug, Clone)]
enum Op {
    Notify(ProcessNotification),
    Stop,
}

fn notification_strategy() -> impl Strategy<Value = ProcessNotification> {
    prop_oneof![
        Just(ProcessNotification::Started),
        Just(ProcessNotification::Restarted),
        Just(ProcessNotification::Stopped),
        (proptest::option::of(0..255i32), proptest::option::of(1..32i32)).prop_map(
            |(code, signal)| ProcessNotification::ExitCode(ExitRecord { code, signal })
        ),
        Just(ProcessNotification::Exit),
        "[a-z]{1,8}".prop_map(ProcessNotification::Error),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => notification_strategy().prop_map(Op::Notify),
        1 => Just(Op::Stop),
    ]
}

struct Trace {
    events: Vec<MonitorEvent>,
    stop_called: bool,
    error_notifications: usize,
    exit_notifications: usize,
}

fn run_ops(ops: &[Op]) -> (ServiceMonitor, ManualHandle, Trace) {
    let handle = ManualHandle::running();
    let mut m = ServiceMonitor::new("svc", handle.boxed());
    let mut trace = Trace {
        events: Vec::new(),
        stop_called: false,
        error_notifications: 0,
        exit_notifications: 0,
    };

    for op in ops {
        match op {
            Op::Stop => {
                trace.stop_called = true;
                m.stop();
            }
            Op::Notify(n) => {
                match n {
                    ProcessNotification::Error(_) => trace.error_notifications += 1,
                    ProcessNotification::Exit => trace.exit_notifications += 1,
                    _ => {}
                }
                trace.events.extend(m.handle(n.clone()));
            }
        }
    }

    (m, handle, trace)
}

fn states(events: &[MonitorEvent]) -> Vec<ServiceState> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::StateChanged(s) => Some(*s),
            _ => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn reported_states_never_repeat(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let (_, _, trace) = run_ops(&ops);
        let states = states(&trace.events);
        for pair in states.windows(2) {
            prop_assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn error_and_off_are_final(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let (_, _, trace) = run_ops(&ops);
        let states = states(&trace.events);
        if let Some(pos) = states
            .iter()
            .position(|s| matches!(s, ServiceState::Error | ServiceState::Off))
        {
            prop_assert_eq!(pos, states.len() - 1);
        }
    }

    #[test]
    fn stop_reaches_the_handle_at_most_once(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let (_, handle, _) = run_ops(&ops);
        prop_assert!(handle.stop_calls() <= 1);
    }

    #[test]
    fn terminal_exit_is_handled_once(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let (m, _, trace) = run_ops(&ops);

        let graceful = trace
            .events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Exit(_)))
            .count();
        let errors = trace
            .events
            .iter()
            .filter(|e| matches!(e, MonitorEvent::Error(_)))
            .count();

        prop_assert!(graceful <= 1);
        if graceful == 1 {
            prop_assert!(trace.stop_called);
        }
        // Every low-level error is reported, plus at most one synthesized
        // error for an unrequested terminal exit.
        prop_assert!(errors <= trace.error_notifications + 1);
        prop_assert!(
            !(graceful == 1 && errors > 0),
            "monitor reported both error ({}) and graceful exit ({})",
            errors,
            graceful
        );
        prop_assert_eq!(m.stopped(), trace.exit_notifications > 0);
    }
}
