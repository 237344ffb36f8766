//! Lifecycle scenarios exercised against real child processes
//!
//! These tests spawn actual children (`sleep`, `true`, `false`, `sh`) and
//! drive them through the supervisor's registration, teardown, and restart
//! paths with deliberately short timeouts.

use super::*;
use schema::Config;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn short_timeouts() -> Timeouts {
    Timeouts {
        post_script: 1,
        service_shutdown: 1,
        global_shutdown: 3,
        dependency_wait: 10,
    }
}

fn spec(name: &str, command: &str, args: &[&str]) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        command: command.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        log_file: None,
        pre_script: None,
        pos_script: None,
        user: None,
        depends_on: vec![],
        wait_after: None,
        enabled: true,
        required: false,
    }
}

fn supervisor_with(services: Vec<ServiceSpec>) -> Supervisor {
    Supervisor::new(Config {
        services,
        timeouts: short_timeouts(),
    })
}

async fn wait_for_running(sup: &Supervisor, name: &str) -> ServiceInfo {
    for _ in 0..100 {
        if let Some(info) = sup
            .list_services()
            .into_iter()
            .find(|i| i.name == name && i.state == ServiceState::Running)
        {
            return info;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("service '{}' never reached RUNNING", name);
}

#[tokio::test]
async fn long_running_service_registers_with_pid() {
    let sup = supervisor_with(vec![]);
    let runner = {
        let sup = sup.clone();
        tokio::spawn(async move { runner::run_service(sup, spec("sleeper", "sleep", &["30"])).await })
    };

    let info = wait_for_running(&sup, "sleeper").await;
    assert!(info.pid > 0);
    assert_eq!(sup.alive_count(), 1);

    sup.trigger_shutdown();
    let result = timeout(Duration::from_secs(5), runner)
        .await
        .expect("runner should finish within the grace budget")
        .expect("runner task should not panic");
    assert!(result.is_ok());
    assert!(sup.list_services().is_empty());
    assert_eq!(sup.alive_count(), 0);
}

#[tokio::test]
async fn zero_exit_is_classified_as_stopped_not_failed() {
    let sup = supervisor_with(vec![]);
    let result = runner::run_service(sup.clone(), spec("oneshot", "true", &[])).await;
    assert!(result.is_ok());
    assert!(sup.list_services().is_empty());
    assert_eq!(sup.alive_count(), 0);
}

#[tokio::test]
async fn nonzero_exit_is_reported_as_an_error() {
    let sup = supervisor_with(vec![]);
    let result = runner::run_service(sup.clone(), spec("failing", "false", &[])).await;
    match result {
        Err(CoreError::Service(msg)) => assert!(msg.contains("failing")),
        other => panic!("expected a service error, got {:?}", other.map(|_| ())),
    }
    assert!(sup.list_services().is_empty());
}

#[tokio::test]
async fn spawn_failure_of_required_service_triggers_global_shutdown() {
    let mut vital = spec("vital", "/nonexistent-roost-test-binary", &[]);
    vital.required = true;
    let sup = supervisor_with(vec![vital.clone()]);

    sup.start_service(vital).await;
    assert!(sup.is_shutting_down());
}

#[tokio::test]
async fn spawn_failure_of_optional_service_does_not_escalate() {
    let optional = spec("optional", "/nonexistent-roost-test-binary", &[]);
    let sup = supervisor_with(vec![optional.clone()]);

    sup.start_service(optional).await;
    assert!(!sup.is_shutting_down());
}

#[tokio::test]
async fn short_lived_predecessor_still_unblocks_its_dependent() {
    let first = spec("first", "true", &[]);
    let mut second = spec("second", "true", &[]);
    second.depends_on = vec!["first".to_string()];
    let sup = supervisor_with(vec![first.clone(), second.clone()]);

    let dependent = {
        let sup = sup.clone();
        tokio::spawn(async move { sup.start_service(second).await })
    };
    sleep(Duration::from_millis(200)).await;
    assert!(
        !sup.has_started("second"),
        "dependent must not launch before its predecessor"
    );

    // The predecessor runs to completion almost instantly; its marker
    // outlives the process and still gates the dependent open.
    sup.start_service(first).await;
    assert!(sup.has_started("first"));

    timeout(Duration::from_secs(10), dependent)
        .await
        .expect("dependent should start once the marker is set")
        .expect("starter task should not panic");
    assert!(sup.has_started("second"));
}

#[tokio::test]
async fn restart_produces_a_new_instance_with_a_new_pid() {
    let sup = supervisor_with(vec![]);
    let _runner = {
        let sup = sup.clone();
        tokio::spawn(async move { runner::run_service(sup, spec("svc", "sleep", &["30"])).await })
    };

    let old = wait_for_running(&sup, "svc").await;

    let message = sup
        .restart_service("svc")
        .await
        .expect("restart should initiate");
    assert!(message.contains("svc"));

    let mut new_pid = 0;
    for _ in 0..100 {
        if let Some(info) = sup
            .list_services()
            .into_iter()
            .find(|i| i.name == "svc" && i.state == ServiceState::Running && i.pid != old.pid)
        {
            new_pid = info.pid;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(new_pid > 0, "replacement instance never reached RUNNING");
    assert_ne!(new_pid, old.pid);

    sup.trigger_shutdown();
    sup.drain_shutdown().await;
    assert!(sup.list_services().is_empty());
}

#[tokio::test]
async fn restart_of_unknown_service_is_rejected() {
    let sup = supervisor_with(vec![]);
    match sup.restart_service("ghost").await {
        Err(CoreError::ServiceNotFound(name)) => assert_eq!(name, "ghost"),
        other => panic!("expected not-found, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn sigterm_ignoring_child_is_killed_within_the_grace_budget() {
    let sup = supervisor_with(vec![]);
    let runner = {
        let sup = sup.clone();
        tokio::spawn(async move {
            runner::run_service(sup, spec("stubborn", "sh", &["-c", "trap '' TERM; sleep 30"]))
                .await
        })
    };

    wait_for_running(&sup, "stubborn").await;
    let begun = std::time::Instant::now();
    sup.trigger_shutdown();

    timeout(Duration::from_secs(5), runner)
        .await
        .expect("SIGKILL fallback should reap the child")
        .expect("runner task should not panic");
    // service_shutdown is 1s here; allow scheduling slack on top.
    assert!(begun.elapsed() < Duration::from_secs(4));
    assert!(sup.list_services().is_empty());
}

#[tokio::test]
async fn disabled_services_are_skipped_by_run() {
    let mut disabled = spec("off", "sleep", &["30"]);
    disabled.enabled = false;
    let sup = supervisor_with(vec![disabled]);

    let run = {
        let sup = sup.clone();
        tokio::spawn(async move { sup.run().await })
    };
    sleep(Duration::from_millis(300)).await;
    assert!(sup.list_services().is_empty());
    assert!(!sup.has_started("off"));

    sup.trigger_shutdown();
    timeout(Duration::from_secs(5), run)
        .await
        .expect("run should return after shutdown")
        .expect("run task should not panic")
        .expect("run should succeed");
}

#[tokio::test]
async fn listing_twice_is_stable_apart_from_uptime() {
    let sup = supervisor_with(vec![]);
    let _runner = {
        let sup = sup.clone();
        tokio::spawn(async move { runner::run_service(sup, spec("svc", "sleep", &["30"])).await })
    };
    wait_for_running(&sup, "svc").await;

    let first = sup.list_services();
    let second = sup.list_services();
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].name, second[0].name);
    assert_eq!(first[0].state, second[0].state);
    assert_eq!(first[0].pid, second[0].pid);

    sup.trigger_shutdown();
    sup.drain_shutdown().await;
}
