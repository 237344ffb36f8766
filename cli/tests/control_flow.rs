#![allow(unused_crate_dependencies)]
//! End-to-end control-channel flow against an in-process daemon
//!
//! Wires a real supervisor and control server on a tempdir socket, then
//! drives them through the control client the way the CLI subcommands do.

mod common;

use roost_core::Supervisor;
use schema::{Config, ServiceSpec, ServiceState, Timeouts};
use std::time::Duration;
use tokio::time::sleep;

fn sleeper_spec() -> ServiceSpec {
    ServiceSpec {
        name: "sleeper".to_string(),
        command: "sleep".to_string(),
        args: vec!["60".to_string()],
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

fn test_config() -> Config {
    Config {
        services: vec![sleeper_spec()],
        timeouts: Timeouts {
            post_script: 1,
            service_shutdown: 1,
            global_shutdown: 3,
            dependency_wait: 10,
        },
    }
}

#[tokio::test]
async fn list_status_and_restart_over_the_control_socket() {
    common::run_with_timeout(Duration::from_secs(60), async {
        let tmp = tempfile::tempdir().expect("tempdir");
        let socket = tmp.path().join("roost.sock");

        let supervisor = Supervisor::new(test_config());
        let server = ipc::ControlServer::new(
            &socket,
            cli::daemon::control_handler(supervisor.clone()),
            supervisor.cancellation(),
        );
        tokio::spawn(async move {
            let _ = server.serve().await;
        });

        let run = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.run().await })
        };

        let client = ipc::ControlClient::new(&socket);

        // The service should come up and be listed as RUNNING with a pid.
        let mut old_pid = 0;
        for _ in 0..100 {
            if let Ok(response) = client.list_services().await {
                if let Some(info) = response
                    .services
                    .iter()
                    .find(|s| s.name == "sleeper" && s.state == ServiceState::Running)
                {
                    old_pid = info.pid;
                    break;
                }
            }
            sleep(Duration::from_millis(100)).await;
        }
        assert!(old_pid > 0, "sleeper never reached RUNNING");

        // A second listing with no intervening event matches the first.
        let listing = client.list_services().await.expect("list should succeed");
        assert_eq!(listing.services.len(), 1);
        assert_eq!(listing.services[0].pid, old_pid);

        let status = client.get_status().await.expect("status should succeed");
        assert!(status.success);
        assert!(status.message.contains("Total: 1"));
        assert!(status.message.contains("Running: 1"));

        // Restarting replaces the instance: same name, new pid.
        let response = client
            .restart_service("sleeper")
            .await
            .expect("restart round trip");
        assert!(response.success, "restart failed: {}", response.message);

        let mut new_pid = 0;
        for _ in 0..100 {
            if let Ok(listing) = client.list_services().await {
                if let Some(info) = listing
                    .services
                    .iter()
                    .find(|s| s.state == ServiceState::Running && s.pid != old_pid)
                {
                    new_pid = info.pid;
                    break;
                }
            }
            sleep(Duration::from_millis(100)).await;
        }
        assert!(new_pid > 0, "replacement instance never appeared");
        assert_ne!(new_pid, old_pid);

        // Unknown services are refused.
        let response = client
            .restart_service("ghost")
            .await
            .expect("round trip should succeed");
        assert!(!response.success);
        assert!(response.message.contains("not found"));

        // Shutdown drains the registry and unlinks the socket.
        supervisor.trigger_shutdown();
        run.await
            .expect("run task should not panic")
            .expect("run should succeed");

        for _ in 0..50 {
            if !socket.exists() {
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
        assert!(!socket.exists(), "socket file should be removed on shutdown");
        assert!(supervisor.list_services().is_empty());
    })
    .await;
}

#[tokio::test]
async fn client_fails_cleanly_when_no_daemon_is_listening() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let socket = tmp.path().join("absent.sock");
    let client = ipc::ControlClient::new(&socket);
    match client.list_services().await {
        Err(ipc::IpcError::ConnectionFailed(_)) => {}
        other => panic!("expected connection failure, got {:?}", other.map(|_| ())),
    }
}
