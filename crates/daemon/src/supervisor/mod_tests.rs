// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{fast_config, record_statuses, settle, wait_for, Harness, MANAGER_PID};
use ax_adapters::GitCall;
use ax_core::ServiceStatus;

fn start(h: &Harness, name: &str) -> SupervisorHandle {
    start_with(h, name, fast_config())
}

fn start_with(h: &Harness, name: &str, config: SupervisorConfig) -> SupervisorHandle {
    spawn(h.descriptor(name), h.path(name), Arc::new(config), h.deps()).unwrap()
}

fn has_log(record: &StatusRecord, needle: &str) -> bool {
    record.logs.iter().any(|e| e.message.contains(needle))
}

#[tokio::test]
async fn fresh_service_clones_then_runs() {
    let h = Harness::new();
    h.git.set_latency(Duration::from_millis(100));
    let path = h.path("a");

    let handle = start(&h, "a");
    let initial = h.record(&path).unwrap();
    assert_eq!(initial.status, ServiceStatus::Initializing);
    assert_eq!(initial.service_manager_pid, MANAGER_PID);
    assert_eq!(initial.script_pid, None);

    let seen = record_statuses(&h.store, &path, ServiceStatus::Running).await;
    assert_eq!(
        seen,
        vec![ServiceStatus::Initializing, ServiceStatus::Cloning, ServiceStatus::Running]
    );

    let record = h.wait_running(&path).await;
    assert!(record.repo_path.ends_with("a"));
    assert_eq!(record.url, "https://x/a.git");
    assert_eq!(record.branch, "main");
    assert_eq!(record.script_to_run.as_deref(), Some("main.py"));

    let spawned = h.launcher.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(record.script_pid, Some(spawned[0].pid));
    assert_eq!(spawned[0].spec.program, "python3");
    assert_eq!(spawned[0].spec.args, vec!["main.py".to_string()]);
    assert_eq!(spawned[0].spec.cwd, path);
    assert!(path.join("main.py").is_file());

    handle.stop().await;
}

#[tokio::test]
async fn existing_checkout_is_not_cloned() {
    let h = Harness::new();
    let path = h.path("a");
    std::fs::create_dir_all(path.join(".git")).unwrap();
    std::fs::write(path.join("autoexec.txt"), "local.py\n").unwrap();
    std::fs::write(path.join("local.py"), "").unwrap();

    let handle = start(&h, "a");
    let seen = record_statuses(&h.store, &path, ServiceStatus::Running).await;

    assert!(!seen.contains(&ServiceStatus::Cloning));
    assert_eq!(h.git.clone_count(), 0);
    assert_eq!(h.record(&path).unwrap().script_to_run.as_deref(), Some("local.py"));
    handle.stop().await;
}

#[tokio::test]
async fn crashed_child_is_relaunched() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    let first = h.wait_running(&path).await.script_pid.unwrap();

    assert!(h.launcher.crash(first));
    let record = wait_for("relaunch", || {
        h.record(&path).filter(|r| r.script_pid.is_some_and(|pid| pid != first))
    })
    .await;

    assert_eq!(record.status, ServiceStatus::Running);
    assert!(has_log(&record, "terminated unexpectedly"));
    assert!(!h.launcher.get(first).unwrap().was_terminated());
    assert_eq!(h.launcher.alive().len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn remote_update_restarts_with_new_script() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    let first = h.wait_running(&path).await.script_pid.unwrap();

    h.git.push([("autoexec.txt", "next.py\n"), ("next.py", "print('v2')\n")]);
    let record = wait_for("update applied", || {
        h.record(&path).filter(|r| {
            r.status == ServiceStatus::Running && r.script_to_run.as_deref() == Some("next.py")
        })
    })
    .await;

    assert!(h.launcher.get(first).unwrap().was_terminated());
    assert_ne!(record.script_pid, Some(first));
    assert_eq!(h.git.pull_count(), 1);
    assert_eq!(h.git.checkout_rev(&path), Some(h.git.remote_rev()));
    assert_eq!(std::fs::read_to_string(path.join("next.py")).unwrap(), "print('v2')\n");
    assert!(has_log(&record, "New updates found"));

    let last = h.launcher.spawned().pop().unwrap();
    assert_eq!(last.spec.args, vec!["next.py".to_string()]);
    assert_eq!(h.launcher.alive().len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn update_passes_through_updating() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    h.wait_running(&path).await;

    h.git.set_latency(Duration::from_millis(100));
    h.git.push([("main.py", "print('v2')\n")]);
    let seen = wait_for("updating", || {
        h.status(&path).filter(|s| *s == ServiceStatus::Updating)
    })
    .await;
    assert_eq!(seen, ServiceStatus::Updating);
    // No child while the pull is in flight.
    wait_for("child cleared", || h.record(&path).filter(|r| r.script_pid.is_none())).await;
    h.wait_running(&path).await;
    handle.stop().await;
}

#[tokio::test]
async fn no_update_means_no_restart() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    h.wait_running(&path).await;

    // Several update checks elapse against an unchanged remote.
    settle(12).await;

    let checks = h.git.calls().iter().filter(|c| matches!(c, GitCall::IsAhead { .. })).count();
    assert!(checks >= 2, "only {checks} update checks");
    assert_eq!(h.git.pull_count(), 0);
    assert_eq!(h.launcher.spawned().len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn update_takes_precedence_over_crash() {
    let h = Harness::new();
    let path = h.path("a");
    let config = SupervisorConfig { git_check_interval: Duration::ZERO, ..fast_config() };
    let handle = start_with(&h, "a", config);
    let first = h.wait_running(&path).await.script_pid.unwrap();

    // Both land before the supervisor's next cycle.
    h.git.push([("main.py", "print('v2')\n")]);
    h.launcher.crash(first);

    wait_for("pulled", || (h.git.pull_count() == 1).then_some(())).await;
    let record = h.wait_running(&path).await;
    assert!(!has_log(&record, "terminated unexpectedly"));
    assert_eq!(h.launcher.spawned().len(), 2);
    handle.stop().await;
}

#[tokio::test]
async fn fetch_failure_keeps_service_running() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    let pid = h.wait_running(&path).await.script_pid;

    h.git.fail_next_fetches(3);
    wait_for("fetch warnings", || {
        h.record(&path).filter(|r| has_log(r, "Failed to check for updates"))
    })
    .await;
    let record = h.record(&path).unwrap();
    assert_eq!(record.status, ServiceStatus::Running);
    assert_eq!(record.script_pid, pid);
    handle.stop().await;
}

#[tokio::test]
async fn pull_failure_fails_then_retries() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    h.wait_running(&path).await;

    h.git.fail_next_pulls(1);
    h.git.push([("main.py", "print('v2')\n")]);

    wait_for("second pull", || (h.git.pull_count() == 2).then_some(())).await;
    let record = h.wait_running(&path).await;
    assert!(has_log(&record, "failed to pull updates"));
    assert_eq!(h.git.checkout_rev(&path), Some(h.git.remote_rev()));
    handle.stop().await;
}

#[tokio::test]
async fn persistent_pull_failure_keeps_old_checkout_running() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    let first = h.wait_running(&path).await.script_pid.unwrap();
    let old_rev = h.git.checkout_rev(&path);

    h.git.fail_next_pulls(10_000);
    h.git.push([("main.py", "print('v2')\n")]);
    let started = std::time::Instant::now();

    wait_for("third pull", || (h.git.pull_count() >= 3).then_some(())).await;
    // Retries follow the update check interval, not the failure backoff.
    assert!(started.elapsed() >= Duration::from_millis(100));

    let record = h.wait_running(&path).await;
    assert_ne!(record.script_pid, Some(first));
    assert!(has_log(&record, "failed to pull updates"));
    assert_eq!(h.git.checkout_rev(&path), old_rev);
    assert_eq!(h.launcher.alive().len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn clone_failure_is_retried() {
    let h = Harness::new();
    let path = h.path("a");
    h.git.fail_next_clones(2);

    let handle = start(&h, "a");
    let record = h.wait_running(&path).await;

    assert_eq!(h.git.clone_count(), 3);
    assert!(has_log(&record, "failed to clone repository"));
    handle.stop().await;
}

#[tokio::test]
async fn missing_script_file_fails_until_it_appears() {
    let h = Harness::with_files([("main.py", "")]);
    let path = h.path("a");
    let handle = start(&h, "a");

    let record = wait_for("failed", || {
        h.record(&path).filter(|r| r.status == ServiceStatus::Failed)
    })
    .await;
    assert_eq!(record.script_pid, None);
    assert!(has_log(&record, "'autoexec.txt' not found"));
    assert!(h.launcher.spawned().is_empty());

    std::fs::write(path.join("autoexec.txt"), "main.py\n").unwrap();
    h.wait_running(&path).await;
    handle.stop().await;
}

#[tokio::test]
async fn launch_failure_is_retried() {
    let h = Harness::new();
    let path = h.path("a");
    h.launcher.fail_next_spawns(1);

    let handle = start(&h, "a");
    let record = h.wait_running(&path).await;
    assert!(has_log(&record, "failed to start script"));
    assert_eq!(h.launcher.spawned().len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn stop_terminates_child() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    let pid = h.wait_running(&path).await.script_pid.unwrap();

    handle.stop().await;

    assert!(h.launcher.alive().is_empty());
    assert!(h.launcher.get(pid).unwrap().was_terminated());
}

#[tokio::test]
async fn dropped_handle_cancels_supervisor() {
    let h = Harness::new();
    let path = h.path("a");
    let handle = start(&h, "a");
    h.wait_running(&path).await;

    drop(handle);
    wait_for("child stopped", || h.launcher.alive().is_empty().then_some(())).await;
}

#[tokio::test]
async fn is_alive_tracks_task() {
    let h = Harness::new();
    let handle = start(&h, "a");
    assert!(handle.is_alive());
    assert_eq!(handle.path(), h.path("a"));

    handle.abort();
    wait_for("task finished", || (!handle.is_alive()).then_some(())).await;
}

#[tokio::test]
async fn reconfigure_switches_branch() {
    let h = Harness::new();
    let path = h.path("a");
    let mut handle = start(&h, "a");
    h.wait_running(&path).await;

    assert!(!handle.reconfigure(h.descriptor("a")));
    assert!(handle.reconfigure(h.descriptor("a").with_branch("dev")));
    assert_eq!(handle.descriptor().branch, "dev");

    wait_for("branch recorded", || h.record(&path).filter(|r| r.branch == "dev")).await;
    wait_for("dev checked", || {
        h.git
            .calls()
            .iter()
            .any(|c| matches!(c, GitCall::IsAhead { branch, .. } if branch == "dev"))
            .then_some(())
    })
    .await;
    // Same url: the remote is left alone.
    assert!(!h.git.calls().iter().any(|c| matches!(c, GitCall::SetRemoteUrl { .. })));
    handle.stop().await;
}

#[tokio::test]
async fn reconfigure_switches_url() {
    let h = Harness::new();
    let path = h.path("a");
    let mut handle = start(&h, "a");
    h.wait_running(&path).await;

    let moved = ServiceDescriptor::new("https://mirror/a.git");
    assert!(handle.reconfigure(moved));

    let call = wait_for("remote updated", || {
        h.git.calls().into_iter().find(|c| matches!(c, GitCall::SetRemoteUrl { .. }))
    })
    .await;
    assert_eq!(call, GitCall::SetRemoteUrl { path: path.clone(), url: "https://mirror/a.git".into() });
    wait_for("url recorded", || h.record(&path).filter(|r| r.url == "https://mirror/a.git")).await;
    handle.stop().await;
}

#[tokio::test]
async fn log_ring_is_bounded() {
    let h = Harness::new();
    let path = h.path("a");
    let config = SupervisorConfig { max_log_entries: 3, ..fast_config() };
    let handle = start_with(&h, "a", config);

    for _ in 0..4 {
        let pid = h.wait_running(&path).await.script_pid.unwrap();
        h.launcher.crash(pid);
        wait_for("relaunch", || {
            h.record(&path).filter(|r| r.script_pid.is_some_and(|p| p != pid))
        })
        .await;
    }

    let record = h.record(&path).unwrap();
    assert_eq!(record.logs.len(), 3);
    assert!(record.logs.lines().last().unwrap().contains("Script started"));
    handle.stop().await;
}

#[tokio::test]
async fn unwritable_repos_dir_fails_spawn() {
    let h = Harness::new();
    std::fs::write(&h.repos_dir, "not a directory").unwrap();

    let result = spawn(h.descriptor("a"), h.path("a"), Arc::new(fast_config()), h.deps());
    assert!(matches!(result, Err(SupervisorError::Prepare { .. })));
    assert!(h.store.is_empty());
}
