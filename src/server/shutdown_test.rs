//! Tests for shutdown signalling between upgrade passes

use super::shutdown::*;
use std::time::Duration;

#[tokio::test]
async fn test_signal_starts_clear_and_is_shared_by_clones() {
    let (controller, signal) = shutdown_channel();
    let clone = signal.clone();

    assert!(!signal.is_shutdown());
    assert!(!clone.is_shutdown());

    controller.shutdown();

    assert!(signal.is_shutdown());
    assert!(clone.is_shutdown());
}

#[tokio::test]
async fn test_wait_returns_after_shutdown() {
    let (controller, mut signal) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.shutdown();
    });

    let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;

    assert!(result.is_ok(), "wait() should return once shutdown is sent");
    assert!(signal.is_shutdown());
}

/// Test: a dropped controller releases waiters instead of hanging them
#[tokio::test]
async fn test_wait_returns_when_controller_dropped() {
    let (controller, mut signal) = shutdown_channel();
    drop(controller);

    let result = tokio::time::timeout(Duration::from_secs(1), signal.wait()).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_sleep_or_shutdown_elapses_without_signal() {
    let (_controller, mut signal) = shutdown_channel();

    let interrupted = signal.sleep_or_shutdown(Duration::from_millis(20)).await;

    assert!(!interrupted);
}

/// Test: shutdown cuts the interval between passes short
#[tokio::test]
async fn test_sleep_or_shutdown_wakes_on_signal() {
    let (controller, mut signal) = shutdown_channel();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.shutdown();
    });

    let interrupted = tokio::time::timeout(
        Duration::from_secs(5),
        signal.sleep_or_shutdown(Duration::from_secs(3600)),
    )
    .await
    .expect("sleep should end on shutdown");

    assert!(interrupted);
}

#[tokio::test]
async fn test_sleep_or_shutdown_returns_at_once_when_already_signaled() {
    let (controller, mut signal) = shutdown_channel();
    controller.shutdown();

    let interrupted = tokio::time::timeout(
        Duration::from_millis(500),
        signal.sleep_or_shutdown(Duration::from_secs(3600)),
    )
    .await
    .expect("already signaled");

    assert!(interrupted);
}

/// Test: the signal listener's clone drives the same channel as `main`
#[tokio::test]
async fn test_cloned_controller_raises_shared_flag() {
    let (controller, signal) = shutdown_channel();
    let listener = controller.clone();

    listener.shutdown();
    controller.shutdown();

    assert!(signal.is_shutdown());
}

#[tokio::test]
async fn test_wait_stays_pending_while_a_clone_lives() {
    let (controller, mut signal) = shutdown_channel();
    let listener = controller.clone();
    drop(controller);

    let result = tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;

    assert!(result.is_err(), "a live clone keeps the channel open");
    drop(listener);
}
