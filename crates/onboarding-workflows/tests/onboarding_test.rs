// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end onboarding tests over the 90-day timeline in virtual time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    Behaviour, Call, DAY, RecordingActivities, request, runtime_over, test_runtime,
};
use durable_runtime::{
    MemoryPersistence, Persistence, ProcessHandle, Runtime, RuntimeError, VirtualClock,
};
use onboarding_workflows::{
    OnboardingProcess, OnboardingStatus, OnboardingStatusResponse, QUERY_ONBOARDING_STATUS,
    ReminderType, SIGNAL_DOCUMENT_SUBMITTED, Timeline, VerificationResult, kyc_child_id,
    onboarding_instance_id,
};

const MERCHANT: &str = "MERCH-001";

fn instance_id() -> String {
    onboarding_instance_id(MERCHANT)
}

async fn start(runtime: &Runtime, activities: Arc<RecordingActivities>) -> ProcessHandle<String> {
    runtime
        .start(
            &instance_id(),
            Arc::new(OnboardingProcess::new(activities)),
            request(MERCHANT),
        )
        .await
        .unwrap()
}

async fn submit(runtime: &Runtime, document_id: &str) {
    runtime
        .signal(&instance_id(), SIGNAL_DOCUMENT_SUBMITTED, document_id)
        .await
        .unwrap();
}

fn status(runtime: &Runtime) -> OnboardingStatusResponse {
    runtime
        .query(&instance_id(), QUERY_ONBOARDING_STATUS)
        .unwrap()
}

fn assert_elapsed_between(clock: &VirtualClock, from: Duration, to: Duration) {
    let elapsed = clock.elapsed();
    assert!(
        elapsed >= from && elapsed < to,
        "elapsed {:?} not in {:?}..{:?}",
        elapsed,
        from,
        to
    );
}

// ============================================================================
// Outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_no_document_disables_payments_at_deadline() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();

    let handle = start(&runtime, activities.clone()).await;

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-PAYMENTS-DISABLED"
    );
    assert_eq!(
        activities.reminders(),
        vec![ReminderType::Day30, ReminderType::Day60]
    );
    assert_eq!(activities.count(&Call::DisablePayments), 1);
    assert!(activities.supplier_documents().is_empty());
    assert_elapsed_between(&clock, 90 * DAY, 90 * DAY + Duration::from_secs(1));

    let child = runtime
        .persistence()
        .get_instance(&kyc_child_id(MERCHANT))
        .await
        .unwrap();
    assert!(child.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_early_document_is_approved_without_reminders() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(10 * DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(activities.reminders(), vec![ReminderType::OnboardingApproved]);
    assert_eq!(activities.supplier_documents(), vec!["123456789"]);
    assert_eq!(activities.count(&Call::DisablePayments), 0);
    assert_elapsed_between(&clock, 10 * DAY, 11 * DAY);
}

#[tokio::test(start_paused = true)]
async fn test_document_between_reminders_stops_further_reminders() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(45 * DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(
        activities.reminders(),
        vec![ReminderType::Day30, ReminderType::OnboardingApproved]
    );
    assert_elapsed_between(&clock, 45 * DAY, 46 * DAY);
}

#[tokio::test(start_paused = true)]
async fn test_document_after_day_60_completes_without_waiting_for_deadline() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(75 * DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(
        activities.reminders(),
        vec![
            ReminderType::Day30,
            ReminderType::Day60,
            ReminderType::OnboardingApproved
        ]
    );
    assert_elapsed_between(&clock, 75 * DAY, 76 * DAY);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_document_is_rejected() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(DAY).await;
    submit(&runtime, "ABC123").await;

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-KYC-REJECTED"
    );
    assert_eq!(activities.reminders(), vec![ReminderType::KycRejection]);
    assert_eq!(activities.supplier_documents(), vec!["ABC123"]);
    assert_eq!(activities.count(&Call::Internal), 0);

    let child = runtime
        .persistence()
        .get_instance(&kyc_child_id(MERCHANT))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child.parent_id, Some(instance_id()));
    let result: VerificationResult =
        serde_json::from_slice(&child.output.unwrap()).unwrap();
    assert!(!result.passed);
    assert!(result.details.contains("Supplier validation failed"));
}

// ============================================================================
// Timer / signal races
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_document_at_reminder_instant_wins_over_reminder() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    // Exactly the day-30 checkpoint
    tokio::time::sleep(30 * DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(activities.reminders(), vec![ReminderType::OnboardingApproved]);
}

#[tokio::test(start_paused = true)]
async fn test_document_at_deadline_instant_is_accepted() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(90 * DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(activities.count(&Call::DisablePayments), 0);
    assert_eq!(
        activities.reminders(),
        vec![
            ReminderType::Day30,
            ReminderType::Day60,
            ReminderType::OnboardingApproved
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_submission_is_ignored() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(5 * DAY).await;
    submit(&runtime, "").await;
    tokio::time::sleep(3 * DAY).await;
    submit(&runtime, "12345").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(activities.supplier_documents(), vec!["12345"]);
    assert_elapsed_between(&clock, 8 * DAY, 9 * DAY);
}

#[tokio::test(start_paused = true)]
async fn test_first_document_wins() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(2 * DAY).await;
    submit(&runtime, "111").await;
    submit(&runtime, "222").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(activities.supplier_documents(), vec!["111"]);
}

// ============================================================================
// Status query
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_query_answers_right_after_start() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    let response = status(&runtime);
    assert!(matches!(
        response.status,
        OnboardingStatus::Pending | OnboardingStatus::AwaitingKycDocuments
    ));
    assert_eq!(response.days_remaining, 90);

    submit(&runtime, "123456789").await;
    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
}

#[tokio::test(start_paused = true)]
async fn test_status_query_tracks_progress() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let response = status(&runtime);
    assert_eq!(response.status, OnboardingStatus::AwaitingKycDocuments);
    assert_eq!(response.days_remaining, 89);

    tokio::time::sleep(31 * DAY - Duration::from_secs(1)).await;
    let response = status(&runtime);
    assert_eq!(response.status, OnboardingStatus::AwaitingKycDocuments);
    assert_eq!(response.days_remaining, 59);

    submit(&runtime, "123456789").await;
    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");

    let err = runtime
        .query::<OnboardingStatusResponse>(&instance_id(), QUERY_ONBOARDING_STATUS)
        .unwrap_err();
    assert!(matches!(err, RuntimeError::InstanceNotRunning { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_compressed_timeline() {
    let (runtime, clock) = test_runtime();
    let activities = RecordingActivities::new();
    let timeline = Timeline::with_day_length(Duration::from_secs(1)).unwrap();

    let handle = runtime
        .start(
            &instance_id(),
            Arc::new(OnboardingProcess::with_timeline(activities.clone(), timeline)),
            request(MERCHANT),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(status(&runtime).days_remaining, 80);

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-PAYMENTS-DISABLED"
    );
    assert_eq!(
        activities.reminders(),
        vec![ReminderType::Day30, ReminderType::Day60]
    );
    assert_elapsed_between(&clock, Duration::from_secs(90), Duration::from_secs(91));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_reminders_do_not_block_onboarding() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::with(Behaviour {
        reminders_fail: true,
        ..Behaviour::default()
    });

    let handle = start(&runtime, activities.clone()).await;

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-PAYMENTS-DISABLED"
    );
    // Three attempts per reminder
    assert_eq!(activities.count(&Call::Reminder(ReminderType::Day30)), 3);
    assert_eq!(activities.count(&Call::Reminder(ReminderType::Day60)), 3);
    assert_eq!(activities.count(&Call::DisablePayments), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_disable_keeps_outcome() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::with(Behaviour {
        disable_fails: true,
        ..Behaviour::default()
    });

    let handle = start(&runtime, activities.clone()).await;

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-PAYMENTS-DISABLED"
    );
    assert_eq!(activities.count(&Call::DisablePayments), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_approval_notice_keeps_approval() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::with(Behaviour {
        reminders_fail: true,
        ..Behaviour::default()
    });
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(
        activities.count(&Call::Reminder(ReminderType::OnboardingApproved)),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_internal_failure_rejects() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::with(Behaviour {
        internal_fails: true,
        ..Behaviour::default()
    });
    let handle = start(&runtime, activities.clone()).await;

    tokio::time::sleep(DAY).await;
    submit(&runtime, "123456789").await;

    assert_eq!(
        handle.result().await.unwrap(),
        "ONBOARD-MERCH-001-KYC-REJECTED"
    );
    assert_eq!(activities.count(&Call::Internal), 2);
}

// ============================================================================
// Idempotency and durability
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_second_start_for_same_merchant_is_rejected() {
    let (runtime, _clock) = test_runtime();
    let activities = RecordingActivities::new();
    let handle = start(&runtime, activities.clone()).await;

    let err = runtime
        .start(
            &instance_id(),
            Arc::new(OnboardingProcess::new(activities.clone())),
            request(MERCHANT),
        )
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RuntimeError::InstanceAlreadyRunning { .. }));

    submit(&runtime, "123456789").await;
    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
}

#[tokio::test(start_paused = true)]
async fn test_worker_restart_resumes_without_repeating_reminders() {
    let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
    let clock = Arc::new(VirtualClock::new(common::origin()));
    let activities = RecordingActivities::new();

    let first = runtime_over(persistence.clone(), clock.clone());
    start(&first, activities.clone()).await;
    tokio::time::sleep(45 * DAY).await;
    assert_eq!(activities.reminders(), vec![ReminderType::Day30]);
    first.shutdown();

    let second = runtime_over(persistence.clone(), clock.clone());
    let mut handles = second
        .resume_all(Arc::new(OnboardingProcess::new(activities.clone())))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    let handle = handles.remove(0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let response = status(&second);
    assert_eq!(response.status, OnboardingStatus::AwaitingKycDocuments);
    assert_eq!(response.days_remaining, 44);

    tokio::time::sleep(5 * DAY).await;
    submit(&second, "123456789").await;

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(
        activities.reminders(),
        vec![ReminderType::Day30, ReminderType::OnboardingApproved]
    );
    assert_elapsed_between(&clock, 50 * DAY, 51 * DAY);
}

#[tokio::test(start_paused = true)]
async fn test_document_sent_while_worker_is_down() {
    let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
    let clock = Arc::new(VirtualClock::new(common::origin()));
    let activities = RecordingActivities::new();

    let first = runtime_over(persistence.clone(), clock.clone());
    start(&first, activities.clone()).await;
    tokio::time::sleep(65 * DAY).await;
    first.shutdown();

    let second = runtime_over(persistence.clone(), clock.clone());
    submit(&second, "123456789").await;
    tokio::time::sleep(DAY).await;

    let mut handles = second
        .resume_all(Arc::new(OnboardingProcess::new(activities.clone())))
        .await
        .unwrap();
    let handle = handles.remove(0);

    assert_eq!(handle.result().await.unwrap(), "ONBOARD-MERCH-001-APPROVED");
    assert_eq!(
        activities.reminders(),
        vec![
            ReminderType::Day30,
            ReminderType::Day60,
            ReminderType::OnboardingApproved
        ]
    );
    assert_elapsed_between(&clock, 66 * DAY, 67 * DAY);
}
