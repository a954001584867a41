//! State-machine tests for the runner, driven entirely by collaborator
//! mocks: no file I/O, no child processes.

use std::path::PathBuf;

use sora_sync::config::RunnerConfig;
use sora_sync::contract::{
    CleanReport, MockCleaner, MockSyncer, MockUploader, SyncReport, UploadOutcome,
};
use sora_sync::pipeline::{run_pipeline, PipelineError};

fn test_config() -> RunnerConfig {
    RunnerConfig::resolve(None, None, None, Some("/videos/source"), None, None)
}

#[tokio::test]
async fn sync_failure_aborts_before_upload_and_cleanup() {
    let mut syncer = MockSyncer::new();
    syncer
        .expect_sync()
        .times(1)
        .returning(|_| Err("disk full".into()));

    let mut uploader = MockUploader::new();
    uploader.expect_upload().times(0);
    let mut cleaner = MockCleaner::new();
    cleaner.expect_clean().times(0);

    let result = run_pipeline(&test_config(), &syncer, &uploader, &cleaner).await;
    assert!(matches!(result, Err(PipelineError::Sync(_))));
}

#[tokio::test]
async fn upload_success_triggers_cleanup_exactly_once() {
    // Scenario A: three files synced, uploaded and cleaned.
    let mut syncer = MockSyncer::new();
    syncer.expect_sync().times(1).returning(|_| {
        Ok(SyncReport {
            synced_count: Some(3),
        })
    });

    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .times(1)
        .returning(|_, _| Ok(UploadOutcome::Uploaded));

    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_clean()
        .times(1)
        .returning(|_| Ok(CleanReport { removed_files: 3 }));

    let report = run_pipeline(&test_config(), &syncer, &uploader, &cleaner)
        .await
        .expect("pipeline should reach DONE");
    assert_eq!(report.sync.synced_count, Some(3));
    assert_eq!(report.upload, UploadOutcome::Uploaded);
    assert_eq!(report.cleanup.removed_files, 3);
}

#[tokio::test]
async fn nothing_to_upload_still_cleans_and_succeeds() {
    // Scenario B: the sentinel outcome is success-adjacent, not an error.
    let mut syncer = MockSyncer::new();
    syncer.expect_sync().times(1).returning(|_| {
        Ok(SyncReport {
            synced_count: Some(0),
        })
    });

    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .times(1)
        .returning(|_, _| Ok(UploadOutcome::NothingToUpload));

    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_clean()
        .times(1)
        .returning(|_| Ok(CleanReport::default()));

    let report = run_pipeline(&test_config(), &syncer, &uploader, &cleaner)
        .await
        .expect("quota/no-op path is overall success");
    assert_eq!(report.upload, UploadOutcome::NothingToUpload);
}

#[tokio::test]
async fn upload_generic_failure_skips_cleanup() {
    // Scenario C: a mid-upload network error must leave the record and
    // synced files alone so the next run can retry without re-syncing.
    let mut syncer = MockSyncer::new();
    syncer.expect_sync().times(1).returning(|_| {
        Ok(SyncReport {
            synced_count: Some(2),
        })
    });

    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .times(1)
        .returning(|_, _| Err("network error".into()));

    let mut cleaner = MockCleaner::new();
    cleaner.expect_clean().times(0);

    let result = run_pipeline(&test_config(), &syncer, &uploader, &cleaner).await;
    assert!(matches!(result, Err(PipelineError::Upload(_))));
}

#[tokio::test]
async fn cleanup_failure_fails_the_pipeline() {
    let mut syncer = MockSyncer::new();
    syncer
        .expect_sync()
        .times(1)
        .returning(|_| Ok(SyncReport::default()));

    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .times(1)
        .returning(|_, _| Ok(UploadOutcome::Uploaded));

    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_clean()
        .times(1)
        .returning(|_| Err("permission denied".into()));

    let result = run_pipeline(&test_config(), &syncer, &uploader, &cleaner).await;
    assert!(matches!(result, Err(PipelineError::Cleanup(_))));
}

#[tokio::test]
async fn upload_and_cleanup_receive_the_fixed_record_path_and_quota() {
    let config = test_config();
    let expected_record = PathBuf::from("videos/.sync_last.json");

    let mut syncer = MockSyncer::new();
    syncer
        .expect_sync()
        .times(1)
        .returning(|_| Ok(SyncReport::default()));

    let record_for_upload = expected_record.clone();
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload()
        .times(1)
        .withf(move |record, daily_times| record == record_for_upload && daily_times == "15")
        .returning(|_, _| Ok(UploadOutcome::Uploaded));

    let record_for_clean = expected_record.clone();
    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_clean()
        .times(1)
        .withf(move |record| record == record_for_clean)
        .returning(|_| Ok(CleanReport::default()));

    run_pipeline(&config, &syncer, &uploader, &cleaner)
        .await
        .expect("pipeline should reach DONE");
}
