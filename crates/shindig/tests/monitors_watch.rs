//! Monitor loops: settings compliance, bot permissions, and shadow
//! maintenance driving the warning manager.

mod fixtures;

use fixtures::{track, TestFixture};
use shindig::domain::{MemberStatus, PlaybackCompliance, TrackId};
use shindig::monitors;
use shindig::shadow::ShadowSource;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_settings_drift_warns_then_recovers() {
    let fixture = TestFixture::new();
    *fixture.streaming.compliance.lock().unwrap() = PlaybackCompliance {
        correct_shuffle: false,
        correct_repeat: true,
        issues: vec!["shuffle is on".to_string()],
    };
    fixture
        .streaming
        .fail_settings_fix
        .store(true, Ordering::SeqCst);

    let handle = tokio::spawn(monitors::settings_monitor(fixture.services.clone()));

    // The first check runs immediately.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let dms = fixture.chat.dms.lock().unwrap().clone();
    assert_eq!(dms.len(), 1);
    assert!(dms[0].2.contains("shuffle is on"));

    // Still broken on the next pass: no duplicate warning.
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(fixture.chat.dms.lock().unwrap().len(), 1);

    // Back to optimal: warning cleared, DM removed.
    *fixture.streaming.compliance.lock().unwrap() = PlaybackCompliance::optimal();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(fixture.chat.deleted.lock().unwrap().len(), 1);

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn test_settings_auto_correction_avoids_warning() {
    let fixture = TestFixture::new();
    *fixture.streaming.compliance.lock().unwrap() = PlaybackCompliance {
        correct_shuffle: false,
        correct_repeat: false,
        issues: vec!["shuffle".to_string(), "repeat".to_string()],
    };

    let handle = tokio::spawn(monitors::settings_monitor(fixture.services.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Correction succeeded, so nobody got bothered.
    assert!(fixture.chat.dms.lock().unwrap().is_empty());

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn test_lost_permissions_warn_and_recover() {
    let fixture = TestFixture::new();
    fixture.chat.set_bot_status(MemberStatus::Member);

    let handle = tokio::spawn(monitors::permissions_monitor(fixture.services.clone()));

    // The startup check runs before the first interval tick.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let dms = fixture.chat.dms.lock().unwrap().clone();
    assert_eq!(dms.len(), 1);
    assert!(dms[0].2.contains("admin rights"));

    fixture.chat.set_bot_status(MemberStatus::Administrator);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(fixture.chat.deleted.lock().unwrap().len(), 1);

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_advances_shadow_on_progression() {
    let fixture = TestFixture::new();
    fixture
        .services
        .shadow
        .append(TrackId::from("a"), ShadowSource::Playlist, Duration::from_secs(100));
    fixture
        .services
        .shadow
        .append(TrackId::from("b"), ShadowSource::Playlist, Duration::from_secs(100));

    // The backend has moved on to "a" and still queues "b".
    fixture.streaming.add_catalog_track(track("a", "A", "Band", 100));
    *fixture.streaming.current.lock().unwrap() = Some(TrackId::from("a"));
    fixture.streaming.queue.lock().unwrap().push(TrackId::from("b"));

    let handle = tokio::spawn(monitors::shadow_maintenance_monitor(fixture.services.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(fixture.services.shadow.len(), 1);
    assert_eq!(fixture.services.shadow.position(&TrackId::from("b")), Some(0));
    // All signals healthy: no warnings went out.
    assert!(fixture.chat.dms.lock().unwrap().is_empty());

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_shadow_raises_queue_sync_warning() {
    let fixture = fixtures::FixtureBuilder::new()
        .config(|config| config.tuning.shadow.sync_warning_timeout_mins = 0)
        .build();
    fixture
        .services
        .shadow
        .append(TrackId::from("a"), ShadowSource::Playlist, Duration::from_secs(100));
    // Keep the item present backend-side so reconciliation drops nothing.
    fixture.streaming.queue.lock().unwrap().push(TrackId::from("a"));

    let handle = tokio::spawn(monitors::shadow_maintenance_monitor(fixture.services.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let dms = fixture.chat.dms.lock().unwrap().clone();
    assert_eq!(dms.len(), 1);
    assert!(dms[0].2.contains("drifted apart"));

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_prunes_stale_priority_entries() {
    let fixture = TestFixture::new();
    // Neither playing nor shadowed: this entry should not survive.
    fixture
        .services
        .priority
        .insert(TrackId::from("old"), TrackId::from("resume"));

    let handle = tokio::spawn(monitors::shadow_maintenance_monitor(fixture.services.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(fixture.services.priority.is_empty());

    fixture.services.shutdown.cancel();
    let _ = handle.await;
}
