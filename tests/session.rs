//! Session registry lifecycle under a paused clock.

mod helpers;

use std::{sync::Arc, time::Duration};

use helpers::{CHANNEL, GUILD, Harness, Recorder};
use legato::{
    common::types::{ChannelId, GuildId},
    configs::{PlayerConfig, SessionConfig},
    player::PlayerStatus,
    session::{CloseReason, Session, SessionLabels},
    voice::VoiceStatus,
};
use tokio_util::sync::CancellationToken;

fn session_config() -> SessionConfig {
    SessionConfig {
        ttl_secs: 60,
        alone_timeout_secs: 30,
        sweep_interval_secs: 10,
        voice_reconnect_window_ms: 5_000,
    }
}

fn harness() -> Harness {
    Harness::with_config(session_config(), PlayerConfig::default())
}

fn record(session: &Session) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());
    let observer = recorder.clone();
    session.attach_observer(move || observer);
    recorder
}

#[tokio::test(start_paused = true)]
async fn one_session_per_guild() {
    let h = harness();
    let labels = SessionLabels::default();

    let first = h
        .registry
        .create_session(GuildId::from(GUILD), ChannelId::from(CHANNEL), labels.clone())
        .await
        .unwrap();
    let again = h
        .registry
        .create_session(GuildId::from(GUILD), ChannelId::from("other"), labels.clone())
        .await
        .unwrap();
    assert!(first.is_new);
    assert!(!again.is_new);
    assert_eq!(first.session.id, again.session.id);
    assert_eq!(h.connector.voices.lock().len(), 1);

    let other = h
        .registry
        .create_session(GuildId::from("another-guild"), ChannelId::from(CHANNEL), labels)
        .await
        .unwrap();
    assert!(other.is_new);
    assert_ne!(other.session.id, first.session.id);
    assert_eq!(h.registry.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_voice_connect_creates_nothing() {
    let h = harness();
    h.connector.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    let result = h
        .registry
        .create_session(GuildId::from(GUILD), ChannelId::from(CHANNEL), SessionLabels::default())
        .await;
    assert!(result.is_err());
    assert!(h.registry.is_empty());
    assert!(h.registry.get_by_guild(&GuildId::from(GUILD)).is_none());
}

#[tokio::test(start_paused = true)]
async fn observer_is_attached_once() {
    let h = harness();
    let session = h.session(GUILD).await;

    let first = record(&session);
    let second = Arc::new(Recorder::default());
    let other = second.clone();
    session.attach_observer(move || other);

    session.player().set_volume(50.0);
    assert_eq!(first.events().len(), 1);
    assert!(second.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_absent_and_swept() {
    let h = harness();
    let session = h.session(GUILD).await;
    let rec = record(&session);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.expires_at - snapshot.created_at, 60_000);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(h.registry.get_by_id(&session.id).is_none());
    assert!(h.registry.get_by_guild(&session.guild_id).is_none());
    assert_eq!(h.registry.len(), 1);

    assert_eq!(h.registry.sweep_expired(), 1);
    assert!(h.registry.is_empty());
    assert_eq!(rec.closed_reason().as_deref(), Some("expired"));
    assert_eq!(session.player().status(), PlayerStatus::Destroyed);
    assert!(h.connector.last_voice().is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn expired_occupant_is_replaced_on_create() {
    let h = harness();
    let old = h.session(GUILD).await;
    let rec = record(&old);

    tokio::time::advance(Duration::from_secs(61)).await;
    let new = h.session(GUILD).await;

    assert_ne!(new.id, old.id);
    assert_eq!(rec.closed_reason().as_deref(), Some("expired"));
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.registry.get_by_guild(&GuildId::from(GUILD)).unwrap().id, new.id);
}

#[tokio::test(start_paused = true)]
async fn sweeper_collects_in_the_background() {
    let h = harness();
    let session = h.session(GUILD).await;
    let rec = record(&session);
    let shutdown = CancellationToken::new();
    let sweeper = h.registry.spawn_sweeper(shutdown.clone());

    tokio::time::sleep(Duration::from_secs(75)).await;
    assert!(h.registry.is_empty());
    assert_eq!(rec.closed_reason().as_deref(), Some("expired"));

    shutdown.cancel();
    sweeper.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rearming_the_alone_timer_restarts_the_countdown() {
    let h = harness();
    let session = h.session(GUILD).await;
    let rec = record(&session);
    let timeout = Duration::from_secs(30);

    assert!(h.registry.start_alone_timeout(&session.id, timeout));
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(h.registry.start_alone_timeout(&session.id, timeout));
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(h.registry.get_by_id(&session.id).is_some());
    assert!(session.has_alone_timer());

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(h.registry.get_by_id(&session.id).is_none());
    assert!(!session.has_alone_timer());
    assert_eq!(rec.closed_reason().as_deref(), Some("alone_timeout"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_alone_timer_never_fires() {
    let h = harness();
    let session = h.session(GUILD).await;

    assert!(h.registry.start_alone_timeout(&session.id, Duration::from_secs(30)));
    assert!(h.registry.cancel_alone_timeout(&session.id));
    assert!(!h.registry.cancel_alone_timeout(&session.id));

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(h.registry.get_by_id(&session.id).is_some());
    assert!(!session.has_alone_timer());
}

#[tokio::test(start_paused = true)]
async fn voice_that_recovers_keeps_the_session() {
    let h = harness();
    let session = h.session(GUILD).await;
    let voice = h.connector.last_voice();

    voice.set_status(VoiceStatus::Disconnected);
    tokio::time::sleep(Duration::from_secs(1)).await;
    voice.set_status(VoiceStatus::Signalling);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(h.registry.get_by_id(&session.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn voice_that_stays_down_ends_the_session() {
    let h = harness();
    let session = h.session(GUILD).await;
    let rec = record(&session);

    h.connector.last_voice().set_status(VoiceStatus::Disconnected);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(h.registry.get_by_id(&session.id).is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.registry.get_by_id(&session.id).is_none());
    assert_eq!(rec.closed_reason().as_deref(), Some("voice_disconnected"));
}

#[tokio::test(start_paused = true)]
async fn destroyed_voice_ends_the_session_at_once() {
    let h = harness();
    let session = h.session(GUILD).await;

    h.connector.last_voice().set_status(VoiceStatus::Destroyed);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.registry.get_by_id(&session.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn destroy_is_reported_once() {
    let h = harness();
    let session = h.session(GUILD).await;
    let rec = record(&session);

    assert!(h.registry.destroy_session(&session.id, CloseReason::Stopped));
    assert!(!h.registry.destroy_session(&session.id, CloseReason::Stopped));
    assert!(!h.registry.start_alone_timeout(&session.id, Duration::from_secs(1)));

    let closes: Vec<_> = rec
        .events()
        .into_iter()
        .filter(|e| matches!(e, helpers::Event::Closed(_)))
        .collect();
    assert_eq!(closes, [helpers::Event::Closed("stopped".into())]);
}

#[tokio::test(start_paused = true)]
async fn destroy_all_tears_down_every_session() {
    let h = harness();
    let a = h.session("guild-a").await;
    let b = h.session("guild-b").await;
    let rec_a = record(&a);
    let rec_b = record(&b);

    assert_eq!(h.registry.destroy_all(CloseReason::Shutdown), 2);
    assert!(h.registry.is_empty());
    assert_eq!(rec_a.closed_reason().as_deref(), Some("shutdown"));
    assert_eq!(rec_b.closed_reason().as_deref(), Some("shutdown"));
    assert_eq!(h.registry.destroy_all(CloseReason::Shutdown), 0);
}
