// tests/watch_cycle.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use catalog_sentinel::ingest::admission::AdmissionPolicy;
use catalog_sentinel::ingest::providers::youtube_feed::YouTubeFeed;
use catalog_sentinel::ingest::types::{AdmissionMode, Decision, Source};
use catalog_sentinel::ingest::WatchCycle;
use common::{cycle, MockChannel, MockDispatcher, MockIndex, MockProbe};

fn source_a() -> Source {
    Source::new("A", "Source A", AdmissionMode::AdmitAll)
}

fn source_b() -> Source {
    Source::new("B", "Source B", AdmissionMode::AdmitLongOnly)
}

#[tokio::test]
async fn mixed_sources_dispatch_only_admitted_items() {
    let channel = Arc::new(
        MockChannel::default()
            .with("A", &["V1", "V2"])
            .with("B", &["V3", "V4"]),
    );
    let index = Arc::new(MockIndex::containing(&["V2"]));
    let probe = Arc::new(MockProbe::default().with("V3", 300).with("V4", 1800));
    let dispatcher = Arc::new(MockDispatcher::default());

    let report = cycle(
        vec![source_a(), source_b()],
        channel,
        index,
        probe.clone(),
        dispatcher.clone(),
    )
    .run_once()
    .await;

    assert_eq!(dispatcher.attempted_ids(), vec!["V1", "V4"]);
    let decisions: Vec<_> = report
        .verdicts
        .iter()
        .map(|v| (v.verdict.item_id.as_str(), v.verdict.decision))
        .collect();
    assert_eq!(
        decisions,
        vec![
            ("V1", Decision::Accept),
            ("V2", Decision::SkipExists),
            ("V3", Decision::SkipTooShort),
            ("V4", Decision::Accept),
        ]
    );
    assert_eq!(report.verdict_for("V4").unwrap().duration_secs, Some(1800));
    assert_eq!(report.count(Decision::Accept), 2);
    assert_eq!(probe.calls(), 2);
    assert_eq!(report.verdicts[2].source_id, "B");
}

#[tokio::test]
async fn broken_source_does_not_stop_healthy_one() {
    let channel = Arc::new(MockChannel::default().broken("A").with("B", &["V4"]));
    let probe = Arc::new(MockProbe::default().with("V4", 3600));
    let dispatcher = Arc::new(MockDispatcher::default());

    let report = cycle(
        vec![source_a(), source_b()],
        channel.clone(),
        Arc::new(MockIndex::default()),
        probe,
        dispatcher.clone(),
    )
    .run_once()
    .await;

    assert_eq!(channel.calls.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.delivered_ids(), vec!["V4"]);
    assert_eq!(report.dispatched.len(), 1);
}

#[tokio::test]
async fn failed_dispatch_does_not_abort_the_cycle() {
    let channel = Arc::new(
        MockChannel::default()
            .with("A", &["V1", "V2"])
            .with("B", &["V5"]),
    );
    let probe = Arc::new(MockProbe::default().with("V5", 1500));
    let dispatcher = Arc::new(MockDispatcher::failing_for(&["V1"]));

    cycle(
        vec![source_a(), source_b()],
        channel,
        Arc::new(MockIndex::default()),
        probe,
        dispatcher.clone(),
    )
    .run_once()
    .await;

    assert_eq!(dispatcher.attempted_ids(), vec!["V1", "V2", "V5"]);
    assert_eq!(dispatcher.delivered_ids(), vec!["V2", "V5"]);
}

#[tokio::test]
async fn repeated_runs_redispatch_until_indexed() {
    let channel = Arc::new(MockChannel::default().with("A", &["V1", "V2"]));
    let dispatcher = Arc::new(MockDispatcher::default());
    let watch = cycle(
        vec![source_a()],
        channel,
        Arc::new(MockIndex::default()),
        Arc::new(MockProbe::default()),
        dispatcher.clone(),
    );

    let first = watch.run_once().await;
    let second = watch.run_once().await;

    // No index write in between: at-least-once, same set both times.
    assert_eq!(first.dispatched, second.dispatched);
    assert_eq!(dispatcher.attempted_ids(), vec!["V1", "V2", "V1", "V2"]);
}

#[tokio::test]
async fn empty_watch_list_is_a_no_op() {
    let dispatcher = Arc::new(MockDispatcher::default());
    let report = cycle(
        vec![],
        Arc::new(MockChannel::default()),
        Arc::new(MockIndex::default()),
        Arc::new(MockProbe::default()),
        dispatcher.clone(),
    )
    .run_once()
    .await;
    assert!(report.verdicts.is_empty());
    assert!(dispatcher.attempted_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_follows_each_dispatch() {
    let channel = Arc::new(MockChannel::default().with("A", &["V1", "V2", "V3"]));
    let index = Arc::new(MockIndex::containing(&["V2"]));
    let policy = AdmissionPolicy::new(index, Arc::new(MockProbe::default()));
    let watch = WatchCycle::new(
        vec![source_a()],
        channel,
        policy,
        Arc::new(MockDispatcher::default()),
    )
    .with_dispatch_pause(std::time::Duration::from_secs(5));

    let t0 = tokio::time::Instant::now();
    watch.run_once().await;
    // two accepts -> two pauses; the skipped item adds none
    assert_eq!(t0.elapsed(), std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn fixture_feed_drives_the_cycle() {
    let xml = include_str!("fixtures/channel_feed.xml");
    let feed = Arc::new(YouTubeFeed::from_fixtures([("A", xml)]));
    let index = Arc::new(MockIndex::containing(&["dQw4w9WgXcQ"]));
    let dispatcher = Arc::new(MockDispatcher::default());
    let policy = AdmissionPolicy::new(index, Arc::new(MockProbe::default()));

    // "B" has no fixture: behaves like a broken feed.
    let report = WatchCycle::new(
        vec![source_a(), source_b()],
        feed,
        policy,
        dispatcher.clone(),
    )
    .with_dispatch_pause(std::time::Duration::ZERO)
    .run_once()
    .await;

    assert_eq!(report.verdicts.len(), 3);
    assert_eq!(dispatcher.attempted_ids(), vec!["aB3dE5fG7hI", "kL9mN1oP3qR"]);
    assert_eq!(
        report.dispatched[0].url,
        "https://www.youtube.com/watch?v=aB3dE5fG7hI"
    );
}
