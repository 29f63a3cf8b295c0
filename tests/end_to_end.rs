use chrono::{DateTime, TimeZone, Utc};
use memorius::database::db;
use memorius::export::json::{sample_deck, seed_database};
use memorius::models::Outcome;
use memorius::review::{LogNotifier, MessageRef};
use memorius::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const USER: i64 = 7;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 18, 30, 0).unwrap()
}

fn target() -> MessageRef {
    MessageRef {
        chat_id: USER,
        message_id: 12,
    }
}

fn setup(dir: &TempDir) -> (Arc<SqliteCardStore>, Arc<ManualClock>, Arc<ReviewOrchestrator>) {
    let store = Arc::new(SqliteCardStore::open(dir.path().join("cards.db")).unwrap());
    let clock = Arc::new(ManualClock::new(t0()));
    let config = ReviewConfig::default()
        .with_answer_timeout(Duration::from_secs(20))
        .unwrap();
    let review = ReviewOrchestrator::new(store.clone(), Arc::new(LogNotifier), clock.clone(), &config);
    (store, clock, review)
}

#[tokio::test(start_paused = true)]
async fn easy_then_skip_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let (store, _clock, review) = setup(&dir);
    let (deck_id, a, b) = {
        let conn = store.conn().unwrap();
        let deck_id = db::new_deck("Two cards", &conn).unwrap();
        let a = db::add_card(deck_id, "cześć", "hello", &[], None, t0(), &conn).unwrap();
        let b = db::add_card(deck_id, "proszę", "please", &[], None, t0(), &conn).unwrap();
        (deck_id, a, b)
    };
    let b_before = store.fetch_card(b).await.unwrap().unwrap().memory;

    let first = review.start_session(USER, deck_id, target(), t0()).await.unwrap();
    assert_eq!(first.card_id, a);

    review.answer(USER, a, Rating::Easy).await.unwrap();
    let done = review.skip(USER, b).await.unwrap();

    let ReviewStep::Finished(summary) = done.step else {
        panic!("two answers should finish a two card session");
    };
    assert_eq!(
        summary,
        SessionSummary {
            total: 2,
            easy_count: 1,
            medium_count: 0,
            hard_count: 0,
            skipped_count: 1,
            timed_out_count: 0,
        }
    );

    let a_after = store.fetch_card(a).await.unwrap().unwrap().memory;
    assert_eq!((a_after.repetitions, a_after.interval_days), (1, 1));
    assert_eq!(store.fetch_card(b).await.unwrap().unwrap().memory, b_before);

    let stats = review.statistics(USER, 30, t0()).await.unwrap();
    assert_eq!((stats.total, stats.easy, stats.skipped), (2, 1, 1));
}

#[tokio::test(start_paused = true)]
async fn schedule_brings_cards_back_on_later_days() {
    let dir = TempDir::new().unwrap();
    let (store, clock, review) = setup(&dir);
    let deck_id = seed_database(&sample_deck(), t0(), &store.conn().unwrap()).unwrap();

    // Day 0: answer everything easy (the variants card with its correct pick).
    let mut view = review.start_session(USER, deck_id, target(), clock.now()).await.unwrap();
    loop {
        let card = store.fetch_card(view.card_id).await.unwrap().unwrap();
        let rating = match card.correct_variant {
            Some(n) => Rating::Variant(n),
            None => Rating::Easy,
        };
        let result = review.answer(USER, view.card_id, rating).await.unwrap();
        assert_eq!(result.outcome, Outcome::Easy);
        match result.step {
            ReviewStep::Next(next) => view = next,
            ReviewStep::Finished(summary) => {
                assert_eq!(summary.easy_count, 3);
                break;
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    // Nothing is due until a day has passed.
    let err = review
        .start_session(USER, deck_id, target(), clock.now())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::NoCardsDue));

    clock.advance_days(1);
    let view = review.start_session(USER, deck_id, target(), clock.now()).await.unwrap();
    assert_eq!(view.total, 3);

    // Let the first question time out; it is tallied and rescheduled as a failure.
    tokio::time::sleep(Duration::from_secs(21)).await;
    let timed_out = store.fetch_card(view.card_id).await.unwrap().unwrap().memory;
    assert_eq!((timed_out.repetitions, timed_out.interval_days), (0, 0));
    assert_eq!(review.current_card(USER).await.map(|id| id != view.card_id), Some(true));

    assert!(review.cancel_session(USER).await);
    let stats = review.statistics(USER, 7, clock.now()).await.unwrap();
    assert_eq!((stats.total, stats.easy, stats.timed_out), (4, 3, 1));
}
