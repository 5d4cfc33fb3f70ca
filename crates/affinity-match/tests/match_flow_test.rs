//! End-to-end match flows through the dispatcher with an in-memory store
//! and a file-backed ledger.

use std::sync::Arc;

use affinity_match::{
    ActionDispatcher, CelebrationLedger, DispatchConfig, FileLedger, HeartOutcome, HideOutcome,
    MemoryTagStore, RelationshipState, StoreOp, Tag, TagSet, UserId,
};
use tempfile::TempDir;

const ALICE: UserId = UserId(100);
const BOB: UserId = UserId(200);

struct Fixture {
    store: MemoryTagStore,
    ledger: Arc<FileLedger>,
    alice: ActionDispatcher,
    bob: ActionDispatcher,
    _dir: TempDir,
}

fn fixture(config: DispatchConfig) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = MemoryTagStore::new();
    let ledger = Arc::new(FileLedger::new(dir.path()));
    let alice = ActionDispatcher::new(Arc::new(store.clone()), ledger.clone(), config.clone());
    let bob = ActionDispatcher::new(Arc::new(store.clone()), ledger.clone(), config);
    Fixture {
        store,
        ledger,
        alice,
        bob,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_full_match_flow_celebrates_once() {
    let f = fixture(DispatchConfig::default());
    let mut events = f.alice.events().subscribe();

    // Alice approves Bob; liking is blocked until Bob approves back.
    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::Approved);
    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::AwaitingApproval);

    // Bob approves Alice, then Alice likes with a note.
    f.bob.click_heart(BOB, ALICE).await.unwrap();
    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::NoteRequested);
    let r = f
        .alice
        .confirm_like(ALICE, BOB, Some("Coffee sometime?"))
        .await
        .unwrap();
    assert_eq!(r.outcome, HeartOutcome::Liked);
    assert_eq!(r.state, RelationshipState::Liked);
    assert_eq!(f.store.notes().len(), 1);

    // Bob likes back and is celebrated immediately on his side.
    let r = f.bob.confirm_like(BOB, ALICE, None).await.unwrap();
    match r.outcome {
        HeartOutcome::Matched { celebration } => {
            assert_eq!(celebration.expect("celebration").target, ALICE)
        }
        other => panic!("expected match, got {:?}", other),
    }

    // Alice sees the match on her next sweep, exactly once.
    assert_eq!(f.alice.state(ALICE, BOB).await.unwrap(), RelationshipState::Matched);
    let first = f.alice.sweep(ALICE).await.unwrap().expect("celebration");
    assert_eq!(first.target, BOB);
    assert!(f.alice.sweep(ALICE).await.unwrap().is_none());
    assert_eq!(f.ledger.load(ALICE).await.unwrap().len(), 1);

    let mut celebrated = 0;
    while let Ok(envelope) = events.try_recv() {
        if envelope.event_type == "match.celebrated" {
            celebrated += 1;
        }
    }
    assert_eq!(celebrated, 1);
}

#[tokio::test]
async fn test_heart_on_match_unlikes_and_keeps_approve() {
    let f = fixture(DispatchConfig::default());
    f.store.set_tags(ALICE, BOB, [Tag::Approve, Tag::Like]);
    f.store.set_tags(BOB, ALICE, [Tag::Approve, Tag::Like]);

    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::Unliked { was_matched: true });
    assert_eq!(r.tags, TagSet::from([Tag::Approve]));
    assert_eq!(r.state, RelationshipState::Approved);
    assert_eq!(f.store.peek(ALICE, BOB), TagSet::from([Tag::Approve]));
}

#[tokio::test]
async fn test_like_without_approve_restores_approve_on_unlike() {
    let f = fixture(DispatchConfig::default());
    f.store.set_tags(ALICE, BOB, [Tag::Like]);

    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.tags, TagSet::from([Tag::Approve]));
    assert_eq!(f.store.call_count(StoreOp::ToggleTag), 2);
}

#[tokio::test]
async fn test_hide_clears_approve_and_like() {
    let f = fixture(DispatchConfig::default());
    f.store.set_tags(ALICE, BOB, [Tag::Approve, Tag::Like]);

    let r = f.alice.toggle_hide(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HideOutcome::Hidden);
    assert_eq!(r.tags, TagSet::from([Tag::Hide]));
    assert_eq!(f.store.call_count(StoreOp::ToggleTag), 3);

    f.store.clear_calls();
    let r = f.alice.toggle_hide(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HideOutcome::Unhidden);
    assert!(r.tags.is_empty());
    assert_eq!(f.store.call_count(StoreOp::ToggleTag), 1);
}

#[tokio::test]
async fn test_rematch_is_not_celebrated_again_by_default() {
    let f = fixture(DispatchConfig::default());
    f.store.set_tags(ALICE, BOB, [Tag::Approve, Tag::Like]);
    f.store.set_tags(BOB, ALICE, [Tag::Approve, Tag::Like]);
    assert!(f.alice.sweep(ALICE).await.unwrap().is_some());

    f.alice.click_heart(ALICE, BOB).await.unwrap();
    let r = f.alice.confirm_like(ALICE, BOB, None).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::Matched { celebration: None });
}

#[tokio::test]
async fn test_rematch_celebrated_when_forgetting_on_unmatch() {
    let f = fixture(DispatchConfig::default().with_forget_on_unmatch(true));
    f.store.set_tags(ALICE, BOB, [Tag::Approve, Tag::Like]);
    f.store.set_tags(BOB, ALICE, [Tag::Approve, Tag::Like]);
    assert!(f.alice.sweep(ALICE).await.unwrap().is_some());

    f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert!(f.ledger.load(ALICE).await.unwrap().is_empty());

    let r = f.alice.confirm_like(ALICE, BOB, None).await.unwrap();
    assert!(matches!(
        r.outcome,
        HeartOutcome::Matched {
            celebration: Some(_)
        }
    ));
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_at_previous_tags() {
    let f = fixture(DispatchConfig::default());
    f.store.fail_toggle(Tag::Approve);

    assert!(f.alice.click_heart(ALICE, BOB).await.is_err());
    assert!(f.alice.viewer_tags(ALICE, BOB).await.unwrap().is_empty());
    assert!(!f.alice.is_busy(ALICE, BOB));
}

#[tokio::test]
async fn test_action_after_rollback_follows_store() {
    let f = fixture(DispatchConfig::default());
    f.store.set_tags(ALICE, BOB, [Tag::Approve, Tag::Like]);
    f.store.fail_toggle(Tag::Hide);

    assert!(f.alice.toggle_hide(ALICE, BOB).await.is_err());
    assert_eq!(
        f.alice.viewer_tags(ALICE, BOB).await.unwrap(),
        TagSet::from([Tag::Approve, Tag::Like])
    );
    f.store.heal();

    let r = f.alice.toggle_hide(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HideOutcome::Hidden);
    assert_eq!(r.tags, TagSet::from([Tag::Hide]));
    assert_eq!(f.store.peek(ALICE, BOB), TagSet::from([Tag::Hide]));
}

#[tokio::test]
async fn test_two_sessions_for_same_viewer() {
    let f = fixture(DispatchConfig::default());
    let other_device = ActionDispatcher::new(
        Arc::new(f.store.clone()),
        f.ledger.clone(),
        DispatchConfig::default(),
    );

    // This session caches an empty set, then the other one hides Bob.
    assert_eq!(f.alice.state(ALICE, BOB).await.unwrap(), RelationshipState::None);
    other_device.toggle_hide(ALICE, BOB).await.unwrap();

    let r = f.alice.click_heart(ALICE, BOB).await.unwrap();
    assert_eq!(r.outcome, HeartOutcome::Approved);
    assert_eq!(f.store.peek(ALICE, BOB), TagSet::from([Tag::Approve]));
    assert!(!r.tags.contains(Tag::Hide));
}
