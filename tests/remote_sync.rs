//! Remotes, pull and push against bare repositories on disk, including
//! conflicts and their resolution.

mod common;

use std::path::PathBuf;

use common::{bare_remote, branch, push_to_remote, remote_tip, user, TestDeck};
use gitdeck::core::types::{ProjectName, RemoteName, UserId};
use gitdeck::engine::{
    AuthUpdate, EngineError, MergeState, PullOptions, PushOptions, RemoteSpec, RemoteUpdate,
    Resolution, StatusOptions,
};
use gitdeck::git::{Credentials, Integration};

fn origin() -> RemoteName {
    RemoteName::new("origin").unwrap()
}

/// A template project published to a fresh bare `origin` with tracking.
async fn published(deck: &TestDeck, who: &UserId) -> (ProjectName, PathBuf) {
    let notes = deck.project(who, "notes").await;
    let remote = bare_remote(deck.dir.path(), "origin");
    deck.engine
        .add_remote(
            who,
            &notes,
            RemoteSpec {
                name: origin(),
                url: remote.to_string_lossy().into_owned(),
                credentials: None,
            },
        )
        .await
        .unwrap();
    let pushed = deck
        .engine
        .push(
            who,
            &notes,
            PushOptions {
                track: true,
                ..PushOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(remote_tip(&remote, "main"), pushed.head.as_str());
    (notes, remote)
}

/// Local and remote both rewrite README.md.
async fn conflicted(deck: &TestDeck, who: &UserId) -> (ProjectName, Vec<String>) {
    let (notes, remote) = published(deck, who).await;
    push_to_remote(&remote, "main", &[("README.md", "# remote\n")], "Remote edit");
    deck.commit_file(who, &notes, "README.md", "# local\n", "Local edit")
        .await;

    let outcome = deck
        .engine
        .pull(who, &notes, PullOptions::default())
        .await
        .unwrap();
    let paths = match outcome.integration {
        Integration::Conflicted { paths } => paths,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert!(outcome.merge.is_in_progress());
    (notes, paths)
}

#[tokio::test]
async fn push_then_fast_forward_pull() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, remote) = published(&deck, &alice).await;

    push_to_remote(&remote, "main", &[("shared.md", "from elsewhere\n")], "Elsewhere");

    let status = deck
        .engine
        .get_status(
            &alice,
            &notes,
            StatusOptions {
                include_remote: true,
                timeout: None,
            },
        )
        .await
        .unwrap();
    let remote_status = status.remote.expect("tracking origin");
    assert_eq!(remote_status.upstream.as_deref(), Some("origin/main"));
    assert_eq!((remote_status.ahead, remote_status.behind), (0, 1));
    assert!(remote_status.unreachable.is_none());

    let outcome = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome.integration, Integration::FastForward { .. }));
    assert_eq!(outcome.merge, MergeState::Clean);
    assert_eq!(deck.read(&notes, "shared.md"), "from elsewhere\n");

    let again = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap();
    assert_eq!(again.integration, Integration::UpToDate);
}

#[tokio::test]
async fn diverged_histories_merge_cleanly() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, remote) = published(&deck, &alice).await;

    push_to_remote(&remote, "main", &[("theirs.md", "t\n")], "Theirs");
    deck.commit_file(&alice, &notes, "ours.md", "o\n", "Ours").await;

    let outcome = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap();
    let head = match outcome.integration {
        Integration::Merged { head } => head,
        other => panic!("expected merge, got {other:?}"),
    };
    let detail = deck
        .engine
        .get_commit(&alice, &notes, head.as_str())
        .await
        .unwrap();
    assert_eq!(detail.info.parents.len(), 2);
    assert_eq!(detail.info.summary, "Merge branch 'main' of origin");
}

#[tokio::test]
async fn non_fast_forward_push_is_rejected() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, remote) = published(&deck, &alice).await;
    let before = remote_tip(&remote, "main");

    push_to_remote(&remote, "main", &[("theirs.md", "t\n")], "Theirs");
    let advanced = remote_tip(&remote, "main");
    assert_ne!(before, advanced);
    deck.commit_file(&alice, &notes, "ours.md", "o\n", "Ours").await;

    let err = deck
        .engine
        .push(&alice, &notes, PushOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NonFastForward(_)), "{err:?}");
    assert_eq!(err.status_code(), 409);
    assert_eq!(remote_tip(&remote, "main"), advanced);
}

#[tokio::test]
async fn conflict_resolved_and_committed() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, paths) = conflicted(&deck, &alice).await;
    assert_eq!(paths, ["README.md"]);

    // only resolve, abort and commit are allowed now
    let err = deck
        .engine
        .stage_files(&alice, &notes, vec!["README.md".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MergeInProgress { .. }));
    let err = deck.engine.commit(&alice, &notes, "Too early").await.unwrap_err();
    match err {
        EngineError::MergeInProgress { unresolved } => assert_eq!(unresolved, ["README.md"]),
        other => panic!("unexpected {other:?}"),
    }
    let upstream = RemoteName::new("upstream").unwrap();
    let refused = [
        deck.engine
            .add_remote(
                &alice,
                &notes,
                RemoteSpec {
                    name: upstream.clone(),
                    url: "/srv/upstream.git".into(),
                    credentials: None,
                },
            )
            .await
            .map(|_| ()),
        deck.engine
            .update_remote(
                &alice,
                &notes,
                &origin(),
                RemoteUpdate {
                    url: Some("/srv/moved.git".into()),
                    auth: None,
                },
            )
            .await
            .map(|_| ()),
        deck.engine.remove_remote(&alice, &notes, &origin()).await,
        deck.engine
            .set_branch(&alice, &notes, &branch("side"), true)
            .await,
        deck.engine
            .delete_branch(&alice, &notes, &branch("side"), true)
            .await,
        deck.engine
            .push(&alice, &notes, PushOptions::default())
            .await
            .map(|_| ()),
    ];
    for result in refused {
        assert!(
            matches!(result, Err(EngineError::MergeInProgress { .. })),
            "expected MergeInProgress, got {result:?}"
        );
    }
    let remotes = deck.engine.get_remotes(&alice, &notes).await.unwrap();
    assert_eq!(remotes.len(), 1);

    let err = deck
        .engine
        .resolve_merge(&alice, &notes, ".gitignore", Resolution::Ours)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotConflicted(_)));

    let state = deck
        .engine
        .resolve_merge(&alice, &notes, "README.md", Resolution::Theirs)
        .await
        .unwrap();
    assert_eq!(
        state,
        MergeState::InProgress {
            conflicted: Vec::new()
        }
    );
    assert_eq!(deck.read(&notes, "README.md"), "# remote\n");

    let merge = deck.engine.commit(&alice, &notes, "Merge origin").await.unwrap();
    assert_eq!(merge.parents.len(), 2);

    let status = deck
        .engine
        .get_status(&alice, &notes, StatusOptions::default())
        .await
        .unwrap();
    assert_eq!(status.merge, MergeState::Clean);
    assert!(status.snapshot.conflicted.is_empty());
}

#[tokio::test]
async fn conflict_resolved_with_new_content() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, _) = conflicted(&deck, &alice).await;

    deck.engine
        .resolve_merge(
            &alice,
            &notes,
            "README.md",
            Resolution::Content("# both\n".into()),
        )
        .await
        .unwrap();
    deck.engine.commit(&alice, &notes, "Merge").await.unwrap();
    assert_eq!(deck.read(&notes, "README.md"), "# both\n");
}

#[tokio::test]
async fn abort_restores_pre_merge_state() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, _) = conflicted(&deck, &alice).await;
    let local = deck
        .engine
        .get_commit(&alice, &notes, "HEAD")
        .await
        .unwrap()
        .info
        .oid;

    deck.engine.abort_merge(&alice, &notes).await.unwrap();

    let status = deck
        .engine
        .get_status(&alice, &notes, StatusOptions::default())
        .await
        .unwrap();
    assert_eq!(status.merge, MergeState::Clean);
    assert_eq!(status.snapshot.head, Some(local));
    assert!(status.snapshot.staged.is_empty());
    assert!(status.snapshot.unstaged.is_empty());
    assert_eq!(deck.read(&notes, "README.md"), "# local\n");
}

#[tokio::test]
async fn pull_needs_clean_tracked_tree() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let (notes, _) = published(&deck, &alice).await;

    deck.write(&notes, "README.md", "# uncommitted\n");
    let err = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UncommittedChanges(_)));
}

#[tokio::test]
async fn unrelated_histories_need_consent() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let notes = deck.project(&alice, "notes").await;
    let remote = bare_remote(deck.dir.path(), "foreign");
    push_to_remote(&remote, "main", &[("foreign.md", "f\n")], "Foreign root");

    deck.engine
        .add_remote(
            &alice,
            &notes,
            RemoteSpec {
                name: origin(),
                url: remote.to_string_lossy().into_owned(),
                credentials: None,
            },
        )
        .await
        .unwrap();

    let err = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnrelatedHistories));

    let outcome = deck
        .engine
        .pull(
            &alice,
            &notes,
            PullOptions {
                allow_unrelated_histories: true,
                ..PullOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome.integration, Integration::Merged { .. }));
    assert_eq!(deck.read(&notes, "foreign.md"), "f\n");
    assert_eq!(deck.read(&notes, "README.md"), "# notes\n");
}

#[tokio::test]
async fn remote_management() {
    let deck = TestDeck::new();
    let alice = user("alice");
    let notes = deck.project(&alice, "notes").await;
    let first = bare_remote(deck.dir.path(), "first");
    let second = bare_remote(deck.dir.path(), "second");
    let spec = || RemoteSpec {
        name: origin(),
        url: first.to_string_lossy().into_owned(),
        credentials: None,
    };

    let view = deck.engine.add_remote(&alice, &notes, spec()).await.unwrap();
    assert!(!view.has_auth);
    let err = deck.engine.add_remote(&alice, &notes, spec()).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)));

    let updated = deck
        .engine
        .update_remote(
            &alice,
            &notes,
            &origin(),
            RemoteUpdate {
                url: Some(second.to_string_lossy().into_owned()),
                auth: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.url, second.to_string_lossy());

    let authed = deck
        .engine
        .set_remote_auth(
            &alice,
            &notes,
            &origin(),
            Credentials {
                username: "alice".into(),
                token: "tok".into(),
            },
        )
        .await
        .unwrap();
    assert!(authed.has_auth);
    assert_eq!(deck.secrets.len(), 1);

    let cleared = deck
        .engine
        .update_remote(
            &alice,
            &notes,
            &origin(),
            RemoteUpdate {
                url: None,
                auth: Some(AuthUpdate::Clear),
            },
        )
        .await
        .unwrap();
    assert!(!cleared.has_auth);
    assert_eq!(deck.secrets.len(), 0);

    let err = deck
        .engine
        .add_remote(
            &alice,
            &notes,
            RemoteSpec {
                name: RemoteName::new("bad").unwrap(),
                url: "--upload-pack=touch".into(),
                credentials: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    deck.engine.remove_remote(&alice, &notes, &origin()).await.unwrap();
    assert!(deck.engine.get_remotes(&alice, &notes).await.unwrap().is_empty());

    let err = deck
        .engine
        .pull(&alice, &notes, PullOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
