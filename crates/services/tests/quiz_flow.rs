use std::sync::{Arc, Mutex};

use quiz_core::aggregate::ProgressStatus;
use quiz_core::model::{QuestionId, UserId};
use quiz_core::time::fixed_now;
use services::{
    AppServices, AuthUser, Clock, ExamDraft, IdentityEvent, QuestionDraft, SessionConfig,
    SubmitOutcome,
};
use storage::progress_store::InMemoryProgressStore;
use storage::repository::Storage;

fn question(id: &str, correct_index: usize) -> QuestionDraft {
    QuestionDraft {
        id: id.to_owned(),
        prompt: format!("Which option is right for {id}?"),
        options: vec!["first".into(), "second".into(), "third".into()],
        correct_index,
        explanation: Some(format!("Option {correct_index} is right.")),
    }
}

async fn app(db: &str) -> AppServices {
    let storage = Storage::sqlite(&format!("sqlite:file:{db}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    AppServices::new(
        &storage,
        Arc::new(InMemoryProgressStore::new()),
        Clock::fixed(fixed_now()),
        SessionConfig::default(),
    )
}

fn auth_user(email: &str) -> AuthUser {
    AuthUser {
        user_id: UserId::random(),
        email: Some(email.to_owned()),
        display_name_hint: None,
        avatar_url: None,
    }
}

#[tokio::test]
async fn take_test_end_to_end() {
    let app = app("memdb_quiz_flow").await;
    let catalog = app.catalog();
    catalog
        .create_subject("HTML", Some("Markup basics"))
        .await
        .expect("create subject");
    let exam = catalog
        .save_exam(ExamDraft {
            id: "html-101".into(),
            title: "HTML 101".into(),
            subject: "HTML".into(),
            description: None,
            time_limit_minutes: 15,
            questions: vec![question("q1", 0), question("q2", 1), question("q3", 2)],
        })
        .await
        .expect("save exam");

    let identity = app
        .identity()
        .sign_in(auth_user("grace@example.com"))
        .await
        .expect("sign in");
    let user = identity.user_id;

    let sessions = app.sessions();
    let mut session = sessions.start(exam.id(), user).await.expect("start");
    for (id, option) in [("q1", 0), ("q2", 2), ("q3", 2)] {
        session
            .select_answer(&QuestionId::new(id).unwrap(), option)
            .expect("select");
    }
    let outcome = sessions.submit(&mut session, false).await.expect("submit");
    let SubmitOutcome::Submitted { attempt_id, report } = outcome else {
        panic!("expected a submission, got {outcome:?}");
    };
    assert_eq!(report.score(), 67);

    let progress = app.progress();
    let summaries = progress.progress_for(user).await.expect("progress");
    let summary = &summaries[exam.id()];
    assert_eq!(summary.status, ProgressStatus::Completed);
    assert_eq!(summary.best_score, 67);

    let detail = progress
        .attempt_detail(user, attempt_id)
        .await
        .expect("attempt detail");
    assert_eq!(detail.answers.len(), 3);
    assert!(!detail.answers[1].is_correct);
    assert_eq!(detail.answers[1].selected_answer.as_deref(), Some("third"));

    let board = progress.leaderboard().await.expect("leaderboard");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].display_name, "grace");
    assert_eq!(board[0].average_score, 67);
}

#[tokio::test]
async fn identity_subscribers_see_initial_before_changes() {
    let app = app("memdb_identity_order").await;
    let identity = app.identity();
    let first = identity
        .sign_in(auth_user("ada@example.com"))
        .await
        .expect("sign in");

    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut subscriptions = Vec::new();
    for name in ["a", "b"] {
        let log = Arc::clone(&log);
        let sub = identity
            .on_identity_change(move |event| {
                let label = match event {
                    IdentityEvent::Initial(Some(who)) => format!("initial:{}", who.profile.display_name()),
                    IdentityEvent::Initial(None) => "initial:none".to_owned(),
                    IdentityEvent::SignedIn(who) => format!("in:{}", who.profile.display_name()),
                    IdentityEvent::ProfileUpdated(who) => {
                        format!("avatar:{}", who.profile.avatar_url().unwrap_or("none"))
                    }
                    IdentityEvent::SignedOut => "out".to_owned(),
                };
                log.lock().unwrap().push(format!("{name}:{label}"));
            })
            .expect("subscribe");
        subscriptions.push(sub);
    }
    assert_eq!(
        *log.lock().unwrap(),
        vec!["a:initial:ada", "b:initial:ada"]
    );
    assert_eq!(identity.current().unwrap().map(|i| i.user_id), Some(first.user_id));

    identity.sign_out().expect("sign out");
    drop(subscriptions.remove(0));
    let bob_auth = auth_user("bob@example.com");
    identity
        .sign_in(bob_auth.clone())
        .await
        .expect("sign in");
    let bob = identity
        .update_avatar(Some("https://cdn.example.org/bob.png".into()))
        .await
        .expect("avatar");

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "a:initial:ada",
            "b:initial:ada",
            "a:out",
            "b:out",
            "b:in:bob",
            "b:avatar:https://cdn.example.org/bob.png",
        ]
    );

    // A later sign-in reads the avatar back from the SQLite profile row.
    let stored = app
        .identity()
        .sign_in(bob_auth)
        .await
        .expect("sign in again");
    assert_eq!(stored.profile.avatar_url(), bob.profile.avatar_url());
}

#[tokio::test]
async fn saved_progress_survives_restart() {
    let db = "sqlite:file:memdb_resume_flow?mode=memory&cache=shared";
    let dir = tempfile::tempdir().expect("tempdir");
    let user = UserId::random();

    let first = AppServices::new_sqlite(db, dir.path(), Clock::fixed(fixed_now()), SessionConfig::default())
        .await
        .expect("open app");
    first.catalog().create_subject("CSS", None).await.expect("subject");
    let exam = first
        .catalog()
        .save_exam(ExamDraft {
            id: "css-101".into(),
            title: "CSS 101".into(),
            subject: "CSS".into(),
            description: None,
            time_limit_minutes: 1,
            questions: vec![question("q1", 0), question("q2", 1)],
        })
        .await
        .expect("save exam");

    let sessions = first.sessions();
    let mut session = sessions.start(exam.id(), user).await.expect("start");
    session
        .select_answer(&QuestionId::new("q2").unwrap(), 1)
        .expect("select");
    session.jump_to(1);
    session.tick();
    assert!(sessions.autosave(&session).await);

    let second = AppServices::new_sqlite(db, dir.path(), Clock::fixed(fixed_now()), SessionConfig::default())
        .await
        .expect("reopen app");
    let summaries = second.progress().progress_for(user).await.expect("progress");
    assert_eq!(summaries[exam.id()].status, ProgressStatus::InProgress);

    let resumed = second.sessions().start(exam.id(), user).await.expect("resume");
    assert_eq!(resumed.current_index(), 1);
    assert_eq!(resumed.remaining_secs(), 59);
    assert_eq!(resumed.answers(), session.answers());
    drop(first);
}
