use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    ChildLoansQuery, Direction, Engine, EngineError, LoanDetails, LoanViewKind, MemberSplit,
    NotificationKind, SplitCreateCmd, SplitUpdateCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build();
    (engine, db)
}

async fn seed_user(db: &DatabaseConnection, first_name: &str, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (id, auth_subject, email, first_name) VALUES (?, ?, ?, ?)",
        vec![
            id.to_string().into(),
            format!("sub-{id}").into(),
            email.into(),
            first_name.into(),
        ],
    ))
    .await
    .unwrap();
    id
}

async fn seed_group(db: &DatabaseConnection, creator: Uuid, members: &[Uuid]) -> Uuid {
    let id = Uuid::new_v4();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO groups (id, name, creator_id) VALUES (?, ?, ?)",
        vec![id.to_string().into(), "Trip".into(), creator.to_string().into()],
    ))
    .await
    .unwrap();

    for (user_id, role) in std::iter::once((&creator, "admin"))
        .chain(members.iter().map(|m| (m, "member")))
    {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO group_memberships (group_id, user_id, role) VALUES (?, ?, ?)",
            vec![
                id.to_string().into(),
                user_id.to_string().into(),
                role.into(),
            ],
        ))
        .await
        .unwrap();
    }
    id
}

#[tokio::test]
async fn create_split_builds_parent_and_children() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;
    let group = seed_group(&db, alice, &[bob, carol]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000), MemberSplit::new(carol, 20_000)],
        ))
        .await
        .unwrap();

    let parent = &split.parent;
    assert_eq!(parent.loan.amount_minor, 30_000);
    assert_eq!(parent.loan.description, "Dinner (Group Total)");
    assert_eq!(parent.loan.lender_user_id(), Some(alice));
    assert!(parent.loan.borrower.is_none());
    assert_eq!(parent.transactions.len(), 1);
    assert_eq!(parent.transactions[0].direction, Direction::Out);
    assert_eq!(parent.transactions[0].title, "Loan from Alice to Group");

    assert_eq!(split.splits.len(), 2);
    let mut borrower_ids: Vec<Uuid> = split
        .splits
        .iter()
        .filter_map(|child| child.loan.borrower_user_id())
        .collect();
    borrower_ids.sort();
    let mut expected = vec![bob, carol];
    expected.sort();
    assert_eq!(borrower_ids, expected);

    for child in &split.splits {
        assert_eq!(child.loan.parent_id, Some(parent.loan.id));
        assert_eq!(child.transactions.len(), 1);
        assert_eq!(child.transactions[0].direction, Direction::In);
        assert_eq!(
            child.transactions[0].payer_id,
            child.loan.borrower_user_id().unwrap()
        );
    }

    // Round-trip through the split view returns the same borrower set.
    let details = engine
        .loan_details(parent.loan.id, LoanViewKind::Split)
        .await
        .unwrap();
    let LoanDetails::Split(view) = details else {
        panic!("expected split view");
    };
    let mut seen: Vec<Uuid> = view
        .splits
        .iter()
        .filter_map(|child| child.loan.borrower_user_id())
        .collect();
    seen.sort();
    assert_eq!(seen, expected);

    // Each child produced a loan_created notification for {creator, member}.
    let page = engine.list_notifications(bob, 1, 50).await.unwrap();
    assert!(
        page.notifications
            .iter()
            .any(|n| n.kind == NotificationKind::LoanCreated)
    );
}

#[tokio::test]
async fn create_split_rejects_non_members_listing_them() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let dave = seed_user(&db, "Dave", "dave@example.com").await;
    let group = seed_group(&db, alice, &[bob]).await;

    let err = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000), MemberSplit::new(dave, 5_000)],
        ))
        .await
        .unwrap_err();

    match err {
        EngineError::NotFound(message) => assert!(message.contains(&dave.to_string())),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn creator_share_counts_toward_total_without_a_child() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let group = seed_group(&db, alice, &[bob]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Groceries",
            Utc::now() + Duration::days(5),
            vec![MemberSplit::new(alice, 5_000), MemberSplit::new(bob, 10_000)],
        ))
        .await
        .unwrap();

    assert_eq!(split.parent.loan.amount_minor, 15_000);
    assert_eq!(split.splits.len(), 1);
    assert_eq!(split.splits[0].loan.borrower_user_id(), Some(bob));
}

#[tokio::test]
async fn update_split_reconciles_children_against_the_new_set() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;
    let group = seed_group(&db, alice, &[bob, carol]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000), MemberSplit::new(carol, 20_000)],
        ))
        .await
        .unwrap();
    let parent_id = split.parent.loan.id;
    let carol_child_id = split
        .splits
        .iter()
        .find(|child| child.loan.borrower_user_id() == Some(carol))
        .unwrap()
        .loan
        .id;

    // Carol is omitted from the new set: her child is soft-deleted, Bob's
    // share changes, and the parent total follows.
    let updated = engine
        .update_split_loan(
            parent_id,
            SplitUpdateCmd::default().member_splits(vec![MemberSplit::new(bob, 15_000)]),
            alice,
        )
        .await
        .unwrap();

    let LoanDetails::Split(view) = updated else {
        panic!("expected split view");
    };
    assert_eq!(view.parent.loan.amount_minor, 15_000);
    assert_eq!(view.splits.len(), 1);
    assert_eq!(view.splits[0].loan.borrower_user_id(), Some(bob));
    assert_eq!(view.splits[0].loan.amount_minor, 15_000);

    // Parent invariant: amount equals the sum of live children.
    let child_sum: i64 = view.splits.iter().map(|c| c.loan.amount_minor).sum();
    assert_eq!(view.parent.loan.amount_minor, child_sum);

    let err = engine
        .loan_details(carol_child_id, LoanViewKind::Single)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn update_split_rejects_the_creator_as_borrower() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let group = seed_group(&db, alice, &[bob]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000)],
        ))
        .await
        .unwrap();

    let err = engine
        .update_split_loan(
            split.parent.loan.id,
            SplitUpdateCmd::default()
                .member_splits(vec![MemberSplit::new(alice, 5_000), MemberSplit::new(bob, 10_000)]),
            alice,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn update_split_creates_children_for_new_members() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;
    let group = seed_group(&db, alice, &[bob, carol]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000)],
        ))
        .await
        .unwrap();

    let updated = engine
        .update_split_loan(
            split.parent.loan.id,
            SplitUpdateCmd::default().member_splits(vec![
                MemberSplit::new(bob, 10_000),
                MemberSplit::new(carol, 7_500),
            ]),
            alice,
        )
        .await
        .unwrap();

    let LoanDetails::Split(view) = updated else {
        panic!("expected split view");
    };
    assert_eq!(view.parent.loan.amount_minor, 17_500);
    let carol_child = view
        .splits
        .iter()
        .find(|child| child.loan.borrower_user_id() == Some(carol))
        .unwrap();
    assert_eq!(carol_child.loan.amount_minor, 7_500);
    assert_eq!(carol_child.transactions.len(), 1);
    assert_eq!(carol_child.transactions[0].direction, Direction::In);
}

#[tokio::test]
async fn update_split_by_non_owner_is_not_found() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let group = seed_group(&db, alice, &[bob]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000)],
        ))
        .await
        .unwrap();

    let err = engine
        .update_split_loan(
            split.parent.loan.id,
            SplitUpdateCmd::default().member_splits(vec![MemberSplit::new(bob, 20_000)]),
            bob,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn delete_split_cascades_to_children_and_entries() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;
    let group = seed_group(&db, alice, &[bob, carol]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000), MemberSplit::new(carol, 20_000)],
        ))
        .await
        .unwrap();
    let parent_id = split.parent.loan.id;
    let child_ids: Vec<Uuid> = split.splits.iter().map(|child| child.loan.id).collect();

    // The borrower cannot delete the split.
    let err = engine.delete_split_loan(parent_id, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    engine.delete_split_loan(parent_id, alice).await.unwrap();

    let err = engine
        .loan_details(parent_id, LoanViewKind::Split)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    for child_id in child_ids {
        let err = engine
            .loan_details(child_id, LoanViewKind::Single)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}

#[tokio::test]
async fn child_listing_paginates_and_sums_the_whole_filtered_set() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;
    let group = seed_group(&db, alice, &[bob, carol]).await;

    let split = engine
        .create_split_loan(SplitCreateCmd::new(
            alice,
            group,
            "Dinner",
            Utc::now() + Duration::days(10),
            vec![MemberSplit::new(bob, 10_000), MemberSplit::new(carol, 20_000)],
        ))
        .await
        .unwrap();
    let parent_id = split.parent.loan.id;

    // Page 1 of 2, but the aggregates cover the whole set.
    let page = engine
        .child_loans(parent_id, ChildLoansQuery::default().page(1).page_size(1))
        .await
        .unwrap();
    assert_eq!(page.child_loans.len(), 1);
    assert_eq!(page.total_count, 2);
    assert_eq!(page.total_amount_minor, 30_000);

    let filtered = engine
        .child_loans(parent_id, ChildLoansQuery::default().search("carol"))
        .await
        .unwrap();
    assert_eq!(filtered.total_count, 1);
    assert_eq!(filtered.total_amount_minor, 20_000);
    assert_eq!(
        filtered.child_loans[0].loan.borrower_user_id(),
        Some(carol)
    );
}
