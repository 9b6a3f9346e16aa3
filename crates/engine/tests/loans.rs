use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{
    Direction, Engine, EngineError, LoanCreateCmd, LoanDetails, LoanPatch, LoanStatus,
    LoanViewKind, NotificationKind, Party, TransferLoanCmd,
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

fn single(details: LoanDetails) -> engine::LoanDetail {
    match details {
        LoanDetails::Single(detail) => detail,
        LoanDetails::Split(_) => panic!("expected single view"),
    }
}

#[tokio::test]
async fn create_between_registered_users_books_both_legs() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;

    let detail = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            500_000,
            "Car repair",
            Utc::now() + Duration::days(30),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    assert_eq!(detail.loan.lender_user_id(), Some(alice));
    assert_eq!(detail.loan.borrower_user_id(), Some(bob));
    assert!(detail.loan.is_acknowledged);
    assert_eq!(detail.loan.amount_minor, 500_000);

    assert_eq!(detail.transactions.len(), 2);
    let out_leg = detail
        .transactions
        .iter()
        .find(|tx| tx.direction == Direction::Out)
        .unwrap();
    let in_leg = detail
        .transactions
        .iter()
        .find(|tx| tx.direction == Direction::In)
        .unwrap();
    assert_eq!(out_leg.payer_id, alice);
    assert_eq!(in_leg.payer_id, bob);
    assert_eq!(out_leg.amount_minor, 500_000);
    assert_eq!(in_leg.amount_minor, 500_000);
    assert_eq!(out_leg.title, "Loan from Alice to Bob");
    assert_eq!(out_leg.description, "Loan given: Car repair");
    assert_eq!(in_leg.description, "Loan received: Car repair");
}

#[tokio::test]
async fn create_with_unregistered_email_books_one_leg() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;

    let detail = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            10_000,
            "Lunch",
            Utc::now() + Duration::days(7),
            Direction::Out,
        )
        .counterparty_email("bob@x.com"))
        .await
        .unwrap();

    assert_eq!(detail.loan.lender_user_id(), Some(alice));
    assert_eq!(
        detail.loan.borrower,
        Some(Party::External {
            email: "bob@x.com".to_string()
        })
    );
    assert!(!detail.loan.is_acknowledged);

    assert_eq!(detail.transactions.len(), 1);
    assert_eq!(detail.transactions[0].direction, Direction::Out);
    assert_eq!(detail.transactions[0].title, "Loan from Alice to bob");
}

#[tokio::test]
async fn create_with_group_requires_both_parties_registered() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let group = seed_group(&db, alice, &[]).await;

    let err = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            10_000,
            "Lunch",
            Utc::now() + Duration::days(7),
            Direction::Out,
        )
        .counterparty_email("bob@x.com")
        .group_id(group))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn update_amount_cascades_to_entries_and_notifies() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let updated = engine
        .update_loan(
            created.loan.id,
            LoanPatch::default().amount_minor(60_000),
            alice,
        )
        .await
        .unwrap();

    assert_eq!(updated.loan.amount_minor, 60_000);
    assert_eq!(updated.transactions.len(), 2);
    for tx in &updated.transactions {
        assert_eq!(tx.amount_minor, 60_000);
    }

    let page = engine.list_notifications(bob, 1, 50).await.unwrap();
    let balance_update = page
        .notifications
        .iter()
        .find(|n| n.kind == NotificationKind::BalanceUpdate)
        .unwrap();
    assert_eq!(
        balance_update.message,
        "Loan amount updated from 500.00 to 600.00"
    );
    assert_eq!(balance_update.loan_id, Some(created.loan.id));
}

#[tokio::test]
async fn update_by_stranger_is_forbidden() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let err = engine
        .update_loan(
            created.loan.id,
            LoanPatch::default().description("tampered"),
            carol,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn repaid_status_notifies_each_side_with_its_own_wording() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let updated = engine
        .update_loan(
            created.loan.id,
            LoanPatch::default().status(LoanStatus::Repaid),
            bob,
        )
        .await
        .unwrap();
    assert_eq!(updated.loan.status, LoanStatus::Repaid);

    let lender_page = engine.list_notifications(alice, 1, 50).await.unwrap();
    let lender_note = lender_page
        .notifications
        .iter()
        .find(|n| n.kind == NotificationKind::LoanRepaid)
        .unwrap();
    assert_eq!(lender_note.message, "Bob has repaid the loan of 500.00");

    let borrower_page = engine.list_notifications(bob, 1, 50).await.unwrap();
    let borrower_note = borrower_page
        .notifications
        .iter()
        .find(|n| n.kind == NotificationKind::LoanRepaid)
        .unwrap();
    assert_eq!(
        borrower_note.message,
        "You have repaid the loan of 500.00 to Alice"
    );
}

#[tokio::test]
async fn transfer_with_both_targets_is_rejected_without_side_effects() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let err = engine
        .transfer_loan(
            TransferLoanCmd::new(created.loan.id, alice)
                .new_borrower_id(carol)
                .new_party_email("dave@x.com"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let detail = single(
        engine
            .loan_details(created.loan.id, LoanViewKind::Single)
            .await
            .unwrap(),
    );
    assert_eq!(detail.loan.borrower_user_id(), Some(bob));
    assert_eq!(detail.transactions.len(), 2);
}

#[tokio::test]
async fn transfer_to_registered_borrower_replaces_legs() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let transferred = engine
        .transfer_loan(TransferLoanCmd::new(created.loan.id, alice).new_borrower_id(carol))
        .await
        .unwrap();

    assert_eq!(transferred.loan.borrower_user_id(), Some(carol));
    assert_eq!(transferred.transactions.len(), 2);
    let out_leg = transferred
        .transactions
        .iter()
        .find(|tx| tx.direction == Direction::Out)
        .unwrap();
    let in_leg = transferred
        .transactions
        .iter()
        .find(|tx| tx.direction == Direction::In)
        .unwrap();
    assert_eq!(out_leg.title, "Loan given to Carol");
    assert_eq!(in_leg.title, "Loan received from Alice");
    assert_eq!(in_leg.payer_id, carol);
}

#[tokio::test]
async fn borrower_can_hand_the_lender_side_to_an_email_contact() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let transferred = engine
        .transfer_loan(TransferLoanCmd::new(created.loan.id, bob).new_party_email("eve@x.com"))
        .await
        .unwrap();

    assert_eq!(
        transferred.loan.lender,
        Some(Party::External {
            email: "eve@x.com".to_string()
        })
    );
    assert_eq!(transferred.loan.borrower_user_id(), Some(bob));
    assert_eq!(transferred.transactions.len(), 1);
    assert_eq!(transferred.transactions[0].direction, Direction::In);
    assert_eq!(transferred.transactions[0].payer_id, bob);
    assert_eq!(transferred.transactions[0].title, "Loan with new lender contact");
}

#[tokio::test]
async fn repaid_loans_refuse_transfer() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;
    let carol = seed_user(&db, "Carol", "carol@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();
    engine
        .update_loan(
            created.loan.id,
            LoanPatch::default().status(LoanStatus::Repaid),
            alice,
        )
        .await
        .unwrap();

    let err = engine
        .transfer_loan(TransferLoanCmd::new(created.loan.id, alice).new_borrower_id(carol))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn only_the_lender_can_delete() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;
    let bob = seed_user(&db, "Bob", "bob@example.com").await;

    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            50_000,
            "Rent",
            Utc::now() + Duration::days(14),
            Direction::Out,
        )
        .counterparty_id(bob))
        .await
        .unwrap();

    let err = engine.delete_loan(created.loan.id, bob).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Loan is still live.
    let detail = single(
        engine
            .loan_details(created.loan.id, LoanViewKind::Single)
            .await
            .unwrap(),
    );
    assert!(detail.loan.deleted_at.is_none());

    engine.delete_loan(created.loan.id, alice).await.unwrap();
    let err = engine
        .loan_details(created.loan.id, LoanViewKind::Single)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Deleting again is a plain NotFound, never a second cascade.
    let err = engine.delete_loan(created.loan.id, alice).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn acknowledgement_rules_follow_registration() {
    let (engine, db) = engine_with_db().await;
    let alice = seed_user(&db, "Alice", "alice@example.com").await;

    // One side unregistered: the registered side may acknowledge.
    let created = engine
        .create_loan(LoanCreateCmd::new(
            alice,
            10_000,
            "Lunch",
            Utc::now() + Duration::days(7),
            Direction::Out,
        )
        .counterparty_email("bob@x.com"))
        .await
        .unwrap();
    assert!(!created.loan.is_acknowledged);

    let updated = engine
        .update_loan(
            created.loan.id,
            LoanPatch::default().is_acknowledged(true),
            alice,
        )
        .await
        .unwrap();
    assert!(updated.loan.is_acknowledged);
}
