// ABOUTME: Tests for the storage layer and the pairing state machine
// ABOUTME: Each test runs against a fresh tempfile-backed sqlite database

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Database, Set};
    use sea_orm_migration::MigratorTrait;
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::entities::{wand, work_order};
    use crate::error::AppError;
    use crate::pairing;
    use crate::storage::Storage;

    async fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let db = Database::connect(&db_url).await.unwrap();
        crate::migration::Migrator::up(&db, None).await.unwrap();

        (Storage { db }, temp_dir)
    }

    // Insert a wand with no owner, which the normal flow never produces
    async fn insert_orphan_wand(storage: &Storage, code: &str) -> wand::Model {
        let model = wand::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(None),
            verified: Set(false),
            verification_code: Set(Some(code.to_string())),
            created_at: Set(chrono::Utc::now().timestamp()),
        };
        model.insert(&storage.db).await.unwrap()
    }

    #[tokio::test]
    async fn test_user_email_is_normalized() {
        let (storage, _temp_dir) = create_test_storage().await;

        let user = storage.create_user("Alice@Example.COM").await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let found = storage
            .get_user_by_email("ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let (storage, _temp_dir) = create_test_storage().await;

        let first = storage.get_or_create_user("bob@example.com").await.unwrap();
        let second = storage.get_or_create_user("Bob@Example.com").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_update_profile_is_partial() {
        let (storage, _temp_dir) = create_test_storage().await;

        let user = storage.create_user("carol@example.com").await.unwrap();
        let updated = storage
            .update_profile(user.id, Some("Carol".to_string()), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Carol"));
        assert_eq!(updated.last_name, None);

        let updated = storage
            .update_profile(user.id, None, Some("Jones".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Carol"));
        assert_eq!(updated.last_name.as_deref(), Some("Jones"));
    }

    #[tokio::test]
    async fn test_pending_wand_is_idempotent() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();

        let first = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();
        let second = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.verification_code, second.verification_code);
        assert!(!first.verified);
        assert!(first.verification_code.is_some());
    }

    #[tokio::test]
    async fn test_confirm_flips_wand_and_clears_code() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();
        let wand = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        let code = wand.verification_code.clone().unwrap();
        let verified = pairing::confirm(&storage, wand.id, &code).await.unwrap();

        assert!(verified.verified);
        assert_eq!(verified.verification_code, None);
    }

    #[tokio::test]
    async fn test_confirm_accepts_spoken_initials() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();
        let wand = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        let code = wand.verification_code.clone().unwrap();
        let candidate =
            pairing::extract_candidate_code(&format!("associate {}", code.replace('-', " ")));
        let verified = pairing::confirm(&storage, wand.id, &candidate).await.unwrap();
        assert!(verified.verified);
    }

    #[tokio::test]
    async fn test_confirm_rejects_wrong_code() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();
        let wand = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        let result = pairing::confirm(&storage, wand.id, "ZZZZZZ").await;
        assert!(matches!(result, Err(AppError::InvalidCode)));

        // A failed attempt leaves the wand pending with its code intact
        let current = storage.get_wand(wand.id).await.unwrap().unwrap();
        assert!(!current.verified);
        assert_eq!(current.verification_code, wand.verification_code);
    }

    #[tokio::test]
    async fn test_confirm_twice_reports_already_verified() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();
        let wand = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        let code = wand.verification_code.clone().unwrap();
        pairing::confirm(&storage, wand.id, &code).await.unwrap();

        let result = pairing::confirm(&storage, wand.id, &code).await;
        assert!(matches!(result, Err(AppError::AlreadyVerified)));
    }

    #[tokio::test]
    async fn test_confirm_unknown_wand_is_not_found() {
        let (storage, _temp_dir) = create_test_storage().await;

        let result = pairing::confirm(&storage, Uuid::new_v4(), "ABCD").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_confirm_ownerless_wand_is_forbidden() {
        let (storage, _temp_dir) = create_test_storage().await;
        let wand = insert_orphan_wand(&storage, "able-baker").await;

        // Ownership is checked before the code, so even the right code fails
        let result = pairing::confirm(&storage, wand.id, "able-baker").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_verification_after_confirm_makes_new_pending_wand() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();

        let first = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();
        let code = first.verification_code.clone().unwrap();
        pairing::confirm(&storage, first.id, &code).await.unwrap();

        let second = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_owner_email_through_relation() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("owner@example.com").await.unwrap();
        let wand = pairing::get_or_create_pending_wand(&storage, user.id)
            .await
            .unwrap();

        let email = storage.owner_email(wand.id).await.unwrap();
        assert_eq!(email.as_deref(), Some("owner@example.com"));

        let orphan = insert_orphan_wand(&storage, "x").await;
        assert_eq!(storage.owner_email(orphan.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mark_wand_verified_requires_exact_stored_code() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();
        let wand = storage.insert_wand(user.id, "able-baker-cat").await.unwrap();

        assert_eq!(
            storage.mark_wand_verified(wand.id, "wrong-code").await.unwrap(),
            0
        );
        assert_eq!(
            storage
                .mark_wand_verified(wand.id, "able-baker-cat")
                .await
                .unwrap(),
            1
        );
        // Second attempt loses the conditional update
        assert_eq!(
            storage
                .mark_wand_verified(wand.id, "able-baker-cat")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_work_order_lifecycle() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();

        let order = storage
            .create_work_order(user.id, "Broken light", "The hallway light is out.")
            .await
            .unwrap();
        assert_eq!(order.status, work_order::WorkOrderStatus::Unsent);

        let pending = storage
            .set_work_order_status(order.id, work_order::WorkOrderStatus::Pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.status, work_order::WorkOrderStatus::Pending);

        let done = storage
            .set_work_order_status(order.id, work_order::WorkOrderStatus::Done)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, work_order::WorkOrderStatus::Done);

        storage.delete_work_order(order.id).await.unwrap();
        assert!(storage.get_work_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_work_orders_sorted_by_status_then_recency() {
        let (storage, _temp_dir) = create_test_storage().await;
        let user = storage.create_user("dev@example.com").await.unwrap();

        let a = storage
            .create_work_order(user.id, "A", "body")
            .await
            .unwrap();
        let b = storage
            .create_work_order(user.id, "B", "body")
            .await
            .unwrap();
        storage
            .set_work_order_status(a.id, work_order::WorkOrderStatus::Done)
            .await
            .unwrap();

        let orders = storage.work_orders_for_user(user.id).await.unwrap();
        assert_eq!(orders.len(), 2);
        // "done" sorts before "unsent" lexicographically
        assert_eq!(orders[0].id, a.id);
        assert_eq!(orders[1].id, b.id);
    }

    #[tokio::test]
    async fn test_work_orders_scoped_to_owner() {
        let (storage, _temp_dir) = create_test_storage().await;
        let alice = storage.create_user("alice@example.com").await.unwrap();
        let bob = storage.create_user("bob@example.com").await.unwrap();

        storage
            .create_work_order(alice.id, "Alice's order", "body")
            .await
            .unwrap();

        assert_eq!(storage.work_orders_for_user(bob.id).await.unwrap().len(), 0);
        assert_eq!(
            storage.work_orders_for_user(alice.id).await.unwrap().len(),
            1
        );
    }
}
