// ABOUTME: Database storage layer for users, the wand registry, and work orders
// ABOUTME: Owns the atomic conditional update that flips a wand to verified

use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{user, wand, work_order};
use crate::migration::Migrator;
use sea_orm_migration::MigratorTrait;

pub struct Storage {
    pub db: DatabaseConnection,
}

impl Storage {
    pub async fn connect(url: &str) -> Result<Self> {
        let db = Database::connect(url).await?;
        Migrator::up(&db, None).await?;
        Ok(Self { db })
    }

    // --- users ---

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.to_ascii_lowercase()))
            .one(&self.db)
            .await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn create_user(&self, email: &str) -> Result<user::Model, DbErr> {
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_ascii_lowercase()),
            first_name: Set(None),
            last_name: Set(None),
            email_verified: Set(false),
            created_at: Set(chrono::Utc::now().timestamp()),
        };
        model.insert(&self.db).await
    }

    /// Lazily create the account on first sign-in attempt.
    pub async fn get_or_create_user(&self, email: &str) -> Result<user::Model, DbErr> {
        if let Some(user) = self.get_user_by_email(email).await? {
            return Ok(user);
        }
        self.create_user(email).await
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<Option<user::Model>, DbErr> {
        let Some(user) = self.get_user_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: user::ActiveModel = user.into();
        if let Some(first) = first_name {
            active.first_name = Set(Some(first));
        }
        if let Some(last) = last_name {
            active.last_name = Set(Some(last));
        }
        Ok(Some(active.update(&self.db).await?))
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> Result<(), DbErr> {
        user::Entity::update_many()
            .col_expr(user::Column::EmailVerified, Expr::value(true))
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    // --- wand registry ---

    pub async fn get_wand(&self, id: Uuid) -> Result<Option<wand::Model>, DbErr> {
        wand::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn get_wand_with_owner(
        &self,
        id: Uuid,
    ) -> Result<Option<(wand::Model, Option<user::Model>)>, DbErr> {
        wand::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await
    }

    pub async fn unverified_wand_for_user(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<wand::Model>, DbErr> {
        wand::Entity::find()
            .filter(wand::Column::OwnerId.eq(owner_id))
            .filter(wand::Column::Verified.eq(false))
            .one(&self.db)
            .await
    }

    pub async fn insert_wand(
        &self,
        owner_id: Uuid,
        verification_code: &str,
    ) -> Result<wand::Model, DbErr> {
        let model = wand::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(Some(owner_id)),
            verified: Set(false),
            verification_code: Set(Some(verification_code.to_string())),
            created_at: Set(chrono::Utc::now().timestamp()),
        };
        model.insert(&self.db).await
    }

    /// Resolve the owning user's email through the wand relation.
    pub async fn owner_email(&self, wand_id: Uuid) -> Result<Option<String>, DbErr> {
        let pair = self.get_wand_with_owner(wand_id).await?;
        Ok(pair.and_then(|(_, owner)| owner.map(|u| u.email)))
    }

    /// Flip a wand to verified in one conditional update. The filter on the
    /// exact stored code and on `verified = false` makes the transition atomic
    /// under concurrent confirm calls; the code is cleared in the same
    /// statement so it cannot grant pairing again. Returns rows affected.
    pub async fn mark_wand_verified(
        &self,
        wand_id: Uuid,
        stored_code: &str,
    ) -> Result<u64, DbErr> {
        let result = wand::Entity::update_many()
            .col_expr(wand::Column::Verified, Expr::value(true))
            .col_expr(
                wand::Column::VerificationCode,
                Expr::value(Option::<String>::None),
            )
            .filter(wand::Column::Id.eq(wand_id))
            .filter(wand::Column::Verified.eq(false))
            .filter(wand::Column::VerificationCode.eq(stored_code))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    // --- work orders ---

    pub async fn create_work_order(
        &self,
        owner_id: Uuid,
        email_subject: &str,
        email_body: &str,
    ) -> Result<work_order::Model, DbErr> {
        let model = work_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            status: Set(work_order::WorkOrderStatus::Unsent),
            email_subject: Set(email_subject.to_string()),
            email_body: Set(email_body.to_string()),
            created_at: Set(chrono::Utc::now().timestamp()),
        };
        model.insert(&self.db).await
    }

    pub async fn work_orders_for_user(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<work_order::Model>, DbErr> {
        work_order::Entity::find()
            .filter(work_order::Column::OwnerId.eq(owner_id))
            .order_by_asc(work_order::Column::Status)
            .order_by_desc(work_order::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    pub async fn get_work_order(&self, id: Uuid) -> Result<Option<work_order::Model>, DbErr> {
        work_order::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn set_work_order_status(
        &self,
        id: Uuid,
        status: work_order::WorkOrderStatus,
    ) -> Result<Option<work_order::Model>, DbErr> {
        let Some(order) = self.get_work_order(id).await? else {
            return Ok(None);
        };

        let mut active: work_order::ActiveModel = order.into();
        active.status = Set(status);
        Ok(Some(active.update(&self.db).await?))
    }

    pub async fn update_work_order(
        &self,
        id: Uuid,
        email_subject: &str,
        email_body: &str,
    ) -> Result<Option<work_order::Model>, DbErr> {
        let Some(order) = self.get_work_order(id).await? else {
            return Ok(None);
        };

        let mut active: work_order::ActiveModel = order.into();
        active.email_subject = Set(email_subject.to_string());
        active.email_body = Set(email_body.to_string());
        Ok(Some(active.update(&self.db).await?))
    }

    pub async fn delete_work_order(&self, id: Uuid) -> Result<(), DbErr> {
        work_order::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }
}
