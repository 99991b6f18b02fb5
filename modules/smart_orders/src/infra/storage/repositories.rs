//! SeaORM repository implementations

use crate::contract::{
    Account, AddItemOutcome, CartItemChange, Device, DeviceFilter, DeviceInput, NewAccount,
    Order, OrderLine, OrderQuery, OrderStatus,
};
use crate::domain::lifecycle::Transition;
use crate::domain::repository::{AccountRepository, DeviceRepository, OrderRepository};
use crate::domain::validation::MAX_QUANTITY;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Func, OnConflict};
use sea_orm::{
    prelude::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbBackend, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect, SqlErr, TransactionTrait,
};
use std::sync::Arc;

use super::entity::{account, device, order, order_item};
use super::mapper::{apply_device_input, to_order_line};

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn status_names(statuses: &[OrderStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

// ===== Device Repository =====

pub struct SeaOrmDeviceRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmDeviceRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_active_model(&self, device_id: i32) -> Result<Option<device::Model>> {
        Ok(device::Entity::find_by_id(device_id)
            .filter(device::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?)
    }
}

#[async_trait]
impl DeviceRepository for SeaOrmDeviceRepository {
    async fn create(&self, input: &DeviceInput) -> Result<Device> {
        let category = input
            .category
            .ok_or_else(|| anyhow!("device category must be resolved before insert"))?;

        let mut active = device::ActiveModel {
            category: Set(category.as_str().to_string()),
            image_key: Set(None),
            image_url: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        apply_device_input(&mut active, input);

        let model = active.insert(&*self.db).await?;
        Ok(model.into())
    }

    async fn find_by_id(&self, device_id: i32) -> Result<Option<Device>> {
        let result = device::Entity::find_by_id(device_id).one(&*self.db).await?;
        Ok(result.map(Into::into))
    }

    async fn list_active(&self, filter: &DeviceFilter) -> Result<Vec<Device>> {
        let mut query = device::Entity::find().filter(device::Column::IsActive.eq(true));

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((device::Entity, device::Column::Name))))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            device::Entity,
                            device::Column::Description,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        if let Some(protocol) = filter.protocol.as_deref().map(str::trim).filter(|s| !s.is_empty())
        {
            query = query.filter(device::Column::Protocol.eq(protocol));
        }

        let results = query
            .order_by_asc(device::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn update(&self, device_id: i32, input: &DeviceInput) -> Result<Option<Device>> {
        let Some(model) = self.find_active_model(device_id).await? else {
            return Ok(None);
        };

        let mut active = model.into_active_model();
        apply_device_input(&mut active, input);
        let updated = active.update(&*self.db).await?;

        Ok(Some(updated.into()))
    }

    async fn deactivate(&self, device_id: i32) -> Result<bool> {
        let result = device::Entity::update_many()
            .col_expr(device::Column::IsActive, Expr::value(false))
            .filter(device::Column::Id.eq(device_id))
            .filter(device::Column::IsActive.eq(true))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn set_image(
        &self,
        device_id: i32,
        image_key: Option<String>,
        image_url: Option<String>,
    ) -> Result<bool> {
        let result = device::Entity::update_many()
            .col_expr(device::Column::ImageKey, Expr::value(image_key))
            .col_expr(device::Column::ImageUrl, Expr::value(image_url))
            .filter(device::Column::Id.eq(device_id))
            .filter(device::Column::IsActive.eq(true))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

// ===== Account Repository =====

pub struct SeaOrmAccountRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmAccountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountRepository for SeaOrmAccountRepository {
    async fn create(&self, new_account: &NewAccount) -> Result<Option<Account>> {
        let active = account::ActiveModel {
            username: Set(new_account.username.clone()),
            password_hash: Set(new_account.password_hash.clone()),
            is_moderator: Set(new_account.is_moderator),
            is_active: Set(true),
            last_login: Set(None),
            date_joined: Set(Utc::now()),
            ..Default::default()
        };

        match active.insert(&*self.db).await {
            Ok(model) => Ok(Some(model.into())),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, account_id: i32) -> Result<Option<Account>> {
        let result = account::Entity::find_by_id(account_id)
            .one(&*self.db)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let result = account::Entity::find()
            .filter(account::Column::Username.eq(username))
            .one(&*self.db)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn update_profile(
        &self,
        account_id: i32,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> Result<Option<Account>> {
        if username.is_none() && password_hash.is_none() {
            return self.find_by_id(account_id).await;
        }

        let mut update = account::Entity::update_many().filter(account::Column::Id.eq(account_id));
        if let Some(username) = username {
            update = update.col_expr(account::Column::Username, Expr::value(username));
        }
        if let Some(hash) = password_hash {
            update = update.col_expr(account::Column::PasswordHash, Expr::value(hash));
        }

        match update.exec(&*self.db).await {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(account_id)
            .await?
            .map(Some)
            .ok_or_else(|| anyhow!("account {} disappeared during update", account_id))
    }

    async fn record_login(&self, account_id: i32, at: DateTime<Utc>) -> Result<()> {
        account::Entity::update_many()
            .col_expr(account::Column::LastLogin, Expr::value(at))
            .filter(account::Column::Id.eq(account_id))
            .exec(&*self.db)
            .await?;

        Ok(())
    }
}

// ===== Order Repository =====

pub struct SeaOrmOrderRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmOrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// The client's draft; row-locked on backends that support it
async fn select_draft<C: ConnectionTrait>(conn: &C, client_id: i32) -> Result<Option<order::Model>> {
    let mut query = order::Entity::find().filter(order::Column::DraftClientId.eq(client_id));
    if conn.get_database_backend() == DbBackend::Postgres {
        query = query.lock_exclusive();
    }
    Ok(query.one(conn).await?)
}

#[async_trait]
impl OrderRepository for SeaOrmOrderRepository {
    async fn find_by_id(&self, order_id: i32) -> Result<Option<Order>> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn find_draft(&self, client_id: i32) -> Result<Option<Order>> {
        order::Entity::find()
            .filter(order::Column::DraftClientId.eq(client_id))
            .one(&*self.db)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    async fn add_item(
        &self,
        client_id: i32,
        device_id: i32,
        quantity: i32,
    ) -> Result<AddItemOutcome> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let draft = match select_draft(&txn, client_id).await? {
            Some(draft) => draft,
            None => {
                let draft = order::ActiveModel {
                    status: Set(OrderStatus::Draft.as_str().to_string()),
                    client_id: Set(client_id),
                    draft_client_id: Set(Some(client_id)),
                    address: Set(String::new()),
                    created_at: Set(now),
                    formed_at: Set(None),
                    completed_at: Set(None),
                    completion_requested_at: Set(None),
                    moderator_id: Set(None),
                    total_traffic: Set(0.0),
                    traffic_calculated: Set(false),
                    ..Default::default()
                };

                // A concurrent insert wins the unique draft slot; read its row instead
                order::Entity::insert(draft)
                    .on_conflict(
                        OnConflict::column(order::Column::DraftClientId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(&txn)
                    .await?;

                match select_draft(&txn, client_id).await? {
                    Some(draft) => draft,
                    None => {
                        txn.rollback().await?;
                        return Ok(AddItemOutcome::DraftContended);
                    }
                }
            }
        };

        let existing = order_item::Entity::find_by_id((draft.id, device_id))
            .one(&txn)
            .await?;

        let line = order_item::ActiveModel {
            order_id: Set(draft.id),
            device_id: Set(device_id),
            quantity: Set(quantity),
            created_at: Set(now),
        };
        let merged = Expr::col((order_item::Entity, order_item::Column::Quantity))
            .add(Expr::col((Alias::new("excluded"), order_item::Column::Quantity)));
        let written = order_item::Entity::insert(line)
            .on_conflict(
                OnConflict::columns([order_item::Column::OrderId, order_item::Column::DeviceId])
                    .value(order_item::Column::Quantity, merged.clone())
                    .action_and_where(Expr::expr(merged).lte(MAX_QUANTITY))
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if written == 0 {
            txn.rollback().await?;
            return Ok(AddItemOutcome::QuantityLimit {
                current: existing.map(|l| l.quantity).unwrap_or_default(),
            });
        }

        let line = order_item::Entity::find_by_id((draft.id, device_id))
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow!("line ({}, {}) missing after upsert", draft.id, device_id))?;

        txn.commit().await?;

        Ok(AddItemOutcome::Added(CartItemChange {
            order_id: draft.id,
            device_id,
            quantity: line.quantity,
            created: existing.is_none(),
        }))
    }

    async fn set_item_quantity(&self, order_id: i32, device_id: i32, quantity: i32) -> Result<bool> {
        let result = order_item::Entity::update_many()
            .col_expr(order_item::Column::Quantity, Expr::value(quantity))
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::DeviceId.eq(device_id))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn remove_item(&self, order_id: i32, device_id: i32) -> Result<bool> {
        let result = order_item::Entity::delete_by_id((order_id, device_id))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn lines(&self, order_id: i32) -> Result<Vec<OrderLine>> {
        let rows = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(device::Entity)
            .order_by_asc(order_item::Column::CreatedAt)
            .order_by_asc(order_item::Column::DeviceId)
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(item, device)| {
                let device = device
                    .ok_or_else(|| anyhow!("device {} of order {} missing", item.device_id, order_id))?;
                Ok(to_order_line(item, device))
            })
            .collect()
    }

    async fn item_count(&self, order_id: i32) -> Result<i64> {
        let total: Option<Option<i64>> = order_item::Entity::find()
            .select_only()
            .column_as(Expr::col(order_item::Column::Quantity).sum(), "total")
            .filter(order_item::Column::OrderId.eq(order_id))
            .into_tuple::<Option<i64>>()
            .one(&*self.db)
            .await?;

        Ok(total.flatten().unwrap_or(0))
    }

    async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut select = order::Entity::find();

        if let Some(client_id) = query.client_id {
            select = select.filter(order::Column::ClientId.eq(client_id));
        }
        if !query.exclude.is_empty() {
            select = select.filter(order::Column::Status.is_not_in(status_names(&query.exclude)));
        }
        if let Some(status) = query.status {
            select = select.filter(order::Column::Status.eq(status.as_str()));
        }
        if let Some(from) = query.formed_from {
            select = select.filter(order::Column::FormedAt.gte(from));
        }
        if let Some(before) = query.formed_before {
            select = select.filter(order::Column::FormedAt.lt(before));
        }
        if let Some(before) = query.requested_before {
            select = select.filter(order::Column::CompletionRequestedAt.lt(before));
        }

        select
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn update_address(
        &self,
        order_id: i32,
        allowed: &[OrderStatus],
        address: &str,
    ) -> Result<bool> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::Address, Expr::value(address))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in(status_names(allowed)))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn transition(&self, order_id: i32, transition: &Transition) -> Result<bool> {
        let none_at: Option<DateTime<Utc>> = None;
        let none_id: Option<i32> = None;

        // Every transition leaves `draft`, which frees the client's draft slot
        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(transition.target().as_str()))
            .col_expr(order::Column::DraftClientId, Expr::value(none_id))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in(status_names(transition.allowed_from())));

        update = match *transition {
            Transition::Form { at } => update.col_expr(order::Column::FormedAt, Expr::value(at)),
            Transition::Complete {
                moderator_id,
                total_traffic,
                at,
            } => update
                .col_expr(order::Column::ModeratorId, Expr::value(moderator_id))
                .col_expr(order::Column::TotalTraffic, Expr::value(total_traffic))
                .col_expr(order::Column::TrafficCalculated, Expr::value(true))
                .col_expr(order::Column::CompletedAt, Expr::value(at))
                .col_expr(order::Column::CompletionRequestedAt, Expr::value(none_at)),
            Transition::RequestCompletion { moderator_id, at } => update
                .col_expr(order::Column::ModeratorId, Expr::value(moderator_id))
                .col_expr(order::Column::CompletionRequestedAt, Expr::value(at)),
            Transition::CancelCompletion => update
                .col_expr(order::Column::ModeratorId, Expr::value(none_id))
                .col_expr(order::Column::CompletionRequestedAt, Expr::value(none_at)),
            Transition::ApplyTrafficResult { total_traffic, at } => update
                .col_expr(order::Column::TotalTraffic, Expr::value(total_traffic))
                .col_expr(order::Column::TrafficCalculated, Expr::value(true))
                .col_expr(order::Column::CompletedAt, Expr::value(at))
                .col_expr(order::Column::CompletionRequestedAt, Expr::value(none_at)),
            Transition::Reject { moderator_id, at } => update
                .col_expr(order::Column::ModeratorId, Expr::value(moderator_id))
                .col_expr(order::Column::CompletedAt, Expr::value(at)),
            Transition::Delete => update,
        };

        let result = update.exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
