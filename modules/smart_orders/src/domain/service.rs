//! Domain service - business logic orchestration

use super::credentials;
use super::events::{EventPublisher, OrderEvent};
use super::lifecycle::{guard_message, Transition};
use super::media::{content_type_for, image_object_name, ObjectStore};
use super::repository::{AccountRepository, DeviceRepository, OrderRepository};
use super::session::SessionStore;
use super::traffic::{calculate_total, infer_category, TrafficDispatcher, TrafficRequest};
use super::validation;
use crate::config::Config;
use crate::contract::{
    Account, AddItemOutcome, CartItemChange, CartSummary, CompletionPolicy, Device, DeviceFilter,
    DeviceInput, NewAccount, Order, OrderDetails, OrderError, OrderFilter, OrderQuery,
    OrderStatus, OrderUpdate, Principal, ProfileUpdate, SessionData, TrafficResult,
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Storage ports the service depends on
pub struct Repositories {
    pub devices: Arc<dyn DeviceRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

/// External collaborators
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub dispatcher: Arc<dyn TrafficDispatcher>,
    pub events: Arc<dyn EventPublisher>,
}

/// Domain service for catalog, accounts, carts and orders
pub struct Service {
    devices: Arc<dyn DeviceRepository>,
    accounts: Arc<dyn AccountRepository>,
    orders: Arc<dyn OrderRepository>,
    sessions: Arc<dyn SessionStore>,
    objects: Arc<dyn ObjectStore>,
    dispatcher: Arc<dyn TrafficDispatcher>,
    events: Arc<dyn EventPublisher>,
    completion_policy: CompletionPolicy,
    callback_token: String,
    session_ttl: Duration,
    pending_timeout: Duration,
}

/// Log a storage failure and hide it behind `Internal`
fn internal(context: &'static str) -> impl FnOnce(anyhow::Error) -> OrderError {
    move |e| {
        tracing::error!(error = %format!("{e:#}"), "{}", context);
        OrderError::Internal
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

impl Service {
    /// Create a new service instance
    pub fn new(repos: Repositories, collaborators: Collaborators, config: &Config) -> Self {
        Self {
            devices: repos.devices,
            accounts: repos.accounts,
            orders: repos.orders,
            sessions: collaborators.sessions,
            objects: collaborators.objects,
            dispatcher: collaborators.dispatcher,
            events: collaborators.events,
            completion_policy: config.completion_policy.into(),
            callback_token: config.traffic.callback_token.clone(),
            session_ttl: config.session_ttl,
            pending_timeout: config.pending_completion_timeout,
        }
    }

    pub fn completion_policy(&self) -> CompletionPolicy {
        self.completion_policy
    }

    async fn publish(&self, event: OrderEvent) {
        let order_id = event.order_id();
        if let Err(e) = self.events.publish(event).await {
            // Events never undo a committed transition
            tracing::warn!(order_id, error = %e, "failed to publish order event");
        }
    }

    fn require_moderator(principal: &Principal) -> Result<(), OrderError> {
        if principal.is_moderator() {
            Ok(())
        } else {
            Err(OrderError::forbidden("moderator role required"))
        }
    }

    fn require_client(principal: &Principal) -> Result<(), OrderError> {
        if principal.is_moderator() {
            Err(OrderError::forbidden("moderators do not have a cart"))
        } else {
            Ok(())
        }
    }

    // ===== Accounts & sessions =====

    /// Register a client account
    pub async fn register(&self, username: &str, password: &str) -> Result<Account, OrderError> {
        self.create_account(username, password, false).await
    }

    /// Create a moderator account (operator bootstrap)
    pub async fn create_moderator(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Account, OrderError> {
        self.create_account(username, password, true).await
    }

    async fn create_account(
        &self,
        username: &str,
        password: &str,
        is_moderator: bool,
    ) -> Result<Account, OrderError> {
        validation::validate_username(username)?;
        validation::validate_password(password)?;

        let username = username.trim().to_string();
        let password_hash =
            credentials::hash_password(password).map_err(internal("failed to hash password"))?;

        let account = self
            .accounts
            .create(&NewAccount {
                username: username.clone(),
                password_hash,
                is_moderator,
            })
            .await
            .map_err(internal("failed to create account"))?
            .ok_or_else(|| OrderError::Conflict {
                reason: format!("username '{}' is already taken", username),
            })?;

        tracing::info!(
            account_id = account.id,
            username = %account.username,
            is_moderator,
            "account registered"
        );
        Ok(account)
    }

    /// Verify credentials and open a session; returns the session token
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(String, Account), OrderError> {
        let invalid = || OrderError::unauthorized("invalid username or password");

        let mut account = self
            .accounts
            .find_by_username(username.trim())
            .await
            .map_err(internal("failed to load account"))?
            .ok_or_else(invalid)?;

        if !account.is_active || !credentials::verify_password(password, &account.password_hash) {
            tracing::warn!(username = %username.trim(), "login rejected");
            return Err(invalid());
        }

        let now = Utc::now();
        self.accounts
            .record_login(account.id, now)
            .await
            .map_err(internal("failed to record login"))?;
        account.last_login = Some(now);

        let token = credentials::new_session_token();
        let session = SessionData {
            account_id: account.id,
            username: account.username.clone(),
            is_moderator: account.is_moderator,
        };
        self.sessions
            .create(&token, session, self.session_ttl)
            .await
            .map_err(internal("failed to store session"))?;

        tracing::info!(account_id = account.id, "session opened");
        Ok((token, account))
    }

    /// Close a session; unknown tokens are ignored
    pub async fn logout(&self, token: &str) -> Result<(), OrderError> {
        self.sessions
            .delete(token)
            .await
            .map_err(internal("failed to delete session"))
    }

    /// Resolve a session token into the caller
    pub async fn authenticate(&self, token: &str) -> Result<Principal, OrderError> {
        if token.is_empty() {
            return Err(OrderError::unauthorized("authentication required"));
        }
        self.sessions
            .get(token)
            .await
            .map_err(internal("failed to read session"))?
            .map(Principal::from)
            .ok_or_else(|| OrderError::unauthorized("session expired or unknown"))
    }

    pub async fn get_account(
        &self,
        principal: &Principal,
        account_id: i32,
    ) -> Result<Account, OrderError> {
        if !principal.can_manage(account_id) {
            return Err(OrderError::forbidden("cannot view another account"));
        }
        self.accounts
            .find_by_id(account_id)
            .await
            .map_err(internal("failed to load account"))?
            .ok_or_else(|| OrderError::not_found("account", account_id))
    }

    /// Change username and/or password.
    ///
    /// Changing one's own password requires the current one. Blank fields are
    /// ignored.
    pub async fn update_profile(
        &self,
        principal: &Principal,
        account_id: i32,
        update: ProfileUpdate,
    ) -> Result<Account, OrderError> {
        let account = self.get_account(principal, account_id).await?;

        let username = update
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty() && *u != account.username);
        if let Some(username) = &username {
            validation::validate_username(username)?;
        }

        let password = update.password.filter(|p| !p.is_empty());
        let password_hash = match password {
            Some(password) => {
                validation::validate_password(&password)?;
                if principal.account_id == account_id {
                    let current = update
                        .current_password
                        .filter(|p| !p.is_empty())
                        .ok_or_else(|| {
                            OrderError::validation("current_password is required to change the password")
                        })?;
                    if !credentials::verify_password(&current, &account.password_hash) {
                        return Err(OrderError::unauthorized("current password is incorrect"));
                    }
                }
                Some(
                    credentials::hash_password(&password)
                        .map_err(internal("failed to hash password"))?,
                )
            }
            None => None,
        };

        if username.is_none() && password_hash.is_none() {
            return Ok(account);
        }

        let updated = self
            .accounts
            .update_profile(account_id, username.clone(), password_hash)
            .await
            .map_err(internal("failed to update account"))?
            .ok_or_else(|| OrderError::Conflict {
                reason: format!(
                    "username '{}' is already taken",
                    username.unwrap_or_default()
                ),
            })?;

        tracing::info!(account_id, "profile updated");
        Ok(updated)
    }

    /// Drop expired sessions from the store
    pub async fn purge_sessions(&self) -> Result<usize, OrderError> {
        self.sessions
            .purge_expired()
            .await
            .map_err(internal("failed to purge sessions"))
    }

    // ===== Catalog =====

    pub async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, OrderError> {
        self.devices
            .list_active(filter)
            .await
            .map_err(internal("failed to list devices"))
    }

    /// Get an active device
    pub async fn get_device(&self, device_id: i32) -> Result<Device, OrderError> {
        self.devices
            .find_by_id(device_id)
            .await
            .map_err(internal("failed to load device"))?
            .filter(|d| d.is_active)
            .ok_or_else(|| OrderError::not_found("device", device_id))
    }

    /// Add a device to the catalog. Without an explicit category it is
    /// inferred from the name.
    pub async fn create_device(
        &self,
        principal: &Principal,
        mut input: DeviceInput,
    ) -> Result<Device, OrderError> {
        Self::require_moderator(principal)?;
        validation::validate_device_input(&input)?;

        input.name = input.name.trim().to_string();
        input.category = Some(input.category.unwrap_or_else(|| infer_category(&input.name)));

        let device = self
            .devices
            .create(&input)
            .await
            .map_err(internal("failed to create device"))?;

        tracing::info!(device_id = device.id, category = %device.category, "device created");
        Ok(device)
    }

    /// Replace a device's editable fields; the category is kept unless given
    pub async fn update_device(
        &self,
        principal: &Principal,
        device_id: i32,
        mut input: DeviceInput,
    ) -> Result<Device, OrderError> {
        Self::require_moderator(principal)?;
        validation::validate_device_input(&input)?;

        let existing = self.get_device(device_id).await?;
        input.name = input.name.trim().to_string();
        input.category = Some(input.category.unwrap_or(existing.category));

        self.devices
            .update(device_id, &input)
            .await
            .map_err(internal("failed to update device"))?
            .ok_or_else(|| OrderError::not_found("device", device_id))
    }

    /// Soft delete a device
    pub async fn delete_device(
        &self,
        principal: &Principal,
        device_id: i32,
    ) -> Result<(), OrderError> {
        Self::require_moderator(principal)?;

        let deactivated = self
            .devices
            .deactivate(device_id)
            .await
            .map_err(internal("failed to delete device"))?;
        if !deactivated {
            return Err(OrderError::not_found("device", device_id));
        }

        tracing::info!(device_id, "device deactivated");
        Ok(())
    }

    /// Store a new image for the device, replacing the previous one
    pub async fn upload_device_image(
        &self,
        principal: &Principal,
        device_id: i32,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Device, OrderError> {
        Self::require_moderator(principal)?;
        if bytes.is_empty() {
            return Err(OrderError::validation("image body is empty"));
        }

        let device = self.get_device(device_id).await?;
        let name = image_object_name(device_id, filename);
        let url = self
            .objects
            .put(&name, bytes, content_type_for(&name))
            .await
            .map_err(|e| {
                tracing::error!(device_id, error = %e, "image upload failed");
                OrderError::Dependency {
                    service: "object_store".to_string(),
                    message: e.to_string(),
                }
            })?;

        let updated = self
            .devices
            .set_image(device_id, Some(name), Some(url))
            .await
            .map_err(internal("failed to store image reference"))?;
        if !updated {
            return Err(OrderError::not_found("device", device_id));
        }

        if let Some(old) = device.image_key {
            self.remove_object(&old).await;
        }

        self.get_device(device_id).await
    }

    /// Remove the device's image
    pub async fn delete_device_image(
        &self,
        principal: &Principal,
        device_id: i32,
    ) -> Result<Device, OrderError> {
        Self::require_moderator(principal)?;

        let device = self.get_device(device_id).await?;
        let Some(key) = device.image_key else {
            return Ok(device);
        };

        self.devices
            .set_image(device_id, None, None)
            .await
            .map_err(internal("failed to clear image reference"))?;
        self.remove_object(&key).await;

        self.get_device(device_id).await
    }

    async fn remove_object(&self, name: &str) {
        if let Err(e) = self.objects.delete(name).await {
            tracing::warn!(object = name, error = %e, "failed to delete stale image");
        }
    }

    // ===== Cart =====

    /// Add `quantity` (default 1) of a device to the caller's draft,
    /// creating the draft on first use
    pub async fn add_item(
        &self,
        principal: &Principal,
        device_id: i32,
        quantity: Option<i32>,
    ) -> Result<CartItemChange, OrderError> {
        Self::require_client(principal)?;
        let quantity = validation::normalize_add_quantity(quantity);
        validation::validate_quantity(quantity)?;

        self.get_device(device_id).await?;

        match self
            .orders
            .add_item(principal.account_id, device_id, quantity)
            .await
            .map_err(internal("failed to add cart item"))?
        {
            AddItemOutcome::Added(change) => {
                tracing::debug!(
                    order_id = change.order_id,
                    device_id,
                    quantity = change.quantity,
                    created = change.created,
                    "cart item added"
                );
                Ok(change)
            }
            AddItemOutcome::DraftContended => {
                tracing::warn!(client_id = principal.account_id, "draft creation contended");
                Err(OrderError::Conflict {
                    reason: "draft order is being created concurrently, retry".to_string(),
                })
            }
            AddItemOutcome::QuantityLimit { current } => Err(OrderError::validation(format!(
                "quantity of device {} would exceed {} (in cart: {})",
                device_id,
                validation::MAX_QUANTITY,
                current
            ))),
        }
    }

    async fn require_draft(&self, principal: &Principal) -> Result<Order, OrderError> {
        self.orders
            .find_draft(principal.account_id)
            .await
            .map_err(internal("failed to load draft"))?
            .ok_or_else(|| OrderError::not_found("cart", principal.account_id))
    }

    /// Overwrite the quantity of a line in the caller's draft
    pub async fn update_item(
        &self,
        principal: &Principal,
        device_id: i32,
        quantity: i32,
    ) -> Result<CartItemChange, OrderError> {
        validation::validate_quantity(quantity)?;
        Self::require_client(principal)?;

        let draft = self.require_draft(principal).await?;
        let updated = self
            .orders
            .set_item_quantity(draft.id, device_id, quantity)
            .await
            .map_err(internal("failed to update cart item"))?;
        if !updated {
            return Err(OrderError::not_found("order_item", device_id));
        }

        Ok(CartItemChange {
            order_id: draft.id,
            device_id,
            quantity,
            created: false,
        })
    }

    /// Remove a line from the caller's draft
    pub async fn remove_item(&self, principal: &Principal, device_id: i32) -> Result<(), OrderError> {
        Self::require_client(principal)?;

        let draft = self.require_draft(principal).await?;
        let removed = self
            .orders
            .remove_item(draft.id, device_id)
            .await
            .map_err(internal("failed to remove cart item"))?;
        if !removed {
            return Err(OrderError::not_found("order_item", device_id));
        }
        Ok(())
    }

    pub async fn cart_summary(&self, principal: &Principal) -> Result<CartSummary, OrderError> {
        let Some(draft) = self
            .orders
            .find_draft(principal.account_id)
            .await
            .map_err(internal("failed to load draft"))?
        else {
            return Ok(CartSummary::default());
        };

        let count = self
            .orders
            .item_count(draft.id)
            .await
            .map_err(internal("failed to count cart items"))?;
        Ok(CartSummary {
            order_id: draft.id,
            count,
        })
    }

    // ===== Orders =====

    /// Order that exists and is not deleted
    async fn load_order(&self, order_id: i32) -> Result<Order, OrderError> {
        self.orders
            .find_by_id(order_id)
            .await
            .map_err(internal("failed to load order"))?
            .filter(|o| o.status != OrderStatus::Deleted)
            .ok_or_else(|| OrderError::not_found("order", order_id))
    }

    /// Order the caller owns or moderates
    async fn load_managed_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<Order, OrderError> {
        let order = self.load_order(order_id).await?;
        if !principal.can_manage(order.client_id) {
            return Err(OrderError::forbidden("order belongs to another client"));
        }
        Ok(order)
    }

    /// Run a transition as one conditional update. When the guard fails the
    /// order is re-read to tell a vanished order from a status conflict.
    async fn apply_transition(
        &self,
        mut order: Order,
        transition: Transition,
    ) -> Result<Order, OrderError> {
        if !transition.can_apply(order.status) {
            return Err(OrderError::validation(guard_message(&transition, order.status)));
        }

        let applied = self
            .orders
            .transition(order.id, &transition)
            .await
            .map_err(internal("failed to update order status"))?;

        if !applied {
            let current = self.load_order(order.id).await?;
            tracing::warn!(
                order_id = order.id,
                transition = transition.name(),
                status = %current.status,
                "transition guard failed"
            );
            return Err(OrderError::validation(guard_message(
                &transition,
                current.status,
            )));
        }

        let from = order.status;
        transition.apply(&mut order);
        tracing::info!(
            order_id = order.id,
            transition = transition.name(),
            from = %from,
            to = %order.status,
            "order transition"
        );
        Ok(order)
    }

    /// Get an order with its lines and participants
    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<OrderDetails, OrderError> {
        let order = self.load_managed_order(principal, order_id).await?;

        let lines = self
            .orders
            .lines(order_id)
            .await
            .map_err(internal("failed to load order lines"))?;

        let client_name = self.username_of(order.client_id).await?.unwrap_or_default();
        let moderator_name = match order.moderator_id {
            Some(id) => self.username_of(id).await?,
            None => None,
        };

        Ok(OrderDetails {
            order,
            client_name,
            moderator_name,
            lines,
        })
    }

    async fn username_of(&self, account_id: i32) -> Result<Option<String>, OrderError> {
        Ok(self
            .accounts
            .find_by_id(account_id)
            .await
            .map_err(internal("failed to load account"))?
            .map(|a| a.username))
    }

    /// Orders visible to the caller.
    ///
    /// Clients see their own orders except deleted ones; moderators see every
    /// order that is neither deleted nor a draft. Dates are inclusive and
    /// compared against the formation day in UTC.
    pub async fn list_orders(
        &self,
        principal: &Principal,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, OrderError> {
        let mut query = OrderQuery {
            status: filter.status,
            formed_from: filter.date_from.map(start_of_day),
            formed_before: filter
                .date_to
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(start_of_day),
            ..Default::default()
        };

        if principal.is_moderator() {
            query.exclude = vec![OrderStatus::Deleted, OrderStatus::Draft];
        } else {
            query.client_id = Some(principal.account_id);
            query.exclude = vec![OrderStatus::Deleted];
        }

        self.orders
            .list(&query)
            .await
            .map_err(internal("failed to list orders"))
    }

    /// Update editable fields of a draft or formed order; blank values are ignored
    pub async fn update_order(
        &self,
        principal: &Principal,
        order_id: i32,
        update: OrderUpdate,
    ) -> Result<Order, OrderError> {
        const EDITABLE: [OrderStatus; 2] = [OrderStatus::Draft, OrderStatus::Formed];

        let mut order = self.load_managed_order(principal, order_id).await?;
        if !EDITABLE.contains(&order.status) {
            return Err(OrderError::validation(format!(
                "only draft or formed orders can be edited (status: {})",
                order.status
            )));
        }

        let Some(address) = update
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
        else {
            return Ok(order);
        };

        let updated = self
            .orders
            .update_address(order_id, &EDITABLE, &address)
            .await
            .map_err(internal("failed to update order"))?;
        if !updated {
            let current = self.load_order(order_id).await?;
            return Err(OrderError::validation(format!(
                "only draft or formed orders can be edited (status: {})",
                current.status
            )));
        }

        order.address = address;
        Ok(order)
    }

    /// Submit a draft
    pub async fn form_order(&self, principal: &Principal, order_id: i32) -> Result<Order, OrderError> {
        let order = self.load_managed_order(principal, order_id).await?;
        let transition = Transition::Form { at: Utc::now() };
        if !transition.can_apply(order.status) {
            return Err(OrderError::validation(guard_message(&transition, order.status)));
        }
        validation::validate_address(&order.address)?;

        let order = self.apply_transition(order, transition).await?;
        self.publish(OrderEvent::formed(&order, principal.account_id))
            .await;
        Ok(order)
    }

    /// Complete a formed order according to the configured policy.
    ///
    /// With the async policy the order is returned in `pending_completion`
    /// and completes when the calculator calls back.
    pub async fn complete_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<Order, OrderError> {
        Self::require_moderator(principal)?;

        let order = self.load_order(order_id).await?;
        if order.status != OrderStatus::Formed {
            return Err(OrderError::validation(format!(
                "only formed orders can be completed (status: {})",
                order.status
            )));
        }

        let lines = self
            .orders
            .lines(order_id)
            .await
            .map_err(internal("failed to load order lines"))?;

        match self.completion_policy {
            CompletionPolicy::Sync => {
                let transition = Transition::Complete {
                    moderator_id: principal.account_id,
                    total_traffic: calculate_total(&lines),
                    at: Utc::now(),
                };
                let order = self.apply_transition(order, transition).await?;
                self.publish(OrderEvent::completed(&order, false)).await;
                Ok(order)
            }
            CompletionPolicy::Async => {
                let transition = Transition::RequestCompletion {
                    moderator_id: principal.account_id,
                    at: Utc::now(),
                };
                let order = self.apply_transition(order, transition).await?;

                let request = TrafficRequest::new(order_id, &lines);
                match self.dispatcher.dispatch(&request).await {
                    Ok(()) => {
                        self.publish(OrderEvent::completion_requested(
                            &order,
                            principal.account_id,
                        ))
                        .await;
                        Ok(order)
                    }
                    Err(e) => {
                        tracing::error!(order_id, error = %e, "traffic calculation dispatch failed");
                        if !self.cancel_completion(order).await {
                            // The calculator may have called back before failing the request
                            let current = self.load_order(order_id).await?;
                            if current.status == OrderStatus::Completed {
                                return Ok(current);
                            }
                        }
                        Err(OrderError::Dependency {
                            service: "traffic_calculator".to_string(),
                            message: e.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// Return a pending order to `formed`; a lost race is only logged
    async fn cancel_completion(&self, order: Order) -> bool {
        let order_id = order.id;
        match self.apply_transition(order, Transition::CancelCompletion).await {
            Ok(order) => {
                self.publish(OrderEvent::completion_cancelled(&order)).await;
                true
            }
            Err(e) => {
                tracing::warn!(order_id, error = %e, "could not revert pending completion");
                false
            }
        }
    }

    /// Reject a formed order
    pub async fn reject_order(
        &self,
        principal: &Principal,
        order_id: i32,
    ) -> Result<Order, OrderError> {
        Self::require_moderator(principal)?;

        let order = self.load_order(order_id).await?;
        let transition = Transition::Reject {
            moderator_id: principal.account_id,
            at: Utc::now(),
        };
        let order = self.apply_transition(order, transition).await?;
        self.publish(OrderEvent::rejected(&order, principal.account_id))
            .await;
        Ok(order)
    }

    /// Soft delete a draft or formed order
    pub async fn delete_order(&self, principal: &Principal, order_id: i32) -> Result<(), OrderError> {
        let order = self.load_managed_order(principal, order_id).await?;
        let order = self.apply_transition(order, Transition::Delete).await?;
        self.publish(OrderEvent::deleted(&order, principal.account_id))
            .await;
        Ok(())
    }

    /// Callback of the external traffic calculator.
    ///
    /// A wrong token is rejected before anything is read. A result for an
    /// order that is already completed changes nothing and returns the order.
    pub async fn apply_traffic_result(&self, result: TrafficResult) -> Result<Order, OrderError> {
        if !credentials::callback_token_matches(&result.token, &self.callback_token) {
            tracing::warn!(order_id = result.order_id, "traffic callback with invalid token");
            return Err(OrderError::unauthorized("invalid callback token"));
        }
        validation::validate_traffic_total(result.total_traffic)?;

        let order = self.load_order(result.order_id).await?;
        if order.status == OrderStatus::Completed {
            tracing::info!(order_id = order.id, "traffic result for completed order ignored");
            return Ok(order);
        }

        let transition = Transition::ApplyTrafficResult {
            total_traffic: result.total_traffic,
            at: Utc::now(),
        };
        match self.apply_transition(order, transition).await {
            Ok(order) => {
                self.publish(OrderEvent::completed(&order, true)).await;
                Ok(order)
            }
            Err(OrderError::Validation { message }) => {
                // A concurrent callback may have completed it first
                let current = self.load_order(result.order_id).await?;
                if current.status == OrderStatus::Completed {
                    Ok(current)
                } else {
                    Err(OrderError::Validation { message })
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Revert orders stuck in `pending_completion` past the timeout.
    /// Returns how many were reverted.
    pub async fn sweep_pending(&self, now: DateTime<Utc>) -> Result<usize, OrderError> {
        let Some(cutoff) = chrono::Duration::from_std(self.pending_timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout))
        else {
            return Ok(0);
        };

        let stale = self
            .orders
            .list(&OrderQuery {
                status: Some(OrderStatus::PendingCompletion),
                requested_before: Some(cutoff),
                ..Default::default()
            })
            .await
            .map_err(internal("failed to list pending orders"))?;

        let mut reverted = 0;
        for order in stale {
            tracing::warn!(
                order_id = order.id,
                requested_at = ?order.completion_requested_at,
                "traffic callback timed out"
            );
            if self.cancel_completion(order).await {
                reverted += 1;
            }
        }
        Ok(reverted)
    }
}
