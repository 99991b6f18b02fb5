//! Shared mocks and fixtures for the smart orders integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use smart_orders::config::{CompletionPolicyConfig, Config, TrafficConfig};
use smart_orders::contract::{
    Account, AddItemOutcome, CartItemChange, Device, DeviceFilter, DeviceInput, NewAccount,
    Order, OrderLine, OrderQuery, OrderStatus, Principal,
};
use smart_orders::domain::{
    AccountRepository, Collaborators, DeviceRepository, DispatchError, EventPublisher,
    OrderEvent, OrderRepository, Repositories, Service, TrafficDispatcher, TrafficRequest,
    Transition,
};
use smart_orders::domain::validation::MAX_QUANTITY;
use smart_orders::infra::media::InMemoryObjectStore;
use smart_orders::infra::session::InMemorySessionStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const CALLBACK_TOKEN: &str = "calc-secret";

pub fn print_test_header(test_name: &str, purpose: &str) {
    println!("\n🧪 TEST: {}", test_name);
    println!("📋 PURPOSE: {}", purpose);
}

pub fn test_config(policy: CompletionPolicyConfig) -> Config {
    Config {
        completion_policy: policy,
        traffic: TrafficConfig {
            callback_token: CALLBACK_TOKEN.to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn device_input(name: &str, data_per_hour: f64) -> DeviceInput {
    DeviceInput {
        name: name.to_string(),
        model: format!("{} v1", name),
        avg_data_rate: 12.5,
        data_per_hour,
        description: format!("{} for a smart home", name),
        description_all: String::new(),
        protocol: "Zigbee".to_string(),
        category: None,
    }
}

// ===== Mock repositories =====

#[derive(Default)]
pub struct MockDeviceRepo {
    data: RwLock<BTreeMap<i32, Device>>,
}

impl MockDeviceRepo {
    pub fn get(&self, device_id: i32) -> Option<Device> {
        self.data.read().get(&device_id).cloned()
    }
}

#[async_trait]
impl DeviceRepository for MockDeviceRepo {
    async fn create(&self, input: &DeviceInput) -> anyhow::Result<Device> {
        let mut data = self.data.write();
        let id = data.keys().next_back().copied().unwrap_or(0) + 1;
        let device = Device {
            id,
            name: input.name.clone(),
            model: input.model.clone(),
            avg_data_rate: input.avg_data_rate,
            data_per_hour: input.data_per_hour,
            image_key: None,
            image_url: None,
            description: input.description.clone(),
            description_all: input.description_all.clone(),
            protocol: input.protocol.clone(),
            category: input
                .category
                .ok_or_else(|| anyhow::anyhow!("category must be resolved"))?,
            is_active: true,
            created_at: Utc::now(),
        };
        data.insert(id, device.clone());
        Ok(device)
    }

    async fn find_by_id(&self, device_id: i32) -> anyhow::Result<Option<Device>> {
        Ok(self.get(device_id))
    }

    async fn list_active(&self, filter: &DeviceFilter) -> anyhow::Result<Vec<Device>> {
        let search = filter.search.as_deref().map(str::to_lowercase);
        Ok(self
            .data
            .read()
            .values()
            .filter(|d| d.is_active)
            .filter(|d| match &search {
                Some(s) => {
                    d.name.to_lowercase().contains(s) || d.description.to_lowercase().contains(s)
                }
                None => true,
            })
            .filter(|d| match &filter.protocol {
                Some(p) => &d.protocol == p,
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn update(&self, device_id: i32, input: &DeviceInput) -> anyhow::Result<Option<Device>> {
        let mut data = self.data.write();
        let Some(device) = data.get_mut(&device_id).filter(|d| d.is_active) else {
            return Ok(None);
        };
        device.name = input.name.clone();
        device.model = input.model.clone();
        device.avg_data_rate = input.avg_data_rate;
        device.data_per_hour = input.data_per_hour;
        device.description = input.description.clone();
        device.description_all = input.description_all.clone();
        device.protocol = input.protocol.clone();
        if let Some(category) = input.category {
            device.category = category;
        }
        Ok(Some(device.clone()))
    }

    async fn deactivate(&self, device_id: i32) -> anyhow::Result<bool> {
        let mut data = self.data.write();
        match data.get_mut(&device_id).filter(|d| d.is_active) {
            Some(device) => {
                device.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_image(
        &self,
        device_id: i32,
        image_key: Option<String>,
        image_url: Option<String>,
    ) -> anyhow::Result<bool> {
        let mut data = self.data.write();
        match data.get_mut(&device_id).filter(|d| d.is_active) {
            Some(device) => {
                device.image_key = image_key;
                device.image_url = image_url;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MockAccountRepo {
    data: RwLock<BTreeMap<i32, Account>>,
}

impl MockAccountRepo {
    /// Insert an account directly, skipping password hashing
    pub fn seed(&self, username: &str, is_moderator: bool) -> Principal {
        let mut data = self.data.write();
        let id = data.keys().next_back().copied().unwrap_or(0) + 1;
        data.insert(
            id,
            Account {
                id,
                username: username.to_string(),
                password_hash: "not-a-phc-string".to_string(),
                is_moderator,
                is_active: true,
                last_login: None,
                date_joined: Utc::now(),
            },
        );
        if is_moderator {
            Principal::moderator(id, username)
        } else {
            Principal::client(id, username)
        }
    }

    pub fn deactivate(&self, account_id: i32) {
        if let Some(account) = self.data.write().get_mut(&account_id) {
            account.is_active = false;
        }
    }

    pub fn get(&self, account_id: i32) -> Option<Account> {
        self.data.read().get(&account_id).cloned()
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepo {
    async fn create(&self, account: &NewAccount) -> anyhow::Result<Option<Account>> {
        let mut data = self.data.write();
        if data.values().any(|a| a.username == account.username) {
            return Ok(None);
        }
        let id = data.keys().next_back().copied().unwrap_or(0) + 1;
        let created = Account {
            id,
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            is_moderator: account.is_moderator,
            is_active: true,
            last_login: None,
            date_joined: Utc::now(),
        };
        data.insert(id, created.clone());
        Ok(Some(created))
    }

    async fn find_by_id(&self, account_id: i32) -> anyhow::Result<Option<Account>> {
        Ok(self.get(account_id))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<Account>> {
        Ok(self
            .data
            .read()
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn update_profile(
        &self,
        account_id: i32,
        username: Option<String>,
        password_hash: Option<String>,
    ) -> anyhow::Result<Option<Account>> {
        let mut data = self.data.write();
        if let Some(name) = &username {
            if data
                .values()
                .any(|a| a.id != account_id && &a.username == name)
            {
                return Ok(None);
            }
        }
        let Some(account) = data.get_mut(&account_id) else {
            return Ok(None);
        };
        if let Some(name) = username {
            account.username = name;
        }
        if let Some(hash) = password_hash {
            account.password_hash = hash;
        }
        Ok(Some(account.clone()))
    }

    async fn record_login(&self, account_id: i32, at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(account) = self.data.write().get_mut(&account_id) {
            account.last_login = Some(at);
        }
        Ok(())
    }
}

#[derive(Default)]
struct OrderState {
    orders: BTreeMap<i32, Order>,
    /// (order_id, device_id) -> quantity
    items: BTreeMap<(i32, i32), i32>,
}

/// Orders and lines behind one lock, standing in for a transaction
pub struct MockOrderRepo {
    state: Mutex<OrderState>,
    devices: Arc<MockDeviceRepo>,
}

impl MockOrderRepo {
    pub fn new(devices: Arc<MockDeviceRepo>) -> Self {
        Self {
            state: Mutex::new(OrderState::default()),
            devices,
        }
    }

    pub fn get(&self, order_id: i32) -> Option<Order> {
        self.state.lock().orders.get(&order_id).cloned()
    }

    pub fn drafts_of(&self, client_id: i32) -> usize {
        self.state
            .lock()
            .orders
            .values()
            .filter(|o| o.client_id == client_id && o.status == OrderStatus::Draft)
            .count()
    }

    pub fn quantity(&self, order_id: i32, device_id: i32) -> Option<i32> {
        self.state.lock().items.get(&(order_id, device_id)).copied()
    }

    /// Rewrite an order in place, for setting up timestamps
    pub fn modify(&self, order_id: i32, f: impl FnOnce(&mut Order)) {
        if let Some(order) = self.state.lock().orders.get_mut(&order_id) {
            f(order);
        }
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepo {
    async fn find_by_id(&self, order_id: i32) -> anyhow::Result<Option<Order>> {
        Ok(self.get(order_id))
    }

    async fn find_draft(&self, client_id: i32) -> anyhow::Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .orders
            .values()
            .find(|o| o.client_id == client_id && o.status == OrderStatus::Draft)
            .cloned())
    }

    async fn add_item(
        &self,
        client_id: i32,
        device_id: i32,
        quantity: i32,
    ) -> anyhow::Result<AddItemOutcome> {
        let mut state = self.state.lock();
        let existing = state
            .orders
            .values()
            .find(|o| o.client_id == client_id && o.status == OrderStatus::Draft)
            .map(|o| o.id);

        let order_id = match existing {
            Some(id) => id,
            None => {
                let id = state.orders.keys().next_back().copied().unwrap_or(0) + 1;
                state.orders.insert(
                    id,
                    Order {
                        id,
                        status: OrderStatus::Draft,
                        client_id,
                        address: String::new(),
                        created_at: Utc::now(),
                        formed_at: None,
                        completed_at: None,
                        completion_requested_at: None,
                        moderator_id: None,
                        total_traffic: 0.0,
                        traffic_calculated: false,
                    },
                );
                id
            }
        };

        let existed = state.items.contains_key(&(order_id, device_id));
        let line = state.items.entry((order_id, device_id)).or_insert(0);
        if *line + quantity > MAX_QUANTITY {
            return Ok(AddItemOutcome::QuantityLimit { current: *line });
        }
        *line += quantity;

        Ok(AddItemOutcome::Added(CartItemChange {
            order_id,
            device_id,
            quantity: *line,
            created: !existed,
        }))
    }

    async fn set_item_quantity(
        &self,
        order_id: i32,
        device_id: i32,
        quantity: i32,
    ) -> anyhow::Result<bool> {
        match self.state.lock().items.get_mut(&(order_id, device_id)) {
            Some(line) => {
                *line = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_item(&self, order_id: i32, device_id: i32) -> anyhow::Result<bool> {
        Ok(self
            .state
            .lock()
            .items
            .remove(&(order_id, device_id))
            .is_some())
    }

    async fn lines(&self, order_id: i32) -> anyhow::Result<Vec<OrderLine>> {
        let items: Vec<(i32, i32)> = self
            .state
            .lock()
            .items
            .iter()
            .filter(|((o, _), _)| *o == order_id)
            .map(|((_, d), q)| (*d, *q))
            .collect();

        items
            .into_iter()
            .map(|(device_id, quantity)| {
                let device = self
                    .devices
                    .get(device_id)
                    .ok_or_else(|| anyhow::anyhow!("device {} missing", device_id))?;
                Ok(OrderLine {
                    device_id,
                    device_name: device.name,
                    quantity,
                    data_per_hour: device.data_per_hour,
                    category: device.category,
                    image_url: device.image_url,
                })
            })
            .collect()
    }

    async fn item_count(&self, order_id: i32) -> anyhow::Result<i64> {
        Ok(self
            .state
            .lock()
            .items
            .iter()
            .filter(|((o, _), _)| *o == order_id)
            .map(|(_, q)| i64::from(*q))
            .sum())
    }

    async fn list(&self, query: &OrderQuery) -> anyhow::Result<Vec<Order>> {
        let state = self.state.lock();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| query.client_id.is_none_or(|c| o.client_id == c))
            .filter(|o| !query.exclude.contains(&o.status))
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| match query.formed_from {
                Some(from) => o.formed_at.is_some_and(|f| f >= from),
                None => true,
            })
            .filter(|o| match query.formed_before {
                Some(before) => o.formed_at.is_some_and(|f| f < before),
                None => true,
            })
            .filter(|o| match query.requested_before {
                Some(before) => o.completion_requested_at.is_some_and(|r| r < before),
                None => true,
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_address(
        &self,
        order_id: i32,
        allowed: &[OrderStatus],
        address: &str,
    ) -> anyhow::Result<bool> {
        let mut state = self.state.lock();
        match state
            .orders
            .get_mut(&order_id)
            .filter(|o| allowed.contains(&o.status))
        {
            Some(order) => {
                order.address = address.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn transition(&self, order_id: i32, transition: &Transition) -> anyhow::Result<bool> {
        let mut state = self.state.lock();
        match state
            .orders
            .get_mut(&order_id)
            .filter(|o| transition.can_apply(o.status))
        {
            Some(order) => {
                transition.apply(order);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ===== Mock collaborators =====

#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<TrafficRequest>>,
}

impl RecordingDispatcher {
    pub fn requests(&self) -> Vec<TrafficRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TrafficDispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: &TrafficRequest) -> Result<(), DispatchError> {
        self.requests.lock().push(request.clone());
        Ok(())
    }
}

/// Dispatcher whose calculator is always down
pub struct FailingDispatcher;

#[async_trait]
impl TrafficDispatcher for FailingDispatcher {
    async fn dispatch(&self, _request: &TrafficRequest) -> Result<(), DispatchError> {
        Err(DispatchError::Network("connection refused".to_string()))
    }
}

/// Dispatcher that completes the order as the calculator callback would,
/// then reports a transport failure
pub struct CallbackThenFailDispatcher {
    orders: Arc<MockOrderRepo>,
    total_traffic: f64,
}

#[async_trait]
impl TrafficDispatcher for CallbackThenFailDispatcher {
    async fn dispatch(&self, request: &TrafficRequest) -> Result<(), DispatchError> {
        let callback = Transition::ApplyTrafficResult {
            total_traffic: self.total_traffic,
            at: Utc::now(),
        };
        self.orders.modify(request.order_id, |o| callback.apply(o));
        Err(DispatchError::Network("connection reset".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

// ===== Test environment =====

pub struct TestEnv {
    pub service: Arc<Service>,
    pub devices: Arc<MockDeviceRepo>,
    pub accounts: Arc<MockAccountRepo>,
    pub orders: Arc<MockOrderRepo>,
    pub sessions: Arc<InMemorySessionStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub events: Arc<RecordingPublisher>,
    pub moderator: Principal,
}

impl TestEnv {
    pub fn new(policy: CompletionPolicyConfig) -> Self {
        Self::with_config(test_config(policy))
    }

    pub fn with_config(config: Config) -> Self {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let active: Arc<dyn TrafficDispatcher> = dispatcher.clone();
        Self::build(config, move |_| active, dispatcher)
    }

    /// Async environment whose calculator is unreachable
    pub fn with_failing_calculator() -> Self {
        Self::build(
            test_config(CompletionPolicyConfig::Async),
            |_| Arc::new(FailingDispatcher),
            Arc::new(RecordingDispatcher::default()),
        )
    }

    /// Async environment whose calculator reports the result and then fails
    /// the dispatch request
    pub fn with_callback_before_failure(total_traffic: f64) -> Self {
        Self::build(
            test_config(CompletionPolicyConfig::Async),
            |orders| {
                Arc::new(CallbackThenFailDispatcher {
                    orders: orders.clone(),
                    total_traffic,
                })
            },
            Arc::new(RecordingDispatcher::default()),
        )
    }

    fn build(
        config: Config,
        active: impl FnOnce(&Arc<MockOrderRepo>) -> Arc<dyn TrafficDispatcher>,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> Self {
        let devices = Arc::new(MockDeviceRepo::default());
        let accounts = Arc::new(MockAccountRepo::default());
        let orders = Arc::new(MockOrderRepo::new(devices.clone()));
        let active = active(&orders);
        let sessions = Arc::new(InMemorySessionStore::new());
        let objects = Arc::new(InMemoryObjectStore::new(&config.object_store));
        let events = Arc::new(RecordingPublisher::default());

        let service = Arc::new(Service::new(
            Repositories {
                devices: devices.clone(),
                accounts: accounts.clone(),
                orders: orders.clone(),
            },
            Collaborators {
                sessions: sessions.clone(),
                objects: objects.clone(),
                dispatcher: active,
                events: events.clone(),
            },
            &config,
        ));

        let moderator = accounts.seed("moderator", true);

        Self {
            service,
            devices,
            accounts,
            orders,
            sessions,
            objects,
            dispatcher,
            events,
            moderator,
        }
    }

    pub fn client(&self, username: &str) -> Principal {
        self.accounts.seed(username, false)
    }

    pub async fn device(&self, name: &str, data_per_hour: f64) -> Device {
        self.service
            .create_device(&self.moderator, device_input(name, data_per_hour))
            .await
            .unwrap()
    }

    /// Draft with the given lines and an address, already formed
    pub async fn formed_order(&self, client: &Principal, lines: &[(i32, i32)]) -> Order {
        let mut order_id = 0;
        for (device_id, quantity) in lines {
            order_id = self
                .service
                .add_item(client, *device_id, Some(*quantity))
                .await
                .unwrap()
                .order_id;
        }
        self.service
            .update_order(
                client,
                order_id,
                smart_orders::contract::OrderUpdate {
                    address: Some("Baumanskaya 5".to_string()),
                },
            )
            .await
            .unwrap();
        self.service.form_order(client, order_id).await.unwrap()
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
