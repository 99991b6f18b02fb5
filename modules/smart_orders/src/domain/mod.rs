//! Domain layer - business logic and services

pub mod credentials;
pub mod events;
pub mod lifecycle;
pub mod media;
pub mod repository;
pub mod service;
pub mod session;
pub mod traffic;
pub mod validation;

pub use events::{EventPublisher, NoOpEventPublisher, OrderEvent, TracingEventPublisher};
pub use lifecycle::Transition;
pub use media::ObjectStore;
pub use repository::{AccountRepository, DeviceRepository, OrderRepository};
pub use service::{Collaborators, Repositories, Service};
pub use session::SessionStore;
pub use traffic::{DispatchError, TrafficDispatcher, TrafficRequest};
