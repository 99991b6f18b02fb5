//! Infrastructure layer - storage and external collaborators

pub mod media;
pub mod session;
pub mod storage;
pub mod traffic_client;
