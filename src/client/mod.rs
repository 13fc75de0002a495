//! Client builders
//!
//! This module turns a resolved profile into HTTP and websocket clients.

pub mod factory;
pub mod http;
pub mod stream;

pub use factory::{FactoryBuilder, KubeClientFactory};
pub use self::http::{BasicAuth, HttpClient};
pub use stream::{StreamClient, WebSocket};
