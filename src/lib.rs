//! TCP round-robin load balancer library.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use load_balancer::BackendPool;
pub use net::Listener;
pub use proxy::Proxy;
