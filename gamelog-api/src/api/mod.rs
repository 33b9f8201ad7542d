//! HTTP API handlers

pub mod games;
pub mod health;
pub mod meta;

pub use games::game_routes;
pub use health::health_routes;
pub use meta::meta_routes;
