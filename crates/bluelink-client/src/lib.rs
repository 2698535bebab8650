//! Bluelink Client Library
//!
//! Authenticates against the Hyundai, Kia and Genesis connected-car
//! backends and issues authenticated requests against a vehicle.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bluelink_client::{ControllerConfig, SessionController, StaticStamp};
//! use bluelink_core::{Brand, Credentials, Region};
//!
//! #[tokio::main]
//! async fn main() -> bluelink_client::Result<()> {
//!     let config = ControllerConfig {
//!         credentials: Credentials::new("me@example.com", "secret"),
//!         brand: Brand::Hyundai,
//!         region: Region::Eu,
//!         language: Some("de".to_string()),
//!         pin: Some("1234".to_string()),
//!     };
//!     let controller = SessionController::new(config, Arc::new(StaticStamp::new("stamp")))?;
//!
//!     controller.login().await?;
//!
//!     // Read request, carries the access token
//!     let vehicles = controller
//!         .api_request(reqwest::Method::GET, "/api/v1/spa/vehicles")
//!         .await?
//!         .send()
//!         .await?;
//!     println!("{}", vehicles.status());
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module starts an axum router on a random local port so the
//! whole login sequence can run against a stub backend:
//!
//! ```rust,ignore
//! use bluelink_client::testing::TestServer;
//!
//! let server = TestServer::start(stub_router()).await?;
//! let env = BrandEnvironment::new(Brand::Hyundai, Region::Eu, stamp)?
//!     .with_base_url(&server.base_url())?;
//! ```

pub mod auth;
mod controller;
mod environment;
mod error;
pub mod scrape;
pub mod testing;
mod token;
mod vehicle;

pub use controller::{ControllerConfig, SessionController};
pub use environment::{
    BrandEnvironment, Endpoints, GrantStyle, MissingRefreshToken, StampProvider, StaticStamp,
};
pub use error::{BluelinkError, Result};
pub use token::TokenExchanger;
pub use vehicle::{EngineType, Odometer, StartOptions, Vehicle, VehicleConfig};

// Re-export core types for convenience
pub use bluelink_core::{
    Brand, Credentials, HeatedFeatures, Language, Region, SeatClimateValidator, Session,
};
