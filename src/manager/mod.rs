//! Resource manager module.
//!
//! This module provides the main entry point: one [`ResourceManager`] per
//! application, owning its channels and connections.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ResourceManager`] | Channel and connection registries, dispatch |
//! | [`ManagerBuilder`] | Fluent configuration builder |
//! | [`ManagerConfig`] | Caller configuration and the defaults merge |
//! | [`ConnectBuilder`] | Per-call connection options |
//!
//! # Example
//!
//! ```ignore
//! use rtc_resource_manager::{ResourceManager, Result};
//!
//! async fn example(channel: MyChannel, facade: MyFacade) -> Result<()> {
//!     let manager = ResourceManager::builder()
//!         .channel(channel)
//!         .rtc_facade(facade)
//!         .build()?;
//!
//!     let connection = manager.connect_to("peer-42").await?;
//!     connection.add_data_connection("chat").await?;
//!     manager.close("peer-42")?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for manager configuration.
pub mod builder;

/// Configuration and the defaults merge.
pub mod config;

/// Core manager implementation.
pub mod core;

/// Inbound signaling dispatch.
mod dispatch;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use config::{DEFAULT_CONNECTION_TTL, ManagerConfig, MergePolicy};
pub use core::{ConnectBuilder, ResourceManager};
