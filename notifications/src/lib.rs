//! Real-time notification delivery for the idea platform's navigation shell.
//!
//! One [`Manager`] per signed-in session owns at most one live delivery
//! channel and degrades on failure:
//!
//! - **Streaming**: server-push stream of notifications (preferred).
//! - **Polling**: unread-count fetch every poll interval when the stream
//!   cannot be set up or fails.
//! - **Disabled**: the server answered "service unavailable". Terminal for the
//!   session, the badge is zeroed and nothing is retried.
//!
//! The presentation layer reads [`Snapshot`]s (or subscribes to them) and
//! drives the manager with `activate`, `deactivate`, `mark_read`,
//! `open_panel` and `close_panel`. Nothing it calls returns an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use notifications::{DeliveryConfig, HttpApiConfig, HttpNotificationApi, Manager};
//! use std::sync::Arc;
//!
//! let api = HttpNotificationApi::new(HttpApiConfig::default())?;
//! let manager = Manager::new(Arc::new(api), DeliveryConfig::default());
//!
//! manager.activate(Some("42"));
//! let mut updates = manager.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("unread: {}", updates.borrow().unread_count);
//! }
//! ```
//!
//! # Modules
//!
//! - `connection`: HTTP and SSE implementation of the backend API
//! - `error`: transport error type and the terminal disable signal
//! - `manager`: the delivery state machine
//! - `message`: notification payloads
//! - `state`: counts and recent items, with their invariants
//! - `transport`: the backend API trait and the task handle every transport runs in

pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod state;
pub mod transport;

pub use connection::{HttpApiConfig, HttpNotificationApi};
pub use error::{Error, ErrorKind};
pub use manager::{DeliveryConfig, Manager};
pub use message::{Notification, Page};
pub use state::{Mode, Snapshot, RECENT_CAPACITY};
pub use transport::NotificationApi;
