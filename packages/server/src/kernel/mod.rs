//! Kernel module - infrastructure seams, adapters and dependencies.

pub mod deps;
pub mod facebook_client;
pub mod publishers;
pub mod scheduled_tasks;
pub mod stores;
pub mod test_dependencies;
pub mod traits;

pub use deps::{build_publishers, RelayDeps};
pub use facebook_client::{FacebookClient, FacebookError};
pub use publishers::{FacebookPublisher, TelegramPublisher, WhatsAppPublisher};
pub use stores::{PgCursorStore, PgDeliveryLedger, PgJobSource};
pub use test_dependencies::TestDependencies;
pub use traits::*;
