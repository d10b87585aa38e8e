//! Lost & Found Matching Server Library
//!
//! A line-protocol TCP server that collects lost and found item reports,
//! pairs compatible reports from different people, and relays a private
//! chat between the two reporters.
//!
//! # Features
//! - `REPORT_LOST` / `REPORT_FOUND` with JSON item details
//! - Automatic first-match-wins pairing on name, color and location
//! - 1:1 chat between matched reporters, ended with `/exit_chat`
//! - Item listings (`GET_MY_ITEMS`, `GET_ALL_ITEMS`)
//! - JSON persistence of every item, rewritten after each change
//! - Graceful shutdown with a notice to every connected client
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `MatchServer` is the central actor owning the Item Store and the
//!   Connection Registry
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use lostfound_server::{Acceptor, ItemStore, JsonFileStore, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let store = ItemStore::load(
//!         config.locations.clone(),
//!         Box::new(JsonFileStore::new(&config.data_file)),
//!     );
//!     let acceptor = Acceptor::bind(config).await?;
//!     acceptor.run(store).await?;
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod config;
pub mod error;
pub mod handler;
pub mod item;
pub mod matcher;
pub mod message;
pub mod persistence;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use acceptor::{Acceptor, ShutdownHandle};
pub use config::ServerConfig;
pub use error::{AppError, PairError, PersistenceError, ProtocolError, SendError, StoreError, ValidationError};
pub use handler::handle_connection;
pub use item::{Item, ItemReport, ItemStatus, ReportKind};
pub use message::{ClientCommand, ServerMessage};
pub use persistence::{JsonFileStore, MemoryStore, Persistence};
pub use registry::ConnectionRegistry;
pub use server::{MatchServer, ServerCommand};
pub use session::{Session, SessionMode};
pub use store::ItemStore;
pub use types::{ItemId, SessionId};
