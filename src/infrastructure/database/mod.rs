pub mod change_feed;
pub mod connection;
pub mod device_repo;
pub mod installation_repo;
pub mod memory_store;

pub use change_feed::{BroadcastChangeFeed, DEFAULT_FEED_CAPACITY};
pub use connection::DatabaseConnection;
pub use device_repo::SqliteDeviceRepository;
pub use installation_repo::SqliteInstallationRepository;
pub use memory_store::InMemoryStore;
