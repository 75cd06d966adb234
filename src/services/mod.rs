// Service exports
pub mod events;
pub mod locks;
pub mod memory;
pub mod postgres;
pub mod profiles;
pub mod store;

pub use events::EventBus;
pub use locks::KeyedMutex;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use profiles::{DirectoryError, ProfileClient, ProfileDirectory, StaticDirectory};
pub use store::{EngineStore, StoreError};
