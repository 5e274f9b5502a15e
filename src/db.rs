pub mod store;
pub use store::{Store, StoreTx};
pub mod postgres;
pub use postgres::{PgStore, PgTx};
pub mod memory;
pub use memory::{MemoryStore, MemoryTx};
