pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryGameStore;
pub use postgres::{create_pool, run_migrations, PgGameStore};
pub use store::GameStore;
