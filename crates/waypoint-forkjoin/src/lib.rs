pub mod manager;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use manager::{BranchSpec, ForkGroupManager};
pub use memory::MemoryGroupStore;
pub use sqlite::SqliteGroupStore;
pub use store::GroupStore;
