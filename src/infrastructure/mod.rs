//! 基础设施层
//!
//! 持有稀缺资源（持久化存储、时钟），只暴露能力

pub mod clock;
pub mod kv_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use kv_store::{FileStore, KeyValueStore, MemoryStore};
