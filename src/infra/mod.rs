// Adapters implementing the application ports

pub mod in_memory_repository;
pub mod json_table_source;
pub mod local_queue;

pub use in_memory_repository::InMemoryRepository;
pub use json_table_source::JsonTableSource;
pub use local_queue::LocalWorkerQueue;
