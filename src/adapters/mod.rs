// Adapters layer: concrete implementations of the domain ports (http, storage).

pub mod memory;
pub mod mongo;
pub mod openai;
pub mod scjn;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use openai::OpenAiEmbedder;
pub use scjn::ScjnClient;
