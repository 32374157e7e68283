pub mod edge;
pub mod id;
pub mod link;
pub mod time;

// Re-export commonly used types
pub use edge::Edge;
pub use id::{EdgeId, LinkId};
pub use link::Link;
