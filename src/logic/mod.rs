pub mod access_gate;
pub mod alignment;
pub mod explanation_resolver;
pub mod explorer;
pub mod traversal;

pub use access_gate::*;
pub use alignment::*;
pub use explanation_resolver::*;
pub use explorer::*;
pub use traversal::*;
