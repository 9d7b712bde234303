pub mod activation;
pub mod common;
pub mod dataset;
pub mod explanation;
pub mod feature;
pub mod filter;
pub mod sample;
pub mod user;
pub mod user_context;
pub mod view;

pub use activation::*;
pub use common::*;
pub use dataset::*;
pub use explanation::*;
pub use feature::*;
pub use filter::*;
pub use sample::*;
pub use user::*;
pub use user_context::*;
pub use view::*;
