pub mod namespace;
pub mod suggest;
pub mod text;
pub mod writegate;

pub use namespace::{InvalidNamespace, Namespace};
