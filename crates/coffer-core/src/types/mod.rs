//! Core types for Coffer

mod multipart;
mod object;
mod policy;
mod post_policy;

pub use multipart::*;
pub use object::*;
pub use policy::*;
pub use post_policy::*;
