//! AWS Signature V4 signing for Coffer
//!
//! Used where the SDK offers no equivalent (browser POST policies) and by
//! the in-memory backend to hand out realistic presigned URLs.

pub mod post_policy;
pub mod presigned;
pub mod signature;

pub use post_policy::sign_post_policy;
pub use presigned::{presign_url, PresignRequest};
pub use signature::SigningCredentials;
