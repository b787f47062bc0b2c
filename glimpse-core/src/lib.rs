pub mod expiry;
pub mod guard;
pub mod resource;

pub use expiry::{parse_expiry, ExpiryError};
pub use guard::{check_access, AccessDenied};
pub use resource::{MediaResource, NewMediaResource};
