mod rights;
mod token;

pub use rights::{AnyUser, Rights, SuperAdmin};
pub use token::{AuthToken, OptionalToken, BEARER_PREFIX};
