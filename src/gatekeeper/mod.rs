//! Request gatekeeping: who is calling, how often, and with what.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`identity`] | Derive the rate-limit key from headers / peer address |
//! | [`rate_limit`] | 5-minute and 24-hour sliding windows per client |
//! | [`screen`] | Upload size limit and content denylist |

pub mod identity;
pub mod rate_limit;
pub mod screen;

pub use identity::client_identity;
pub use rate_limit::RateLimiter;
pub use screen::{check_upload_size, screen_content};
