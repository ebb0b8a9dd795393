//! 退税凭证：创建、签发、海关决定、过期

pub mod expiry;
pub mod lifecycle;
pub mod rules;

pub use expiry::{ExpiryScheduler, ExpirySweeper};
pub use lifecycle::{OfflineOrigin, VoucherLifecycle};
