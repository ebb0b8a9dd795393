//! Domain models

pub mod eligibility;
pub mod invoice;
pub mod notification;
pub mod refund;
pub mod rule_set;
pub mod shift;
pub mod status_override;
pub mod sync;
pub mod traveler;
pub mod validation;
pub mod voucher;

pub use eligibility::*;
pub use invoice::*;
pub use notification::*;
pub use refund::*;
pub use rule_set::*;
pub use shift::*;
pub use status_override::*;
pub use sync::*;
pub use traveler::*;
pub use validation::*;
pub use voucher::*;
