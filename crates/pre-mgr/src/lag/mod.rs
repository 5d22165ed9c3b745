//! LAG membership table, keyed by LAG id.

mod mgr;
mod types;

pub use mgr::LagMgr;
pub use types::{LagData, LagFields};
