mod creator;
mod list;

pub use creator::{repair_missing_creators, CreatorRepairReport};
pub use list::{repair_missing_lists, ListRepairReport};
