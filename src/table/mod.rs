pub mod eligibility;
pub mod extractor;

pub use eligibility::{is_eligible, Trigger};
pub use extractor::{RowExtractor, RowRecord};
