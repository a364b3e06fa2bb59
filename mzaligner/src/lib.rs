mod args;
mod driver;
mod load;
mod progress;
mod time_range;
mod write;

pub use args::*;
pub use driver::{MZAligner, MZAlignerError};
pub use progress::ProgressRecord;
pub use time_range::{TimeRange, TimeRangeParseError};
pub use write::{write_output, write_table};
