pub mod stage0_filter;
pub mod stage1_synthesize;
pub mod stage2_results;

pub use stage0_filter::*;
pub use stage1_synthesize::*;
pub use stage2_results::*;
