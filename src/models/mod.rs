pub mod answer;
pub mod respondent;
pub mod selection;

pub use answer::*;
pub use respondent::*;
pub use selection::*;
