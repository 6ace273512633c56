pub mod plan;
pub mod source;
pub mod merge;
pub mod executor;
pub mod results;
