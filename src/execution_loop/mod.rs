pub mod error_classifier;
pub mod refinement_loop;

pub use error_classifier::*;
pub use refinement_loop::*;
