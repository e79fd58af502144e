//! Generation core: corpus loading, model building, the weighted walk
//! and sentence post-processing.

pub mod corpus;
pub mod filters;
pub mod model;
pub mod random;
pub mod sentence;
pub mod walk;
