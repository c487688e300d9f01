//! Query shaping for lazy-attribute entities.
//!
//! - **Projection**: the default column list of an entity and the rewriter
//!   that removes lazy columns from it
//! - **Request**: the structured SELECT handed to executors
//! - **Dataset**: retrieval builder (`Entity::find()`) that materializes
//!   records and groups them for batch hydration

pub mod projection;
#[doc(inline)]
pub use projection::{rewrite, Projection};

pub mod request;
#[doc(inline)]
pub use request::{KeyFilter, SelectRequest};

pub mod dataset;
#[doc(inline)]
pub use dataset::Dataset;
