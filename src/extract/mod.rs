pub mod doi;
pub mod metadata;
pub mod rows;

pub use doi::*;
pub use metadata::*;
pub use rows::*;
