pub mod change;
pub mod deleted;
pub mod note;
pub mod sync;
pub mod version;
