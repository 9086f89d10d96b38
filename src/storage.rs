mod compression;
mod loose;
mod traits;

pub use loose::LooseObjectStore;
pub use traits::ObjectStore;
