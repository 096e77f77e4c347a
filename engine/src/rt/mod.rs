mod arbiter;
mod clip;
mod driver;
mod engine;
mod registry;

pub use arbiter::*;
pub use clip::*;
pub use driver::*;
pub use engine::*;
pub use registry::*;
