pub mod etl;
pub mod features;
pub mod predictions;
pub mod system;

pub use etl::*;
pub use features::*;
pub use predictions::*;
pub use system::*;
