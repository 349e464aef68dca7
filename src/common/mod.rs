pub mod events;
pub mod input;
pub mod logging;
pub mod output;
pub mod progress;
pub mod shutdown;
pub mod types;
pub mod utils;

pub use events::*;
pub use input::*;
pub use logging::*;
pub use output::*;
pub use progress::create_count_progress_bar;
pub use shutdown::Shutdown;
pub use types::*;
pub use utils::*;
