mod driver;
mod settings;

pub use driver::{CursorOutcome, DatabaseDriver, ServerCursor};
pub use settings::SessionSettings;
