mod load;
mod render_reports;
mod result;
mod session;

pub use load::*;
pub use render_reports::*;
pub use result::*;
pub use session::*;
