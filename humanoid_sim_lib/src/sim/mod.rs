pub mod context;
pub mod motion;
pub mod power;
pub mod recorder;
pub mod session;

pub use context::*;
pub use motion::*;
pub use power::*;
pub use recorder::*;
pub use session::*;
