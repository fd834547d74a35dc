pub mod channel;
pub mod compare;
pub mod monitor_target;
pub mod notice;
pub mod types;

pub use channel::*;
pub use monitor_target::*;
pub use notice::*;
pub use types::*;
