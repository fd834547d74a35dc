mod check_target;

pub use check_target::{CheckRunner, RunOutcome};
