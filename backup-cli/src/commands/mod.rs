mod check;
mod list;
mod prune;
mod run;

pub use check::run_check;
pub use list::{RunSummary, collect_runs, run_list};
pub use prune::{preview_prune, run_prune};
pub use run::run_backup;
