mod list;
mod run;
mod status;

pub use list::cmd_list;
pub use run::{RunArgs, cmd_run};
pub use status::cmd_status;
