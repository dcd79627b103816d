pub mod config;
pub mod export;
pub mod purge;
pub mod save;
pub mod station;
pub mod status;

pub use config::{ConfigAction, ConfigArgs};
pub use export::ExportArgs;
pub use purge::PurgeArgs;
pub use save::SaveArgs;
pub use station::StationArgs;
pub use status::StatusArgs;
