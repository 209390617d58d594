pub mod cache;
pub mod config;
pub mod coordinator;
pub mod detector;
pub mod error;
pub mod host;
pub mod ignore;
pub mod logging;
pub mod mode;
pub mod model;
pub mod notify;
pub mod output;
pub mod platform;
pub mod store;
pub mod tabs;
pub mod tracker;

pub use cache::ResultCache;
pub use config::Config;
pub use coordinator::Coordinator;
pub use mode::ModeController;
pub use model::{AnalysisResult, Availability, Judgment, Mode, ScanRequest, TabId};
pub use tracker::TrackerRegistry;
