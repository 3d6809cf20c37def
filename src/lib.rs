//! Network-synchronised clock core with a single alarm that can be set by
//! dragging the clock hands or by typing day/hour/minute digits.

pub mod alarm;
pub mod clock;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod sync;
pub mod time_source;

pub use clock::{ClockState, ManualMonotonic, MonotonicClock, SystemMonotonic, TimeAnchor};
pub use config::{ClockConfig, load_clock_config, parse_clock_config_text};
pub use controller::{ClockController, SettingOutcome, TickOutcome};
pub use display::{DisplaySnapshot, ModeKind};
pub use error::{ClockError, FetchError};
pub use sync::{SyncReport, TimeSync};
pub use time_source::{DateProbe, HttpDateProbe, NetworkTime, fetch_authoritative_time};
