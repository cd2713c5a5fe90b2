pub mod coins;
pub mod constants;
pub mod epoch;
pub mod error;
pub mod gauge;
pub mod group;
pub mod lock;
pub mod params;
pub mod types;

pub use coins::{Coin, Coins};
pub use constants::*;
pub use epoch::EpochInfo;
pub use error::IncentivesError;
pub use gauge::{DistributeTo, Gauge, GaugeState};
pub use group::{Group, InternalGaugeInfo, InternalGaugeRecord, SplittingPolicy};
pub use lock::Lock;
pub use params::Params;
pub use types::*;
