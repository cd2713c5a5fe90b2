pub mod db;

pub use db::GaugeStore;
