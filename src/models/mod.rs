// Domain models shared by the store, encoder, routes, and collectors

mod health;
mod push;
mod sample;

pub use health::{
    CheckResult, GluetunStatus, HealthSnapshot, HealthUpdate, ServiceStatus, UpdateOutcome,
    VpnStatus,
};
pub use push::PushMessage;
pub use sample::{ChartDataPoint, TorrentRate};
