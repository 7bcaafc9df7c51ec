// Push channel message envelope

use serde::Serialize;

use super::{ChartDataPoint, HealthSnapshot};

/// Broadcast to every connected dashboard so clients update incrementally
/// without re-polling `/api/charts`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PushMessage {
    /// Sent when a check pass detected an actual change.
    Health(HealthSnapshot),
    /// Sent on every collection tick.
    ChartPoint(ChartDataPoint),
}
