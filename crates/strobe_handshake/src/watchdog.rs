//! Run-wide watchdog.

use tracing::warn;

use strobe_sim::{JoinHandle, SimError, SimHandle, TimeUnit};

/// Fails with [`SimError::WatchdogExpired`] once `delay` of simulated time
/// has elapsed. Purely timer driven, so it fires even if the clock stops.
pub async fn watchdog(sim: SimHandle, delay: u64, unit: TimeUnit) -> Result<(), SimError> {
    sim.timer(delay, unit).await;
    let at = sim.now();
    warn!(delay, %unit, %at, "watchdog expired");
    Err(SimError::WatchdogExpired { at })
}

/// Spawns [`watchdog`] as a task named `watchdog`.
pub fn start_watchdog(sim: &SimHandle, delay: u64, unit: TimeUnit) -> JoinHandle<()> {
    sim.spawn("watchdog", watchdog(sim.clone(), delay, unit))
}
