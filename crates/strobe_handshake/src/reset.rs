//! Reset sequencing.

use tracing::debug;

use strobe_sim::{SimError, Signal, TimeUnit};

/// Holds `binding` at its active level for `delay`, then releases it.
///
/// With `active_low` the active level is 0 and release drives 1.
pub async fn reset(
    binding: Signal,
    delay: u64,
    unit: TimeUnit,
    active_low: bool,
) -> Result<(), SimError> {
    let sim = binding.sim();
    binding.set_value(u128::from(!active_low))?;
    debug!(signal = binding.name(), active_low, at = %sim.now(), "reset asserted");
    sim.timer(delay, unit).await;
    binding.set_value(u128::from(active_low))?;
    debug!(signal = binding.name(), at = %sim.now(), "reset released");
    Ok(())
}
