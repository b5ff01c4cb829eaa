//! Free-running random stimulus.

use tracing::{debug, trace};

use strobe_sim::{SimError, Signal};

/// Writes a uniformly random value to `binding` once per clock cycle.
///
/// Each cycle draws from the simulator's seeded source, writes, then waits
/// for the next rising edge of `clock`. Returns after `num_cycles` writes,
/// or never when `num_cycles` is zero. `binding` is at least one bit wide:
/// the simulator refuses to create a zero-width signal.
pub async fn drive_random(binding: Signal, clock: Signal, num_cycles: u64) -> Result<(), SimError> {
    let width = binding.bit_width();
    let sim = binding.sim();
    debug!(signal = binding.name(), width, num_cycles, "random driver started");

    let mut written = 0u64;
    while num_cycles == 0 || written < num_cycles {
        let value = sim.random_bits(width);
        binding.set_value(value)?;
        trace!(signal = binding.name(), value, at = %sim.now(), "random write");
        written += 1;
        clock.rising_edge().await;
    }
    debug!(signal = binding.name(), written, "random driver finished");
    Ok(())
}
