//! Free-running clock generator.
//!
//! [`Clock`] toggles a 1-bit signal forever from its own task. Engines never
//! talk to the generator: they wait on edges of the signal it drives.

use tracing::debug;

use crate::error::SimError;
use crate::kernel::JoinHandle;
use crate::signal::Signal;
use crate::time::TimeUnit;

/// A periodic square wave on one signal.
#[derive(Clone, Debug)]
pub struct Clock {
    signal: Signal,
    high_fs: u64,
    low_fs: u64,
}

impl Clock {
    /// Creates a clock with the given period. The high phase is half the
    /// period, rounded down; the low phase takes the remainder.
    pub fn new(signal: Signal, period: u64, unit: TimeUnit) -> Result<Self, SimError> {
        let period_fs = unit.to_fs(period);
        if period_fs < 2 {
            return Err(SimError::config(format!(
                "clock period {period} {unit} is shorter than 2 fs"
            )));
        }
        if signal.bit_width() != 1 {
            return Err(SimError::config(format!(
                "clock signal '{}' must be 1 bit wide, got {}",
                signal.name(),
                signal.bit_width()
            )));
        }
        let high_fs = period_fs / 2;
        Ok(Self {
            signal,
            high_fs,
            low_fs: period_fs - high_fs,
        })
    }

    /// Returns the driven signal.
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Returns the full period in femtoseconds.
    pub fn period_fs(&self) -> u64 {
        self.high_fs + self.low_fs
    }

    /// Spawns the toggling task. With `start_high` the first half period is high.
    pub fn start(&self, start_high: bool) -> JoinHandle<()> {
        let sim = self.signal.sim();
        debug!(
            clock = self.signal.name(),
            period_fs = self.period_fs(),
            start_high,
            "clock started"
        );
        sim.spawn(
            &format!("clock:{}", self.signal.name()),
            toggle(self.clone(), start_high),
        )
    }
}

async fn toggle(clock: Clock, start_high: bool) -> Result<(), SimError> {
    let sim = clock.signal.sim();
    if start_high {
        clock.signal.set_value(1)?;
        sim.timer_fs(clock.high_fs).await;
    }
    loop {
        clock.signal.set_value(0)?;
        sim.timer_fs(clock.low_fs).await;
        clock.signal.set_value(1)?;
        sim.timer_fs(clock.high_fs).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Simulator;
    use crate::time::FS_PER_NS;
    use crate::SimConfig;

    #[test]
    fn rejects_short_period_and_wide_signal() {
        let sim = Simulator::new(SimConfig::default());
        let clk = sim.signal("clk", 1).unwrap();
        assert!(Clock::new(clk.clone(), 1, TimeUnit::Fs).is_err());
        let bus = sim.signal("bus", 2).unwrap();
        assert!(Clock::new(bus, 2, TimeUnit::Ns).is_err());
        let clock = Clock::new(clk, 3, TimeUnit::Fs).unwrap();
        assert_eq!(clock.period_fs(), 3);
    }

    #[test]
    fn rising_edges_are_one_period_apart() {
        let mut sim = Simulator::new(SimConfig::default());
        let clk = sim.signal("clk", 1).unwrap();
        let clock = Clock::new(clk.clone(), 2, TimeUnit::Ns).unwrap();
        clock.start(false);
        let h = sim.handle();
        let edges = sim
            .run(async move {
                let mut times = Vec::new();
                for _ in 0..3 {
                    clk.rising_edge().await;
                    times.push(h.now().fs);
                }
                Ok::<_, SimError>(times)
            })
            .unwrap();
        assert_eq!(edges, vec![FS_PER_NS, 3 * FS_PER_NS, 5 * FS_PER_NS]);
    }

    #[test]
    fn falling_edge_between_rising_edges() {
        let mut sim = Simulator::new(SimConfig::default());
        let clk = sim.signal("clk", 1).unwrap();
        Clock::new(clk.clone(), 10, TimeUnit::Ns).unwrap().start(false);
        let h = sim.handle();
        let (rise, fall) = sim
            .run(async move {
                clk.rising_edge().await;
                let rise = h.now().to_ns();
                clk.falling_edge().await;
                Ok::<_, SimError>((rise, h.now().to_ns()))
            })
            .unwrap();
        assert_eq!((rise, fall), (5, 10));
    }
}
