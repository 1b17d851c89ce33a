use std::time::Duration;

/// Fixed-default tunables for the sweep, spoof, and restoration cadences.
///
/// All defaults come from `spec.md` §6; the bundled CLI exposes the ones
/// worth overriding as flags (see `cli::Cli`), the rest are internal.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gap between successive ARP requests during a subnet sweep.
    pub scan_inter_packet_gap: Duration,
    /// Grace period after the last sweep request before `scan` resolves.
    pub scan_grace_period: Duration,
    /// Cadence of the periodic bidirectional poison loop.
    pub spoof_tick_period: Duration,
    /// Number of restoration rounds emitted on unblock/shutdown.
    pub restoration_rounds: u32,
    /// Gap between restoration rounds.
    pub restoration_gap: Duration,
    /// Capacity of the UI-facing log event history/broadcast.
    pub max_log_lines: usize,
    /// Read timeout on the underlying capture handle.
    pub capture_read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_inter_packet_gap: Duration::from_millis(3),
            scan_grace_period: Duration::from_millis(1000),
            spoof_tick_period: Duration::from_millis(1500),
            restoration_rounds: 5,
            restoration_gap: Duration::from_millis(100),
            max_log_lines: 100,
            capture_read_timeout: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.spoof_tick_period, Duration::from_millis(1500));
        assert_eq!(c.restoration_rounds, 5);
        assert_eq!(c.restoration_gap, Duration::from_millis(100));
        assert_eq!(c.max_log_lines, 100);
    }
}
