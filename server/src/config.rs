/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub listen_addr: String,
    /// World updates per second.
    pub frame_rate_hz: u32,
    /// Frame messages per second.
    pub broadcast_rate_hz: u32,
    /// Cadence of outbound intents for the local player.
    pub intent_interval_ms: u64,
    pub rng_seed: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9002".to_string(),
            frame_rate_hz: 60,
            broadcast_rate_hz: 15,
            intent_interval_ms: 500,
            rng_seed: 42,
        }
    }
}

impl HostConfig {
    /// Defaults with `STARDUST_LISTEN_ADDR` and `STARDUST_SEED` applied.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(addr) = lookup("STARDUST_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(seed) = lookup("STARDUST_SEED") {
            config.rng_seed = seed
                .parse()
                .map_err(|e| format!("STARDUST_SEED must be an integer: {}", e))?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.frame_rate_hz == 0 {
            return Err("frame_rate_hz must be > 0".to_string());
        }
        if self.broadcast_rate_hz == 0 || self.broadcast_rate_hz > self.frame_rate_hz {
            return Err(format!(
                "broadcast_rate_hz must be in 1..={} (got {})",
                self.frame_rate_hz, self.broadcast_rate_hz
            ));
        }
        if self.intent_interval_ms == 0 {
            return Err("intent_interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    /// Frames between two frame messages.
    pub fn broadcast_every(&self) -> u32 {
        (self.frame_rate_hz / self.broadcast_rate_hz.max(1)).max(1)
    }

    pub fn intent_interval_secs(&self) -> f64 {
        self.intent_interval_ms as f64 / 1000.0
    }
}
