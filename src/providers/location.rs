use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::models::LocationSample;

/// One-shot position source. Implementations must request a fresh fix rather
/// than returning a cached one; the caller applies its own timeout.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<LocationSample>;

    /// Best-effort reverse geocoding.
    async fn resolve_address(&self, _sample: &LocationSample) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reports a fixed origin with a few metres of jitter, standing in for a GPS
/// fix on hosts without one.
pub struct SimulatedLocationProvider {
    latitude: f64,
    longitude: f64,
    address: Option<String>,
}

impl SimulatedLocationProvider {
    pub fn new(latitude: f64, longitude: f64, address: Option<String>) -> Self {
        Self {
            latitude,
            longitude,
            address,
        }
    }
}

impl Default for SimulatedLocationProvider {
    fn default() -> Self {
        Self::new(51.5007, -0.1246, Some("Westminster, London".into()))
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn current_location(&self) -> Result<LocationSample> {
        let mut rng = rand::thread_rng();
        // ~0.0001 degrees is roughly ten metres
        let jitter_lat = rng.gen_range(-0.0001..0.0001);
        let jitter_lon = rng.gen_range(-0.0001..0.0001);

        Ok(LocationSample {
            latitude: self.latitude + jitter_lat,
            longitude: self.longitude + jitter_lon,
            accuracy: rng.gen_range(5.0..25.0),
            captured_at: Utc::now(),
            resolved_address: None,
        })
    }

    async fn resolve_address(&self, _sample: &LocationSample) -> Result<Option<String>> {
        Ok(self.address.clone())
    }
}
