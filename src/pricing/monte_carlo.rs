use crate::errors::{DeskError, DeskResult};
use crate::pricing::PricingRequest;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use statrs::distribution::{ContinuousCDF, Normal};

/// Simulation settings. A fixed seed makes the estimate reproducible.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct McConfig {
    pub paths: usize,
    pub steps: usize,
    pub seed: Option<u64>,
    /// Two-sided confidence level for the reported interval
    pub confidence: f64,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            paths: 50_000,
            steps: 63,
            seed: None,
            confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct SimulationResult {
    pub option_price: f64,
    pub standard_error: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
    pub paths: usize,
    pub steps: usize,
}

/// One geometric Brownian motion step: S * exp((mu - sigma^2/2) dt + sigma sqrt(dt) z).
#[inline]
pub fn gbm_step(price: f64, drift: f64, volatility: f64, dt: f64, z: f64) -> f64 {
    price * ((drift - 0.5 * volatility * volatility) * dt + volatility * dt.sqrt() * z).exp()
}

/// Risk-neutral Monte Carlo pricer for European payoffs.
pub struct MonteCarloPricer {
    config: McConfig,
}

impl MonteCarloPricer {
    pub fn new(config: McConfig) -> DeskResult<Self> {
        if config.paths < 2 {
            return Err(DeskError::invalid("paths", config.paths as f64));
        }
        if config.steps == 0 {
            return Err(DeskError::invalid("steps", 0.0));
        }
        if !(config.confidence > 0.0 && config.confidence < 1.0) {
            return Err(DeskError::invalid("confidence", config.confidence));
        }
        Ok(Self { config })
    }

    pub fn simulate(&self, req: &PricingRequest) -> DeskResult<SimulationResult> {
        req.validate()?;

        let McConfig { paths, steps, seed, confidence } = self.config;
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let dt = req.time_to_expiry / steps as f64;

        // Welford accumulation: no per-path allocation
        let mut mean = 0.0;
        let mut m2 = 0.0;
        for n in 1..=paths {
            let mut s = req.spot;
            for _ in 0..steps {
                let z: f64 = StandardNormal.sample(&mut rng);
                s = gbm_step(s, req.risk_free_rate, req.volatility, dt, z);
            }
            let payoff = req.option_type.payoff(s, req.strike);
            let dev = payoff - mean;
            mean += dev / n as f64;
            m2 += dev * (payoff - mean);
        }

        let df = req.discount_factor();
        let variance = m2 / (paths - 1) as f64;
        let option_price = mean * df;
        let standard_error = (variance / paths as f64).sqrt() * df;

        if !option_price.is_finite() || !standard_error.is_finite() {
            return Err(DeskError::Simulation(format!(
                "non-finite estimate: price={option_price} se={standard_error}"
            )));
        }

        let z = Normal::standard().inverse_cdf(0.5 + 0.5 * confidence);
        let margin = z * standard_error;

        Ok(SimulationResult {
            option_price,
            standard_error,
            confidence_interval_lower: option_price - margin,
            confidence_interval_upper: option_price + margin,
            paths,
            steps,
        })
    }
}
