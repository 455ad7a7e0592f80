use crate::errors::{DeskError, DeskResult};
use crate::pricing::black_scholes::ThetaConvention;

/// One simulated underlying: ticker and its starting price.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSymbol {
    pub symbol: String,
    pub start_price: f64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub risk_free_rate: f64,
    pub sim_volatility: f64,
    pub sim_tick_ms: u64,
    pub sim_symbols: Vec<SimSymbol>,
    pub sim_seed: Option<u64>,
    pub mc_paths: usize,
    pub mc_steps: usize,
    pub mc_confidence: f64,
    pub theta_convention: ThetaConvention,
    pub var_confidence: f64,
    pub max_abs_delta: f64,
    pub max_var: f64,
}

impl AppConfig {
    pub fn from_env() -> DeskResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> DeskResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server_port = parse_var::<u16>("SERVER_PORT", &get("SERVER_PORT", "3001"))?;
        if server_port == 0 {
            return Err(DeskError::Config("SERVER_PORT: must be non-zero".into()));
        }

        let risk_free_rate = parse_var::<f64>("RISK_FREE_RATE", &get("RISK_FREE_RATE", "0.05"))?;

        let sim_volatility = parse_var::<f64>("SIM_VOLATILITY", &get("SIM_VOLATILITY", "0.25"))?;
        if sim_volatility <= 0.0 {
            return Err(DeskError::Config("SIM_VOLATILITY: must be positive".into()));
        }

        let sim_tick_ms = parse_var::<u64>("SIM_TICK_MS", &get("SIM_TICK_MS", "1000"))?;
        if sim_tick_ms == 0 {
            return Err(DeskError::Config("SIM_TICK_MS: must be positive".into()));
        }

        let sim_symbols = parse_symbols(&get(
            "SIM_SYMBOLS",
            "AAPL=150.25,GOOGL=2825.50,TSLA=238.90,SPY=425.00",
        ))?;

        let sim_seed = match lookup("SIM_SEED") {
            Some(raw) => Some(parse_var::<u64>("SIM_SEED", &raw)?),
            None => None,
        };

        let mc_paths = parse_var::<usize>("MC_PATHS", &get("MC_PATHS", "50000"))?;
        if mc_paths < 2 {
            return Err(DeskError::Config("MC_PATHS: need at least 2 paths".into()));
        }

        let mc_steps = parse_var::<usize>("MC_STEPS", &get("MC_STEPS", "63"))?;
        if mc_steps == 0 {
            return Err(DeskError::Config("MC_STEPS: must be positive".into()));
        }

        let mc_confidence = parse_probability("MC_CONFIDENCE", &get("MC_CONFIDENCE", "0.95"))?;
        let var_confidence = parse_probability("VAR_CONFIDENCE", &get("VAR_CONFIDENCE", "0.95"))?;

        let theta_convention = match get("THETA_CONVENTION", "simplified").to_ascii_lowercase().as_str() {
            "simplified" => ThetaConvention::Simplified,
            "full" => ThetaConvention::Full,
            other => {
                return Err(DeskError::Config(format!(
                    "THETA_CONVENTION: expected simplified|full, got {other}"
                )))
            }
        };

        let max_abs_delta = parse_limit("MAX_ABS_DELTA", &get("MAX_ABS_DELTA", "5000"))?;
        let max_var = parse_limit("MAX_VAR", &get("MAX_VAR", "25000"))?;

        Ok(Self {
            server_port,
            risk_free_rate,
            sim_volatility,
            sim_tick_ms,
            sim_symbols,
            sim_seed,
            mc_paths,
            mc_steps,
            mc_confidence,
            theta_convention,
            var_confidence,
            max_abs_delta,
            max_var,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> DeskResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| DeskError::Config(format!("{key}: {e}")))
}

fn parse_probability(key: &str, raw: &str) -> DeskResult<f64> {
    let p = parse_var::<f64>(key, raw)?;
    if !(p > 0.0 && p < 1.0) {
        return Err(DeskError::Config(format!("{key}: must be in (0, 1), got {p}")));
    }
    Ok(p)
}

fn parse_limit(key: &str, raw: &str) -> DeskResult<f64> {
    let limit = parse_var::<f64>(key, raw)?;
    if !(limit.is_finite() && limit > 0.0) {
        return Err(DeskError::Config(format!("{key}: must be positive, got {limit}")));
    }
    Ok(limit)
}

/// Parse `AAPL=150.25,GOOGL=2825.50` into symbols with starting prices.
fn parse_symbols(raw: &str) -> DeskResult<Vec<SimSymbol>> {
    let mut out = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (symbol, price) = entry
            .split_once('=')
            .ok_or_else(|| DeskError::Config(format!("SIM_SYMBOLS: expected SYMBOL=PRICE, got {entry}")))?;
        let start_price = parse_var::<f64>("SIM_SYMBOLS", price)?;
        if start_price <= 0.0 || !start_price.is_finite() {
            return Err(DeskError::Config(format!("SIM_SYMBOLS: bad price for {symbol}")));
        }
        out.push(SimSymbol {
            symbol: symbol.trim().to_ascii_uppercase(),
            start_price,
        });
    }
    if out.is_empty() {
        return Err(DeskError::Config("SIM_SYMBOLS: no symbols configured".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.server_port, 3001);
        assert_eq!(cfg.sim_symbols.len(), 4);
        assert_eq!(cfg.sim_symbols[0].symbol, "AAPL");
        assert_eq!(cfg.theta_convention, ThetaConvention::Simplified);
        assert!(cfg.sim_seed.is_none());
        assert_eq!(cfg.mc_paths, 50_000);
    }

    #[test]
    fn test_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("SIM_SYMBOLS", "msft=410.5"),
            ("SIM_SEED", "7"),
            ("THETA_CONVENTION", "FULL"),
        ]))
        .unwrap();
        assert_eq!(cfg.sim_symbols, vec![SimSymbol { symbol: "MSFT".into(), start_price: 410.5 }]);
        assert_eq!(cfg.sim_seed, Some(7));
        assert_eq!(cfg.theta_convention, ThetaConvention::Full);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("SERVER_PORT", "abc")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MC_CONFIDENCE", "1.5")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("SIM_SYMBOLS", "AAPL")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MC_PATHS", "1")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("THETA_CONVENTION", "exotic")])).is_err());
    }

    #[test]
    fn test_risk_limits_must_be_positive() {
        for (key, raw) in [
            ("MAX_ABS_DELTA", "-100"),
            ("MAX_ABS_DELTA", "0"),
            ("MAX_VAR", "-1"),
            ("MAX_VAR", "inf"),
        ] {
            match AppConfig::from_lookup(lookup(&[(key, raw)])) {
                Err(DeskError::Config(msg)) => assert!(msg.starts_with(key), "{msg}"),
                other => panic!("{key}={raw}: expected config error, got {other:?}"),
            }
        }
        let cfg = AppConfig::from_lookup(lookup(&[("MAX_VAR", "1e6")])).unwrap();
        assert_eq!(cfg.max_var, 1e6);
    }
}
