use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::RoutingError;
use crate::route_compute::{LoopCheck, PathConstraints};

pub const DEFAULT_PRECISION_FACTOR: f64 = 1e-6;

/// Options recognised when generating a candidate path set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePathParams {
    pub k: usize,
    pub max_length_km: f64,
    pub max_num_hops: usize,
    pub max_weight: f64,
    pub max_weight_factor: f64,
    pub max_weight_offset: f64,
}

impl Default for CandidatePathParams {
    fn default() -> Self {
        Self {
            k: 3,
            max_length_km: f64::INFINITY,
            max_num_hops: usize::MAX,
            max_weight: f64::INFINITY,
            max_weight_factor: f64::INFINITY,
            max_weight_offset: f64::INFINITY,
        }
    }
}

fn parse_f64(name: &str, raw: &str) -> Result<f64, RoutingError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| RoutingError::invalid_value(name, raw))
}

fn positive_f64(name: &str, raw: &str) -> Result<f64, RoutingError> {
    let value = parse_f64(name, raw)?;
    if value <= 0.0 {
        return Err(RoutingError::invalid_value(name, raw));
    }
    Ok(value)
}

fn positive_count(name: &str, raw: &str) -> Result<usize, RoutingError> {
    if let Ok(value) = raw.trim().parse::<f64>() {
        if value == f64::INFINITY {
            return Ok(usize::MAX);
        }
    }
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| RoutingError::invalid_value(name, raw))
}

impl CandidatePathParams {
    /// Parses `name -> value` option pairs on top of the defaults.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "K" => {
                    params.k = value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .filter(|k| *k > 0)
                        .ok_or_else(|| RoutingError::invalid_value(key, value))?;
                }
                "maxLengthInKm" => params.max_length_km = positive_f64(key, value)?,
                "maxNumHops" => params.max_num_hops = positive_count(key, value)?,
                "maxWeight" => params.max_weight = positive_f64(key, value)?,
                "maxWeightFactorRespectToShortestPath" => {
                    params.max_weight_factor = positive_f64(key, value)?
                }
                "maxWeightRespectToShortestPath" => {
                    let offset = parse_f64(key, value)?;
                    if offset < 0.0 {
                        return Err(RoutingError::invalid_value(key, value));
                    }
                    params.max_weight_offset = offset;
                }
                other => return Err(RoutingError::UnknownParameter(other.to_string())),
            }
        }
        Ok(params)
    }

    pub fn constraints(&self) -> PathConstraints {
        PathConstraints {
            max_length_km: self.max_length_km,
            max_hops: self.max_num_hops,
            max_weight: self.max_weight,
            max_weight_factor: self.max_weight_factor,
            max_weight_offset: self.max_weight_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub candidate_paths: CandidatePathParams,
    pub precision_factor: f64,
    pub loop_check: LoopCheck,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_paths: CandidatePathParams::default(),
            precision_factor: DEFAULT_PRECISION_FACTOR,
            loop_check: LoopCheck::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawEngineConfig {
    #[serde(default)]
    candidate_paths: BTreeMap<String, serde_yaml::Value>,
    precision_factor: Option<f64>,
    loop_check: Option<LoopCheck>,
}

fn yaml_scalar_to_string(key: &str, value: &serde_yaml::Value) -> Result<String, RoutingError> {
    match value {
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(RoutingError::invalid_value(key, format!("{other:?}"))),
    }
}

pub fn parse_engine_config(text: &str) -> Result<EngineConfig> {
    let raw: RawEngineConfig = if text.trim().is_empty() {
        RawEngineConfig::default()
    } else {
        serde_yaml::from_str(text).context("failed to parse engine config yaml")?
    };

    let pairs = raw
        .candidate_paths
        .iter()
        .map(|(key, value)| yaml_scalar_to_string(key, value).map(|v| (key.clone(), v)))
        .collect::<Result<Vec<_>, _>>()?;
    let candidate_paths =
        CandidatePathParams::from_pairs(pairs).context("invalid candidate_paths section")?;

    let precision_factor = raw.precision_factor.unwrap_or(DEFAULT_PRECISION_FACTOR);
    if !(precision_factor.is_finite() && precision_factor > 0.0) {
        return Err(RoutingError::invalid_value("precision_factor", precision_factor).into());
    }

    Ok(EngineConfig {
        candidate_paths,
        precision_factor,
        loop_check: raw.loop_check.unwrap_or_default(),
    })
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_engine_config(&raw_text)
        .with_context(|| format!("failed to load engine config {}", path.display()))
}
