use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RoutingError;

/// Flat `key=value` record of a candidate path set: `d_p`, `weights` and one `path_<i>` per path.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPathSet {
    pub demand_of_path: Vec<usize>,
    pub weights: Vec<f64>,
    pub paths: Vec<Vec<usize>>,
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn split<T: FromStr>(key: &str, raw: &str) -> Result<Vec<T>, RoutingError> {
    raw.split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|_| {
                RoutingError::InvalidPersistedSet(format!("bad value {token:?} under key {key}"))
            })
        })
        .collect()
}

impl fmt::Display for PersistedPathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "d_p={}", join(&self.demand_of_path))?;
        writeln!(f, "weights={}", join(&self.weights))?;
        for (i, links) in self.paths.iter().enumerate() {
            writeln!(f, "path_{i}={}", join(links))?;
        }
        Ok(())
    }
}

impl FromStr for PersistedPathSet {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        for (line_no, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(RoutingError::InvalidPersistedSet(format!(
                    "line {} is not a key=value pair",
                    line_no + 1
                )));
            };
            entries.insert(key.trim().to_string(), value.trim().to_string());
        }

        let missing = |key: &str| RoutingError::InvalidPersistedSet(format!("missing key {key}"));
        let demand_of_path: Vec<usize> =
            split("d_p", entries.remove("d_p").ok_or_else(|| missing("d_p"))?.as_str())?;
        let weights: Vec<f64> = split(
            "weights",
            entries.remove("weights").ok_or_else(|| missing("weights"))?.as_str(),
        )?;

        let mut paths = Vec::with_capacity(demand_of_path.len());
        for i in 0..demand_of_path.len() {
            let key = format!("path_{i}");
            let raw = entries.remove(&key).ok_or_else(|| missing(&key))?;
            paths.push(split(&key, &raw)?);
        }
        if let Some(extra) = entries.keys().next() {
            return Err(RoutingError::InvalidPersistedSet(format!(
                "unexpected key {extra}"
            )));
        }

        Ok(Self {
            demand_of_path,
            weights,
            paths,
        })
    }
}
