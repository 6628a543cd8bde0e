use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use netroute::config::{load_engine_config, EngineConfig};
use netroute::route_compute::{
    link_disjoint_pair, node_disjoint_pair, BuildOptions, CandidatePathSet, RoutingConverter,
};
use netroute::{Demand, Link, Topology};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// K-loopless candidate paths per demand.
    Candidates,
    /// Best link-disjoint pair per demand.
    DisjointLink,
    /// Best node-disjoint pair per demand.
    DisjointNode,
    /// Offered traffic split over each demand's shortest candidates, converted to forwarding fractions.
    Routing,
}

#[derive(Debug, Parser)]
#[command(name = "netroute")]
#[command(about = "Resolve candidate, disjoint and fraction-based routings over a planning topology")]
struct Args {
    #[arg(long)]
    topology: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Mode::Candidates)]
    mode: Mode,
    #[arg(long)]
    output_json: Option<PathBuf>,
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DemandInput {
    ingress: usize,
    egress: usize,
    #[serde(default)]
    offered: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct TopologyInput {
    node_count: usize,
    links: Vec<Link>,
    #[serde(default)]
    demands: Vec<DemandInput>,
}

fn load_topology(path: &Path) -> Result<(Topology, Vec<Demand>, Vec<f64>)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file {}", path.display()))?;
    let input: TopologyInput = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse topology json {}", path.display()))?;
    let topology = Topology::new(input.node_count, input.links)?;
    let demands: Vec<Demand> = input
        .demands
        .iter()
        .map(|d| Demand::new(d.ingress, d.egress))
        .collect();
    topology.check_demands(&demands)?;
    let offered = input.demands.iter().map(|d| d.offered).collect();
    Ok((topology, demands, offered))
}

fn build_candidates<'a>(
    topology: &'a Topology,
    demands: &[Demand],
    weights: &[f64],
    cfg: &EngineConfig,
) -> Result<CandidatePathSet<'a>> {
    let options = BuildOptions {
        loop_check: cfg.loop_check,
        ..BuildOptions::default()
    };
    Ok(CandidatePathSet::build(
        topology,
        demands,
        weights,
        &cfg.candidate_paths,
        options,
    )?)
}

fn run_candidates(topology: &Topology, demands: &[Demand], cfg: &EngineConfig) -> Result<Value> {
    let weights = topology.costs();
    let set = build_candidates(topology, demands, &weights, cfg)?;
    let costs = set.path_costs(&weights)?;
    let lengths = set.path_lengths_km();
    let rows: Vec<Value> = (0..set.demand_count())
        .map(|d| {
            let paths: Vec<Value> = set
                .paths_of_demand(d)
                .iter()
                .map(|p| {
                    json!({
                        "path": p,
                        "links": set.path(*p),
                        "weight": costs[*p],
                        "length_km": lengths[*p],
                    })
                })
                .collect();
            json!({ "demand": d, "paths": paths })
        })
        .collect();
    Ok(json!({
        "path_count": set.path_count(),
        "demands": rows,
        "record": set.to_record().to_string(),
    }))
}

fn run_disjoint(topology: &Topology, demands: &[Demand], by_node: bool) -> Result<Value> {
    let weights = topology.costs();
    let mut rows = Vec::with_capacity(demands.len());
    for (d, demand) in demands.iter().enumerate() {
        let pair = if by_node {
            node_disjoint_pair(topology, &weights, demand.ingress, demand.egress)?
        } else {
            link_disjoint_pair(topology, &weights, demand.ingress, demand.egress)?
        };
        rows.push(json!({
            "demand": d,
            "complete": pair.is_complete(),
            "pair": pair,
        }));
    }
    Ok(json!({ "demands": rows }))
}

fn run_routing(
    topology: &Topology,
    demands: &[Demand],
    offered: &[f64],
    cfg: &EngineConfig,
) -> Result<Value> {
    let weights = topology.costs();
    let set = build_candidates(topology, demands, &weights, cfg)?;
    let mut x_p = vec![0.0; set.path_count()];
    for (d, traffic) in offered.iter().enumerate() {
        let shortest = set.shortest_paths_of_demand(d, &weights)?;
        for p in &shortest {
            x_p[*p] = traffic / shortest.len() as f64;
        }
    }

    let converter = RoutingConverter::new(topology, demands, cfg.precision_factor)?;
    let routed = set.routed_paths(&x_p)?;
    let f_te = converter.xp_to_fte(&routed)?;
    let class = converter.classify(&f_te)?;
    info!("forwarding fractions classify as {class}");
    Ok(json!({
        "classification": class.to_string(),
        "link_traffic": set.link_carried_traffic(&x_p)?,
        "installations": set.installations(&x_p)?,
        "forwarding_fractions": f_te,
    }))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let cfg = match args.config.as_ref() {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };
    let (topology, demands, offered) = load_topology(&args.topology)?;
    info!(
        "loaded topology: nodes={} links={} demands={}",
        topology.node_count(),
        topology.link_count(),
        demands.len()
    );

    let result = match args.mode {
        Mode::Candidates => run_candidates(&topology, &demands, &cfg)?,
        Mode::DisjointLink => run_disjoint(&topology, &demands, false)?,
        Mode::DisjointNode => run_disjoint(&topology, &demands, true)?,
        Mode::Routing => run_routing(&topology, &demands, &offered, &cfg)?,
    };
    let payload = json!({
        "topology": args.topology,
        "mode": format!("{:?}", args.mode),
        "result": result,
    });

    if let Some(path) = args.output_json {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(&payload)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
