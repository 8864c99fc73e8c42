//! Public entry point to the simulation
//!
//! `TrafficManager` owns a [`SimNetwork`] and the tick counter used to
//! timestamp external removals.

use log::{debug, info};

use super::network::SimNetwork;
use super::snapshot::NetworkSnapshot;
use super::types::{CarId, EdgeId, NodeId, RouteMetric};
use crate::config::{CarSpec, SimConfig, Topology};
use crate::error::SimResult;

#[derive(Debug)]
pub struct TrafficManager {
    network: SimNetwork,
    timestamp: u64,
}

impl TrafficManager {
    pub fn new(topology: &Topology, config: &SimConfig) -> SimResult<Self> {
        Ok(Self::from_network(SimNetwork::build(topology, config)?))
    }

    pub fn from_network(network: SimNetwork) -> Self {
        let timestamp = network.global_tick();
        Self { network, timestamp }
    }

    /// Advances the simulation by one tick and returns the share of
    /// available potential the cars actually used, or `None` if no car
    /// could have moved.
    pub fn tick(&mut self) -> SimResult<Option<f64>> {
        let report = self.network.tick()?;
        self.timestamp += 1;
        debug!("Tick {} settled after {} rounds", self.timestamp, report.rounds);
        Ok(report.utilization())
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn add_car(&mut self, spec: &CarSpec) -> SimResult<CarId> {
        self.network.add_car(spec)
    }

    /// Adds cars in order and stops at the first rejected one. Cars added
    /// before the failure stay in the network.
    pub fn add_cars(&mut self, specs: &[CarSpec]) -> SimResult<usize> {
        for spec in specs {
            self.network.add_car(spec)?;
        }
        info!("Added {} cars", specs.len());
        Ok(specs.len())
    }

    pub fn remove_car(&mut self, car_id: CarId) -> SimResult<()> {
        self.network.remove_car(car_id, self.timestamp)
    }

    pub fn pause_car(&mut self, car_id: CarId) -> SimResult<()> {
        self.network.pause_car(car_id)
    }

    pub fn resume_car(&mut self, car_id: CarId) -> SimResult<()> {
        self.network.resume_car(car_id)
    }

    pub fn remove_node(&mut self, node_id: NodeId) -> SimResult<()> {
        self.network.remove_node(node_id)
    }

    pub fn remove_edge(&mut self, edge_id: EdgeId) -> SimResult<()> {
        self.network.remove_edge(edge_id)
    }

    pub fn get_snapshot(&self) -> NetworkSnapshot {
        self.network.snapshot()
    }

    pub fn get_all_paths(&self, start: EdgeId, end: EdgeId) -> SimResult<Vec<Vec<EdgeId>>> {
        self.network.all_simple_paths(start, end)
    }

    pub fn get_path_distance(&self, path: &[EdgeId]) -> SimResult<f64> {
        self.network.path_cost_distance(path)
    }

    pub fn get_path_minimum_time(&self, path: &[EdgeId]) -> SimResult<f64> {
        self.network.path_cost_minimum_time(path)
    }

    pub fn choose_shortest(&mut self, paths: &[Vec<EdgeId>]) -> SimResult<Vec<EdgeId>> {
        self.network.choose_path(paths, RouteMetric::Shortest)
    }

    pub fn choose_fastest(&mut self, paths: &[Vec<EdgeId>]) -> SimResult<Vec<EdgeId>> {
        self.network.choose_path(paths, RouteMetric::Fastest)
    }

    pub fn choose_random(&mut self, paths: &[Vec<EdgeId>]) -> SimResult<Vec<EdgeId>> {
        self.network.choose_path(paths, RouteMetric::Random)
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }
}
