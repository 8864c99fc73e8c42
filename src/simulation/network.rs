//! The simulated road network
//!
//! Owns the node, edge and car arenas and drives the global tick: rounds of
//! node ticks are repeated until no car moves or crosses any more.

use std::collections::BTreeMap;

use log::{debug, error, info, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::car::SimCar;
use super::edge::SimEdge;
use super::intersection::{NodeTickOutcome, SimNode, TickContext};
use super::road_network::{RoadEdge, SimRoadNetwork};
use super::snapshot::NetworkSnapshot;
use super::stoplight::Stoplight;
use super::types::{CarId, CarType, EdgeId, Energy, NodeId, RouteMetric};
use super::{CarMap, EdgeMap};
use crate::config::{CarSpec, Defaults, EdgeSpec, NodeSpec, SimConfig, Topology};
use crate::error::{CarSpecError, RoutingError, SimError, SimResult, TopologyError};

/// Result of one global tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Global tick count after this tick
    pub tick: u64,
    /// Inner rounds needed to reach a fixed point
    pub rounds: usize,
    /// Potential spent and spendable, summed over all rounds
    pub energy: Energy,
    /// Cars that left the simulation with a routing error during this tick
    pub stranded: Vec<(CarId, RoutingError)>,
}

impl TickReport {
    pub fn utilization(&self) -> Option<f64> {
        self.energy.utilization()
    }
}

/// Road network with every node, edge and car in the simulation
#[derive(Debug)]
pub struct SimNetwork {
    nodes: BTreeMap<NodeId, SimNode>,
    edges: EdgeMap,
    cars: CarMap,
    roads: SimRoadNetwork,
    rng: StdRng,
    global_tick: u64,
    max_rounds: usize,
    defaults: Defaults,
}

impl SimNetwork {
    /// Creates an empty network. The RNG is seeded from `config.seed`, or
    /// from OS entropy when no seed is given.
    pub fn new(config: &SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    /// Creates an empty network with a caller supplied RNG
    pub fn with_rng(config: &SimConfig, rng: StdRng) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            cars: BTreeMap::new(),
            roads: SimRoadNetwork::new(),
            rng,
            global_tick: 0,
            max_rounds: config.max_rounds,
            defaults: config.defaults,
        }
    }

    /// Creates an empty network with default configuration and a fixed seed
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new(&SimConfig::seeded(seed))
    }

    /// Builds a network from a topology: all nodes, then all edges.
    pub fn build(topology: &Topology, config: &SimConfig) -> SimResult<Self> {
        let mut network = Self::new(config);
        network.load_topology(topology)?;
        Ok(network)
    }

    /// Adds every node and edge of `topology` and checks stoplight patterns
    /// once all edges are known.
    pub fn load_topology(&mut self, topology: &Topology) -> SimResult<()> {
        for node in &topology.node_list {
            self.add_node(node)?;
        }
        for edge in &topology.edge_list {
            self.add_edge(edge)?;
        }
        self.validate_stoplights()?;
        info!(
            "Built network with {} nodes and {} edges",
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    pub fn add_node(&mut self, spec: &NodeSpec) -> SimResult<()> {
        if self.nodes.contains_key(&spec.id) {
            return Err(TopologyError::DuplicateNode(spec.id).into());
        }

        let defaults = &self.defaults.node;
        let cost = spec
            .intersection_time_cost
            .unwrap_or(defaults.intersection_time_cost);
        if !cost.is_finite() || cost < 0.0 {
            return Err(TopologyError::InvalidNode {
                node: spec.id,
                reason: format!("crossing cost must be a non-negative number, got {cost}"),
            }
            .into());
        }

        let stoplight = match &spec.stoplight_pattern {
            Some(pattern) => {
                let duration = spec.stoplight_duration.unwrap_or(defaults.stoplight_duration);
                if duration == 0 {
                    return Err(TopologyError::InvalidStoplight {
                        node: spec.id,
                        reason: "duration must be at least one tick".to_string(),
                    }
                    .into());
                }
                let delay = spec.stoplight_delay.unwrap_or(defaults.stoplight_delay);
                Some(Stoplight::new(pattern.clone(), duration, delay))
            }
            None => None,
        };

        self.nodes
            .insert(spec.id, SimNode::new(spec.id, cost, stoplight));
        self.roads.add_intersection(spec.id, cost);
        debug!("Added {}", spec.id);
        Ok(())
    }

    pub fn add_edge(&mut self, spec: &EdgeSpec) -> SimResult<()> {
        if self.edges.contains_key(&spec.id) {
            return Err(TopologyError::DuplicateEdge(spec.id).into());
        }
        for node in [spec.start_node, spec.end_node] {
            if !self.nodes.contains_key(&node) {
                return Err(TopologyError::MissingNode {
                    edge: spec.id,
                    node,
                }
                .into());
            }
        }

        let defaults = &self.defaults.edge;
        let length = spec.edge_length.unwrap_or(defaults.edge_length);
        let max_speed = spec.max_speed.unwrap_or(defaults.max_speed);
        let max_capacity = spec.max_capacity.unwrap_or(defaults.max_capacity);
        if !length.is_finite() || length < 0.0 {
            return Err(TopologyError::InvalidEdge {
                edge: spec.id,
                reason: format!("length must be a non-negative number, got {length}"),
            }
            .into());
        }
        if !max_speed.is_finite() || max_speed <= 0.0 {
            return Err(TopologyError::InvalidEdge {
                edge: spec.id,
                reason: format!("max speed must be positive, got {max_speed}"),
            }
            .into());
        }

        self.roads.add_road(
            spec.start_node,
            spec.end_node,
            RoadEdge {
                edge_id: spec.id,
                length,
                max_speed,
            },
        )?;
        if let Some(node) = self.nodes.get_mut(&spec.start_node) {
            node.add_outbound(spec.id);
        }
        if let Some(node) = self.nodes.get_mut(&spec.end_node) {
            node.add_inbound(spec.id);
        }
        self.edges.insert(
            spec.id,
            SimEdge::new(
                spec.id,
                spec.start_node,
                spec.end_node,
                length,
                max_speed,
                max_capacity,
            ),
        );
        debug!("Added {} from {} to {}", spec.id, spec.start_node, spec.end_node);
        Ok(())
    }

    /// Every stoplight phase may only name inbound edges of its own node
    fn validate_stoplights(&self) -> SimResult<()> {
        for node in self.nodes.values() {
            let Some(light) = &node.stoplight else {
                continue;
            };
            for edge in light.pattern.iter().flatten() {
                if !node.inbound.contains(edge) {
                    return Err(TopologyError::InvalidStoplight {
                        node: node.id,
                        reason: format!("{edge} is not an inbound edge"),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn remove_node(&mut self, _node_id: NodeId) -> SimResult<()> {
        Err(SimError::Unsupported("node removal"))
    }

    pub fn remove_edge(&mut self, _edge_id: EdgeId) -> SimResult<()> {
        Err(SimError::Unsupported("edge removal"))
    }

    /// Validates a car and queues it on its start edge.
    ///
    /// Nothing is mutated unless every check passes, except that a random
    /// route draws from the network RNG.
    pub fn add_car(&mut self, spec: &CarSpec) -> SimResult<CarId> {
        let id = spec.id;
        if self.cars.contains_key(&id) {
            return Err(CarSpecError::DuplicateCar(id).into());
        }

        let start_length = self.edge_length_for(id, spec.start_edge)?;
        let end_length = self.edge_length_for(id, spec.end_edge)?;
        let start_pos = spec.start_pos_meter.unwrap_or(0.0);
        let end_pos = spec.end_pos_meter.unwrap_or(end_length);
        check_position(id, spec.start_edge, start_pos, start_length)?;
        check_position(id, spec.end_edge, end_pos, end_length)?;

        let defaults = &self.defaults.car;
        let length = spec.car_length.unwrap_or(defaults.car_length);
        if !length.is_finite() || length < 0.0 {
            return Err(CarSpecError::InvalidAttribute {
                car: id,
                field: "car_length",
                value: length,
            }
            .into());
        }
        let max_tick_potential = spec
            .max_tick_potential
            .unwrap_or(defaults.max_tick_potential);
        if !max_tick_potential.is_finite() || max_tick_potential <= 0.0 {
            return Err(CarSpecError::InvalidAttribute {
                car: id,
                field: "max_tick_potential",
                value: max_tick_potential,
            }
            .into());
        }
        let car_type = spec.car_type.unwrap_or(defaults.car_type);
        let metric = spec.route_preference.unwrap_or(defaults.route_preference);

        let path = match &spec.path {
            Some(declared) => self.check_declared_path(id, spec.start_edge, spec.end_edge, declared)?,
            None => self.plan_initial_path(spec.start_edge, spec.end_edge, metric)?,
        };
        // a dynamic car replans at every node and would never leave its end edge
        if car_type == CarType::Dynamic && spec.start_edge == spec.end_edge && !path.is_empty() {
            return Err(CarSpecError::InvalidPath {
                car: id,
                reason: format!("dynamic car already starts on its end edge {}", spec.end_edge),
            }
            .into());
        }
        if path.is_empty() && start_pos > end_pos {
            return Err(CarSpecError::ExitBehindEntry {
                car: id,
                start: start_pos,
                end: end_pos,
            }
            .into());
        }

        let car = SimCar::new(
            id,
            length,
            spec.start_edge,
            start_pos,
            spec.end_edge,
            end_pos,
            path,
            car_type,
            metric,
            max_tick_potential,
        );
        info!(
            "Added {} from {} to {} via {} more edges",
            id,
            spec.start_edge,
            spec.end_edge,
            car.path.len()
        );
        self.cars.insert(id, car);
        self.edges
            .get_mut(&spec.start_edge)
            .ok_or(SimError::UnknownEdge(spec.start_edge))?
            .enqueue(id);
        Ok(id)
    }

    fn edge_length_for(&self, car: CarId, edge: EdgeId) -> SimResult<f64> {
        self.edges
            .get(&edge)
            .map(|edge| edge.length)
            .ok_or_else(|| CarSpecError::UnknownEdge { car, edge }.into())
    }

    /// Strips the start edge from a declared path and checks that the rest
    /// is a connected walk ending at `end`.
    fn check_declared_path(
        &self,
        car: CarId,
        start: EdgeId,
        end: EdgeId,
        declared: &[EdgeId],
    ) -> SimResult<Vec<EdgeId>> {
        let path = match declared.split_first() {
            Some((head, rest)) if *head == start => rest.to_vec(),
            _ => declared.to_vec(),
        };
        let invalid = |reason: String| -> SimError { CarSpecError::InvalidPath { car, reason }.into() };

        match path.last() {
            Some(last) if *last != end => {
                return Err(invalid(format!("ends at {last} instead of {end}")));
            }
            None if start != end => {
                return Err(invalid(format!("is empty but {start} is not {end}")));
            }
            _ => {}
        }

        let mut previous = start;
        for edge in &path {
            if !self.edges.contains_key(edge) {
                return Err(CarSpecError::UnknownEdge { car, edge: *edge }.into());
            }
            if !self.roads.connects(previous, *edge) {
                return Err(invalid(format!("{edge} does not continue from {previous}")));
            }
            previous = *edge;
        }
        Ok(path)
    }

    fn plan_initial_path(
        &mut self,
        start: EdgeId,
        end: EdgeId,
        metric: RouteMetric,
    ) -> SimResult<Vec<EdgeId>> {
        if start == end {
            return Ok(Vec::new());
        }
        let mut path = self.roads.plan_route(start, end, metric, &mut self.rng)?;
        path.remove(0);
        Ok(path)
    }

    /// Runs one global tick.
    ///
    /// Rounds are repeated until a round neither spends potential nor moves
    /// a car across a node. A car that cannot be routed at a node leaves the
    /// simulation with [`RouteFailed`](super::types::RouteStatus::RouteFailed) and is listed in the
    /// report while every other car carries on. Every active car then gets
    /// its full potential back and the global tick advances.
    pub fn tick(&mut self) -> SimResult<TickReport> {
        let mut energy = Energy::default();
        let mut stranded = Vec::new();
        let mut rounds = 0;
        loop {
            if rounds >= self.max_rounds {
                error!(
                    "Tick {} did not settle within {} rounds",
                    self.global_tick, self.max_rounds
                );
                return Err(SimError::RoundLimitExceeded { rounds });
            }
            let mut outcome = self.tick_round()?;
            rounds += 1;
            energy += outcome.energy;
            stranded.append(&mut outcome.stranded);
            trace!(
                "Tick {} round {}: expended {:.3} of {:.3}, {} crossings",
                self.global_tick,
                rounds,
                outcome.energy.expended,
                outcome.energy.max_expendable,
                outcome.crossings
            );
            if outcome.energy.expended == 0.0 && outcome.crossings == 0 {
                break;
            }
        }

        for car in self.cars.values_mut().filter(|car| !car.is_terminal()) {
            car.restore_potential();
        }
        self.global_tick += 1;

        Ok(TickReport {
            tick: self.global_tick,
            rounds,
            energy,
            stranded,
        })
    }

    /// Runs every node tick once, in a random order
    pub fn tick_round(&mut self) -> SimResult<NodeTickOutcome> {
        let mut order: Vec<NodeId> = self.nodes.keys().copied().collect();
        order.shuffle(&mut self.rng);

        let Self {
            nodes,
            edges,
            cars,
            roads,
            rng,
            global_tick,
            ..
        } = self;
        let mut ctx = TickContext {
            edges,
            cars,
            roads,
            rng,
            global_tick: *global_tick,
        };

        let mut outcome = NodeTickOutcome::default();
        for node_id in order {
            let node = nodes.get(&node_id).ok_or(SimError::UnknownNode(node_id))?;
            let mut node_outcome = node.tick(&mut ctx)?;
            outcome.energy += node_outcome.energy;
            outcome.crossings += node_outcome.crossings;
            outcome.stranded.append(&mut node_outcome.stranded);
        }
        Ok(outcome)
    }

    pub fn all_simple_paths(&self, start: EdgeId, end: EdgeId) -> SimResult<Vec<Vec<EdgeId>>> {
        self.roads.all_simple_paths(start, end)
    }

    pub fn path_cost_distance(&self, path: &[EdgeId]) -> SimResult<f64> {
        self.roads.path_cost_distance(path)
    }

    pub fn path_cost_minimum_time(&self, path: &[EdgeId]) -> SimResult<f64> {
        self.roads.path_cost_minimum_time(path)
    }

    /// Picks one of `paths`; the random metric draws from the network RNG
    pub fn choose_path(
        &mut self,
        paths: &[Vec<EdgeId>],
        metric: RouteMetric,
    ) -> SimResult<Vec<EdgeId>> {
        self.roads.choose_path(paths, metric, &mut self.rng)
    }

    /// Takes a car out of the simulation, recording the tick it left at.
    /// Finished cars are left as they are.
    pub fn remove_car(&mut self, car_id: CarId, tick: u64) -> SimResult<()> {
        let car = self
            .cars
            .get_mut(&car_id)
            .ok_or(SimError::UnknownCar(car_id))?;
        if car.is_terminal() {
            return Ok(());
        }
        let holder = car.current_edge.unwrap_or(car.start_edge);
        car.remove_at(tick);

        let removed = self
            .edges
            .get_mut(&holder)
            .is_some_and(|edge| edge.remove_car(car_id));
        if !removed && !self.edges.values_mut().any(|edge| edge.remove_car(car_id)) {
            return Err(SimError::Inconsistent(format!(
                "{car_id} was not held by any edge"
            )));
        }
        info!("Removed {} at tick {}", car_id, tick);
        Ok(())
    }

    pub fn pause_car(&mut self, car_id: CarId) -> SimResult<()> {
        self.car_mut(car_id)?.pause();
        Ok(())
    }

    pub fn resume_car(&mut self, car_id: CarId) -> SimResult<()> {
        self.car_mut(car_id)?.resume();
        Ok(())
    }

    fn car_mut(&mut self, car_id: CarId) -> SimResult<&mut SimCar> {
        self.cars
            .get_mut(&car_id)
            .ok_or(SimError::UnknownCar(car_id))
    }

    pub fn node(&self, node_id: NodeId) -> Option<&SimNode> {
        self.nodes.get(&node_id)
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&SimEdge> {
        self.edges.get(&edge_id)
    }

    pub fn car(&self, car_id: CarId) -> Option<&SimCar> {
        self.cars.get(&car_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SimNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &SimEdge> {
        self.edges.values()
    }

    pub fn cars(&self) -> impl Iterator<Item = &SimCar> {
        self.cars.values()
    }

    pub fn roads(&self) -> &SimRoadNetwork {
        &self.roads
    }

    pub fn global_tick(&self) -> u64 {
        self.global_tick
    }

    /// Cars that have neither completed their route nor been removed
    pub fn active_car_count(&self) -> usize {
        self.cars.values().filter(|car| !car.is_terminal()).count()
    }

    pub fn completed_car_count(&self) -> usize {
        self.edges.values().map(|edge| edge.completed().len()).sum()
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::capture(self)
    }
}

fn check_position(car: CarId, edge: EdgeId, position: f64, length: f64) -> SimResult<()> {
    if position.is_finite() && (0.0..=length).contains(&position) {
        Ok(())
    } else {
        Err(CarSpecError::PositionOutOfRange {
            car,
            edge,
            position,
            length,
        }
        .into())
    }
}
