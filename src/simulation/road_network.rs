//! Road network graph for pathfinding
//!
//! Mirrors the static topology in a petgraph directed graph so that path
//! enumeration and path costs never need to touch the mutable car state.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rand::seq::IndexedRandom;
use rand::Rng;

use ordered_float::OrderedFloat;

use super::types::{EdgeId, NodeId, RouteMetric};
use crate::error::{RoutingError, SimError, SimResult};

/// Edge data for the road network graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadEdge {
    pub edge_id: EdgeId,
    pub length: f64,
    pub max_speed: f64,
}

impl RoadEdge {
    /// Ticks needed to drive the whole edge unobstructed
    pub fn traversal_ticks(&self) -> f64 {
        self.length / self.max_speed
    }
}

/// Static road graph used for route planning
#[derive(Debug, Default, Clone)]
pub struct SimRoadNetwork {
    /// The underlying petgraph directed graph (one-way roads)
    graph: DiGraph<NodeId, RoadEdge>,

    /// Maps node IDs to their node indices in the graph
    node_to_index: HashMap<NodeId, NodeIndex>,

    /// Maps road IDs to their edge indices in the graph
    edge_to_index: HashMap<EdgeId, EdgeIndex>,

    /// Cost in ticks of crossing each intersection
    crossing_costs: HashMap<NodeId, f64>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intersection to the network graph
    pub fn add_intersection(&mut self, node_id: NodeId, crossing_cost: f64) {
        if self.node_to_index.contains_key(&node_id) {
            return;
        }
        let index = self.graph.add_node(node_id);
        self.node_to_index.insert(node_id, index);
        self.crossing_costs.insert(node_id, crossing_cost);
    }

    /// Adds a road between two known intersections
    pub fn add_road(&mut self, start: NodeId, end: NodeId, road: RoadEdge) -> SimResult<()> {
        let start_index = self.node_index(start)?;
        let end_index = self.node_index(end)?;
        let index = self.graph.add_edge(start_index, end_index, road);
        self.edge_to_index.insert(road.edge_id, index);
        Ok(())
    }

    pub fn road(&self, edge_id: EdgeId) -> Option<&RoadEdge> {
        self.edge_to_index
            .get(&edge_id)
            .and_then(|index| self.graph.edge_weight(*index))
    }

    /// Start and end intersections of a road
    pub fn endpoints(&self, edge_id: EdgeId) -> Option<(NodeId, NodeId)> {
        let index = self.edge_to_index.get(&edge_id)?;
        let (start, end) = self.graph.edge_endpoints(*index)?;
        Some((self.graph[start], self.graph[end]))
    }

    pub fn crossing_cost(&self, node_id: NodeId) -> Option<f64> {
        self.crossing_costs.get(&node_id).copied()
    }

    /// Whether a car can drive from the end of `from` straight onto `to`
    pub fn connects(&self, from: EdgeId, to: EdgeId) -> bool {
        match (self.endpoints(from), self.endpoints(to)) {
            (Some((_, junction)), Some((start, _))) => junction == start,
            _ => false,
        }
    }

    pub fn road_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn intersection_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Every path from `start` to `end` that never repeats an edge.
    ///
    /// Paths include both `start` and `end`. The search is exhaustive and
    /// exponential on dense cyclic graphs; branches that cannot reach the
    /// destination at all are pruned up front. Each call starts from fresh
    /// accumulators.
    pub fn all_simple_paths(&self, start: EdgeId, end: EdgeId) -> SimResult<Vec<Vec<EdgeId>>> {
        let start_index = self.edge_index(start)?;
        let end_index = self.edge_index(end)?;
        if start == end {
            return Ok(vec![vec![start]]);
        }

        let (_, junction) = self.edge_nodes(start_index)?;
        let (destination_origin, _) = self.edge_nodes(end_index)?;

        let can_reach = self.nodes_reaching(destination_origin);

        let mut paths = Vec::new();
        if can_reach.contains(&junction) {
            let mut path = vec![start];
            let mut visited = HashSet::from([start]);
            self.extend_paths(junction, end, &can_reach, &mut path, &mut visited, &mut paths);
        }
        Ok(paths)
    }

    /// Every intersection from which `target` can be reached, `target` included
    fn nodes_reaching(&self, target: NodeIndex) -> HashSet<NodeIndex> {
        let mut seen = HashSet::from([target]);
        let mut queue = VecDeque::from([target]);
        while let Some(node) = queue.pop_front() {
            for upstream in self.graph.neighbors_directed(node, Direction::Incoming) {
                if seen.insert(upstream) {
                    queue.push_back(upstream);
                }
            }
        }
        seen
    }

    fn extend_paths(
        &self,
        junction: NodeIndex,
        end: EdgeId,
        can_reach: &HashSet<NodeIndex>,
        path: &mut Vec<EdgeId>,
        visited: &mut HashSet<EdgeId>,
        paths: &mut Vec<Vec<EdgeId>>,
    ) {
        for (edge_id, next_junction) in self.outbound(junction) {
            if edge_id == end {
                let mut found = path.clone();
                found.push(end);
                paths.push(found);
            } else if !visited.contains(&edge_id) && can_reach.contains(&next_junction) {
                path.push(edge_id);
                visited.insert(edge_id);
                self.extend_paths(next_junction, end, can_reach, path, visited, paths);
                visited.remove(&edge_id);
                path.pop();
            }
        }
    }

    /// Outbound roads of an intersection in the order they were added
    fn outbound(&self, junction: NodeIndex) -> Vec<(EdgeId, NodeIndex)> {
        let mut roads: Vec<_> = self
            .graph
            .edges(junction)
            .map(|edge| (edge.id(), edge.weight().edge_id, edge.target()))
            .collect();
        roads.sort_by_key(|(index, _, _)| *index);
        roads
            .into_iter()
            .map(|(_, edge_id, target)| (edge_id, target))
            .collect()
    }

    /// Total length of a path
    pub fn path_cost_distance(&self, path: &[EdgeId]) -> SimResult<f64> {
        let mut distance = 0.0;
        for edge_id in path {
            distance += self.road_or_err(*edge_id)?.length;
        }
        Ok(distance)
    }

    /// Unobstructed travel time of a path in ticks.
    ///
    /// Includes the crossing cost of every intersection between consecutive
    /// edges, but not the one at the end of the final edge: the car leaves
    /// the network before reaching it.
    pub fn path_cost_minimum_time(&self, path: &[EdgeId]) -> SimResult<f64> {
        let mut ticks = 0.0;
        for (position, edge_id) in path.iter().enumerate() {
            ticks += self.road_or_err(*edge_id)?.traversal_ticks();
            if position + 1 < path.len() {
                let (_, junction) = self.endpoints(*edge_id).ok_or(SimError::UnknownEdge(*edge_id))?;
                ticks += self.crossing_cost(junction).unwrap_or(0.0);
            }
        }
        Ok(ticks)
    }

    /// Pick one of `paths` according to `metric`. Ties go to the first
    /// path encountered.
    pub fn choose_path<R: Rng + ?Sized>(
        &self,
        paths: &[Vec<EdgeId>],
        metric: RouteMetric,
        rng: &mut R,
    ) -> SimResult<Vec<EdgeId>> {
        if paths.is_empty() {
            return Err(RoutingError::NoCandidates.into());
        }

        let best = match metric {
            RouteMetric::Shortest => self.cheapest(paths, |path| self.path_cost_distance(path))?,
            RouteMetric::Fastest => {
                self.cheapest(paths, |path| self.path_cost_minimum_time(path))?
            }
            RouteMetric::Random => paths.choose(rng).ok_or(RoutingError::NoCandidates)?,
        };
        Ok(best.clone())
    }

    fn cheapest<'a>(
        &self,
        paths: &'a [Vec<EdgeId>],
        cost: impl Fn(&[EdgeId]) -> SimResult<f64>,
    ) -> SimResult<&'a Vec<EdgeId>> {
        let mut costed = Vec::with_capacity(paths.len());
        for path in paths {
            costed.push((OrderedFloat(cost(path.as_slice())?), path));
        }
        costed
            .into_iter()
            .min_by_key(|(cost, _)| *cost)
            .map(|(_, path)| path)
            .ok_or_else(|| RoutingError::NoCandidates.into())
    }

    /// Enumerate and select a route from `from` to `to`, both included.
    pub fn plan_route<R: Rng + ?Sized>(
        &self,
        from: EdgeId,
        to: EdgeId,
        metric: RouteMetric,
        rng: &mut R,
    ) -> SimResult<Vec<EdgeId>> {
        let paths = self.all_simple_paths(from, to)?;
        if paths.is_empty() {
            return Err(RoutingError::NoPath { from, to }.into());
        }
        self.choose_path(&paths, metric, rng)
    }

    fn node_index(&self, node_id: NodeId) -> SimResult<NodeIndex> {
        self.node_to_index
            .get(&node_id)
            .copied()
            .ok_or(SimError::UnknownNode(node_id))
    }

    fn edge_index(&self, edge_id: EdgeId) -> SimResult<EdgeIndex> {
        self.edge_to_index
            .get(&edge_id)
            .copied()
            .ok_or(SimError::UnknownEdge(edge_id))
    }

    fn edge_nodes(&self, index: EdgeIndex) -> SimResult<(NodeIndex, NodeIndex)> {
        self.graph
            .edge_endpoints(index)
            .ok_or_else(|| SimError::Inconsistent(format!("dangling edge index {index:?}")))
    }

    fn road_or_err(&self, edge_id: EdgeId) -> SimResult<&RoadEdge> {
        self.road(edge_id).ok_or(SimError::UnknownEdge(edge_id))
    }
}
