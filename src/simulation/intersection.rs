//! Intersection logic for the traffic simulation
//!
//! A node decides which cars waiting at the end of its inbound edges may
//! cross onto an outbound edge, performs the hand-off, and then lets its
//! outbound edges resolve motion.

use std::cmp::Reverse;

use log::{debug, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::road_network::SimRoadNetwork;
use super::stoplight::Stoplight;
use super::types::{CarId, CarType, EdgeId, Energy, NodeId, RouteMetric};
use super::{CarMap, EdgeMap};
use crate::error::{RoutingError, SimError, SimResult};

/// Mutable simulation state a node works on during its tick
pub struct TickContext<'a> {
    pub edges: &'a mut EdgeMap,
    pub cars: &'a mut CarMap,
    pub roads: &'a SimRoadNetwork,
    pub rng: &'a mut StdRng,
    pub global_tick: u64,
}

/// What one node tick achieved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTickOutcome {
    pub energy: Energy,
    /// Cars handed from an inbound to an outbound edge
    pub crossings: usize,
    /// Cars taken out of the simulation because they could not be routed
    pub stranded: Vec<(CarId, RoutingError)>,
}

/// An intersection in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimNode {
    pub id: NodeId,
    pub inbound: Vec<EdgeId>,
    pub outbound: Vec<EdgeId>,
    /// Share of a tick a car spends crossing
    pub crossing_cost: f64,
    pub stoplight: Option<Stoplight>,
}

impl SimNode {
    pub fn new(id: NodeId, crossing_cost: f64, stoplight: Option<Stoplight>) -> Self {
        Self {
            id,
            inbound: Vec::new(),
            outbound: Vec::new(),
            crossing_cost,
            stoplight,
        }
    }

    pub fn add_inbound(&mut self, edge_id: EdgeId) {
        self.inbound.push(edge_id);
    }

    pub fn add_outbound(&mut self, edge_id: EdgeId) {
        self.outbound.push(edge_id);
    }

    /// Inbound edges allowed to release cars during `global_tick`
    pub fn open_inbound(&self, global_tick: u64) -> Vec<EdgeId> {
        match &self.stoplight {
            Some(light) => self
                .inbound
                .iter()
                .copied()
                .filter(|edge| light.is_open(*edge, global_tick))
                .collect(),
            None => self.inbound.clone(),
        }
    }

    /// One resolution pass of this intersection.
    ///
    /// Cars at the end of an open inbound edge try to cross, the ones with
    /// the most unused potential first. Afterwards every outbound edge is
    /// ticked in random order.
    pub fn tick(&self, ctx: &mut TickContext<'_>) -> SimResult<NodeTickOutcome> {
        let mut outcome = NodeTickOutcome::default();

        let mut candidates = Vec::new();
        for inbound in self.open_inbound(ctx.global_tick) {
            let edge = ctx
                .edges
                .get_mut(&inbound)
                .ok_or(SimError::UnknownEdge(inbound))?;
            for car_id in edge.take_exit_candidates(ctx.cars) {
                let potential = ctx
                    .cars
                    .get(&car_id)
                    .map(|car| car.current_tick_potential)
                    .ok_or(SimError::UnknownCar(car_id))?;
                candidates.push((OrderedFloat(potential), inbound, car_id));
            }
        }
        candidates.sort_by_key(|(potential, _, _)| Reverse(*potential));

        let mut pending = candidates.into_iter();
        while let Some((_, inbound, car_id)) = pending.next() {
            match self.cross(ctx, inbound, car_id, &mut outcome) {
                Ok(()) => {}
                Err(SimError::Routing(err)) => {
                    let car = ctx.cars.get_mut(&car_id).ok_or(SimError::UnknownCar(car_id))?;
                    car.fail_route(ctx.global_tick);
                    warn!(
                        "{car_id} leaves the simulation at {inbound}, node {}: {err}",
                        self.id
                    );
                    outcome.stranded.push((car_id, err));
                }
                Err(err) => {
                    for (_, edge_id, waiting_car) in pending {
                        return_to(ctx, edge_id, waiting_car)?;
                    }
                    return Err(err);
                }
            }
        }

        let mut order = self.outbound.clone();
        order.shuffle(&mut *ctx.rng);
        for edge_id in order {
            let edge = ctx
                .edges
                .get_mut(&edge_id)
                .ok_or(SimError::UnknownEdge(edge_id))?;
            outcome.energy += edge.tick(ctx.cars)?;
        }

        Ok(outcome)
    }

    /// Try to move one exit candidate onto the next edge of its path.
    /// A car that has to wait goes back onto `inbound`; a car that cannot be
    /// routed is left off every edge and its routing error returned.
    fn cross(
        &self,
        ctx: &mut TickContext<'_>,
        inbound: EdgeId,
        car_id: CarId,
        outcome: &mut NodeTickOutcome,
    ) -> SimResult<()> {
        let car = ctx.cars.get(&car_id).ok_or(SimError::UnknownCar(car_id))?;
        let remaining = car.current_tick_potential;
        if remaining < self.crossing_cost {
            return return_to(ctx, inbound, car_id);
        }

        if car.car_type == CarType::Dynamic {
            let (metric, destination) = (car.route_metric, car.end_edge);
            let path = reroute(ctx, inbound, destination, metric)?;
            if let Some(car) = ctx.cars.get_mut(&car_id) {
                car.path = path;
            }
        }

        let car = ctx.cars.get(&car_id).ok_or(SimError::UnknownCar(car_id))?;
        let Some(next) = car.next_edge() else {
            let destination = car.end_edge;
            return Err(RoutingError::NoPath {
                from: inbound,
                to: destination,
            }
            .into());
        };
        let length = car.length;
        if !self.outbound.contains(&next) {
            return Err(RoutingError::NotOutbound {
                car: car_id,
                node: self.id,
                edge: next,
            }
            .into());
        }

        let next_edge = ctx.edges.get_mut(&next).ok_or(SimError::UnknownEdge(next))?;
        if !next_edge.has_capacity() {
            debug!("{} is full, {car_id} waits at {}", next, self.id);
            return return_to(ctx, inbound, car_id);
        }
        if !next_edge.has_room_at(ctx.cars, 0.0, length) {
            debug!("Entry of {} is blocked, {car_id} waits at {}", next, self.id);
            return return_to(ctx, inbound, car_id);
        }
        next_edge.accept_car(car_id);

        let car = ctx.cars.get_mut(&car_id).ok_or(SimError::UnknownCar(car_id))?;
        car.place(next, 0.0);
        car.current_tick_potential = remaining - self.crossing_cost;
        car.pop_next_edge();

        outcome.energy += Energy::new(self.crossing_cost, self.crossing_cost);
        outcome.crossings += 1;
        debug!("{car_id} crossed {} from {inbound} onto {next}", self.id);
        Ok(())
    }
}

/// Fresh upcoming path for a dynamic car sitting at the end of `current`
fn reroute(
    ctx: &mut TickContext<'_>,
    current: EdgeId,
    destination: EdgeId,
    metric: RouteMetric,
) -> SimResult<Vec<EdgeId>> {
    let mut path = ctx.roads.plan_route(current, destination, metric, &mut *ctx.rng)?;
    if path.len() <= 1 {
        return Err(RoutingError::NoPath {
            from: current,
            to: destination,
        }
        .into());
    }
    path.remove(0);
    Ok(path)
}

fn return_to(ctx: &mut TickContext<'_>, edge_id: EdgeId, car_id: CarId) -> SimResult<()> {
    ctx.edges
        .get_mut(&edge_id)
        .ok_or(SimError::UnknownEdge(edge_id))?
        .return_car(car_id);
    Ok(())
}
