//! Road segment logic for the traffic simulation
//!
//! An edge owns the IDs of the cars physically on it and resolves their
//! forward motion one sub-tick at a time. Car records themselves live in the
//! network's car arena and are passed in by reference.

use std::cmp::Reverse;
use std::collections::VecDeque;

use log::{debug, info};
use ordered_float::OrderedFloat;

use super::types::{Capacity, CarId, EdgeId, Energy, NodeId};
use super::CarMap;
use crate::error::{SimError, SimResult};

/// A one-way road segment between two nodes
#[derive(Debug, Clone)]
pub struct SimEdge {
    pub id: EdgeId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub length: f64,
    /// Distance a car covers in one full tick
    pub max_speed: f64,
    pub max_capacity: Capacity,
    /// Cars queued to enter the network here, not yet positioned
    waiting: VecDeque<CarId>,
    /// Cars on the edge, front-most first after each tick
    current: Vec<CarId>,
    /// Scratch list filled during a tick, becomes `current` at its end
    processed: Vec<CarId>,
    /// Cars that finished their route on this edge
    completed: Vec<CarId>,
}

impl SimEdge {
    pub fn new(
        id: EdgeId,
        start_node: NodeId,
        end_node: NodeId,
        length: f64,
        max_speed: f64,
        max_capacity: Capacity,
    ) -> Self {
        Self {
            id,
            start_node,
            end_node,
            length,
            max_speed,
            max_capacity,
            waiting: VecDeque::new(),
            current: Vec::new(),
            processed: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn waiting(&self) -> impl Iterator<Item = CarId> + '_ {
        self.waiting.iter().copied()
    }

    pub fn current(&self) -> &[CarId] {
        &self.current
    }

    pub fn completed(&self) -> &[CarId] {
        &self.completed
    }

    /// Cars physically on the edge, including those handed over this round
    pub fn occupancy(&self) -> usize {
        self.current.len() + self.processed.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.max_capacity.admits(self.occupancy())
    }

    /// Queue a new car to enter the network on this edge
    pub fn enqueue(&mut self, car_id: CarId) {
        self.waiting.push_back(car_id);
    }

    /// Take over a car crossing in from an upstream node.
    ///
    /// The car joins `processed`, so it does not move again on this edge
    /// until the next call to [`SimEdge::tick`].
    pub fn accept_car(&mut self, car_id: CarId) {
        self.processed.push(car_id);
    }

    /// Put back a car that could not cross the downstream node
    pub fn return_car(&mut self, car_id: CarId) {
        self.current.push(car_id);
    }

    /// Drop a car from every active container. Returns whether it was found.
    pub fn remove_car(&mut self, car_id: CarId) -> bool {
        let before = self.waiting.len() + self.current.len() + self.processed.len();
        self.waiting.retain(|id| *id != car_id);
        self.current.retain(|id| *id != car_id);
        self.processed.retain(|id| *id != car_id);
        before != self.waiting.len() + self.current.len() + self.processed.len()
    }

    /// Remove and return every mobile car that has reached the end of the
    /// edge and still has somewhere to go.
    pub fn take_exit_candidates(&mut self, cars: &CarMap) -> Vec<CarId> {
        let (leaving, staying): (Vec<CarId>, Vec<CarId>) =
            self.current.iter().copied().partition(|car_id| {
                cars.get(car_id).is_some_and(|car| {
                    car.mobile && car.position >= self.length && !car.is_on_final_edge(self.id)
                })
            });
        self.current = staying;
        leaving
    }

    /// True when a car of `length` with its front at `position` would not
    /// overlap any car already on the edge.
    pub fn has_room_at(&self, cars: &CarMap, position: f64, length: f64) -> bool {
        let back = position - length;
        self.current
            .iter()
            .chain(&self.processed)
            .filter_map(|car_id| cars.get(car_id))
            .all(|other| other.back() >= position || other.position <= back)
    }

    /// Advance every car on the edge as far as its potential, the car ahead
    /// and its exit position allow.
    ///
    /// Cars are processed front to back so that no car is ever moved past
    /// the rear of the car ahead of it. Cars admitted or handed over during
    /// this round hold their place but still block the cars behind them.
    /// Returns the potential spent and the potential that could have been
    /// spent.
    pub fn tick(&mut self, cars: &mut CarMap) -> SimResult<Energy> {
        let mut energy = Energy::default();

        self.admit_waiting(cars, &mut energy)?;

        let mut ordered = Vec::with_capacity(self.occupancy());
        for (car_id, moves) in std::mem::take(&mut self.current)
            .into_iter()
            .map(|car_id| (car_id, true))
            .chain(std::mem::take(&mut self.processed).into_iter().map(|car_id| (car_id, false)))
        {
            let car = cars.get(&car_id).ok_or_else(|| self.missing(car_id))?;
            let key = (Reverse(OrderedFloat(car.position)), Reverse(OrderedFloat(car.back())));
            ordered.push((key, car_id, moves));
        }
        // at equal fronts the shorter car is the one ahead
        ordered.sort_by_key(|(key, _, _)| *key);

        let mut prev_car_back = self.length;
        for (_, car_id, moves) in ordered {
            let car = cars.get_mut(&car_id).ok_or_else(|| self.missing(car_id))?;
            if !moves {
                prev_car_back = car.back();
                self.processed.push(car_id);
                continue;
            }

            let old_potential = car.current_tick_potential;
            energy.max_expendable += old_potential;

            if !car.mobile {
                car.current_tick_potential = 0.0;
            } else if old_potential > 0.0 {
                let reach = old_potential * self.max_speed;
                let gap = (prev_car_back - car.position).max(0.0);

                if car.is_on_final_edge(self.id) {
                    let dist_to_exit = car.end_pos - car.position;
                    if dist_to_exit <= 0.0 || dist_to_exit < reach.min(gap) {
                        let spent = (dist_to_exit.max(0.0) / self.max_speed).min(old_potential);
                        car.current_tick_potential = old_potential - spent;
                        energy.expended += car.tick(old_potential);
                        car.complete(car.end_pos);
                        self.completed.push(car_id);
                        info!("{} completed its route on {}", car_id, self.id);
                        continue;
                    }
                }

                if gap <= reach {
                    car.current_tick_potential = (old_potential - gap / self.max_speed).max(0.0);
                    if gap > 0.0 {
                        car.position = prev_car_back;
                    }
                } else {
                    car.current_tick_potential = 0.0;
                    car.position += reach;
                }
                energy.expended += car.tick(old_potential);
            }

            prev_car_back = car.back();
            self.processed.push(car_id);
        }

        self.current = std::mem::take(&mut self.processed);
        Ok(energy)
    }

    /// Admit queued cars while there is room. Entering consumes the car's
    /// whole remaining potential for this tick. A car whose entry spot is
    /// taken by another car stays queued.
    fn admit_waiting(&mut self, cars: &mut CarMap, energy: &mut Energy) -> SimResult<()> {
        for car_id in std::mem::take(&mut self.waiting) {
            let car = cars.get(&car_id).ok_or_else(|| self.missing(car_id))?;
            if !car.mobile {
                self.waiting.push_back(car_id);
                continue;
            }
            if !self.has_capacity() {
                debug!("{} is full, {} stays queued", self.id, car_id);
                self.waiting.push_back(car_id);
                continue;
            }
            if !self.has_room_at(cars, car.start_pos, car.length) {
                debug!("{} is blocked at {} on {}", car_id, car.start_pos, self.id);
                self.waiting.push_back(car_id);
                continue;
            }

            let car = cars.get_mut(&car_id).ok_or_else(|| self.missing(car_id))?;
            let potential = car.current_tick_potential;
            car.place(self.id, car.start_pos);
            car.current_tick_potential = 0.0;
            *energy += Energy::new(potential, potential);
            debug!("{} entered {} at {}", car_id, self.id, car.start_pos);
            self.processed.push(car_id);
        }
        Ok(())
    }

    fn missing(&self, car_id: CarId) -> SimError {
        SimError::Inconsistent(format!("{} holds unregistered {}", self.id, car_id))
    }
}
