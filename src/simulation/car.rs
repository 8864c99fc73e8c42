//! Car state for the traffic simulation
//!
//! A car has no scheduling of its own: edges and nodes move it, and the
//! network restores its tick potential at the end of every global tick.

use super::types::{CarId, CarType, EdgeId, RouteMetric, RouteStatus};

/// A car in the traffic simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimCar {
    pub id: CarId,
    /// Physical length, may be 0
    pub length: f64,
    pub start_edge: EdgeId,
    pub start_pos: f64,
    pub end_edge: EdgeId,
    pub end_pos: f64,
    /// Upcoming edges, head is the next edge to enter
    pub path: Vec<EdgeId>,
    pub car_type: CarType,
    pub route_metric: RouteMetric,
    pub mobile: bool,
    pub route_status: RouteStatus,
    /// `None` while the car is still queued on its start edge
    pub current_edge: Option<EdgeId>,
    /// Position of the front of the car along `current_edge`
    pub position: f64,
    pub max_tick_potential: f64,
    pub current_tick_potential: f64,
}

impl SimCar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CarId,
        length: f64,
        start_edge: EdgeId,
        start_pos: f64,
        end_edge: EdgeId,
        end_pos: f64,
        path: Vec<EdgeId>,
        car_type: CarType,
        route_metric: RouteMetric,
        max_tick_potential: f64,
    ) -> Self {
        Self {
            id,
            length,
            start_edge,
            start_pos,
            end_edge,
            end_pos,
            path,
            car_type,
            route_metric,
            mobile: true,
            route_status: RouteStatus::InProgress,
            current_edge: None,
            position: start_pos,
            max_tick_potential,
            current_tick_potential: max_tick_potential,
        }
    }

    /// Potential consumed since `old_potential` was read
    pub fn tick(&self, old_potential: f64) -> f64 {
        old_potential - self.current_tick_potential
    }

    pub fn is_terminal(&self) -> bool {
        self.route_status.is_terminal()
    }

    /// True when `edge` is the last leg of this car's route
    pub fn is_on_final_edge(&self, edge: EdgeId) -> bool {
        self.end_edge == edge && self.path.is_empty()
    }

    /// Next edge the car will enter, if any
    pub fn next_edge(&self) -> Option<EdgeId> {
        self.path.first().copied()
    }

    pub fn pop_next_edge(&mut self) -> Option<EdgeId> {
        if self.path.is_empty() {
            None
        } else {
            Some(self.path.remove(0))
        }
    }

    /// Place the car on an edge at the given front position
    pub fn place(&mut self, edge: EdgeId, position: f64) {
        self.current_edge = Some(edge);
        self.position = position;
    }

    pub fn restore_potential(&mut self) {
        self.current_tick_potential = self.max_tick_potential;
    }

    /// Position of the rear bumper
    pub fn back(&self) -> f64 {
        self.position - self.length
    }

    /// Halt the car. Only a car in progress changes state.
    pub fn pause(&mut self) {
        if self.route_status == RouteStatus::InProgress {
            self.mobile = false;
            self.route_status = RouteStatus::Paused;
        }
    }

    /// Undo [`SimCar::pause`]. Only a paused car changes state.
    pub fn resume(&mut self) {
        if self.route_status == RouteStatus::Paused {
            self.mobile = true;
            self.route_status = RouteStatus::InProgress;
        }
    }

    pub fn complete(&mut self, exit_position: f64) {
        self.position = exit_position;
        self.mobile = false;
        self.route_status = RouteStatus::RouteCompleted;
    }

    pub fn remove_at(&mut self, tick: u64) {
        self.mobile = false;
        self.current_tick_potential = 0.0;
        self.route_status = RouteStatus::RemovedAtTick(tick);
    }

    pub fn fail_route(&mut self, tick: u64) {
        self.mobile = false;
        self.current_tick_potential = 0.0;
        self.route_status = RouteStatus::RouteFailed(tick);
    }
}
