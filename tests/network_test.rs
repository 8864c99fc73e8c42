//! Network construction, car validation, lifecycle and tick behaviour

use traffic_core::config::{CarSpec, EdgeSpec, NodeSpec, SimConfig, Topology};
use traffic_core::error::{CarSpecError, SimError, TopologyError};
use traffic_core::generator;
use traffic_core::simulation::{
    Capacity, CarId, CarType, EdgeId, NodeId, RouteMetric, RouteStatus, SimNetwork,
    TrafficManager,
};

fn edge(id: u64, start: u64, end: u64) -> EdgeSpec {
    EdgeSpec::new(EdgeId(id), NodeId(start), NodeId(end))
        .with_length(10.0)
        .with_speed(10.0)
}

fn nodes(count: u64) -> Vec<NodeSpec> {
    (0..count).map(|id| NodeSpec::new(NodeId(id))).collect()
}

/// Straight road 0 -> 1 -> 2 -> 3 over edges 0, 1 and 2
fn chain() -> Topology {
    Topology {
        node_list: nodes(4),
        edge_list: vec![edge(0, 0, 1), edge(1, 1, 2), edge(2, 2, 3)],
    }
}

fn manager(topology: &Topology) -> TrafficManager {
    TrafficManager::new(topology, &SimConfig::seeded(5)).unwrap()
}

fn topology_error(topology: &Topology) -> TopologyError {
    match SimNetwork::build(topology, &SimConfig::seeded(0)) {
        Err(SimError::Topology(err)) => err,
        other => panic!("expected a topology error, got {other:?}"),
    }
}

fn car_error(manager: &mut TrafficManager, spec: &CarSpec) -> CarSpecError {
    match manager.add_car(spec) {
        Err(SimError::CarSpec(err)) => err,
        other => panic!("expected a car spec error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_node_is_rejected() {
    let mut topology = chain();
    topology.node_list.push(NodeSpec::new(NodeId(2)));

    assert_eq!(topology_error(&topology), TopologyError::DuplicateNode(NodeId(2)));
}

#[test]
fn test_duplicate_edge_is_rejected() {
    let mut topology = chain();
    topology.edge_list.push(edge(1, 2, 3));

    assert_eq!(topology_error(&topology), TopologyError::DuplicateEdge(EdgeId(1)));
}

#[test]
fn test_edge_to_missing_node_names_the_node() {
    let mut topology = chain();
    topology.edge_list.push(edge(7, 3, 9));

    assert_eq!(
        topology_error(&topology),
        TopologyError::MissingNode {
            edge: EdgeId(7),
            node: NodeId(9)
        }
    );
}

#[test]
fn test_non_positive_speed_is_rejected() {
    let mut topology = chain();
    topology.edge_list.push(edge(7, 3, 0).with_speed(0.0));

    assert!(matches!(
        topology_error(&topology),
        TopologyError::InvalidEdge { edge: EdgeId(7), .. }
    ));
}

#[test]
fn test_stoplight_must_name_inbound_edges() {
    let mut topology = chain();
    topology.node_list[1] = NodeSpec::new(NodeId(1)).with_stoplight(vec![vec![EdgeId(1)]], 2, 0);

    assert!(matches!(
        topology_error(&topology),
        TopologyError::InvalidStoplight { node: NodeId(1), .. }
    ));
}

#[test]
fn test_stoplight_needs_a_duration() {
    let mut topology = chain();
    topology.node_list[1] = NodeSpec::new(NodeId(1)).with_stoplight(vec![vec![EdgeId(0)]], 0, 1);

    assert!(matches!(
        topology_error(&topology),
        TopologyError::InvalidStoplight { node: NodeId(1), .. }
    ));
}

#[test]
fn test_missing_edge_attributes_use_defaults() {
    let topology = Topology {
        node_list: nodes(2),
        edge_list: vec![EdgeSpec::new(EdgeId(0), NodeId(0), NodeId(1))],
    };
    let network = SimNetwork::build(&topology, &SimConfig::default()).unwrap();

    let edge = network.edge(EdgeId(0)).unwrap();
    assert_eq!(edge.length, 100.0);
    assert_eq!(edge.max_speed, 10.0);
    assert_eq!(edge.max_capacity, Capacity::Unbounded);
    assert_eq!(network.node(NodeId(0)).unwrap().outbound, vec![EdgeId(0)]);
    assert_eq!(network.node(NodeId(1)).unwrap().inbound, vec![EdgeId(0)]);
}

#[test]
fn test_start_position_beyond_edge_is_rejected() {
    let mut manager = manager(&chain());
    let spec = CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)).with_positions(11.0, 5.0);

    assert!(matches!(
        car_error(&mut manager, &spec),
        CarSpecError::PositionOutOfRange { car: CarId(1), edge: EdgeId(0), .. }
    ));
    assert!(manager.network().car(CarId(1)).is_none());
}

#[test]
fn test_invalid_cars_are_rejected() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();

    assert_eq!(
        car_error(&mut manager, &CarSpec::new(CarId(1), EdgeId(0), EdgeId(2))),
        CarSpecError::DuplicateCar(CarId(1))
    );
    assert_eq!(
        car_error(&mut manager, &CarSpec::new(CarId(2), EdgeId(8), EdgeId(2))),
        CarSpecError::UnknownEdge {
            car: CarId(2),
            edge: EdgeId(8)
        }
    );
    assert!(matches!(
        car_error(
            &mut manager,
            &CarSpec::new(CarId(3), EdgeId(1), EdgeId(1)).with_positions(8.0, 2.0)
        ),
        CarSpecError::ExitBehindEntry { .. }
    ));
    assert!(matches!(
        car_error(
            &mut manager,
            &CarSpec::new(CarId(4), EdgeId(0), EdgeId(2)).with_max_tick_potential(0.0)
        ),
        CarSpecError::InvalidAttribute {
            field: "max_tick_potential",
            ..
        }
    ));
    assert!(matches!(
        car_error(
            &mut manager,
            &CarSpec::new(CarId(5), EdgeId(0), EdgeId(2)).with_length(-1.0)
        ),
        CarSpecError::InvalidAttribute {
            field: "car_length",
            ..
        }
    ));
    assert_eq!(manager.network().cars().count(), 1);
}

#[test]
fn test_declared_paths_are_checked() {
    let mut manager = manager(&chain());

    let skips_an_edge = CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)).with_path(vec![EdgeId(2)]);
    let wrong_end = CarSpec::new(CarId(2), EdgeId(0), EdgeId(2)).with_path(vec![EdgeId(1)]);
    let unknown = CarSpec::new(CarId(3), EdgeId(0), EdgeId(2))
        .with_path(vec![EdgeId(1), EdgeId(6), EdgeId(2)]);
    let empty = CarSpec::new(CarId(4), EdgeId(0), EdgeId(2)).with_path(vec![]);

    assert!(matches!(car_error(&mut manager, &skips_an_edge), CarSpecError::InvalidPath { .. }));
    assert!(matches!(car_error(&mut manager, &wrong_end), CarSpecError::InvalidPath { .. }));
    assert!(matches!(car_error(&mut manager, &unknown), CarSpecError::UnknownEdge { .. }));
    assert!(matches!(car_error(&mut manager, &empty), CarSpecError::InvalidPath { .. }));

    let with_head = CarSpec::new(CarId(5), EdgeId(0), EdgeId(2))
        .with_path(vec![EdgeId(0), EdgeId(1), EdgeId(2)]);
    let without_head =
        CarSpec::new(CarId(6), EdgeId(0), EdgeId(2)).with_path(vec![EdgeId(1), EdgeId(2)]);
    manager.add_car(&with_head).unwrap();
    manager.add_car(&without_head).unwrap();
    let network = manager.network();
    assert_eq!(network.car(CarId(5)).unwrap().path, vec![EdgeId(1), EdgeId(2)]);
    assert_eq!(network.car(CarId(6)).unwrap().path, vec![EdgeId(1), EdgeId(2)]);
}

#[test]
fn test_car_travels_the_chain_and_completes() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)).with_positions(0.0, 5.0))
        .unwrap();

    // enter, then one edge per tick, then half of the last edge
    manager.tick().unwrap();
    manager.tick().unwrap();
    assert_eq!(manager.network().car(CarId(1)).unwrap().current_edge, Some(EdgeId(1)));
    manager.tick().unwrap();
    assert_eq!(manager.network().car(CarId(1)).unwrap().current_edge, Some(EdgeId(2)));
    manager.tick().unwrap();

    let network = manager.network();
    let car = network.car(CarId(1)).unwrap();
    assert_eq!(car.route_status, RouteStatus::RouteCompleted);
    assert_eq!(car.position, 5.0);
    assert_eq!(network.edge(EdgeId(2)).unwrap().completed(), &[CarId(1)]);
    assert_eq!(network.active_car_count(), 0);
    assert_eq!(network.completed_car_count(), 1);
}

#[test]
fn test_pause_and_resume_are_idempotent() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();

    manager.pause_car(CarId(1)).unwrap();
    manager.pause_car(CarId(1)).unwrap();
    let car = manager.network().car(CarId(1)).unwrap();
    assert_eq!(car.route_status, RouteStatus::Paused);
    assert!(!car.mobile);

    manager.resume_car(CarId(1)).unwrap();
    manager.resume_car(CarId(1)).unwrap();
    let car = manager.network().car(CarId(1)).unwrap();
    assert_eq!(car.route_status, RouteStatus::InProgress);
    assert!(car.mobile);
}

#[test]
fn test_removed_car_leaves_the_edges() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();
    manager.tick().unwrap();
    manager.tick().unwrap();

    manager.remove_car(CarId(1)).unwrap();

    let snapshot = manager.get_snapshot();
    let car = snapshot.car(CarId(1)).unwrap();
    assert_eq!(car.route_status, RouteStatus::RemovedAtTick(2));
    assert!(!car.mobile);
    for edge in &snapshot.edges {
        assert!(!edge.current_cars.contains(&CarId(1)));
        assert!(!edge.waiting_cars.contains(&CarId(1)));
    }

    // terminal cars ignore further lifecycle requests
    manager.pause_car(CarId(1)).unwrap();
    manager.remove_car(CarId(1)).unwrap();
    assert_eq!(
        manager.network().car(CarId(1)).unwrap().route_status,
        RouteStatus::RemovedAtTick(2)
    );
    assert_eq!(manager.tick().unwrap(), None);
}

#[test]
fn test_removing_a_queued_car() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();

    manager.remove_car(CarId(1)).unwrap();

    assert_eq!(manager.network().edge(EdgeId(0)).unwrap().waiting().count(), 0);
    assert_eq!(
        manager.network().car(CarId(1)).unwrap().route_status,
        RouteStatus::RemovedAtTick(0)
    );
}

#[test]
fn test_unknown_car_lifecycle_requests_fail() {
    let mut manager = manager(&chain());

    assert_eq!(manager.pause_car(CarId(9)), Err(SimError::UnknownCar(CarId(9))));
    assert_eq!(manager.resume_car(CarId(9)), Err(SimError::UnknownCar(CarId(9))));
    assert_eq!(manager.remove_car(CarId(9)), Err(SimError::UnknownCar(CarId(9))));
}

#[test]
fn test_topology_removal_is_unsupported() {
    let mut manager = manager(&chain());

    assert!(matches!(
        manager.remove_node(NodeId(0)),
        Err(SimError::Unsupported(_))
    ));
    assert!(matches!(
        manager.remove_edge(EdgeId(0)),
        Err(SimError::Unsupported(_))
    ));
    assert_eq!(manager.network().edges().count(), 3);
}

#[test]
fn test_round_cap_aborts_the_tick() {
    let config = SimConfig {
        max_rounds: 1,
        ..SimConfig::seeded(1)
    };
    let mut manager = TrafficManager::new(&chain(), &config).unwrap();
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();

    assert_eq!(
        manager.tick(),
        Err(SimError::RoundLimitExceeded { rounds: 1 })
    );
    assert_eq!(manager.timestamp(), 0);
}

#[test]
fn test_busy_network_stays_within_energy_bounds() {
    let topology = generator::complete_network(4);
    let mut manager = manager(&topology);
    for id in 0..20 {
        manager
            .add_car(&CarSpec::new(CarId(id), EdgeId(id % 12), EdgeId((id * 5 + 3) % 12)))
            .unwrap();
    }

    for _ in 0..40 {
        if let Some(utilization) = manager.tick().unwrap() {
            assert!((0.0..=1.0 + 1e-9).contains(&utilization));
        }
    }
    let network = manager.network();
    assert_eq!(
        network.active_car_count() + network.completed_car_count(),
        20
    );
}

#[test]
fn test_dynamic_car_reroutes_at_the_intersection() {
    // edge 1 is the declared route, edge 2 is shorter
    let topology = Topology {
        node_list: nodes(6),
        edge_list: vec![
            edge(0, 0, 1),
            edge(1, 1, 2).with_length(50.0),
            edge(2, 1, 3).with_length(20.0),
            edge(3, 2, 4),
            edge(4, 3, 4),
            edge(5, 4, 5),
        ],
    };
    let mut manager = manager(&topology);
    let declared = vec![EdgeId(1), EdgeId(3), EdgeId(5)];
    manager
        .add_car(
            &CarSpec::new(CarId(1), EdgeId(0), EdgeId(5))
                .with_path(declared.clone())
                .with_type(CarType::Dynamic)
                .with_metric(RouteMetric::Shortest),
        )
        .unwrap();
    manager
        .add_car(
            &CarSpec::new(CarId(2), EdgeId(0), EdgeId(5))
                .with_length(0.0)
                .with_path(declared)
                .with_type(CarType::Static),
        )
        .unwrap();

    manager.tick().unwrap();
    manager.tick().unwrap();

    let network = manager.network();
    let dynamic = network.car(CarId(1)).unwrap();
    assert_eq!(dynamic.current_edge, Some(EdgeId(2)));
    assert_eq!(dynamic.path, vec![EdgeId(4), EdgeId(5)]);
    let fixed = network.car(CarId(2)).unwrap();
    assert_eq!(fixed.current_edge, Some(EdgeId(1)));
    assert_eq!(fixed.path, vec![EdgeId(3), EdgeId(5)]);
}

#[test]
fn test_dynamic_car_cannot_loop_back_onto_its_end_edge() {
    // two nodes joined both ways
    let topology = Topology {
        node_list: nodes(2),
        edge_list: vec![edge(1, 0, 1), edge(2, 1, 0)],
    };
    let mut manager = manager(&topology);
    let looping = CarSpec::new(CarId(1), EdgeId(1), EdgeId(1))
        .with_path(vec![EdgeId(1), EdgeId(2), EdgeId(1)])
        .with_type(CarType::Dynamic);

    assert!(matches!(
        car_error(&mut manager, &looping),
        CarSpecError::InvalidPath { car: CarId(1), .. }
    ));

    // the same loop is a valid route for a static car
    manager
        .add_car(&looping.clone().with_type(CarType::Static).with_length(0.0))
        .unwrap();
    manager
        .add_car(&CarSpec::new(CarId(9), EdgeId(2), EdgeId(2)).with_positions(0.0, 5.0))
        .unwrap();
    for _ in 0..6 {
        manager.tick().unwrap();
    }
    assert_eq!(manager.timestamp(), 6);
    assert_eq!(
        manager.network().car(CarId(1)).unwrap().route_status,
        RouteStatus::RouteCompleted
    );
    assert_eq!(manager.network().completed_car_count(), 2);
}

#[test]
fn test_stoplight_holds_cars_until_green() {
    // green for one tick out of every three
    let mut topology = chain();
    topology.node_list[1] = NodeSpec::new(NodeId(1)).with_stoplight(vec![vec![EdgeId(0)]], 1, 2);
    let mut manager = manager(&topology);
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(1)))
        .unwrap();

    for _ in 0..3 {
        manager.tick().unwrap();
    }
    let car = manager.network().car(CarId(1)).unwrap();
    assert_eq!(car.current_edge, Some(EdgeId(0)));
    assert_eq!(car.position, 10.0);

    manager.tick().unwrap();
    assert_eq!(manager.network().car(CarId(1)).unwrap().current_edge, Some(EdgeId(1)));
}

#[test]
fn test_full_downstream_edge_holds_cars_back() {
    let mut topology = chain();
    topology.edge_list[1] = edge(1, 1, 2)
        .with_length(100.0)
        .with_capacity(Capacity::Limited(1));
    let mut manager = manager(&topology);
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(1)).with_positions(5.0, 100.0))
        .unwrap();
    manager
        .add_car(&CarSpec::new(CarId(2), EdgeId(0), EdgeId(1)).with_positions(0.0, 100.0))
        .unwrap();

    manager.tick().unwrap();
    manager.tick().unwrap();

    let network = manager.network();
    assert_eq!(network.car(CarId(1)).unwrap().current_edge, Some(EdgeId(1)));
    let waiting = network.car(CarId(2)).unwrap();
    assert_eq!(waiting.current_edge, Some(EdgeId(0)));
    assert_eq!(waiting.position, 10.0);
    assert_eq!(network.edge(EdgeId(1)).unwrap().current(), &[CarId(1)]);
}

#[test]
fn test_same_seed_same_simulation() {
    let run = || {
        let mut manager = TrafficManager::new(
            &generator::complete_network(4),
            &SimConfig::seeded(99),
        )
        .unwrap();
        for id in 0..10 {
            manager
                .add_car(&CarSpec::new(CarId(id), EdgeId(id), EdgeId(11 - id)))
                .unwrap();
        }
        for _ in 0..15 {
            manager.tick().unwrap();
        }
        manager.get_snapshot()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_snapshot_can_be_fed_back_in() {
    let mut manager = manager(&chain());
    manager
        .add_car(&CarSpec::new(CarId(1), EdgeId(0), EdgeId(2)))
        .unwrap();
    manager
        .add_car(&CarSpec::new(CarId(2), EdgeId(0), EdgeId(0)).with_positions(0.0, 5.0))
        .unwrap();
    for _ in 0..3 {
        manager.tick().unwrap();
    }

    let snapshot = manager.get_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    assert_eq!(serde_json::from_str::<traffic_core::simulation::NetworkSnapshot>(&json).unwrap(), snapshot);

    let scenario = snapshot.to_scenario();
    assert_eq!(scenario.car_list.len(), 1);
    let resumed = &scenario.car_list[0];
    assert_eq!(resumed.start_edge, EdgeId(2));
    assert_eq!(resumed.start_pos_meter, Some(0.0));

    let mut rebuilt = TrafficManager::new(&scenario.topology, &SimConfig::seeded(5)).unwrap();
    assert_eq!(rebuilt.add_cars(&scenario.car_list).unwrap(), 1);
    assert_eq!(rebuilt.network().edges().count(), 3);
}
