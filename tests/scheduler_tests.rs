mod common;

use chrono::{DateTime, Duration, Utc};

use common::*;
use spacetraders_fleet::config::FleetConfig;
use spacetraders_fleet::models::{MarketSnapshot, PriceQuote, ShipPhase, Step, Task, TaskKind, Waypoint};
use spacetraders_fleet::operations::{ContractManager, FleetScheduler, MarketAnalyzer, PlanInput};
use spacetraders_fleet::storage::ShipRecord;

fn two_markets() -> Vec<Waypoint> {
    vec![marketplace("A", 0, 0), marketplace("B", 10, 0)]
}

fn analyzer_with(config: &FleetConfig, markets: &[(&str, Vec<PriceQuote>)], at: DateTime<Utc>) -> MarketAnalyzer {
    let mut analyzer = MarketAnalyzer::new(config);
    for (name, quotes) in markets {
        analyzer.observe(MarketSnapshot::new(wp(name), quotes.clone(), at));
    }
    analyzer
}

fn iron_ore_spread(config: &FleetConfig, now: DateTime<Utc>) -> MarketAnalyzer {
    analyzer_with(
        config,
        &[
            ("A", vec![quote("IRON_ORE", 10, 8, 20)]),
            ("B", vec![quote("IRON_ORE", 30, 25, 20)]),
        ],
        now,
    )
}

fn plan(
    config: &FleetConfig,
    ships: &[ShipRecord],
    analyzer: &MarketAnalyzer,
    contracts: &ContractManager,
    waypoints: &[Waypoint],
    credits: i64,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let waypoints = waypoint_map(waypoints);
    let input = PlanInput {
        ships,
        analyzer,
        contracts,
        waypoints: &waypoints,
        credits,
        expected_yield: config.scheduler.default_extraction_yield,
        now,
    };
    FleetScheduler::new(config).plan(&input)
}

#[test]
fn test_idle_ship_with_fuel_gets_trade_at_buy_market() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("S1", "A", 40, 40, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1, "one idle ship should get exactly one task");
    let task = &tasks[0];
    assert_eq!(task.kind, TaskKind::Trade);
    assert_eq!(task.target, wp("A"));
    // (25 - 10) * 20 units - ceil(10 fuel * 72 / 100)
    assert_eq!(task.expected_profit, 292);
    assert_eq!(
        task.steps,
        vec![
            Step::Dock,
            Step::Buy {
                good: "IRON_ORE".to_string(),
                units: 20
            },
            Step::Navigate { waypoint: wp("B") },
            Step::Dock,
            Step::Sell {
                good: "IRON_ORE".to_string(),
                units: 20
            },
        ]
    );
}

#[test]
fn test_busy_and_cooling_ships_are_left_alone() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let contracts = ContractManager::new(&config);

    let mut navigating = record(ship("S1", "A", 40, 40, 40));
    navigating.phase = ShipPhase::Navigating;
    let mut tasked = record(ship("S2", "A", 40, 40, 40));
    tasked.task = Some(Task {
        ship: "S2".to_string(),
        kind: TaskKind::Reposition,
        target: wp("B"),
        expected_profit: 0,
        estimated_seconds: 30,
        steps: vec![],
    });
    let mut cooling = record(ship("S3", "A", 40, 40, 40));
    cooling.cooldown_until = Some(now + Duration::seconds(60));

    let tasks = plan(&config, &[navigating, tasked, cooling], &analyzer, &contracts, &two_markets(), 10_000, now);

    assert!(tasks.is_empty(), "no task may go to a non-idle ship: {:?}", tasks);
}

#[test]
fn test_low_fuel_ship_refuels_before_anything_else() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = analyzer_with(
        &config,
        &[
            ("A", vec![quote("IRON_ORE", 10, 8, 20), quote("FUEL", 72, 70, 100)]),
            ("B", vec![quote("IRON_ORE", 30, 25, 20)]),
        ],
        now,
    );
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("S1", "A", 5, 100, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Refuel);
    assert_eq!(tasks[0].target, wp("A"));
    assert_eq!(tasks[0].steps, vec![Step::Dock, Step::Refuel]);
}

#[test]
fn test_trade_beyond_fuel_range_is_not_planned() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let contracts = ContractManager::new(&config);
    let mut waypoints = two_markets();
    waypoints.push(waypoint("FAR", "MOON", 100, 0, &[]));
    // 25% fuel keeps it above the refuel threshold but 100 units short of A
    let ships = vec![record(ship("S1", "FAR", 25, 100, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &waypoints, 10_000, now);

    assert!(tasks.is_empty(), "unreachable trade should be dropped: {:?}", tasks);
}

#[test]
fn test_market_good_reserved_for_one_ship() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let contracts = ContractManager::new(&config);
    let ships = vec![
        record(ship("S2", "A", 40, 40, 40)),
        record(ship("S1", "A", 40, 40, 40)),
    ];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1, "the (A, IRON_ORE) opportunity is claimed once");
    assert_eq!(tasks[0].ship, "S1", "ties go to the lower ship symbol");
}

#[test]
fn test_purchases_must_fit_available_credits() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("S1", "A", 40, 40, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 150, now);

    assert!(tasks.is_empty(), "200 credits of ore cannot be bought with 150");
}

#[test]
fn test_contract_cargo_aboard_goes_to_delivery() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let mut contracts = ContractManager::new(&config);
    contracts.sync(vec![contract("C1", "IRON_ORE", "B", 20, true)], now);
    let ships = vec![record(with_cargo(ship("S1", "A", 40, 40, 40), "IRON_ORE", 20))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.kind, TaskKind::Deliver);
    assert_eq!(task.target, wp("B"));
    assert!(task.steps.contains(&Step::Deliver {
        contract_id: "C1".to_string(),
        good: "IRON_ORE".to_string(),
        units: 20,
    }));
    assert!(
        !task.steps.iter().any(|s| matches!(s, Step::Sell { .. })),
        "contract goods must not be liquidated"
    );
}

#[test]
fn test_miner_heads_for_nearest_asteroid() {
    let mut config = FleetConfig::default();
    config.scheduler.allow_reposition = false;
    let now = Utc::now();
    let analyzer = MarketAnalyzer::new(&config);
    let contracts = ContractManager::new(&config);
    let waypoints = vec![
        marketplace("A", 0, 0),
        waypoint("ROCKS", "ENGINEERED_ASTEROID", 5, 0, &[]),
        waypoint("FARROCKS", "ASTEROID", 50, 0, &[]),
    ];
    let ships = vec![record(miner("M1", "A", 100, 30))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &waypoints, 0, now);

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Mine);
    assert_eq!(tasks[0].target, wp("ROCKS"));
    assert_eq!(
        tasks[0].steps,
        vec![
            Step::Navigate { waypoint: wp("ROCKS") },
            Step::Orbit,
            Step::Extract { wanted: vec![] },
        ]
    );
}

#[test]
fn test_probe_repositions_to_unobserved_market() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = analyzer_with(&config, &[("A", vec![quote("IRON_ORE", 10, 8, 20)])], now);
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("P1", "A", 0, 0, 0))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 0, now);

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Reposition);
    assert_eq!(tasks[0].target, wp("B"));
    assert_eq!(tasks[0].expected_profit, 0);
}

#[test]
fn test_stale_market_counts_as_unobserved() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let mut analyzer = analyzer_with(&config, &[("A", vec![quote("IRON_ORE", 10, 8, 20)])], now);
    analyzer.observe(MarketSnapshot::new(
        wp("B"),
        vec![quote("IRON_ORE", 30, 25, 20)],
        now - Duration::hours(3),
    ));
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("S1", "A", 40, 40, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Reposition, "stale prices must not drive a trade");
    assert_eq!(tasks[0].target, wp("B"));
}

#[test]
fn test_markets_in_another_system_are_not_flown_to() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let mut other = marketplace("B", 10, 0);
    other.symbol = "X1-OTHER-B".to_string();
    other.system_symbol = "X1-OTHER".to_string();
    let waypoints = vec![marketplace("A", 0, 0), other];
    let mut analyzer = analyzer_with(&config, &[("A", vec![quote("IRON_ORE", 10, 8, 20)])], now);
    analyzer.observe(MarketSnapshot::new("X1-OTHER-B", vec![quote("IRON_ORE", 30, 25, 20)], now));
    let contracts = ContractManager::new(&config);
    let ships = vec![record(ship("S1", "A", 40, 40, 40))];

    assert!(
        analyzer.candidates(&waypoint_map(&waypoints), 40, now).is_empty(),
        "no trade route spans two systems"
    );
    let tasks = plan(&config, &ships, &analyzer, &contracts, &waypoints, 10_000, now);

    let leaves_system = tasks.iter().flat_map(|t| &t.steps).any(|step| {
        matches!(step, Step::Navigate { waypoint } if waypoint.as_str() == "X1-OTHER-B")
    });
    assert!(!leaves_system, "navigate cannot cross systems: {:?}", tasks);
}

#[test]
fn test_equal_rate_prefers_quicker_task() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = analyzer_with(&config, &[("A", vec![quote("IRON_ORE", 10, 8, 20)])], now);
    let contracts = ContractManager::new(&config);
    let waypoints = vec![
        marketplace("A", 0, 0),
        marketplace("B", 10, 0),
        waypoint("C", "MOON", 9, 0, &[]),
    ];
    // Both probes can only reposition to B at zero profit; S2 is one unit away
    let ships = vec![record(ship("S1", "A", 0, 0, 0)), record(ship("S2", "C", 0, 0, 0))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &waypoints, 0, now);

    assert_eq!(tasks.len(), 1, "B can be claimed once");
    assert_eq!(tasks[0].ship, "S2", "shorter completion time wins before ship symbol");
    assert_eq!(tasks[0].target, wp("B"));
}

#[test]
fn test_unreserved_cargo_sold_at_best_market() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = analyzer_with(
        &config,
        &[
            ("A", vec![quote("COPPER_ORE", 50, 5, 20)]),
            ("B", vec![quote("COPPER_ORE", 45, 40, 20)]),
        ],
        now,
    );
    let contracts = ContractManager::new(&config);
    let ships = vec![record(with_cargo(ship("S1", "A", 40, 40, 40), "COPPER_ORE", 10))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.kind, TaskKind::Trade);
    assert_eq!(task.target, wp("B"), "40 per unit at B beats 5 at A");
    // 10 units at 40 minus ceil(10 fuel * 72 / 100)
    assert_eq!(task.expected_profit, 392);
    assert_eq!(
        task.steps,
        vec![
            Step::Navigate { waypoint: wp("B") },
            Step::Dock,
            Step::Sell {
                good: "COPPER_ORE".to_string(),
                units: 10
            },
        ]
    );
}

#[test]
fn test_contract_goods_bought_at_cheapest_market_then_delivered() {
    let config = FleetConfig::default();
    let now = Utc::now();
    let analyzer = iron_ore_spread(&config, now);
    let mut contracts = ContractManager::new(&config);
    contracts.sync(vec![contract("C1", "IRON_ORE", "B", 20, true)], now);
    let ships = vec![record(ship("S1", "A", 40, 40, 40))];

    let tasks = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 10_000, now);

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.kind, TaskKind::Deliver);
    assert_eq!(task.target, wp("A"), "A sells ore at 10, B at 30");
    // 20 units at 1000 per unit, minus 200 for the ore and 8 for fuel
    assert_eq!(task.expected_profit, 19_792);
    assert_eq!(
        task.steps,
        vec![
            Step::Dock,
            Step::Buy {
                good: "IRON_ORE".to_string(),
                units: 20
            },
            Step::Navigate { waypoint: wp("B") },
            Step::Dock,
            Step::Deliver {
                contract_id: "C1".to_string(),
                good: "IRON_ORE".to_string(),
                units: 20
            },
            Step::Fulfill {
                contract_id: "C1".to_string()
            },
        ]
    );

    let broke = plan(&config, &ships, &analyzer, &contracts, &two_markets(), 150, now);
    assert!(broke.is_empty(), "the 200 credit purchase must fit the budget: {:?}", broke);
}
