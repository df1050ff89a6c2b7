//! Tests that schedule whole problems and check the written schedules.

use assert_approx_eq::assert_approx_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use roundabout_sched::format::{parse_problem, parse_schedule, write_schedule, Problem};
use roundabout_sched::generate::{generate_problem, GeneratorConfig};
use roundabout_sched::validate::validate;
use roundabout_sched::{Limits, Schedule, Scheduler, SchedulerConfig, Violation};

fn solve(input: &str) -> (Problem, Schedule) {
    let problem = parse_problem(input, &Limits::default()).unwrap();
    let mut scheduler = Scheduler::new(problem.ring.clone(), &problem.vehicles, SchedulerConfig::default()).unwrap();
    let schedule = scheduler.solve().unwrap();
    (problem, schedule)
}

/// Writes the schedule, reads it back and validates it.
fn violations(problem: &Problem, schedule: &Schedule) -> Vec<Violation> {
    let lines = parse_schedule(&write_schedule(schedule)).unwrap();
    validate(problem, &lines, &Limits::default())
}

/// A lone vehicle accelerates to the speed limit and cruises to its exit.
#[test]
fn lone_vehicle_drives_at_full_speed() {
    let (problem, schedule) = solve("1 8 10 10 10 10 10 10 10 10\n0 0 7 0 0\n");
    let vehicle = &schedule.vehicles[0];
    assert_eq!(vehicle.sections.len(), 7);
    // 5 s to reach 15 m/s over 37.5 m, then 32.5 m at 15 m/s
    assert_approx_eq!(vehicle.exit_time(), 5.0 + 32.5 / 15.0);
    assert_approx_eq!(vehicle.travel_time(), vehicle.ideal_travel_time);

    let lines = parse_schedule(&write_schedule(&schedule)).unwrap();
    assert_eq!(lines[0].arcs.len(), 2);
    assert_approx_eq!(lines[0].arcs[0].1, 3.0);
    assert_approx_eq!(lines[0].arcs[1].0, 5.0);
    assert_approx_eq!(lines[0].arcs[1].1, 0.0);
    assert_eq!(violations(&problem, &schedule), vec![]);
}

/// A vehicle arriving right behind another at the same entry waits out the time gap.
#[test]
fn simultaneous_arrivals_are_spaced() {
    let input = "2 8 10 10 10 10 10 10 10 10\n0 0 3 0 0\n1 0 2 0.1 0\n";
    let problem = parse_problem(input, &Limits::default()).unwrap();
    let mut scheduler = Scheduler::new(problem.ring.clone(), &problem.vehicles, SchedulerConfig::default()).unwrap();
    let schedule = scheduler.solve().unwrap();

    assert!(scheduler.table().entry_time(0, 1).unwrap() >= 1.5 - 1e-9);
    assert_approx_eq!(schedule.vehicles[1].entry_time(), 1.5);
    assert_approx_eq!(schedule.vehicles[0].entry_time(), 0.0);
    assert_eq!(violations(&problem, &schedule), vec![]);
}

/// A vehicle arriving at full speed behind a slow one brakes to keep its distance.
#[test]
fn fast_follower_brakes() {
    let (problem, schedule) = solve("2 4 100 100 100 100\n0 0 1 0 2\n1 0 1 3.25 15\n");
    let follower = &schedule.vehicles[1];
    let min_acc = Limits::default().min_acc;
    assert!(follower
        .sections
        .iter()
        .flat_map(|(_, traj)| traj.arcs())
        .any(|arc| arc.acc == min_acc));
    assert_approx_eq!(follower.entry_time(), 3.25);
    let leader = schedule.vehicles[0].trajectory().unwrap();
    let time_gap = Limits::default().time_gap;
    let ring_len = problem.ring.total_length();
    assert!(!follower
        .trajectory()
        .unwrap()
        .conflicts_with(&leader, time_gap, ring_len));
    assert_eq!(violations(&problem, &schedule), vec![]);
}

/// Vehicles crossing the seam of the ring are kept apart from those entering past it.
#[test]
fn schedules_across_the_seam() {
    let input = "4 6 12 8 10 15 10 9\n0 4 2 0 0\n1 0 3 0.5 5\n2 5 1 1.0 0\n3 1 4 1.2 0\n";
    let (problem, schedule) = solve(input);
    for vehicle in &schedule.vehicles {
        assert!(vehicle.entry_time() >= vehicle.arrival_time - 1e-9);
        assert!(vehicle.trajectory().is_some());
    }
    assert!(schedule.stats.repair_passes <= problem.vehicles.len());
    assert_eq!(violations(&problem, &schedule), vec![]);
}

#[test]
fn solving_is_deterministic() {
    let input = "5 5 10 10 10 10 10\n0 0 3 0 0\n1 1 4 0.2 0\n2 0 2 0.4 0\n3 3 1 0.4 0\n4 2 0 1.0 0\n";
    let problem = parse_problem(input, &Limits::default()).unwrap();
    let mut scheduler = Scheduler::new(problem.ring.clone(), &problem.vehicles, SchedulerConfig::default()).unwrap();
    let first = write_schedule(&scheduler.solve().unwrap());
    let second = write_schedule(&scheduler.solve().unwrap());
    let (_, fresh) = solve(input);
    assert_eq!(first, second);
    assert_eq!(first, write_schedule(&fresh));
}

#[test]
fn generated_problems_are_solved() {
    let mut rng = StdRng::from_seed(*b"a roundabout of twenty sections!");
    let config = GeneratorConfig::default();
    for _ in 0..10 {
        let problem = generate_problem(&mut rng, &config).unwrap();
        let mut scheduler =
            Scheduler::new(problem.ring.clone(), &problem.vehicles, SchedulerConfig::default()).unwrap();
        let schedule = scheduler.solve().unwrap();
        assert!(schedule.stats.repair_passes <= problem.vehicles.len());
        assert!(schedule.total_travel_time() >= schedule.ideal_travel_time() - 1e-6);
        assert_eq!(violations(&problem, &schedule), vec![]);
    }
}

/// Dense traffic with journeys across the seam and vehicles arriving in motion.
#[test]
fn wrapping_traffic_is_solved() {
    let mut rng = StdRng::seed_from_u64(42);
    let config = GeneratorConfig {
        max_vehicles: 20,
        min_sections: 4,
        max_sections: 12,
        min_length: 5,
        max_length: 25,
        uniform_lengths: false,
        wrap_around: true,
        max_initial_vel: Limits::default().max_vel,
        arrival_rate: 4.0,
        ..Default::default()
    };
    for _ in 0..25 {
        let problem = generate_problem(&mut rng, &config).unwrap();
        let mut scheduler =
            Scheduler::new(problem.ring.clone(), &problem.vehicles, SchedulerConfig::default()).unwrap();
        let schedule = scheduler.solve().unwrap();
        assert!(schedule.stats.repair_passes <= problem.vehicles.len());
        assert!(schedule.total_travel_time() >= schedule.ideal_travel_time() - 1e-6);
        assert_eq!(violations(&problem, &schedule), vec![]);
    }
}
