//! Randomized checks of the min-cost max-flow solver on layered networks

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use merger_resolver_rs::flow::{ArcId, FlowNetwork};

struct Layered {
    network: FlowNetwork,
    source: usize,
    sink: usize,
    /// (from, to, capacity, cost, handle)
    arcs: Vec<(usize, usize, u32, f64, ArcId)>,
}

/// Source, `layers` layers of 2..=5 nodes with random arcs between
/// neighboring layers, sink. Terminal arcs have unit capacity.
fn layered(rng: &mut StdRng, layers: usize, cost_of: impl Fn(&mut StdRng) -> f64) -> Layered {
    let sizes: Vec<usize> = (0..layers).map(|_| rng.gen_range(2..=5)).collect();
    let total: usize = sizes.iter().sum();
    let mut network = FlowNetwork::new(total + 2);
    let source = total;
    let sink = total + 1;

    let mut offsets = Vec::with_capacity(layers);
    let mut next = 0;
    for size in &sizes {
        offsets.push(next);
        next += size;
    }

    let mut arcs = Vec::new();
    let mut add = |network: &mut FlowNetwork, u: usize, v: usize, capacity: u32, cost: f64| {
        let id = network.add_arc(u, v, capacity, cost);
        arcs.push((u, v, capacity, cost, id));
    };

    for i in 0..sizes[0] {
        add(&mut network, source, offsets[0] + i, 1, 0.0);
    }
    for l in 0..layers - 1 {
        for i in 0..sizes[l] {
            for j in 0..sizes[l + 1] {
                if rng.gen_bool(0.6) {
                    let cost = cost_of(&mut *rng);
                    add(&mut network, offsets[l] + i, offsets[l + 1] + j, 1, cost);
                }
            }
        }
    }
    for i in 0..sizes[layers - 1] {
        add(&mut network, offsets[layers - 1] + i, sink, 1, 0.0);
    }

    Layered {
        network,
        source,
        sink,
        arcs,
    }
}

fn uniform_cost(rng: &mut StdRng) -> f64 {
    rng.gen_range(0.0..10.0)
}

#[test]
fn test_flow_is_conserved_and_within_capacity() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let layers = rng.gen_range(2..=4);
        let mut g = layered(&mut rng, layers, uniform_cost);
        let solution = g.network.min_cost_max_flow(g.source, g.sink).unwrap();

        let mut balance = vec![0i64; g.network.num_nodes()];
        let mut cost = 0.0;
        for &(u, v, capacity, arc_cost, id) in &g.arcs {
            let flow = g.network.flow(id);
            assert!(flow <= capacity);
            balance[u] -= i64::from(flow);
            balance[v] += i64::from(flow);
            cost += f64::from(flow) * arc_cost;
        }

        for (node, &b) in balance.iter().enumerate() {
            if node == g.source {
                assert_eq!(b, -i64::from(solution.flow));
            } else if node == g.sink {
                assert_eq!(b, i64::from(solution.flow));
            } else {
                assert_eq!(b, 0, "node {} is not balanced", node);
            }
        }
        assert!((cost - solution.cost).abs() < 1e-9);
    }
}

#[test]
fn test_flow_value_does_not_depend_on_costs() {
    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..50u64 {
        let layers = rng.gen_range(2..=4);
        // Same topology, once with random costs and once with zero costs.
        // Both draw a cost per arc so the generators stay in step.
        let mut weighted = layered(&mut StdRng::seed_from_u64(round), layers, uniform_cost);
        let mut flat = layered(&mut StdRng::seed_from_u64(round), layers, |rng| {
            uniform_cost(rng) * 0.0
        });

        let a = weighted
            .network
            .min_cost_max_flow(weighted.source, weighted.sink)
            .unwrap();
        let b = flat.network.min_cost_max_flow(flat.source, flat.sink).unwrap();
        assert_eq!(a.flow, b.flow);

        // The cost-blind flow is a maximum flow too, so it cannot be cheaper
        let blind_cost: f64 = weighted
            .arcs
            .iter()
            .zip(&flat.arcs)
            .map(|(w, f)| f64::from(flat.network.flow(f.4)) * w.3)
            .sum();
        assert!(a.cost <= blind_cost + 1e-9, "{} > {}", a.cost, blind_cost);
    }
}

#[test]
fn test_negative_costs_without_cycles_are_solved() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..20 {
        let mut g = layered(&mut rng, 3, |rng| rng.gen_range(-5.0..5.0));
        let solution = g.network.min_cost_max_flow(g.source, g.sink).unwrap();
        let used: u32 = g
            .arcs
            .iter()
            .filter(|a| a.0 == g.source)
            .map(|a| g.network.flow(a.4))
            .sum();
        assert_eq!(used, solution.flow);
    }
}
