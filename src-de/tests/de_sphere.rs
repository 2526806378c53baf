use devolve_de::{
    ChangeOverGeneration, DifferentialEvolutionSolver, SolveOptions, Strategy, Warnflag,
};
use devolve_testfunctions::sphere;
use ndarray::Array1;

#[test]
fn test_de_sphere_5d_plateaus_near_zero() {
    let (lower, upper) = (Array1::from_elem(5, -10.0), Array1::from_elem(5, 10.0));
    let mut solver = DifferentialEvolutionSolver::new(5, 30);
    solver.set_random_seed(30);
    solver.set_strict_ranges(&lower, &upper).unwrap();
    solver.set_random_initial_points(&lower, &upper).unwrap();

    let options = SolveOptions {
        strategy: Strategy::Best1Bin,
        crossover_probability: 0.9,
        scaling_factor: 0.8,
        ..Default::default()
    };
    solver
        .solve(sphere, &mut ChangeOverGeneration::new(1e-8, 50), options)
        .unwrap();

    assert_eq!(solver.warnflag(), Warnflag::Terminated);
    assert!(
        solver.best_energy() < 1e-8,
        "best energy too high: {}",
        solver.best_energy()
    );
    for &xi in solver.best_vector().iter() {
        assert!(xi.abs() < 1e-3, "component too far from 0: {}", xi);
    }
}
