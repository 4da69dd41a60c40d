//! End-to-end solves covering the supported problem classes: pure LPs,
//! second-order cone feasibility and minimum-norm problems, coupled cones,
//! and infeasibility certificates.

use lorix::linalg::sparse;
use lorix::{solve, Settings, SolveStatus};

fn quiet() -> Settings {
    Settings {
        verbose: false,
        ..Settings::default()
    }
}

#[test]
fn lp_equality_and_bounds() {
    // min x1 + x2  s.t.  x1 + x2 = 1, x >= 0
    // Any split of 1 is optimal; the cost is exactly 1.
    let g = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, -1.0)]);
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);

    let sol = solve(
        g,
        a,
        vec![1.0, 1.0],
        vec![0.0, 0.0],
        vec![1.0],
        vec![],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    let cost = sol.x[0] + sol.x[1];
    assert!((cost - 1.0).abs() < 1e-7, "cost = {}", cost);
    assert!(sol.x[0] > -1e-8 && sol.x[1] > -1e-8);

    // Back-scaled primal feasibility: ||Ax - b|| / (1 + ||b||) and
    // ||Gx + s - h|| / (1 + ||h||) within feastol
    let ax = sol.x[0] + sol.x[1];
    assert!((ax - 1.0).abs() / 2.0 <= 1e-8);
    assert!((-sol.x[0] + sol.s[0]).abs() <= 1e-7);
    assert!((-sol.x[1] + sol.s[1]).abs() <= 1e-7);
}

#[test]
fn soc_feasibility_slice() {
    // minimize 0  s.t.  ||x|| <= 1 (via s = -Gx + h = x in SOC), x1 = 0.5
    let g = sparse::from_triplets(
        3,
        3,
        vec![(0, 0, -1.0), (1, 1, -1.0), (2, 2, -1.0)],
    );
    let a = sparse::from_triplets(1, 3, vec![(0, 0, 1.0)]);

    let sol = solve(
        g,
        a,
        vec![0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0],
        vec![0.5],
        vec![3],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    assert!((sol.x[0] - 0.5).abs() < 1e-6, "x0 = {}", sol.x[0]);
    // With a zero objective the central point has the tail at zero
    assert!(sol.x[1].abs() < 1e-5 && sol.x[2].abs() < 1e-5);

    // s must lie in the cone: s0 >= ||s_tail||
    let tail = (sol.s[1] * sol.s[1] + sol.s[2] * sol.s[2]).sqrt();
    assert!(sol.s[0] >= tail - 1e-9);
}

#[test]
fn minimum_norm_reformulation() {
    // minimize ||x||_2 s.t. 3 x1 + 4 x2 = 1, written as
    // min t s.t. t >= ||(x1, x2)||. Optimum: x = a / ||a||^2, t = 0.2.
    let g = sparse::from_triplets(
        3,
        3,
        vec![(0, 0, -1.0), (1, 1, -1.0), (2, 2, -1.0)],
    );
    let a = sparse::from_triplets(1, 3, vec![(0, 1, 3.0), (0, 2, 4.0)]);

    let sol = solve(
        g,
        a,
        vec![1.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0],
        vec![1.0],
        vec![3],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    assert!((sol.x[0] - 0.2).abs() < 1e-6, "t = {}", sol.x[0]);
    assert!((sol.x[1] - 0.12).abs() < 1e-6, "x1 = {}", sol.x[1]);
    assert!((sol.x[2] - 0.16).abs() < 1e-6, "x2 = {}", sol.x[2]);
    assert!(
        sol.info.relgap.is_nan() || sol.info.relgap <= 1e-7,
        "relgap = {}",
        sol.info.relgap
    );
}

#[test]
fn primal_infeasible_box() {
    // x >= 0 and x <= -1 cannot both hold.
    let g = sparse::from_triplets(2, 1, vec![(0, 0, -1.0), (1, 0, 1.0)]);
    let a = sparse::empty(0, 1);

    let sol = solve(
        g,
        a,
        vec![1.0],
        vec![0.0, -1.0],
        vec![],
        vec![],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(
        sol.status,
        SolveStatus::PrimalInfeasible,
        "status {:?}",
        sol.status
    );
    let pinfres = sol.info.pinfres.expect("certificate residual missing");
    assert!(pinfres < 1e-8, "pinfres = {}", pinfres);
    assert!(sol.tau < sol.kappa);
}

#[test]
fn dual_infeasible_unbounded() {
    // min -x s.t. x >= 0 is unbounded below.
    let g = sparse::from_triplets(1, 1, vec![(0, 0, -1.0)]);
    let a = sparse::empty(0, 1);

    let sol = solve(g, a, vec![-1.0], vec![0.0], vec![], vec![], quiet())
        .expect("setup failed");

    assert_eq!(
        sol.status,
        SolveStatus::DualInfeasible,
        "status {:?}",
        sol.status
    );
    let dinfres = sol.info.dinfres.expect("certificate residual missing");
    assert!(dinfres < 1e-8, "dinfres = {}", dinfres);
    assert!(sol.tau < sol.kappa);
}

#[test]
fn two_socs_coupled_by_equalities() {
    // min x1 + y1 s.t. ||(x2,x3)|| <= x1, ||(y2,y3)|| <= y1,
    // x2 + y2 = 1, x3 + y3 = 1. By symmetry each cone carries (0.5, 0.5)
    // and the cost is 2*sqrt(0.5).
    let g = sparse::from_triplets(
        6,
        6,
        (0..6).map(|i| (i, i, -1.0)).collect::<Vec<_>>(),
    );
    let a = sparse::from_triplets(
        2,
        6,
        vec![(0, 1, 1.0), (0, 4, 1.0), (1, 2, 1.0), (1, 5, 1.0)],
    );

    let sol = solve(
        g,
        a,
        vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        vec![0.0; 6],
        vec![1.0, 1.0],
        vec![3, 3],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    let cost = sol.x[0] + sol.x[3];
    let expected = 2.0 * 0.5_f64.sqrt();
    assert!(
        (cost - expected).abs() < 1e-6,
        "cost = {}, expected {}",
        cost,
        expected
    );
}

#[test]
fn no_equality_constraints() {
    // p = 0: min x s.t. x >= 1 through the inequality block alone.
    let g = sparse::from_triplets(1, 1, vec![(0, 0, -1.0)]);
    let a = sparse::empty(0, 1);

    let sol = solve(g, a, vec![1.0], vec![-1.0], vec![], vec![], quiet())
        .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    assert!((sol.x[0] - 1.0).abs() < 1e-7, "x = {}", sol.x[0]);
    assert!(sol.y.is_empty());
}

#[test]
fn soc_dimension_two() {
    // SOC(2) reduces to t >= |x|: min t s.t. x = 0.7 has t = 0.7.
    let g = sparse::from_triplets(2, 2, vec![(0, 0, -1.0), (1, 1, -1.0)]);
    let a = sparse::from_triplets(1, 2, vec![(0, 1, 1.0)]);

    let sol = solve(
        g,
        a,
        vec![1.0, 0.0],
        vec![0.0, 0.0],
        vec![0.7],
        vec![2],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    assert!((sol.x[0] - 0.7).abs() < 1e-6, "t = {}", sol.x[0]);
}

#[test]
fn zero_row_passes_through_equilibration() {
    // A structurally empty G row only says h_row >= slack; the
    // equilibration floor keeps its factor at one and the solve works.
    let g = sparse::from_triplets(2, 1, vec![(0, 0, -1.0)]);
    let a = sparse::empty(0, 1);

    let sol = solve(
        g,
        a,
        vec![1.0],
        vec![0.0, 1.0],
        vec![],
        vec![],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    assert!(sol.x[0].abs() < 1e-6, "x = {}", sol.x[0]);
    // The empty row's slack equals h exactly
    assert!((sol.s[1] - 1.0).abs() < 1e-6);
}

#[test]
fn scaled_data_round_trip() {
    // Wildly scaled copy of the equality LP; the equilibrator has to
    // deliver the same solution in original units.
    let g = sparse::from_triplets(2, 2, vec![(0, 0, -500.0), (1, 1, -0.004)]);
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1000.0), (0, 1, 0.008)]);

    let sol = solve(
        g,
        a,
        vec![2.0, 0.5],
        vec![0.0, 0.0],
        vec![1.0],
        vec![],
        quiet(),
    )
    .expect("setup failed");

    assert_eq!(sol.status, SolveStatus::Optimal, "status {:?}", sol.status);
    let ax = 1000.0 * sol.x[0] + 0.008 * sol.x[1];
    assert!((ax - 1.0).abs() < 1e-6, "Ax = {}", ax);
}
