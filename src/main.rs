mod data_structures {
    pub mod union_find;
}

mod numeric {
    pub mod vector;
}

mod factors {
    pub mod factor_trait;
    pub mod factor_type;
    pub mod general_factor;
    pub mod multicut_edge;
    pub mod multicut_global;
    pub mod multicut_triplet;
    pub mod unary_factor;
}

mod messages {
    pub mod message_nd;
    pub mod message_trait;
}

mod cfn {
    pub mod cost_function_network;
    pub mod factor_sequence;
    pub mod relaxation;
    pub mod solution;
    pub mod solver;
    pub mod uai;
}

mod alg {
    pub mod srmp;
    pub mod tree;
    pub mod visitor;
}

mod tighten {
    pub mod cycle;
    pub mod min_conv;
    pub mod odd_wheel;
}

pub mod error;

pub use cfn::cost_function_network::{CostFunctionNetwork, FactorOrigin};
pub use cfn::solution::Solution;
pub use error::{SolveError, SolveResult};

use alg::tree::{build_spanning_tree, solve_tree_exact};
use cfn::{
    relaxation::{ConstructRelaxation, Relaxation},
    solver::{Solver, SolverOptions},
    uai::UAI,
};
use log::{debug, info, warn};
use tighten::{cycle::tighten_cycles, odd_wheel::tighten_odd_wheels};

use alg::srmp::SRMP;

fn solve_one(mut cfn: CostFunctionNetwork, options: &SolverOptions) -> SolveResult<Option<Solution>> {
    loop {
        let relaxation = Relaxation::new(&cfn);

        // If the relaxation graph happens to be tree-shaped, solve it exactly
        // instead of running the approximate dual ascent (tighter, and cheaper).
        if let Some(tree) = build_spanning_tree(&relaxation) {
            info!("Relaxation is tree-shaped; solving it exactly.");
            return Ok(Some(solve_tree_exact(&cfn, &relaxation, &tree)));
        }

        let solver = SRMP::init(&cfn, &relaxation).run(options);

        if solver.timed_out() {
            return Err(SolveError::Timeout);
        }

        if !options.tighten() || !solver.tighten_requested() {
            let solution = solver.solution().cloned();
            if let Some(sol) = &solution {
                if sol.cost(&cfn).is_infinite() {
                    return Err(SolveError::InfeasibleProblem);
                }
            }
            return Ok(solution);
        }

        let added = tighten_cycles(
            &mut cfn,
            options.tighten_min_dual_increase(),
            options.tighten_constraints_max(),
        ) + tighten_odd_wheels(&mut cfn, options.tighten_constraints_max());

        if added == 0 {
            return Err(SolveError::TighteningNoProgress {
                min_dual_increase: options.tighten_min_dual_increase(),
            });
        }
        info!("Tightening added {} constraint(s); rebuilding and resuming.", added);
    }
}

fn main() {
    std::env::set_var("RUST_LOG", "info");
    env_logger::init();
    debug!("In main");

    let test_instance_files = std::fs::read_dir("test_instances/").unwrap();

    for path in test_instance_files {
        let input_filename = path.unwrap().path();

        debug!("Importing test instance from {}", input_filename.display());
        let cfn = CostFunctionNetwork::read_uai(input_filename, false);

        let mut options = SolverOptions::default();
        options.set_tighten(true);

        debug!("Running SRMP");
        match solve_one(cfn, &options) {
            Ok(Some(solution)) => debug!("Finished: {}\n\n\n", solution),
            Ok(None) => debug!("Finished with no solution computed\n\n\n"),
            // Infeasible/no-progress outcomes are non-fatal per the error taxonomy:
            // this instance just has no better answer to report. A timeout means
            // the budget ran out mid-sweep; either way, move on to the next instance.
            Err(err) => warn!("Finished with no usable solution: {}\n\n\n", err),
        }
    }
}
