use good_lp::solvers::SolutionStatus;
use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use log::{info, trace, warn};
use serde::Serialize;
use std::time::Instant;

use crate::error::BackendError;
use crate::model::{LinearConstraint, Model, Relation, Valuation};

/// Verdict of a backend run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// Present exactly when `status.has_solution()`.
    pub valuation: Option<Valuation>,
}

impl SolveResult {
    pub fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            valuation: None,
        }
    }
}

/// A constraint-solving engine the model can be submitted to.
pub trait Backend {
    fn solve(&self, model: &Model) -> Result<SolveResult, BackendError>;
}

/// HiGHS run options.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub threads: i32,
    pub random_seed: i32,
    pub time_limit_secs: Option<f64>,
    pub log_to_console: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            threads: 1,        // limit to 1 thread for reproducibility
            random_seed: 1234, // set seed for reproducibility
            time_limit_secs: None,
            log_to_console: false,
        }
    }
}

/// Solves models as 0-1 ILPs with the HiGHS solver.
///
/// Holds only options; every call builds a fresh problem.
#[derive(Debug, Clone, Default)]
pub struct HighsBackend {
    options: SolverOptions,
}

impl HighsBackend {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl Backend for HighsBackend {
    fn solve(&self, model: &Model) -> Result<SolveResult, BackendError> {
        let start_time = Instant::now();
        if model.num_vars() == 0 {
            // nothing to decide; HiGHS is not needed to judge an empty model
            let valuation = Valuation::default();
            let status = if model.violations(&valuation).is_empty() {
                SolveStatus::Optimal
            } else {
                SolveStatus::Infeasible
            };
            return Ok(SolveResult {
                status,
                valuation: status.has_solution().then_some(valuation),
            });
        }
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars()
            .map(|v| problem.add(variable().binary().name(model.var_name(v))))
            .collect();

        let objective: Expression = model
            .objective()
            .iter()
            .map(|(v, w)| Expression::from(vars[v.index()]) * (*w as f64))
            .sum();

        let mut lp = problem
            .minimise(objective)
            .using(default_solver)
            .set_option("threads", self.options.threads)
            .set_option("random_seed", self.options.random_seed)
            .set_option(
                "log_to_console",
                if self.options.log_to_console { "true" } else { "false" },
            );
        if let Some(limit) = self.options.time_limit_secs {
            lp = lp.set_option("time_limit", limit);
        }

        let mut rows = 0usize;
        for c in model.constraints() {
            for row in c.linearize() {
                lp.add_constraint(to_good_lp(&row, &vars));
                rows += 1;
            }
        }
        trace!(
            "Submitting {} binary columns and {} rows to HiGHS.",
            vars.len(),
            rows
        );

        info!("Starting ILP solver...");
        let solution = match lp.solve() {
            Ok(s) => s,
            // every column is binary, so "unbounded" can only mean "no point exists"
            Err(ResolutionError::Infeasible | ResolutionError::Unbounded) => {
                info!("HiGHS proved the model infeasible in {:.2?}", start_time.elapsed());
                return Ok(SolveResult::without_solution(SolveStatus::Infeasible));
            }
            Err(e) => {
                warn!("HiGHS stopped without a verdict: {}", e);
                return Ok(SolveResult::without_solution(SolveStatus::Unknown));
            }
        };
        let status = match solution.status() {
            SolutionStatus::Optimal => SolveStatus::Optimal,
            _ => SolveStatus::Feasible,
        };
        info!("Solution ({:?}) found in {:.2?}", status, start_time.elapsed());

        let valuation = Valuation::new(vars.iter().map(|v| solution.value(*v) > 0.5).collect());
        Ok(SolveResult {
            status,
            valuation: Some(valuation),
        })
    }
}

fn to_good_lp(row: &LinearConstraint, vars: &[Variable]) -> good_lp::Constraint {
    let lhs: Expression = row
        .terms
        .iter()
        .map(|(v, c)| Expression::from(vars[v.index()]) * (*c as f64))
        .sum();
    let bound = row.bound as f64;
    match row.relation {
        Relation::Le => constraint!(lhs <= bound),
        Relation::Ge => constraint!(lhs >= bound),
        Relation::Eq => constraint!(lhs == bound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_cheapest_of_exactly_one() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        let c = m.new_bool_var("c");
        m.add_exactly_one(vec![a, b, c]);
        m.minimize(vec![(a, 3), (b, 1), (c, 2)]);

        let result = HighsBackend::default().solve(&m).unwrap();
        assert_eq!(result.status, SolveStatus::Optimal);
        let val = result.valuation.unwrap();
        assert!(val.value(b));
        assert!(!val.value(a) && !val.value(c));
        assert!(m.violations(&val).is_empty());
    }

    #[test]
    fn reports_infeasible() {
        let mut m = Model::new();
        let a = m.new_bool_var("a");
        let b = m.new_bool_var("b");
        m.add_exactly_one(vec![a]);
        m.add_exactly_one(vec![b]);
        m.add_at_most_one(vec![a, b]);

        let result = HighsBackend::default().solve(&m).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.valuation.is_none());
    }

    #[test]
    fn conflict_indicator_is_forced_by_reification() {
        // Two forced placements for one teacher: the indicator must fire
        // even though the objective pushes it down.
        let mut m = Model::new();
        let x = m.new_bool_var("x");
        let y = m.new_bool_var("y");
        let p = m.new_bool_var("p");
        m.add_exactly_one(vec![x]);
        m.add_exactly_one(vec![y]);
        m.add_conditional(LinearConstraint::sum(&[x, y], Relation::Ge, 2), p);
        m.add_conditional(LinearConstraint::sum(&[x, y], Relation::Le, 1), p.not());
        m.minimize(vec![(p, 5)]);

        let val = HighsBackend::default().solve(&m).unwrap().valuation.unwrap();
        assert!(val.value(p));
        assert_eq!(m.objective_value(&val), 5);
    }

    #[test]
    fn empty_model_is_trivially_optimal() {
        let result = HighsBackend::default().solve(&Model::new()).unwrap();
        assert!(result.status.has_solution());
    }
}
