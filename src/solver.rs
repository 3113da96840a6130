use crate::data::Assignment;
use crate::model::{LinearConstraint, Sense, ShiftModel, VarIndex};
use good_lp::variable;
use good_lp::{
    constraint, default_solver, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Default wall-clock budget for one optimization run.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(30);
/// Longer budgets are clamped to this.
pub const MAX_TIME_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverSettings {
    pub time_budget: Duration,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Outcome of one solve: the true assignment variables, empty unless OPTIMAL or FEASIBLE.
#[derive(Debug, Clone)]
pub struct Solved {
    pub status: SolveStatus,
    pub assignments: Vec<Assignment>,
    pub elapsed: Duration,
}

enum Attempt {
    Found { values: Vec<bool>, timed_out: bool },
    Infeasible,
    Unknown(String),
}

/// Solves the shift model with the HiGHS MILP backend.
///
/// The first run maximizes coverage. The second keeps that coverage and
/// maximizes [`tie_break_objective`], which ranks equally covering schedules
/// by how early in tie-break order their assignments sit. Both runs are
/// single-threaded with a fixed seed and a zero MIP gap, so the answer only
/// depends on the model, never on how long the runs took.
pub fn solve(model: &ShiftModel, settings: &SolverSettings) -> Solved {
    let start_time = Instant::now();
    let deadline = start_time + settings.time_budget.min(MAX_TIME_BUDGET);
    let finish = |status: SolveStatus, values: Option<&[bool]>| {
        let elapsed = start_time.elapsed();
        let assignments = match (status, values) {
            (SolveStatus::Optimal | SolveStatus::Feasible, Some(values)) => {
                model.assignments(values)
            }
            _ => Vec::new(),
        };
        info!(
            "Solver finished for {} with status {} and {} assignments in {:.2?}",
            model.department,
            status,
            assignments.len(),
            elapsed
        );
        Solved {
            status,
            assignments,
            elapsed,
        }
    };

    if let Some(c) = model
        .constraints
        .iter()
        .find(|c| c.terms.is_empty() && !c.is_satisfied(&[]))
    {
        warn!(
            "Model for {} is infeasible: constraint {} has no candidate assignments",
            model.department, c.name
        );
        return finish(SolveStatus::Infeasible, None);
    }
    if model.variable_count == 0 {
        return finish(SolveStatus::Optimal, Some(&[][..]));
    }

    info!("Starting ILP solver...");
    let coverage = match attempt(model, &model.objective, &[], deadline) {
        Attempt::Found { values, timed_out: true } => {
            warn!("Time budget reached before optimality was proven; keeping incumbent");
            return finish(SolveStatus::Feasible, Some(values.as_slice()));
        }
        Attempt::Found { values, .. } => values,
        Attempt::Infeasible => {
            warn!(
                "Solver found the model for {} to be infeasible",
                model.department
            );
            return finish(SolveStatus::Infeasible, None);
        }
        Attempt::Unknown(reason) => {
            warn!(
                "Solver produced no schedule for {} (timeout or backend failure): {}",
                model.department, reason
            );
            return finish(SolveStatus::Unknown, None);
        }
    };

    let best = model.objective_value(&coverage);
    debug!("Best coverage is {best}; breaking ties among equally covering schedules");
    let floor = LinearConstraint {
        name: "objective_floor".to_string(),
        terms: model.objective.clone(),
        sense: Sense::AtLeast,
        rhs: best - 0.5,
    };
    match attempt(model, &tie_break_objective(model), &[floor], deadline) {
        Attempt::Found { values, timed_out: false } => {
            finish(SolveStatus::Optimal, Some(values.as_slice()))
        }
        Attempt::Found { values, timed_out: true } => {
            warn!("Time budget reached during tie-breaking; keeping incumbent");
            finish(SolveStatus::Feasible, Some(values.as_slice()))
        }
        Attempt::Infeasible | Attempt::Unknown(_) => {
            warn!("Tie-breaking run for {} failed; keeping the first optimum", model.department);
            finish(SolveStatus::Feasible, Some(coverage.as_slice()))
        }
    }
}

/// Integer weight `(n - i)²` for assignment variable `i` of `n`.
///
/// Weights fall strictly with tie-break position and are strictly convex, so
/// swapping any assignment for a later one never pays off, and spreading a
/// pair of positions towards the front beats bunching them in the middle.
pub fn tie_break_objective(model: &ShiftModel) -> Vec<(VarIndex, f64)> {
    let n = model.decisions.len();
    (0..n)
        .map(|var| {
            let rank = (n - var) as f64;
            (var, rank * rank)
        })
        .collect()
}

/// One backend run bounded by the remaining budget; solutions are re-checked.
fn attempt(
    model: &ShiftModel,
    objective: &[(VarIndex, f64)],
    extra: &[LinearConstraint],
    deadline: Instant,
) -> Attempt {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Attempt::Unknown("time budget exhausted".to_string());
    }
    let started = Instant::now();
    match run_backend(model, objective, extra, remaining) {
        Ok(values) => {
            let timed_out = started.elapsed() >= remaining;
            if !model.is_feasible(&values) || extra.iter().any(|c| !c.is_satisfied(&values)) {
                return Attempt::Unknown(
                    "backend returned an assignment that breaks the model".to_string(),
                );
            }
            trace!("Backend run took {:.2?}", started.elapsed());
            Attempt::Found { values, timed_out }
        }
        Err(ResolutionError::Infeasible) => Attempt::Infeasible,
        Err(e) => Attempt::Unknown(e.to_string()),
    }
}

fn run_backend(
    model: &ShiftModel,
    objective: &[(VarIndex, f64)],
    extra: &[LinearConstraint],
    time_limit: Duration,
) -> Result<Vec<bool>, ResolutionError> {
    let mut problem = ProblemVariables::new();
    let vars: Vec<Variable> = problem.add_vector(variable().binary(), model.variable_count);

    let objective: Expression = objective
        .iter()
        .map(|&(var, coef)| coef * vars[var])
        .sum();

    let mut lp = problem
        .maximise(objective)
        .using(default_solver)
        .set_option("threads", 1) // single thread for reproducibility
        .set_option("random_seed", 1234)
        .set_option("mip_rel_gap", 0.0)
        .set_option("time_limit", time_limit.as_secs_f64())
        .set_option("output_flag", false);

    for c in model.constraints.iter().chain(extra) {
        let lhs: Expression = c.terms.iter().map(|&(var, coef)| coef * vars[var]).sum();
        let rhs = c.rhs;
        lp.add_constraint(match c.sense {
            Sense::AtMost => constraint!(lhs <= rhs),
            Sense::AtLeast => constraint!(lhs >= rhs),
            Sense::Exactly => constraint!(lhs == rhs),
        });
    }

    let solution = lp.solve()?;
    Ok(vars.iter().map(|v| solution.value(*v) > 0.5).collect())
}
