//! Backend-neutral 0-1 constraint model.
//!
//! The encoder writes into a [`Model`]; a [`crate::solver::Backend`] reads it
//! and hands back a [`Valuation`]. Nothing here knows about timetables.

use std::fmt;

/// Handle of a boolean decision variable inside one [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarRef(usize);

impl VarRef {
    pub fn index(self) -> usize {
        self.0
    }

    /// Literal that holds when this variable is false.
    pub fn not(self) -> Literal {
        Literal {
            var: self,
            negated: true,
        }
    }
}

/// A variable or its negation, used as the condition of a reified constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarRef,
    pub negated: bool,
}

impl From<VarRef> for Literal {
    fn from(var: VarRef) -> Self {
        Literal {
            var,
            negated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// `Σ coeff·var  relation  bound`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub terms: Vec<(VarRef, i64)>,
    pub relation: Relation,
    pub bound: i64,
}

impl LinearConstraint {
    pub fn new(terms: Vec<(VarRef, i64)>, relation: Relation, bound: i64) -> Self {
        Self {
            terms,
            relation,
            bound,
        }
    }

    /// Unit-coefficient sum over `vars`.
    pub fn sum(vars: &[VarRef], relation: Relation, bound: i64) -> Self {
        Self::new(vars.iter().map(|v| (*v, 1)).collect(), relation, bound)
    }

    /// Smallest value the left-hand side can take over 0-1 assignments.
    pub fn min_activity(&self) -> i64 {
        self.terms.iter().map(|(_, c)| (*c).min(0)).sum()
    }

    /// Largest value the left-hand side can take over 0-1 assignments.
    pub fn max_activity(&self) -> i64 {
        self.terms.iter().map(|(_, c)| (*c).max(0)).sum()
    }

    pub fn activity(&self, valuation: &Valuation) -> i64 {
        self.terms
            .iter()
            .filter(|(v, _)| valuation.value(*v))
            .map(|(_, c)| *c)
            .sum()
    }

    pub fn is_satisfied_by(&self, valuation: &Valuation) -> bool {
        let lhs = self.activity(valuation);
        match self.relation {
            Relation::Le => lhs <= self.bound,
            Relation::Ge => lhs >= self.bound,
            Relation::Eq => lhs == self.bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Linear(LinearConstraint),
    AtMostOne(Vec<VarRef>),
    ExactlyOne(Vec<VarRef>),
    /// `constraint` must hold whenever `condition` is true.
    Conditional {
        constraint: LinearConstraint,
        condition: Literal,
    },
}

impl Constraint {
    pub fn is_satisfied_by(&self, valuation: &Valuation) -> bool {
        match self {
            Constraint::Linear(c) => c.is_satisfied_by(valuation),
            Constraint::AtMostOne(vars) => valuation.count_true(vars) <= 1,
            Constraint::ExactlyOne(vars) => valuation.count_true(vars) == 1,
            Constraint::Conditional {
                constraint,
                condition,
            } => !valuation.holds(*condition) || constraint.is_satisfied_by(valuation),
        }
    }

    /// Rewrites the constraint as plain linear rows over 0-1 variables.
    ///
    /// Conditional rows use a big-M taken from the activity bounds of the
    /// guarded expression, so the relaxed row is never tighter than the
    /// expression's range. Rows that can never be violated are dropped.
    pub fn linearize(&self) -> Vec<LinearConstraint> {
        match self {
            Constraint::Linear(c) => vec![c.clone()],
            Constraint::AtMostOne(vars) if vars.len() <= 1 => Vec::new(),
            Constraint::AtMostOne(vars) => vec![LinearConstraint::sum(vars, Relation::Le, 1)],
            Constraint::ExactlyOne(vars) => vec![LinearConstraint::sum(vars, Relation::Eq, 1)],
            Constraint::Conditional {
                constraint,
                condition,
            } => match constraint.relation {
                Relation::Le => reify_le(constraint, *condition).into_iter().collect(),
                Relation::Ge => reify_ge(constraint, *condition).into_iter().collect(),
                Relation::Eq => {
                    let le = LinearConstraint {
                        relation: Relation::Le,
                        ..constraint.clone()
                    };
                    let ge = LinearConstraint {
                        relation: Relation::Ge,
                        ..constraint.clone()
                    };
                    reify_le(&le, *condition)
                        .into_iter()
                        .chain(reify_ge(&ge, *condition))
                        .collect()
                }
            },
        }
    }
}

// expr <= b            when lit holds
// expr + M·z <= b + M  (lit = z)
// expr - M·z <= b      (lit = ¬z)
fn reify_le(constraint: &LinearConstraint, condition: Literal) -> Option<LinearConstraint> {
    let big_m = constraint.max_activity() - constraint.bound;
    if big_m <= 0 {
        return None;
    }
    let mut terms = constraint.terms.clone();
    let bound = if condition.negated {
        terms.push((condition.var, -big_m));
        constraint.bound
    } else {
        terms.push((condition.var, big_m));
        constraint.bound + big_m
    };
    Some(LinearConstraint::new(terms, Relation::Le, bound))
}

// expr >= b            when lit holds
// expr - M·z >= b - M  (lit = z)
// expr + M·z >= b      (lit = ¬z)
fn reify_ge(constraint: &LinearConstraint, condition: Literal) -> Option<LinearConstraint> {
    let big_m = constraint.bound - constraint.min_activity();
    if big_m <= 0 {
        return None;
    }
    let mut terms = constraint.terms.clone();
    let bound = if condition.negated {
        terms.push((condition.var, big_m));
        constraint.bound
    } else {
        terms.push((condition.var, -big_m));
        constraint.bound - big_m
    };
    Some(LinearConstraint::new(terms, Relation::Ge, bound))
}

/// Boolean variables, constraints and a minimisation objective.
#[derive(Debug, Clone, Default)]
pub struct Model {
    names: Vec<String>,
    constraints: Vec<Constraint>,
    objective: Vec<(VarRef, i64)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarRef {
        self.names.push(name.into());
        VarRef(self.names.len() - 1)
    }

    pub fn add_linear(&mut self, terms: Vec<(VarRef, i64)>, relation: Relation, bound: i64) {
        self.constraints
            .push(Constraint::Linear(LinearConstraint::new(terms, relation, bound)));
    }

    pub fn add_at_most_one(&mut self, vars: Vec<VarRef>) {
        self.constraints.push(Constraint::AtMostOne(vars));
    }

    pub fn add_exactly_one(&mut self, vars: Vec<VarRef>) {
        self.constraints.push(Constraint::ExactlyOne(vars));
    }

    pub fn add_conditional(&mut self, constraint: LinearConstraint, condition: impl Into<Literal>) {
        self.constraints.push(Constraint::Conditional {
            constraint,
            condition: condition.into(),
        });
    }

    /// Replaces the objective with `Σ weight·var`, to be minimised.
    pub fn minimize(&mut self, terms: Vec<(VarRef, i64)>) {
        self.objective = terms;
    }

    pub fn num_vars(&self) -> usize {
        self.names.len()
    }

    pub fn var_name(&self, var: VarRef) -> &str {
        self.names.get(var.0).map(String::as_str).unwrap_or("")
    }

    pub fn vars(&self) -> impl Iterator<Item = VarRef> {
        (0..self.names.len()).map(VarRef)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarRef, i64)] {
        &self.objective
    }

    pub fn objective_value(&self, valuation: &Valuation) -> i64 {
        self.objective
            .iter()
            .filter(|(v, _)| valuation.value(*v))
            .map(|(_, w)| *w)
            .sum()
    }

    /// Constraints the valuation violates, by position.
    pub fn violations(&self, valuation: &Valuation) -> Vec<usize> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_satisfied_by(valuation))
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} variables, {} constraints, {} objective terms",
            self.names.len(),
            self.constraints.len(),
            self.objective.len()
        )
    }
}

/// Truth values read back from a solved model. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Valuation {
    values: Vec<bool>,
}

impl Valuation {
    pub fn new(values: Vec<bool>) -> Self {
        Self { values }
    }

    /// Everything false except `trues`.
    #[cfg(test)]
    pub(crate) fn with_true(num_vars: usize, trues: &[VarRef]) -> Self {
        let mut values = vec![false; num_vars];
        for v in trues {
            if let Some(slot) = values.get_mut(v.0) {
                *slot = true;
            }
        }
        Self { values }
    }

    /// Unknown variables read as false.
    pub fn value(&self, var: VarRef) -> bool {
        self.values.get(var.0).copied().unwrap_or(false)
    }

    pub fn holds(&self, literal: Literal) -> bool {
        self.value(literal.var) != literal.negated
    }

    pub fn count_true(&self, vars: &[VarRef]) -> usize {
        vars.iter().filter(|v| self.value(**v)).count()
    }
}
