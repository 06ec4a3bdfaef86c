//! Predicate expressions used to filter scans.
//!
//! Users build [`Predicate`]s over column names, they get bound to a schema
//! before any evaluation. Evaluators never look at rows: they only decide
//! whether a predicate could match (or must match) given partition values or
//! file level statistics.

use std::fmt::{Display, Formatter};

use crate::types::PrimitiveValue;

mod bound;
pub use bound::*;
mod project;
pub use project::*;
mod manifest_evaluator;
pub use manifest_evaluator::ManifestEvaluator;
mod partition_evaluator;
pub use partition_evaluator::PartitionEvaluator;
mod residual;
pub use residual::ResidualEvaluator;
mod inclusive_metrics;
pub use inclusive_metrics::InclusiveMetricsEvaluator;
mod strict_metrics;
pub use strict_metrics::StrictMetricsEvaluator;

/// Operators of leaf predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateOperator {
    /// `col IS NULL`
    IsNull,
    /// `col IS NOT NULL`
    NotNull,
    /// `col IS NAN`
    IsNan,
    /// `col IS NOT NAN`
    NotNan,
    /// `col < lit`
    LessThan,
    /// `col <= lit`
    LessThanOrEq,
    /// `col > lit`
    GreaterThan,
    /// `col >= lit`
    GreaterThanOrEq,
    /// `col = lit`
    Eq,
    /// `col != lit`
    NotEq,
    /// `col LIKE 'lit%'`
    StartsWith,
    /// `col NOT LIKE 'lit%'`
    NotStartsWith,
    /// `col IN (lits)`
    In,
    /// `col NOT IN (lits)`
    NotIn,
}

impl PredicateOperator {
    /// Operator matching exactly the rows this one doesn't.
    pub fn negate(self) -> Self {
        use PredicateOperator::*;
        match self {
            IsNull => NotNull,
            NotNull => IsNull,
            IsNan => NotNan,
            NotNan => IsNan,
            LessThan => GreaterThanOrEq,
            LessThanOrEq => GreaterThan,
            GreaterThan => LessThanOrEq,
            GreaterThanOrEq => LessThan,
            Eq => NotEq,
            NotEq => Eq,
            StartsWith => NotStartsWith,
            NotStartsWith => StartsWith,
            In => NotIn,
            NotIn => In,
        }
    }

    fn symbol(self) -> &'static str {
        use PredicateOperator::*;
        match self {
            IsNull => "IS NULL",
            NotNull => "IS NOT NULL",
            IsNan => "IS NAN",
            NotNan => "IS NOT NAN",
            LessThan => "<",
            LessThanOrEq => "<=",
            GreaterThan => ">",
            GreaterThanOrEq => ">=",
            Eq => "=",
            NotEq => "!=",
            StartsWith => "STARTS WITH",
            NotStartsWith => "NOT STARTS WITH",
            In => "IN",
            NotIn => "NOT IN",
        }
    }
}

/// A named reference to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    name: String,
}

impl Reference {
    /// Reference a column by name, nested fields are separated by dots.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn unary(self, op: PredicateOperator) -> Predicate {
        Predicate::Unary { op, term: self }
    }

    fn binary(self, op: PredicateOperator, literal: impl Into<PrimitiveValue>) -> Predicate {
        Predicate::Binary {
            op,
            term: self,
            literal: literal.into(),
        }
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Predicate {
        self.unary(PredicateOperator::IsNull)
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Predicate {
        self.unary(PredicateOperator::NotNull)
    }

    /// `self IS NAN`
    pub fn is_nan(self) -> Predicate {
        self.unary(PredicateOperator::IsNan)
    }

    /// `self IS NOT NAN`
    pub fn is_not_nan(self) -> Predicate {
        self.unary(PredicateOperator::NotNan)
    }

    /// `self < literal`
    pub fn less_than(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::LessThan, literal)
    }

    /// `self <= literal`
    pub fn less_than_or_equal_to(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::LessThanOrEq, literal)
    }

    /// `self > literal`
    pub fn greater_than(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::GreaterThan, literal)
    }

    /// `self >= literal`
    pub fn greater_than_or_equal_to(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::GreaterThanOrEq, literal)
    }

    /// `self = literal`
    pub fn equal_to(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::Eq, literal)
    }

    /// `self != literal`
    pub fn not_equal_to(self, literal: impl Into<PrimitiveValue>) -> Predicate {
        self.binary(PredicateOperator::NotEq, literal)
    }

    /// `self` starts with `prefix`
    pub fn starts_with(self, prefix: impl Into<String>) -> Predicate {
        self.binary(PredicateOperator::StartsWith, prefix.into())
    }

    /// `self` doesn't start with `prefix`
    pub fn not_starts_with(self, prefix: impl Into<String>) -> Predicate {
        self.binary(PredicateOperator::NotStartsWith, prefix.into())
    }

    /// `self IN (literals)`
    pub fn is_in(self, literals: impl IntoIterator<Item = impl Into<PrimitiveValue>>) -> Predicate {
        Predicate::Set {
            op: PredicateOperator::In,
            term: self,
            literals: literals.into_iter().map(Into::into).collect(),
        }
    }

    /// `self NOT IN (literals)`
    pub fn is_not_in(
        self,
        literals: impl IntoIterator<Item = impl Into<PrimitiveValue>>,
    ) -> Predicate {
        Predicate::Set {
            op: PredicateOperator::NotIn,
            term: self,
            literals: literals.into_iter().map(Into::into).collect(),
        }
    }
}

/// Unbound predicate, columns are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every row.
    AlwaysTrue,
    /// Matches no row.
    AlwaysFalse,
    /// Both sides match.
    And(Box<Predicate>, Box<Predicate>),
    /// Any side matches.
    Or(Box<Predicate>, Box<Predicate>),
    /// Inner predicate doesn't match.
    Not(Box<Predicate>),
    /// Predicate without literal.
    Unary {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: Reference,
    },
    /// Predicate comparing a column with one literal.
    Binary {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: Reference,
        /// Literal
        literal: PrimitiveValue,
    },
    /// Predicate comparing a column with a set of literals.
    Set {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: Reference,
        /// Literals
        literals: Vec<PrimitiveValue>,
    },
}

impl Predicate {
    /// `self AND other`
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::AlwaysFalse, _) | (_, Predicate::AlwaysFalse) => Predicate::AlwaysFalse,
            (Predicate::AlwaysTrue, p) | (p, Predicate::AlwaysTrue) => p,
            (l, r) => Predicate::And(Box::new(l), Box::new(r)),
        }
    }

    /// `self OR other`
    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::AlwaysTrue, _) | (_, Predicate::AlwaysTrue) => Predicate::AlwaysTrue,
            (Predicate::AlwaysFalse, p) | (p, Predicate::AlwaysFalse) => p,
            (l, r) => Predicate::Or(Box::new(l), Box::new(r)),
        }
    }

    /// `NOT self`
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::AlwaysTrue => Predicate::AlwaysFalse,
            Predicate::AlwaysFalse => Predicate::AlwaysTrue,
            Predicate::Not(inner) => *inner,
            p => Predicate::Not(Box::new(p)),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::AlwaysTrue => write!(f, "true"),
            Predicate::AlwaysFalse => write!(f, "false"),
            Predicate::And(l, r) => write!(f, "({l}) AND ({r})"),
            Predicate::Or(l, r) => write!(f, "({l}) OR ({r})"),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
            Predicate::Unary { op, term } => write!(f, "{} {}", term.name, op.symbol()),
            Predicate::Binary { op, term, literal } => {
                write!(f, "{} {} {}", term.name, op.symbol(), literal)
            }
            Predicate::Set { op, term, literals } => write!(
                f,
                "{} {} ({})",
                term.name,
                op.symbol(),
                itertools::join(literals, ", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_display() {
        let p = Reference::new("data")
            .greater_than_or_equal_to("d")
            .and(Reference::new("id").is_in([1, 2]).negate());
        assert_eq!(p.to_string(), r#"(data >= "d") AND (NOT (id IN (1, 2)))"#);
    }

    #[test]
    fn test_predicate_simplify() {
        let p = Reference::new("id").is_null();
        assert_eq!(p.clone().and(Predicate::AlwaysTrue), p);
        assert_eq!(p.clone().or(Predicate::AlwaysTrue), Predicate::AlwaysTrue);
        assert_eq!(p.clone().negate().negate(), p);
    }
}
