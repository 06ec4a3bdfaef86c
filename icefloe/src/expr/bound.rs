use std::fmt::{Display, Formatter};

use super::{Predicate, PredicateOperator, Reference};
use crate::types::{Primitive, PrimitiveValue, Struct};
use crate::{Error, ErrorKind, Result};

/// A reference resolved to a primitive field of a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundReference {
    /// Field id
    pub field_id: i32,
    /// Field name, only kept for display.
    pub name: String,
    /// Field type
    pub ty: Primitive,
    /// Whether the field is required.
    pub required: bool,
}

impl BoundReference {
    fn bind(term: &Reference, r#struct: &Struct, case_sensitive: bool) -> Result<Self> {
        let field = r#struct
            .lookup_field_by_name(term.name(), case_sensitive)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Can't find column {} in schema", term.name()),
                )
                .with_context("case_sensitive", case_sensitive.to_string())
            })?;
        let ty = field.field_type.as_primitive().ok_or_else(|| {
            Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Predicates on nested column {} are not supported", term.name()),
            )
        })?;

        Ok(Self {
            field_id: field.id,
            name: term.name().to_string(),
            ty: *ty,
            required: field.required,
        })
    }
}

/// Predicate bound to a schema, columns are resolved to field ids and
/// literals are converted to the column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundPredicate {
    /// Matches every row.
    AlwaysTrue,
    /// Matches no row.
    AlwaysFalse,
    /// Both sides match.
    And(Box<BoundPredicate>, Box<BoundPredicate>),
    /// Any side matches.
    Or(Box<BoundPredicate>, Box<BoundPredicate>),
    /// Inner predicate doesn't match.
    Not(Box<BoundPredicate>),
    /// Predicate without literal.
    Unary {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: BoundReference,
    },
    /// Predicate comparing a column with one literal.
    Binary {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: BoundReference,
        /// Literal
        literal: PrimitiveValue,
    },
    /// Predicate comparing a column with a set of literals.
    Set {
        /// Operator
        op: PredicateOperator,
        /// Column
        term: BoundReference,
        /// Distinct literals
        literals: Vec<PrimitiveValue>,
    },
}

impl Predicate {
    /// Bind this predicate to `r#struct`, usually a table schema.
    pub fn bind(&self, r#struct: &Struct, case_sensitive: bool) -> Result<BoundPredicate> {
        let bound = match self {
            Predicate::AlwaysTrue => BoundPredicate::AlwaysTrue,
            Predicate::AlwaysFalse => BoundPredicate::AlwaysFalse,
            Predicate::And(l, r) => l
                .bind(r#struct, case_sensitive)?
                .and(r.bind(r#struct, case_sensitive)?),
            Predicate::Or(l, r) => l
                .bind(r#struct, case_sensitive)?
                .or(r.bind(r#struct, case_sensitive)?),
            Predicate::Not(inner) => inner.bind(r#struct, case_sensitive)?.not(),
            Predicate::Unary { op, term } => {
                let term = BoundReference::bind(term, r#struct, case_sensitive)?;
                match op {
                    PredicateOperator::IsNull if term.required => BoundPredicate::AlwaysFalse,
                    PredicateOperator::NotNull if term.required => BoundPredicate::AlwaysTrue,
                    PredicateOperator::IsNan | PredicateOperator::NotNan
                        if !matches!(term.ty, Primitive::Float | Primitive::Double) =>
                    {
                        return Err(Error::new(
                            ErrorKind::DataInvalid,
                            format!("{} is not a floating point column", term.name),
                        ));
                    }
                    _ => BoundPredicate::Unary { op: *op, term },
                }
            }
            Predicate::Binary { op, term, literal } => {
                let term = BoundReference::bind(term, r#struct, case_sensitive)?;
                if matches!(
                    op,
                    PredicateOperator::StartsWith | PredicateOperator::NotStartsWith
                ) && term.ty != Primitive::String
                {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!("{} is not a string column", term.name),
                    ));
                }
                let literal = literal.to(&term.ty)?;
                BoundPredicate::Binary {
                    op: *op,
                    term,
                    literal,
                }
            }
            Predicate::Set { op, term, literals } => {
                let term = BoundReference::bind(term, r#struct, case_sensitive)?;
                let mut converted: Vec<PrimitiveValue> = Vec::with_capacity(literals.len());
                for literal in literals {
                    let literal = literal.to(&term.ty)?;
                    if !converted.contains(&literal) {
                        converted.push(literal);
                    }
                }
                BoundPredicate::set(*op, term, converted)
            }
        };

        Ok(bound)
    }
}

impl BoundPredicate {
    pub(crate) fn set(
        op: PredicateOperator,
        term: BoundReference,
        mut literals: Vec<PrimitiveValue>,
    ) -> BoundPredicate {
        match (op, literals.len()) {
            (PredicateOperator::In, 0) => BoundPredicate::AlwaysFalse,
            (PredicateOperator::NotIn, 0) => BoundPredicate::AlwaysTrue,
            (PredicateOperator::In, 1) => BoundPredicate::Binary {
                op: PredicateOperator::Eq,
                term,
                literal: literals.remove(0),
            },
            (PredicateOperator::NotIn, 1) => BoundPredicate::Binary {
                op: PredicateOperator::NotEq,
                term,
                literal: literals.remove(0),
            },
            _ => BoundPredicate::Set { op, term, literals },
        }
    }

    /// `self AND other`
    pub fn and(self, other: BoundPredicate) -> BoundPredicate {
        match (self, other) {
            (BoundPredicate::AlwaysFalse, _) | (_, BoundPredicate::AlwaysFalse) => {
                BoundPredicate::AlwaysFalse
            }
            (BoundPredicate::AlwaysTrue, p) | (p, BoundPredicate::AlwaysTrue) => p,
            (l, r) => BoundPredicate::And(Box::new(l), Box::new(r)),
        }
    }

    /// `self OR other`
    pub fn or(self, other: BoundPredicate) -> BoundPredicate {
        match (self, other) {
            (BoundPredicate::AlwaysTrue, _) | (_, BoundPredicate::AlwaysTrue) => {
                BoundPredicate::AlwaysTrue
            }
            (BoundPredicate::AlwaysFalse, p) | (p, BoundPredicate::AlwaysFalse) => p,
            (l, r) => BoundPredicate::Or(Box::new(l), Box::new(r)),
        }
    }

    /// `NOT self`, kept as a node until [`BoundPredicate::rewrite_not`].
    pub fn not(self) -> BoundPredicate {
        match self {
            BoundPredicate::AlwaysTrue => BoundPredicate::AlwaysFalse,
            BoundPredicate::AlwaysFalse => BoundPredicate::AlwaysTrue,
            BoundPredicate::Not(inner) => *inner,
            p => BoundPredicate::Not(Box::new(p)),
        }
    }

    /// Predicate matching exactly the rows this one doesn't, without `Not`
    /// nodes.
    pub fn negate(self) -> BoundPredicate {
        match self {
            BoundPredicate::AlwaysTrue => BoundPredicate::AlwaysFalse,
            BoundPredicate::AlwaysFalse => BoundPredicate::AlwaysTrue,
            BoundPredicate::And(l, r) => l.negate().or(r.negate()),
            BoundPredicate::Or(l, r) => l.negate().and(r.negate()),
            BoundPredicate::Not(inner) => inner.rewrite_not(),
            BoundPredicate::Unary { op, term } => BoundPredicate::Unary {
                op: op.negate(),
                term,
            },
            BoundPredicate::Binary { op, term, literal } => BoundPredicate::Binary {
                op: op.negate(),
                term,
                literal,
            },
            BoundPredicate::Set { op, term, literals } => BoundPredicate::Set {
                op: op.negate(),
                term,
                literals,
            },
        }
    }

    /// Push every `Not` down to the leaves.
    ///
    /// All evaluators expect a predicate without `Not` nodes.
    pub fn rewrite_not(self) -> BoundPredicate {
        match self {
            BoundPredicate::And(l, r) => l.rewrite_not().and(r.rewrite_not()),
            BoundPredicate::Or(l, r) => l.rewrite_not().or(r.rewrite_not()),
            BoundPredicate::Not(inner) => inner.negate(),
            p => p,
        }
    }
}

impl Display for BoundPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundPredicate::AlwaysTrue => write!(f, "true"),
            BoundPredicate::AlwaysFalse => write!(f, "false"),
            BoundPredicate::And(l, r) => write!(f, "({l}) AND ({r})"),
            BoundPredicate::Or(l, r) => write!(f, "({l}) OR ({r})"),
            BoundPredicate::Not(inner) => write!(f, "NOT ({inner})"),
            BoundPredicate::Unary { op, term } => write!(f, "{} {}", term.name, op.symbol()),
            BoundPredicate::Binary { op, term, literal } => {
                write!(f, "{} {} {}", term.name, op.symbol(), literal)
            }
            BoundPredicate::Set { op, term, literals } => write!(
                f,
                "{} {} ({})",
                term.name,
                op.symbol(),
                itertools::join(literals, ", ")
            ),
        }
    }
}
