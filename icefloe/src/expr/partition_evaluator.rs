use std::cmp::Ordering;
use std::collections::HashMap;

use super::{BoundPredicate, PredicateOperator};
use crate::types::{PrimitiveValue, Struct, StructValue};

/// Evaluates a partition predicate against the exact partition tuple of a
/// file.
pub struct PartitionEvaluator {
    partition_filter: BoundPredicate,
    positions: HashMap<i32, usize>,
}

impl PartitionEvaluator {
    /// `partition_filter` must be bound to `partition_type`.
    pub fn new(partition_filter: BoundPredicate, partition_type: &Struct) -> Self {
        let positions = partition_type
            .fields()
            .iter()
            .enumerate()
            .map(|(pos, f)| (f.id, pos))
            .collect();
        Self {
            partition_filter: partition_filter.rewrite_not(),
            positions,
        }
    }

    /// Whether a file with this partition tuple may hold matching rows.
    pub fn eval(&self, partition: &StructValue) -> bool {
        self.visit(&self.partition_filter, partition)
    }

    fn visit(&self, predicate: &BoundPredicate, partition: &StructValue) -> bool {
        match predicate {
            BoundPredicate::AlwaysTrue => true,
            BoundPredicate::AlwaysFalse => false,
            BoundPredicate::And(l, r) => self.visit(l, partition) && self.visit(r, partition),
            BoundPredicate::Or(l, r) => self.visit(l, partition) || self.visit(r, partition),
            BoundPredicate::Not(_) => true,
            BoundPredicate::Unary { term, .. }
            | BoundPredicate::Binary { term, .. }
            | BoundPredicate::Set { term, .. } => match self.positions.get(&term.field_id) {
                None => true,
                Some(pos) => leaf_matches(predicate, partition.get(*pos)),
            },
        }
    }
}

/// Whether a leaf predicate holds for the exact `value` of its column,
/// `None` being null. Non-leaf predicates are assumed to hold.
pub(crate) fn leaf_matches(predicate: &BoundPredicate, value: Option<&PrimitiveValue>) -> bool {
    match predicate {
        BoundPredicate::Unary { op, .. } => match op {
            PredicateOperator::IsNull => value.is_none(),
            PredicateOperator::NotNull => value.is_some(),
            PredicateOperator::IsNan => value.map_or(false, |v| v.is_nan()),
            PredicateOperator::NotNan => value.map_or(true, |v| !v.is_nan()),
            _ => true,
        },
        BoundPredicate::Binary { op, literal, .. } => match value {
            None => matches!(
                op,
                PredicateOperator::NotEq | PredicateOperator::NotStartsWith
            ),
            Some(v) => compare_exact(*op, v, literal),
        },
        BoundPredicate::Set { op, literals, .. } => match value {
            None => *op == PredicateOperator::NotIn,
            Some(v) => match op {
                PredicateOperator::In => literals.contains(v),
                PredicateOperator::NotIn => !literals.contains(v),
                _ => true,
            },
        },
        _ => true,
    }
}

fn compare_exact(op: PredicateOperator, value: &PrimitiveValue, literal: &PrimitiveValue) -> bool {
    if let (PrimitiveValue::String(v), PrimitiveValue::String(prefix)) = (value, literal) {
        match op {
            PredicateOperator::StartsWith => return v.starts_with(prefix.as_str()),
            PredicateOperator::NotStartsWith => return !v.starts_with(prefix.as_str()),
            _ => {}
        }
    }

    let Some(ord) = value.compare(literal) else {
        return true;
    };
    match op {
        PredicateOperator::LessThan => ord == Ordering::Less,
        PredicateOperator::LessThanOrEq => ord != Ordering::Greater,
        PredicateOperator::GreaterThan => ord == Ordering::Greater,
        PredicateOperator::GreaterThanOrEq => ord != Ordering::Less,
        PredicateOperator::Eq => ord == Ordering::Equal,
        PredicateOperator::NotEq => ord != Ordering::Equal,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BoundReference;
    use crate::types::{Field, Primitive};

    fn category_ref() -> BoundReference {
        BoundReference {
            field_id: 1000,
            name: "category".to_string(),
            ty: Primitive::String,
            required: false,
        }
    }

    #[test]
    fn test_exact_partition_match() {
        let partition_type =
            Struct::new(vec![Field::optional(1000, "category", Primitive::String).into()]);
        let evaluator = PartitionEvaluator::new(
            BoundPredicate::Binary {
                op: PredicateOperator::Eq,
                term: category_ref(),
                literal: "even".into(),
            },
            &partition_type,
        );
        assert!(evaluator.eval(&StructValue::new(vec![Some("even".into())])));
        assert!(!evaluator.eval(&StructValue::new(vec![Some("odd".into())])));
        assert!(!evaluator.eval(&StructValue::new(vec![None])));

        let not_in = PartitionEvaluator::new(
            BoundPredicate::Set {
                op: PredicateOperator::NotIn,
                term: category_ref(),
                literals: vec!["a".into(), "b".into()],
            },
            &partition_type,
        );
        assert!(not_in.eval(&StructValue::new(vec![Some("odd".into())])));
        assert!(!not_in.eval(&StructValue::new(vec![Some("a".into())])));
    }
}
