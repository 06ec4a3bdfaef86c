use std::collections::HashMap;

use super::partition_evaluator::leaf_matches;
use super::BoundPredicate;
use crate::types::{PartitionSpec, StructValue, Transform};

/// Computes what is left of a row filter once the partition of a file is
/// known.
///
/// Leaves on a column partitioned by identity are decided by the partition
/// value and fold into `AlwaysTrue` or `AlwaysFalse`. Every other leaf is
/// kept as is.
pub struct ResidualEvaluator {
    filter: BoundPredicate,
    /// Source column id to position in the partition tuple.
    identity_positions: HashMap<i32, usize>,
}

impl ResidualEvaluator {
    /// `filter` is bound to the table schema.
    pub fn new(spec: &PartitionSpec, filter: BoundPredicate) -> Self {
        let identity_positions = spec
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.transform == Transform::Identity)
            .map(|(pos, f)| (f.source_column_id, pos))
            .collect();
        Self {
            filter: filter.rewrite_not(),
            identity_positions,
        }
    }

    /// Residual of the filter for rows of the `partition` tuple.
    pub fn residual_for(&self, partition: &StructValue) -> BoundPredicate {
        if self.identity_positions.is_empty() {
            return self.filter.clone();
        }
        self.visit(&self.filter, partition)
    }

    fn visit(&self, predicate: &BoundPredicate, partition: &StructValue) -> BoundPredicate {
        match predicate {
            BoundPredicate::And(l, r) => self
                .visit(l, partition)
                .and(self.visit(r, partition)),
            BoundPredicate::Or(l, r) => self
                .visit(l, partition)
                .or(self.visit(r, partition)),
            BoundPredicate::Unary { term, .. }
            | BoundPredicate::Binary { term, .. }
            | BoundPredicate::Set { term, .. } => {
                match self.identity_positions.get(&term.field_id) {
                    Some(pos) if leaf_matches(predicate, partition.get(*pos)) => {
                        BoundPredicate::AlwaysTrue
                    }
                    Some(_) => BoundPredicate::AlwaysFalse,
                    None => predicate.clone(),
                }
            }
            p => p.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::bound::tests::test_struct;
    use crate::expr::Reference;
    use crate::types::PartitionField;

    fn category_spec() -> PartitionSpec {
        PartitionSpec {
            spec_id: 1,
            fields: vec![
                PartitionField {
                    source_column_id: 1,
                    partition_field_id: 1000,
                    transform: Transform::Bucket(4),
                    name: "id_bucket".to_string(),
                },
                PartitionField {
                    source_column_id: 3,
                    partition_field_id: 1001,
                    transform: Transform::Identity,
                    name: "category".to_string(),
                },
            ],
        }
    }

    fn partition(category: Option<&str>) -> StructValue {
        StructValue::new(vec![Some(1.into()), category.map(Into::into)])
    }

    #[test]
    fn test_identity_leaves_are_resolved() {
        let filter = Reference::new("category")
            .equal_to("even")
            .and(Reference::new("data").greater_than("d"))
            .bind(&test_struct(), true)
            .unwrap();
        let data_only = Reference::new("data")
            .greater_than("d")
            .bind(&test_struct(), true)
            .unwrap();
        let evaluator = ResidualEvaluator::new(&category_spec(), filter);

        assert_eq!(evaluator.residual_for(&partition(Some("even"))), data_only);
        assert_eq!(
            evaluator.residual_for(&partition(Some("odd"))),
            BoundPredicate::AlwaysFalse
        );
        assert_eq!(
            evaluator.residual_for(&partition(None)),
            BoundPredicate::AlwaysFalse
        );
    }

    #[test]
    fn test_other_transforms_keep_the_filter() {
        let filter = Reference::new("id")
            .equal_to(1)
            .or(Reference::new("category").equal_to("even"))
            .bind(&test_struct(), true)
            .unwrap();
        let evaluator = ResidualEvaluator::new(&category_spec(), filter.clone());
        assert_eq!(
            evaluator.residual_for(&partition(Some("even"))),
            BoundPredicate::AlwaysTrue
        );

        // `id` is only bucketed, a bucket can't decide `id = 1`.
        let id_only = Reference::new("id")
            .equal_to(1)
            .bind(&test_struct(), true)
            .unwrap();
        assert_eq!(evaluator.residual_for(&partition(Some("odd"))), id_only);

        let unpartitioned = ResidualEvaluator::new(&PartitionSpec::unpartitioned(), filter.clone());
        assert_eq!(unpartitioned.residual_for(&StructValue::empty()), filter);
    }
}
