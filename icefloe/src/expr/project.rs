use super::{BoundPredicate, BoundReference, PredicateOperator};
use crate::types::{create_transform_function, PartitionSpec, PrimitiveValue, Struct};
use crate::{Error, ErrorKind, Result};

/// Project a predicate bound to the table schema onto the partition tuple
/// of `spec`.
///
/// The projection is inclusive: every partition holding a matching row
/// satisfies it. Columns without a usable partition field project to
/// `AlwaysTrue`.
pub fn inclusive_projection(
    spec: &PartitionSpec,
    partition_type: &Struct,
    predicate: &BoundPredicate,
) -> Result<BoundPredicate> {
    let projected = match predicate {
        BoundPredicate::AlwaysTrue => BoundPredicate::AlwaysTrue,
        BoundPredicate::AlwaysFalse => BoundPredicate::AlwaysFalse,
        BoundPredicate::And(l, r) => inclusive_projection(spec, partition_type, l)?
            .and(inclusive_projection(spec, partition_type, r)?),
        BoundPredicate::Or(l, r) => inclusive_projection(spec, partition_type, l)?
            .or(inclusive_projection(spec, partition_type, r)?),
        BoundPredicate::Not(inner) => {
            let rewritten = inner.as_ref().clone().negate();
            inclusive_projection(spec, partition_type, &rewritten)?
        }
        BoundPredicate::Unary { op, term } => project_leaf(spec, partition_type, *op, term, &[])?,
        BoundPredicate::Binary { op, term, literal } => project_leaf(
            spec,
            partition_type,
            *op,
            term,
            std::slice::from_ref(literal),
        )?,
        BoundPredicate::Set { op, term, literals } => {
            project_leaf(spec, partition_type, *op, term, literals)?
        }
    };
    Ok(projected)
}

fn project_leaf(
    spec: &PartitionSpec,
    partition_type: &Struct,
    op: PredicateOperator,
    term: &BoundReference,
    literals: &[PrimitiveValue],
) -> Result<BoundPredicate> {
    let mut result = BoundPredicate::AlwaysTrue;

    for field in spec
        .fields
        .iter()
        .filter(|f| f.source_column_id == term.field_id)
    {
        let Some((projected_op, projected_literals)) =
            create_transform_function(field.transform).project(op, literals)?
        else {
            continue;
        };

        let ty = partition_type
            .lookup_field(field.partition_field_id)
            .and_then(|f| f.field_type.as_primitive().copied())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!(
                        "partition field {} not found in partition type",
                        field.partition_field_id
                    ),
                )
            })?;
        let partition_term = BoundReference {
            field_id: field.partition_field_id,
            name: field.name.clone(),
            ty,
            required: false,
        };

        let leaf = match projected_op {
            PredicateOperator::IsNull
            | PredicateOperator::NotNull
            | PredicateOperator::IsNan
            | PredicateOperator::NotNan => BoundPredicate::Unary {
                op: projected_op,
                term: partition_term,
            },
            PredicateOperator::In | PredicateOperator::NotIn => {
                BoundPredicate::set(projected_op, partition_term, projected_literals)
            }
            _ => match projected_literals.into_iter().next() {
                Some(literal) => BoundPredicate::Binary {
                    op: projected_op,
                    term: partition_term,
                    literal,
                },
                None => continue,
            },
        };
        result = result.and(leaf);
    }

    Ok(result)
}
