//! Identifier extraction from Arrow batches

use arrow::array::{Array, Int32Array, Int64Array, UInt32Array, UInt64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use listcache_core::{ListCacheError, ObjectId, Result};

pub const DEFAULT_ID_COLUMN: &str = "id";

/// Collect object identifiers from `column`, in row order across batches
pub fn extract_ids(batches: &[RecordBatch], column: &str) -> Result<Vec<ObjectId>> {
    let mut ids = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());

    for batch in batches {
        let index = batch
            .schema()
            .index_of(column)
            .map_err(|_| ListCacheError::ColumnNotFound(column.to_string()))?;
        let array = batch.column(index);

        if array.null_count() > 0 {
            return Err(ListCacheError::IdentifierError(format!(
                "column '{}' contains {} null identifiers",
                column,
                array.null_count()
            )));
        }

        match array.data_type() {
            DataType::UInt64 => {
                let values = downcast::<UInt64Array>(array.as_ref(), "UInt64")?;
                ids.extend(values.values().iter().map(|v| ObjectId(*v)));
            }
            DataType::UInt32 => {
                let values = downcast::<UInt32Array>(array.as_ref(), "UInt32")?;
                ids.extend(values.values().iter().map(|v| ObjectId(u64::from(*v))));
            }
            DataType::Int64 => {
                let values = downcast::<Int64Array>(array.as_ref(), "Int64")?;
                for v in values.values().iter() {
                    ids.push(signed_id(*v)?);
                }
            }
            DataType::Int32 => {
                let values = downcast::<Int32Array>(array.as_ref(), "Int32")?;
                for v in values.values().iter() {
                    ids.push(signed_id(i64::from(*v))?);
                }
            }
            other => {
                return Err(ListCacheError::TypeMismatch {
                    expected: "integer identifier".to_string(),
                    found: format!("{:?}", other),
                })
            }
        }
    }

    Ok(ids)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, expected: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ListCacheError::TypeMismatch {
            expected: expected.to_string(),
            found: format!("{:?}", array.data_type()),
        })
}

fn signed_id(value: i64) -> Result<ObjectId> {
    u64::try_from(value)
        .map(ObjectId)
        .map_err(|_| ListCacheError::IdentifierError(format!("negative identifier {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch(name: &str, array: ArrayRef) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new(
            name,
            array.data_type().clone(),
            true,
        )]));
        RecordBatch::try_new(schema, vec![array]).unwrap()
    }

    #[test]
    fn test_extract_preserves_order_across_batches() {
        let batches = vec![
            batch("id", Arc::new(Int64Array::from(vec![5, 2]))),
            batch("id", Arc::new(Int64Array::from(vec![9]))),
        ];
        let ids = extract_ids(&batches, DEFAULT_ID_COLUMN).unwrap();
        assert_eq!(ids, vec![ObjectId(5), ObjectId(2), ObjectId(9)]);
    }

    #[test]
    fn test_extract_unsigned_and_narrow_types() {
        let batches = vec![
            batch("id", Arc::new(UInt64Array::from(vec![7u64]))),
            batch("id", Arc::new(Int32Array::from(vec![3]))),
            batch("id", Arc::new(UInt32Array::from(vec![4u32]))),
        ];
        let ids = extract_ids(&batches, "id").unwrap();
        assert_eq!(ids, vec![ObjectId(7), ObjectId(3), ObjectId(4)]);
    }

    #[test]
    fn test_empty_result() {
        assert!(extract_ids(&[], "id").unwrap().is_empty());
    }

    #[test]
    fn test_missing_column() {
        let batches = vec![batch("post_id", Arc::new(Int64Array::from(vec![1])))];
        assert!(matches!(
            extract_ids(&batches, "id"),
            Err(ListCacheError::ColumnNotFound(name)) if name == "id"
        ));
    }

    #[test]
    fn test_rejects_non_integer_column() {
        let batches = vec![batch("id", Arc::new(StringArray::from(vec!["a"])))];
        assert!(matches!(
            extract_ids(&batches, "id"),
            Err(ListCacheError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_and_null() {
        let negative = vec![batch("id", Arc::new(Int64Array::from(vec![1, -4])))];
        assert!(matches!(
            extract_ids(&negative, "id"),
            Err(ListCacheError::IdentifierError(_))
        ));

        let null = vec![batch("id", Arc::new(Int64Array::from(vec![Some(1), None])))];
        assert!(matches!(
            extract_ids(&null, "id"),
            Err(ListCacheError::IdentifierError(_))
        ));
    }
}
