//! Verifies that the object read back matches the object written.
//!
//! Both response bodies are decoded as JSON and the `name` and `data` fields are compared
//! structurally. Key order and whitespace are irrelevant; nested values are compared
//! recursively.

use serde_json::Value;

use crate::error::{IterationError, Step};

/// The fields of an object representation that must survive a round trip.
#[derive(Debug, PartialEq)]
pub struct ObjectFields {
    /// The `name` field.
    pub name: Value,
    /// The `data` field.
    pub data: Value,
}

impl ObjectFields {
    /// Decodes `body` and extracts `name` and `data`.
    ///
    /// `step` identifies the response in the returned extraction error.
    pub fn extract(step: Step, body: &str) -> Result<Self, IterationError> {
        let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body) else {
            return Err(IterationError::extraction(step, "name", body));
        };

        let name = object
            .remove("name")
            .ok_or_else(|| IterationError::extraction(step, "name", body))?;
        let data = object
            .remove("data")
            .ok_or_else(|| IterationError::extraction(step, "data", body))?;

        Ok(Self { name, data })
    }
}

/// Compares the update and read responses of one iteration.
///
/// Fails with [`IterationError::Consistency`] naming the first differing field, or with
/// [`IterationError::Extraction`] if either body lacks a field.
pub fn check(put_body: &str, get_body: &str) -> Result<(), IterationError> {
    let put = ObjectFields::extract(Step::Update, put_body)?;
    let get = ObjectFields::extract(Step::Read, get_body)?;

    tracing::debug!(put.name = %put.name, get.name = %get.name, "comparing name");
    tracing::debug!(put.data = %put.data, get.data = %get.data, "comparing data");

    if put.name != get.name {
        return Err(IterationError::Consistency {
            field: "name",
            put: put.name,
            get: get.name,
        });
    }

    if put.data != get.data {
        return Err(IterationError::Consistency {
            field: "data",
            put: put.data,
            get: get.data,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::FailureKind;

    const PUT: &str = r#"{"id":"abc123","name":"Updated Name","updatedAt":"2024-01-01T00:00:00.000+00:00","data":{"year":2020,"price":1949.99,"CPU model":"Intel Core i10","Hard disk size":"2 TB"}}"#;

    #[test]
    fn matching_bodies_pass() {
        let get = r#"{"id":"abc123","name":"Updated Name","data":{"year":2020,"price":1949.99,"CPU model":"Intel Core i10","Hard disk size":"2 TB"}}"#;
        check(PUT, get).unwrap();
    }

    #[test]
    fn key_order_and_whitespace_are_ignored() {
        let get = r#"{
            "data": {"Hard disk size": "2 TB", "CPU model": "Intel Core i10", "price": 1949.99, "year": 2020},
            "name": "Updated Name",
            "id": "abc123"
        }"#;
        check(PUT, get).unwrap();
    }

    #[test]
    fn nested_data_is_compared_deeply() {
        let put = r#"{"name":"n","data":{"specs":{"cpu":{"cores":8}},"tags":["a","b"]}}"#;
        let same = r#"{"name":"n","data":{"tags":["a","b"],"specs":{"cpu":{"cores":8}}}}"#;
        let different = r#"{"name":"n","data":{"tags":["a","b"],"specs":{"cpu":{"cores":4}}}}"#;

        check(put, same).unwrap();
        let err = check(put, different).unwrap_err();
        assert!(matches!(err, IterationError::Consistency { field: "data", .. }));
    }

    #[test]
    fn escaped_quotes_in_name() {
        let put = r#"{"name":"say \"hi\"","data":{}}"#;
        let get = r#"{"name":"say \"hi\"","data":{}}"#;
        check(put, get).unwrap();
    }

    #[test]
    fn name_mismatch_reports_both_values() {
        let get = r#"{"name":"Apple MacBook Pro 16","data":{"year":2020,"price":1949.99,"CPU model":"Intel Core i10","Hard disk size":"2 TB"}}"#;
        let err = check(PUT, get).unwrap_err();

        let IterationError::Consistency { field, put, get } = &err else {
            panic!("expected consistency error, got {err:?}");
        };
        assert_eq!(*field, "name");
        assert_eq!(put, &json!("Updated Name"));
        assert_eq!(get, &json!("Apple MacBook Pro 16"));
        assert_eq!(err.kind(), FailureKind::Consistency);
    }

    #[test]
    fn data_mismatch_reports_both_values() {
        let get = r#"{"name":"Updated Name","data":{"year":2019,"price":1849.99,"CPU model":"Intel Core i9","Hard disk size":"1 TB"}}"#;
        let err = check(PUT, get).unwrap_err();

        let IterationError::Consistency { field, get, .. } = err else {
            panic!("expected consistency error");
        };
        assert_eq!(field, "data");
        assert_eq!(get["year"], json!(2019));
    }

    #[test]
    fn missing_fields_are_extraction_failures() {
        let err = check(PUT, r#"{"name":"Updated Name"}"#).unwrap_err();
        assert!(matches!(
            err,
            IterationError::Extraction {
                step: Step::Read,
                field: "data",
                ..
            }
        ));

        let err = check(r#"{"data":{}}"#, PUT).unwrap_err();
        assert!(matches!(
            err,
            IterationError::Extraction {
                step: Step::Update,
                field: "name",
                ..
            }
        ));
    }

    #[test]
    fn non_json_is_an_extraction_failure() {
        let err = check(PUT, "<html>bad gateway</html>").unwrap_err();
        let IterationError::Extraction { step, snippet, .. } = err else {
            panic!("expected extraction error");
        };
        assert_eq!(step, Step::Read);
        assert_eq!(snippet, "<html>bad gateway</html>");
    }
}
