use crate::domain::DomainError;
use garde::{Report, Validate};

/// Run garde validation, flattening the report into a `ValidationError`
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(report_message(&report)))
}

fn report_message(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct PickupInput {
        #[garde(length(min = 1))]
        pickup_location: String,
        #[garde(range(min = 1))]
        expected_package_count: u32,
    }

    #[test]
    fn test_valid_input_passes() {
        let input = PickupInput {
            pickup_location: "Main Warehouse".to_string(),
            expected_package_count: 2,
        };
        assert!(validate_struct(&input).is_ok());
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let input = PickupInput {
            pickup_location: String::new(),
            expected_package_count: 0,
        };

        match validate_struct(&input) {
            Err(DomainError::ValidationError(msg)) => {
                assert!(msg.contains("pickup_location"));
                assert!(msg.contains("expected_package_count"));
            }
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }
}
