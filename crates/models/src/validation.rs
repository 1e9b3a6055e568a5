use crate::errors::ModelError;

pub trait Validate {
    fn validate(&self) -> Result<(), ModelError>;
}

pub fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ModelError> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(ModelError::validation(format!("{field} must be {min}..={max} characters")));
    }
    Ok(())
}

pub fn check_max_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ModelError> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(ModelError::validation(format!("{field} must be at most {max} characters")))
        }
        _ => Ok(()),
    }
}

pub fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ModelError> {
    if value < min || value > max {
        return Err(ModelError::validation(format!("{field} must be within {min}..={max}")));
    }
    Ok(())
}

pub fn check_non_negative(field: &str, value: i64) -> Result<(), ModelError> {
    check_range(field, value, 0, i64::MAX)
}

pub fn check_price(field: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::validation(format!("{field} must be a finite number >= 0")));
    }
    Ok(())
}
