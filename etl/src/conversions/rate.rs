use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Parses a rate from its staged text form.
///
/// Only finite values are accepted. `NaN` and infinities are rejected even though they parse.
pub fn parse_rate(text: &str) -> EtlResult<f64> {
    let value: f64 = text.trim().parse()?;

    if !value.is_finite() {
        bail!(
            ErrorKind::CoercionFailure,
            "Rate is not a finite number",
            text
        );
    }

    Ok(value)
}
