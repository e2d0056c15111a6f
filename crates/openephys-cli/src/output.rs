//! Output formatting for CLI responses

use anyhow::Error;
use serde::Serialize;
use serde_json::json;

use crate::error::CliError;

/// Print a successful payload as pretty JSON under `key`.
pub fn print_json<T: Serialize>(key: &str, value: &T) -> anyhow::Result<()> {
    let mut output = serde_json::Map::new();
    output.insert("success".into(), json!(true));
    output.insert(key.into(), serde_json::to_value(value).map_err(CliError::from)?);
    let text = serde_json::to_string_pretty(&output).map_err(CliError::from)?;
    println!("{text}");
    Ok(())
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("Error: {error}");

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  Caused by: {err}");
        source = err.source();
    }
}

/// Format a sample count with its duration at `sample_rate`.
pub fn duration(samples: u64, sample_rate: f32) -> String {
    if sample_rate > 0.0 {
        format!("{samples} samples ({:.3} s)", samples as f64 / f64::from(sample_rate))
    } else {
        format!("{samples} samples")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        assert_eq!(duration(30000, 30000.0), "30000 samples (1.000 s)");
        assert_eq!(duration(5, 0.0), "5 samples");
    }
}
