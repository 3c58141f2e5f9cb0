//! Parsing of raw benchmark harness output into measurements.
//!
//! Two input forms are supported: the libtest text that `cargo bench` prints,
//! and a generic JSON array of `{name, value, range, unit}` objects for
//! harnesses that pre-digest their results.

use regex::Regex;

use crate::bench::Measurement;
use crate::errors::{Error, Result};

/// `test fib_recursive(12) ... bench:     292,556 ns/iter (+/- 500)`
const BENCH_LINE: &str = r"^test (.+?)\s+\.\.\.\s+bench:\s+([0-9,]+(?:\.[0-9]+)?)\s+(\S+)\s+\(\+/-\s+([0-9,]+(?:\.[0-9]+)?)\)$";

pub fn extract(tool: &str, input: &str) -> Result<Vec<Measurement>> {
    match tool {
        "cargo" => cargo_bench(input),
        "json" => json_benches(input),
        other => Err(Error::BadInput(format!(
            "unsupported tool '{}' (expected 'cargo' or 'json')",
            other
        ))),
    }
}

fn cargo_bench(input: &str) -> Result<Vec<Measurement>> {
    let line = Regex::new(BENCH_LINE).expect("bench line pattern is valid");

    let mut out = Vec::new();
    for l in input.lines().map(str::trim) {
        if let Some(caps) = line.captures(l) {
            out.push(Measurement::new(
                &caps[1],
                number(&caps[2])?,
                number(&caps[4])?,
                &caps[3],
            )?);
        }
    }

    if out.is_empty() {
        return Err(Error::BadInput(
            "no benchmark result lines found in input".to_owned(),
        ));
    }
    Ok(out)
}

fn json_benches(input: &str) -> Result<Vec<Measurement>> {
    let benches: Vec<Measurement> =
        serde_json::from_str(input).map_err(|e| Error::BadInput(e.to_string()))?;
    for m in &benches {
        m.validate()?;
    }
    Ok(benches)
}

fn number(s: &str) -> Result<f64> {
    s.replace(',', "")
        .parse::<f64>()
        .map_err(|e| Error::BadInput(format!("bad number '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARGO_OUTPUT: &str = "\
running 3 tests
test interpreter        ... bench:   3,143,182 ns/iter (+/- 44,206)
test fib_recursive(12)  ... bench:     292,556 ns/iter (+/- 500)
test fib_iterative(12)  ... bench:      76,349 ns/iter (+/- 87)

test result: ok. 0 passed; 0 failed; 0 ignored; 3 measured; 0 filtered out
";

    #[test]
    fn parses_libtest_bench_lines() {
        let benches = extract("cargo", CARGO_OUTPUT).unwrap();
        assert_eq!(benches.len(), 3);
        assert_eq!(benches[0].name, "interpreter");
        assert_eq!(benches[0].value, 3143182.0);
        assert_eq!(benches[0].range, 44206.0);
        assert_eq!(benches[0].unit, "ns/iter");
        assert_eq!(benches[1].name, "fib_recursive(12)");
        assert_eq!(benches[1].value, 292556.0);
    }

    #[test]
    fn non_bench_lines_are_ignored() {
        let benches = extract("cargo", CARGO_OUTPUT).unwrap();
        assert!(benches.iter().all(|m| m.unit == "ns/iter"));
    }

    #[test]
    fn output_without_bench_lines_is_an_error() {
        let err = extract("cargo", "test result: ok. 3 passed\n").unwrap_err();
        assert!(matches!(err, Error::BadInput(_)));
    }

    #[test]
    fn json_array_is_accepted() {
        let benches = extract(
            "json",
            r#"[{"name": "parse", "value": 120.5, "range": "± 2.5", "unit": "MB/s"}]"#,
        )
        .unwrap();
        assert_eq!(benches.len(), 1);
        assert_eq!(benches[0].value, 120.5);
        assert_eq!(benches[0].range, 2.5);
    }

    #[test]
    fn json_with_invalid_measurement_is_rejected() {
        let err = extract(
            "json",
            r#"[{"name": "parse", "value": 1.0, "range": "± -3", "unit": "MB/s"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement { .. }));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert!(matches!(
            extract("gotest", "anything"),
            Err(Error::BadInput(_))
        ));
    }
}
