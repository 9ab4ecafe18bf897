//! Helpers for rendering metrics in the Prometheus exposition format.

use std::fmt;

use crate::label::LabelSet;

/// A sample value, formatted the way the [exposition format] expects.
///
/// Integral values are written without a fractional part, infinities as `+Inf`/`-Inf`, and NaN as
/// `NaN`.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
#[derive(Clone, Copy, Debug)]
pub struct Value(pub f64);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_nan() {
            f.write_str("NaN")
        } else if self.0 == f64::INFINITY {
            f.write_str("+Inf")
        } else if self.0 == f64::NEG_INFINITY {
            f.write_str("-Inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Writes a help (description) line in the Prometheus [exposition format].
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_help_line(buffer: &mut String, name: &str, desc: &str) {
    buffer.push_str("# HELP ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(&escape_description(desc));
    buffer.push('\n');
}

/// Writes a metric type line in the Prometheus [exposition format].
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_type_line(buffer: &mut String, name: &str, metric_type: &str) {
    buffer.push_str("# TYPE ");
    buffer.push_str(name);
    buffer.push(' ');
    buffer.push_str(metric_type);
    buffer.push('\n');
}

/// Writes a metric in the Prometheus [exposition format].
///
/// When `suffix` is specified, it is appended to the `name`, which is useful for writing summary
/// statistics, such as the sum or count of a histogram or summary.  Likewise, `additional_label`
/// would typically be used to specify a data type-specific label, such as `le` for histograms, or
/// `quantile` for summaries.  It is always written after `labels`.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn write_metric_line<T, T2>(
    buffer: &mut String,
    name: &str,
    suffix: Option<&'static str>,
    labels: &LabelSet,
    additional_label: Option<(&'static str, T)>,
    value: T2,
) where
    T: fmt::Display,
    T2: fmt::Display,
{
    buffer.push_str(name);
    if let Some(suffix) = suffix {
        buffer.push('_');
        buffer.push_str(suffix);
    }

    if !labels.is_empty() || additional_label.is_some() {
        buffer.push('{');

        let mut first = true;
        for label in labels {
            if first {
                first = false;
            } else {
                buffer.push(',');
            }
            write_label(buffer, label.key(), label.value());
        }

        if let Some((name, value)) = additional_label {
            if !first {
                buffer.push(',');
            }
            write_label(buffer, name, &value.to_string());
        }

        buffer.push('}');
    }

    buffer.push(' ');
    buffer.push_str(value.to_string().as_str());
    buffer.push('\n');
}

fn write_label(buffer: &mut String, key: &str, value: &str) {
    buffer.push_str(key);
    buffer.push_str("=\"");
    buffer.push_str(&escape_label_value(value));
    buffer.push('"');
}

/// Escapes a label value for the Prometheus [exposition format].
///
/// Backslashes, double quotes, and line feeds are escaped; everything else is written verbatim.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn escape_label_value(value: &str) -> String {
    escape(value, true)
}

/// Escapes a metric description for the Prometheus [exposition format].
///
/// Backslashes and line feeds are escaped.  Double quotes are left as-is.
///
/// [exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
pub fn escape_description(value: &str) -> String {
    escape(value, false)
}

fn escape(value: &str, escape_quotes: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' if escape_quotes => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{
        escape_description, escape_label_value, write_help_line, write_metric_line,
        write_type_line, Value,
    };
    use crate::LabelSet;
    use proptest::prelude::*;

    #[test]
    fn test_value_formatting() {
        let cases = &[
            (5.0, "5"),
            (63.5, "63.5"),
            (-3.25, "-3.25"),
            (0.005, "0.005"),
            (f64::INFINITY, "+Inf"),
            (f64::NEG_INFINITY, "-Inf"),
            (f64::NAN, "NaN"),
        ];

        for (input, expected) in cases {
            assert_eq!(Value(*input).to_string(), *expected);
        }
    }

    #[test]
    fn test_escape_label_value_known_cases() {
        let cases = &[
            ("*", "*"),
            ("\"", "\\\""),
            ("\\", "\\\\"),
            ("\\\\", "\\\\\\\\"),
            ("\n", "\\n"),
            ("foo_bar", "foo_bar"),
            ("1foobar", "1foobar"),
        ];

        for (input, expected) in cases {
            let result = escape_label_value(input);
            assert_eq!(expected, &result);
        }
    }

    #[test]
    fn test_escape_description_known_cases() {
        let cases = &[
            ("*", "*"),
            ("\"", "\""),
            ("\\", "\\\\"),
            ("\n", "\\n"),
            ("total hits", "total hits"),
        ];

        for (input, expected) in cases {
            let result = escape_description(input);
            assert_eq!(expected, &result);
        }
    }

    #[test]
    fn test_metric_lines() {
        let mut buffer = String::new();
        write_help_line(&mut buffer, "hits", "total hits");
        write_type_line(&mut buffer, "hits", "counter");
        write_metric_line::<&str, _>(&mut buffer, "hits", None, &LabelSet::empty(), None, Value(5.0));
        assert_eq!(buffer, "# HELP hits total hits\n# TYPE hits counter\nhits 5\n");

        let labels = LabelSet::new([("route", "/a"), ("method", "GET")]).unwrap();
        let mut buffer = String::new();
        write_metric_line(
            &mut buffer,
            "latency",
            Some("bucket"),
            &labels,
            Some(("le", Value(f64::INFINITY))),
            3,
        );
        assert_eq!(buffer, "latency_bucket{route=\"/a\",method=\"GET\",le=\"+Inf\"} 3\n");

        let mut buffer = String::new();
        write_metric_line(&mut buffer, "latency", None, &LabelSet::empty(), Some(("quantile", 0.5)), 2);
        assert_eq!(buffer, "latency{quantile=\"0.5\"} 2\n");
    }

    proptest! {
        #[test]
        fn test_escape_label_value(input in "[\n\"\\\\]?.*[\n\"\\\\]?") {
            let result = escape_label_value(&input);

            // If any raw newlines are still present, then we messed up.
            assert!(!result.contains('\n'), "raw/unescaped newlines present");

            // Walk the output: every backslash must start a valid escape sequence, and every
            // double quote must have been escaped.
            let mut chars = result.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        let next = chars.next();
                        assert!(matches!(next, Some('\\') | Some('"') | Some('n')),
                            "invalid escape sequence in {:?}", result);
                    }
                    '"' => panic!("unescaped double quote in {:?}", result),
                    _ => {}
                }
            }
        }
    }
}
