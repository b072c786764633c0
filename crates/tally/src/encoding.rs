//! Text encoding of gathered metric families.

use std::fmt;

use crate::{format::Format, sample::MetricFamily};

pub(crate) fn encode_families<W: fmt::Write>(
    writer: &mut W,
    families: &[MetricFamily],
    format: Format,
) -> fmt::Result {
    for family in families {
        encode_family(writer, family, format)?;
    }
    if format.is_open_metrics() {
        writer.write_str("# EOF\n")?;
    }
    Ok(())
}

fn encode_family<W: fmt::Write>(
    writer: &mut W,
    family: &MetricFamily,
    format: Format,
) -> fmt::Result {
    let descriptor = family.descriptor();
    let name = descriptor.full_name();

    write!(writer, "# HELP {name} ")?;
    write_escaped(writer, descriptor.help(), false)?;
    writer.write_char('\n')?;
    writeln!(writer, "# TYPE {name} {}", descriptor.metric_type().as_str())?;
    if let Some(unit) = descriptor.unit().filter(|_| format.is_open_metrics()) {
        writeln!(writer, "# UNIT {name} {}", unit.as_str())?;
    }

    let suffix = if descriptor.is_counter() {
        format.counter_suffix()
    } else {
        ""
    };
    for sample in family.samples() {
        write!(writer, "{name}{suffix}")?;
        let mut labels = sample.labels().peekable();
        if labels.peek().is_some() {
            writer.write_char('{')?;
            for (i, (label, value)) in labels.enumerate() {
                if i > 0 {
                    writer.write_char(',')?;
                }
                write!(writer, "{label}=\"")?;
                write_escaped(writer, value, true)?;
                writer.write_char('"')?;
            }
            writer.write_char('}')?;
        }
        writer.write_char(' ')?;
        write_value(writer, sample.value())?;
        writer.write_char('\n')?;
    }
    Ok(())
}

/// Escapes backslashes and line feeds, plus double quotes in label values.
fn write_escaped<W: fmt::Write>(writer: &mut W, s: &str, escape_quotes: bool) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => writer.write_str("\\\\")?,
            '\n' => writer.write_str("\\n")?,
            '"' if escape_quotes => writer.write_str("\\\"")?,
            _ => writer.write_char(ch)?,
        }
    }
    Ok(())
}

fn write_value<W: fmt::Write>(writer: &mut W, value: f64) -> fmt::Result {
    if value.is_nan() {
        writer.write_str("NaN")
    } else if value.is_infinite() {
        writer.write_str(if value > 0.0 { "+Inf" } else { "-Inf" })
    } else {
        // Debug output is the shortest round-trip representation and always contains
        // a decimal point or an exponent.
        write!(writer, "{value:?}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{MetricDescriptor, Sample};

    fn encode(family: MetricFamily, format: Format) -> String {
        let mut buffer = String::new();
        encode_families(&mut buffer, &[family], format).unwrap();
        buffer
    }

    #[test]
    fn encoding_values() {
        let mut buffer = String::new();
        for value in [42.0, 0.5, -3.0, 1e-7, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            write_value(&mut buffer, value).unwrap();
            buffer.push(' ');
        }
        assert_eq!(buffer, "42.0 0.5 -3.0 1e-7 NaN +Inf -Inf ");
    }

    #[test]
    fn escaping_help_and_label_values() {
        let descriptor = Arc::new(
            MetricDescriptor::new("escaped", "Help with \\ and\nnewline \"quotes\"")
                .with_labels(["path"]),
        );
        let sample = Sample::new(&descriptor, 1.0, ["C:\\dir\n\"x\""]).unwrap();
        let family = MetricFamily {
            descriptor,
            samples: vec![sample],
        };

        let output = encode(family, Format::Prometheus);
        let expected = "\
            # HELP escaped Help with \\\\ and\\nnewline \"quotes\"\n\
            # TYPE escaped gauge\n\
            escaped{path=\"C:\\\\dir\\n\\\"x\\\"\"} 1.0\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn family_without_samples_is_still_declared() {
        let descriptor = Arc::new(MetricDescriptor::new("degraded", "Degraded metric."));
        let family = MetricFamily {
            descriptor,
            samples: vec![],
        };

        let output = encode(family.clone(), Format::Prometheus);
        assert_eq!(
            output,
            "# HELP degraded Degraded metric.\n# TYPE degraded gauge\n"
        );
        let output = encode(family, Format::OpenMetrics);
        assert!(output.ends_with("# TYPE degraded gauge\n# EOF\n"), "{output}");
    }
}
