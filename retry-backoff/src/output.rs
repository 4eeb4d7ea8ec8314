use anyhow::Result;
use serde_json::Value as JsonValue;
use std::io::{self, Write};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
    Raw,
}

pub fn emit_data(fmt: &OutputFormat, data: &JsonValue) -> Result<()> {
    let mut out = io::stdout().lock();
    match fmt {
        OutputFormat::Yaml => {
            let s = serde_yaml::to_string(data)?;
            writeln!(out, "{}", s.trim_end())?;
        }
        OutputFormat::Json => {
            let s = serde_json::to_string_pretty(data)?;
            writeln!(out, "{}", s)?;
        }
        OutputFormat::Raw => {
            writeln!(out, "{}", render_raw(data)?)?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Plain rendering for scripts: strings unquoted, arrays one item per line,
/// anything else as compact JSON.
pub fn render_raw(data: &JsonValue) -> Result<String> {
    Ok(match data {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items
            .iter()
            .map(render_raw)
            .collect::<Result<Vec<_>>>()?
            .join("\n"),
        other => serde_json::to_string(other)?,
    })
}

pub fn emit_error(err: &anyhow::Error) -> Result<()> {
    let mut map = serde_json::Map::new();
    map.insert("error".into(), JsonValue::String(err.to_string()));
    let causes: Vec<JsonValue> = err
        .chain()
        .skip(1)
        .map(|c| JsonValue::String(c.to_string()))
        .collect();
    if !causes.is_empty() {
        map.insert("caused_by".into(), JsonValue::Array(causes));
    }
    let s = serde_yaml::to_string(&JsonValue::Object(map))?;
    let _ = writeln!(io::stderr(), "{}", s.trim_end());
    Ok(())
}

/// Durations are reported as fractional milliseconds.
pub fn ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}
