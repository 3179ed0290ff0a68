//! Log-point output.
//!
//! A log point fires like a breakpoint but, instead of being finalized, has
//! its message template rendered and written to a log. The breakpoint stays
//! active on the engine side.

use debuglet_core::error::Result;
use debuglet_core::wire::{Breakpoint, LogLevel, Variable};

/// Destination for rendered log-point messages.
pub trait LogPointSink: Send + Sync {
    fn write(&self, breakpoint: &Breakpoint) -> Result<()>;
}

/// Writes log-point messages through `tracing` at the breakpoint's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogPointSink;

impl LogPointSink for TracingLogPointSink {
    fn write(&self, breakpoint: &Breakpoint) -> Result<()> {
        let message = render(breakpoint);
        let location = breakpoint
            .location
            .as_ref()
            .map(|l| format!("{}:{}", l.path, l.line))
            .unwrap_or_default();

        match breakpoint.log_level() {
            LogLevel::Info => {
                tracing::info!(target: "logpoint", breakpoint_id = %breakpoint.id, %location, "{}", message)
            }
            LogLevel::Warning => {
                tracing::warn!(target: "logpoint", breakpoint_id = %breakpoint.id, %location, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(target: "logpoint", breakpoint_id = %breakpoint.id, %location, "{}", message)
            }
        }
        Ok(())
    }
}

/// Render a hit log point's message.
///
/// An engine-side error replaces the message with the error text.
pub fn render(breakpoint: &Breakpoint) -> String {
    if let Some(status) = breakpoint.status.as_ref().filter(|s| s.is_error) {
        return format!("LOGPOINT: Error evaluating log point: {}", status.message);
    }
    let values: Vec<String> = breakpoint
        .evaluated_expressions
        .iter()
        .map(display_value)
        .collect();
    format!("LOGPOINT: {}", format_message(&breakpoint.log_message_format, &values))
}

/// Substitute `$0`..`$9` with `values` and `$$` with a literal `$`.
///
/// A placeholder without a matching value is kept verbatim.
pub fn format_message(template: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let index = (d as u8 - b'0') as usize;
                match values.get(index) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push(d);
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

fn display_value(variable: &Variable) -> String {
    match &variable.status {
        Some(status) if status.is_error => format!("<{}>", status.message),
        _ => variable.value.clone(),
    }
}
