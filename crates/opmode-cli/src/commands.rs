//! CLI commands executed against a controller

use anyhow::Context;
use opmode_core::{ModeController, ModeStatus};
use serde_json::Value;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status { json: bool },
    Demo { reason: String },
    Real,
    Toggle,
    Settings,
    Set { field: String, value: String },
    Fail { count: u32, context: String, critical: bool },
    Succeed,
    Reset,
}

/// Run `command`, returning the text to print
pub fn execute(controller: &ModeController, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Status { json } => {
            let status = controller.status();
            if json {
                serde_json::to_string_pretty(&status).context("encoding status")
            } else {
                Ok(render_status(&status))
            }
        }
        Command::Demo { reason } => Ok(transition_line(controller.enable_demo_mode(reason), controller)),
        Command::Real => Ok(transition_line(controller.enable_real_mode(), controller)),
        Command::Toggle => Ok(transition_line(controller.toggle(), controller)),
        Command::Settings => {
            serde_json::to_string_pretty(&controller.settings()).context("encoding settings")
        }
        Command::Set { field, value } => {
            let patch = serde_json::json!({ field: parse_value(&value) });
            let settings = controller.update_settings_from_value(&patch)?;
            serde_json::to_string_pretty(&settings).context("encoding settings")
        }
        Command::Fail {
            count,
            context,
            critical,
        } => {
            let _section = critical.then(|| controller.critical_section(context.as_str()));
            let mut switched = false;
            for i in 0..count {
                switched |= controller.report_failure(format!("manual failure #{}", i + 1), &context);
            }
            let health = controller.health();
            let mut out = format!(
                "{} failure(s) reported under '{context}', {} consecutive",
                count, health.consecutive_errors
            );
            if switched {
                let _ = write!(out, "; switched to {}", controller.mode());
            }
            Ok(out)
        }
        Command::Succeed => {
            controller.report_success();
            Ok("success reported, failure counter cleared".to_string())
        }
        Command::Reset => {
            controller.reset();
            Ok(format!("health reset, mode remains {}", controller.mode()))
        }
    }
}

/// Interpret a CLI value as JSON when possible (`5`, `true`), else as a string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn transition_line(changed: bool, controller: &ModeController) -> String {
    if changed {
        format!("switched to {}", controller.mode())
    } else {
        format!("already {}", controller.mode())
    }
}

fn render_status(status: &ModeStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Mode:               {}", status.mode);
    if let Some(previous) = status.previous_mode {
        let _ = writeln!(out, "Previous mode:      {previous}");
    }
    if let Some(reason) = &status.switch_reason {
        let _ = writeln!(out, "Switch reason:      {reason}");
    }
    if status.override_active {
        let _ = writeln!(out, "Temporary override: active");
    }
    let _ = writeln!(
        out,
        "Connection:         {} ({} consecutive failures)",
        if status.health.healthy_connection { "healthy" } else { "unhealthy" },
        status.health.consecutive_errors
    );
    if let Some(err) = &status.health.last_error {
        let _ = writeln!(out, "Last error:         {err}");
    }
    if !status.critical_operations.is_empty() {
        let _ = writeln!(out, "Critical:           {}", status.critical_operations.join(", "));
    }
    let _ = write!(
        out,
        "Auto-switch:        {} after {} failures",
        if status.settings.auto_switch_on_failure { "on" } else { "off" },
        status.settings.max_consecutive_failures
    );
    out
}
