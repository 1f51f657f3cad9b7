//! Trajectory replay and export.
//!
//! A recorded trajectory is pure data, so it can be re-run against a fresh
//! driver without any model in the loop, or rendered to a standalone
//! program that does the same.

use crate::driver::Driver;
use crate::error::Result;
use crate::trajectory::{ActionStatus, NavigationOutput, Trajectory};
use std::time::Duration;

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Re-execute a trajectory's successful navigation actions in order.
///
/// Actions recorded as failed are skipped; they produced no browser effect
/// the first time either.
pub fn replay(trajectory: &Trajectory, driver: &dyn Driver) -> Result<()> {
    driver.goto(&trajectory.start_url)?;
    driver.wait_for_idle(IDLE_TIMEOUT)?;
    for action in &trajectory.actions {
        if action.status == ActionStatus::Failed {
            log::debug!("replay: skipping failed instruction {:?}", action.instruction);
            continue;
        }
        for output in &action.action_output {
            if let crate::trajectory::ActionOutput::WebNavigation(nav) = output {
                log::info!("replay: {:?}", nav.navigation_command);
                driver.execute(nav)?;
                driver.wait_for_idle(IDLE_TIMEOUT)?;
            }
        }
    }
    Ok(())
}

fn render_output(nav: &NavigationOutput, out: &mut String) {
    out.push_str("    driver.execute(&NavigationOutput::new(\n");
    out.push_str(&format!(
        "        NavigationCommand::{:?},\n",
        nav.navigation_command
    ));
    match &nav.xpath {
        Some(xpath) => out.push_str(&format!("        Some({:?}.to_string()),\n", xpath)),
        None => out.push_str("        None,\n"),
    }
    match &nav.value {
        Some(value) => out.push_str(&format!("        Some({:?}.to_string()),\n", value)),
        None => out.push_str("        None,\n"),
    }
    out.push_str("    ))?;\n");
    out.push_str("    driver.wait_for_idle(Duration::from_secs(10))?;\n");
}

/// Render a trajectory as a standalone runnable program using this crate
pub fn to_script(trajectory: &Trajectory) -> String {
    let mut out = String::new();
    out.push_str("//! Replay of a recorded run.\n");
    out.push_str(&format!("//! Objective: {}\n\n", trajectory.objective));
    out.push_str("use std::time::Duration;\n");
    out.push_str("use webpilot::driver::{ChromeDriver, Driver, LaunchOptions};\n");
    out.push_str("use webpilot::trajectory::{NavigationCommand, NavigationOutput};\n\n");
    out.push_str("fn main() -> webpilot::Result<()> {\n");
    out.push_str("    let driver = ChromeDriver::launch(LaunchOptions::new().headless(false))?;\n");
    out.push_str(&format!(
        "    driver.goto({:?})?;\n",
        trajectory.start_url
    ));
    out.push_str("    driver.wait_for_idle(Duration::from_secs(10))?;\n");
    for action in &trajectory.actions {
        if action.status == ActionStatus::Failed {
            continue;
        }
        out.push_str(&format!("\n    // {}\n", action.instruction));
        for output in &action.action_output {
            if let crate::trajectory::ActionOutput::WebNavigation(nav) = output {
                render_output(nav, &mut out);
            }
        }
    }
    out.push_str("    Ok(())\n}\n");
    out
}
