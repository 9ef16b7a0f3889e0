//! Implementation of the `concierge plan` command.
//!
//! Resolves settings and prints the steps a deployment would take. Nothing is
//! installed, synced, tagged or rebuilt.

use anyhow::{Context, Result};
use chrono::Local;

use concierge_lib::plan::{DeployPlan, build_plan};

use super::{GlobalArgs, PlanArgs, resolve_hostname, resolve_settings};
use crate::output::{print_json, print_stat, print_step};

pub fn cmd_plan(global: &GlobalArgs, args: &PlanArgs) -> Result<()> {
  let settings = resolve_settings(global, &args.deploy)?;
  let hostname = resolve_hostname(&settings)?;

  let plan = build_plan(&settings, &hostname, Local::now()).context("Failed to plan deployment")?;

  if args.output.is_json() {
    return print_json(&plan);
  }

  print_plan(&plan);
  Ok(())
}

/// Summary header followed by a numbered step listing.
pub(crate) fn print_plan(plan: &DeployPlan) {
  println!("Deployment plan for {} ({})", plan.hostname, plan.host_os);
  print_stat("Config", &plan.config_path.display().to_string());
  print_stat("Install", &plan.install_path.display().to_string());
  println!();
  for (index, step) in plan.steps.iter().enumerate() {
    print_step(index, plan.len(), &step.to_string());
  }
}
