use anyhow::Result;

use super::config::cmd_config;
use super::env::CliArgs;
use super::scenario::cmd_scenario;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use crate::scenario::ScenarioPlan;

/// Run the selected command. Returns the process exit code.
pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<i32> {
    match cli.command.clone() {
        Commands::Battle(args) => {
            cmd_scenario(ctx, args.run, |policy| {
                let mut plan = ScenarioPlan::single_battle(policy);
                if let Some(casts) = args.casts {
                    plan.cast_budget = casts;
                }
                plan
            })
            .await
        }
        Commands::Sweep(args) => {
            cmd_scenario(ctx, args.run, |policy| {
                let mut policy = policy.clone();
                if let Some(max_attempts) = args.max_attempts {
                    policy.max_attempts = max_attempts;
                }
                ScenarioPlan::enemy_sweep(&policy)
            })
            .await
        }
        Commands::Repeat(args) => {
            cmd_scenario(ctx, args.run, |policy| {
                ScenarioPlan::repeated_battles(args.battles.unwrap_or(policy.battles), policy)
            })
            .await
        }
        Commands::DevSweep(args) => {
            cmd_scenario(ctx, args.run, |policy| {
                ScenarioPlan::dev_sweep(&args.enemies, policy)
            })
            .await
        }
        Commands::Flow(args) => cmd_scenario(ctx, args.run, ScenarioPlan::full_flow).await,
        Commands::Spells(args) => cmd_scenario(ctx, args.run, ScenarioPlan::spell_buttons).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
