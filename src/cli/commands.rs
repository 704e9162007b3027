use clap::{Args, Subcommand};
use runebattle_core_types::EnemyKind;

use super::config::ConfigArgs;
use super::scenario::RunOptions;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Fight one battle, casting up to the cast budget
    Battle(BattleArgs),

    /// Battle until every enemy kind was met or attempts run out
    Sweep(SweepArgs),

    /// Run repeated battles and check the encounter distribution
    Repeat(RepeatArgs),

    /// Request each enemy through developer mode
    DevSweep(DevSweepArgs),

    /// Camp, shop and battle walkthrough
    Flow(FlowArgs),

    /// Try each spell button once in a battle
    Spells(FlowArgs),

    /// Inspect or initialise configuration
    Config(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
pub struct BattleArgs {
    /// Maximum casts in the battle
    #[arg(long)]
    pub casts: Option<u32>,

    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Args, Clone, Debug)]
pub struct SweepArgs {
    /// Battle attempts before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Args, Clone, Debug)]
pub struct RepeatArgs {
    /// Battles per session
    #[arg(long)]
    pub battles: Option<u32>,

    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Args, Clone, Debug)]
pub struct DevSweepArgs {
    /// Enemies to request, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    pub enemies: Vec<EnemyKind>,

    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Args, Clone, Debug)]
pub struct FlowArgs {
    #[command(flatten)]
    pub run: RunOptions,
}
