use crate::demo::{run_demo, run_reward_quote, DemoArgs, QuoteArgs};
use crate::server;
use campaign_engine::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Campaign Engine",
    about = "Run and demonstrate the influencer campaign engine from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price an influencer against a hypothetical campaign fund
    Reward {
        #[command(subcommand)]
        command: RewardCommand,
    },
    /// Walk through a campaign from launch to a paid reward
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RewardCommand {
    /// Print the reward, fund share and VAT breakdown for one influencer
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Reward {
            command: RewardCommand::Quote(args),
        } => run_reward_quote(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["campaign-engine"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_reward_quote_arguments() {
        let cli = Cli::try_parse_from([
            "campaign-engine",
            "reward",
            "quote",
            "--reward-model",
            "reach",
            "--budget",
            "100000",
            "--units",
            "50000",
            "--followers",
            "4000",
        ])
        .expect("parses");
        assert!(matches!(
            cli.command,
            Some(Command::Reward {
                command: RewardCommand::Quote(_)
            })
        ));
    }

    #[test]
    fn rejects_unknown_reward_models() {
        let result = Cli::try_parse_from([
            "campaign-engine",
            "reward",
            "quote",
            "--reward-model",
            "barter",
            "--budget",
            "100",
            "--units",
            "1",
        ]);
        assert!(result.is_err());
    }
}
