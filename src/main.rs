use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use trackscope::{cli, config, spotify::tracks::TimeRange, utils, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the Spotify authorization URL
    LoginUrl,

    /// Analyze audio features of your top tracks or a public playlist
    Analyze(AnalyzeOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeOptions {
    /// Public playlist id or link, analyzed with client credentials
    #[clap(long)]
    pub playlist: Option<String>,

    /// Number of top tracks to fetch (1-50)
    #[clap(long, default_value_t = 50)]
    pub limit: u32,

    /// Listening period for top tracks
    #[clap(long, value_enum, default_value_t = TimeRange::Long)]
    pub time_range: TimeRange,

    /// Comma separated feature columns to correlate
    #[clap(long, value_parser = utils::parse_columns)]
    pub columns: Option<utils::ColumnList>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    if let Err(e) = config::load_env().await {
        warning!("Cannot load environment file. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::LoginUrl => cli::login_url().await,
        Command::Analyze(opt) => {
            cli::analyze(
                opt.playlist,
                opt.limit,
                opt.time_range,
                opt.columns.map(|c| c.0),
            )
            .await
        }
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
