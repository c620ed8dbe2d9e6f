use std::time::{Duration, Instant};

use clap::Parser;
use hexsettle::board::BoardVariant;
use hexsettle::game::{GameConfig, GameSession};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser, Clone)]
#[command(name = "hexsettle-simulate")]
#[command(about = "Run AI-only sessions end to end and report the outcomes")]
struct Args {
    /// Number of games to play
    #[arg(short = 'n', long, default_value_t = 5)]
    games: u32,

    /// Seats per game (2-4)
    #[arg(long, default_value_t = 4)]
    players: usize,

    /// Seed of the first game; game i uses seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Board variant: standard or randomized
    #[arg(long, default_value_t = BoardVariant::Standard)]
    board: BoardVariant,

    /// Victory points needed to win
    #[arg(long, default_value_t = 10)]
    vps_to_win: u8,

    /// Give up on a game after this many applied actions
    #[arg(long, default_value_t = 5_000)]
    max_actions: usize,

    /// Only print the summary
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Default)]
struct Summary {
    games: u32,
    unfinished: u32,
    wins: Vec<u32>,
    total_turns: u64,
    total_actions: u64,
    total_duration: Duration,
}

impl Summary {
    fn new(players: usize) -> Self {
        Self {
            wins: vec![0; players],
            ..Self::default()
        }
    }

    fn avg(&self, total: u64) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        total as f64 / self.games as f64
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mut summary = Summary::new(args.players);

    for game_idx in 0..args.games {
        let config = GameConfig {
            num_players: args.players,
            board: args.board,
            vps_to_win: args.vps_to_win,
            seed: args.seed + game_idx as u64,
            ..GameConfig::default()
        };
        let mut session = match GameSession::new(config) {
            Ok(session) => session,
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        };

        let start = Instant::now();
        let winner = session.play_out(args.max_actions);
        let duration = start.elapsed();

        let state = session.state();
        summary.games += 1;
        summary.total_turns += state.turn() as u64;
        summary.total_actions += session.log().len() as u64;
        summary.total_duration += duration;
        match winner {
            Some(winner) => summary.wins[winner] += 1,
            None => {
                summary.unfinished += 1;
                warn!(
                    game = game_idx + 1,
                    phase = %state.phase(),
                    aborted = session.is_aborted(),
                    "game did not finish"
                );
            }
        }
        info!(game = game_idx + 1, ?winner, turns = state.turn(), "game finished");

        if !args.quiet {
            let winner = winner
                .map(|seat| format!("seat {seat}"))
                .unwrap_or_else(|| "none".to_string());
            println!(
                "Game {:>4}: Winner={:>7}, Scores={:?}, Turns={:>4}, Actions={:>5}, Duration={:?}",
                game_idx + 1,
                winner,
                state.scores(),
                state.turn(),
                session.log().len(),
                duration
            );
        }
    }

    print_summary(&summary);
}

fn print_summary(summary: &Summary) {
    println!("\n{}", "=".repeat(60));
    println!("SIMULATION SUMMARY");
    println!("{}", "=".repeat(60));
    println!("{:<10} {:<10} {:<10}", "Seat", "Wins", "Win Rate");
    println!("{}", "-".repeat(30));
    for (seat, wins) in summary.wins.iter().enumerate() {
        let rate = if summary.games > 0 {
            *wins as f64 / summary.games as f64 * 100.0
        } else {
            0.0
        };
        println!("{:<10} {:<10} {:<9.1}%", seat, wins, rate);
    }
    println!("\n  Total Games: {}", summary.games);
    println!("  Unfinished: {}", summary.unfinished);
    println!("  Avg Turns: {:.2}", summary.avg(summary.total_turns));
    println!("  Avg Actions: {:.2}", summary.avg(summary.total_actions));
    let avg_duration = if summary.games > 0 {
        summary.total_duration / summary.games
    } else {
        Duration::ZERO
    };
    println!("  Avg Duration: {:.2?}", avg_duration);
}
