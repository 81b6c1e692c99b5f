use clap::Parser;
use engine::Config;

const DEFAULT_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Explore and extend a CDB (chessdb.cn) position tree from a root FEN.
#[derive(Debug, Parser)]
#[command(name = "cdbx", version, about)]
pub struct Cli {
    /// Root position to explore from.
    #[arg(short, long, default_value = DEFAULT_FEN)]
    pub fen: String,

    /// Stop after this many iterative-deepening passes.
    #[arg(short, long, value_name = "PLIES")]
    pub depth_limit: Option<u32>,

    /// Stop starting new iterations after this many seconds.
    #[arg(short, long, value_name = "SECONDS")]
    pub time_limit: Option<u64>,

    /// Permits on the CDB request semaphore.
    #[arg(short, long, default_value_t = 16)]
    pub concurrency: usize,

    /// Centipawns of score lost per 1 ply of width pruning; 0 means PV-only.
    #[arg(short = 'w', long, default_value_t = 0)]
    pub eval_decay: u32,

    /// Count CDB's cursed win/loss band as a genuine win/loss.
    #[arg(long)]
    pub cursed_wins: bool,

    /// Keep expanding past tablebase-scored positions.
    #[arg(long)]
    pub tb_search: bool,

    /// Run the auxiliary mate-proof pass once a mate score is found.
    #[arg(long)]
    pub prove_mates: bool,

    /// Use Chess960 castling semantics.
    #[arg(long)]
    pub chess960: bool,

    /// Appended to the User-Agent CDB sees.
    #[arg(long)]
    pub user: Option<String>,

    /// Silence error-level logging on CDB transport failures.
    #[arg(long)]
    pub suppress_errors: bool,

    /// Don't ask CDB to learn queried positions.
    #[arg(long)]
    pub no_learn: bool,
}

impl Cli {
    pub fn to_config(&self) -> Config {
        Config {
            depth_limit: self.depth_limit,
            time_limit: self.time_limit,
            concurrency: self.concurrency,
            eval_decay: self.eval_decay,
            cursed_wins: self.cursed_wins,
            tb_search: self.tb_search,
            prove_mates: self.prove_mates,
            chess960: self.chess960,
            user: self.user.clone(),
            suppress_errors: self.suppress_errors,
            learn: !self.no_learn,
        }
    }
}
