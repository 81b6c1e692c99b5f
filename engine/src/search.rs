//! Iterative-deepening minimax over CDB, with decay-based width pruning and
//! an auxiliary mate-proof pass.
//!
//! Sibling recursions are dispatched as `tokio::spawn`ed tasks and folded
//! with `futures::future::join_all`, the same async-fan-out idiom
//! `chessmatch` uses to drive several engine subprocesses at once.

use crate::config::Config;
use crate::position::Position;
use crate::snapshot::Snapshot;
use crate::stats::Statistics;
use cdb::{CdbClient, CdbError, Fingerprint, PositionCache, Score};
use chess::board::Terminal;
use futures::future::{join_all, BoxFuture};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{info, warn};

/// Bound on how many plies a reconstructed PV will walk before giving up,
/// guarding against a cycle in the PV-hints map (shouldn't happen, since
/// `search_node` never hints a move leading back to an ancestor, but a
/// runaway walk is worse than a truncated PV).
const MAX_PV_WALK: usize = 256;

/// Resources threaded through every node of one depth iteration. Shared
/// across concurrently-spawned sibling tasks via `Arc`.
struct SearchContext {
    client: Arc<CdbClient>,
    cache: Arc<PositionCache>,
    stats: Arc<Statistics>,
    config: Config,
    pv_hints: Mutex<HashMap<String, String>>,
    /// EPDs of positions on the previous iteration's PV, forcing a reprobe
    /// on this iteration even when the cached entry is already complete.
    previous_pv: HashSet<String>,
}

pub struct Engine {
    client: Arc<CdbClient>,
    cache: Arc<PositionCache>,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Engine {
            client: Arc::new(CdbClient::new(
                config.concurrency,
                config.user.as_deref(),
                config.chess960,
                config.suppress_errors,
            )),
            cache: Arc::new(PositionCache::new()),
        }
    }

    /// Build an `Engine` around an already-constructed client, so tests can
    /// point it at a stub server instead of the real CDB endpoint.
    pub fn with_client(client: CdbClient) -> Self {
        Engine { client: Arc::new(client), cache: Arc::new(PositionCache::new()) }
    }

    /// Run iterative deepening from `root`, yielding one `Snapshot` per
    /// completed depth. The returned stream ends when `depth_limit` or
    /// `time_limit` is reached, or `shutdown` is flipped.
    pub fn search(
        self,
        root: Position,
        config: Config,
        shutdown: Arc<AtomicBool>,
    ) -> impl Stream<Item = Snapshot> {
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            let started = Instant::now();
            let mut previous_pv: HashSet<String> = HashSet::new();

            for depth in 1u32.. {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Some(limit) = config.depth_limit {
                    if depth > limit {
                        break;
                    }
                }
                if let Some(limit) = config.time_limit {
                    if started.elapsed().as_secs() >= limit {
                        break;
                    }
                }

                let ctx = Arc::new(SearchContext {
                    client: self.client.clone(),
                    cache: self.cache.clone(),
                    stats: Statistics::new(),
                    config: config.clone(),
                    pv_hints: Mutex::new(HashMap::new()),
                    previous_pv: previous_pv.clone(),
                });

                let score = search_node(root.clone(), depth as i32, 0, true, ctx.clone()).await;

                if let Score::Invalid = score {
                    warn!(epd = %root.epd(), "cdb rejected root position, aborting search");
                    break;
                }

                let (pv, pv_epds) = reconstruct_pv(&root, &ctx);
                previous_pv = pv_epds;
                let stats = ctx.stats.snapshot();

                let mate_proven = if config.prove_mates {
                    if let Score::Mate(plies) = score {
                        if plies > 0 {
                            Some(prove_mate(&root, plies, &ctx).await)
                        } else {
                            None
                        }
                    } else {
                        None
                    }
                } else {
                    None
                };

                info!(depth, score = %score, queryall = stats.queryall, "depth iteration complete");

                let stop_after_this =
                    config.prove_mates && matches!(mate_proven, Some(true));

                let snapshot = Snapshot {
                    depth,
                    score,
                    pv,
                    stats,
                    mate_proven,
                    root_epd: root.epd(),
                };

                if tx.send(snapshot).await.is_err() {
                    break;
                }

                if stop_after_this {
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Walk the PV-hints map from `root`, applying each hinted move in turn.
/// Also collects the EPD of every position visited along the way, so the
/// next iteration knows which nodes to reprobe.
fn reconstruct_pv(root: &Position, ctx: &SearchContext) -> (Vec<String>, HashSet<String>) {
    let hints = ctx.pv_hints.lock().expect("pv_hints mutex poisoned");
    let mut pv = Vec::new();
    let mut pos = root.clone();
    let mut epds = HashSet::new();
    epds.insert(pos.epd());

    for _ in 0..MAX_PV_WALK {
        let Some(mv) = hints.get(&pos.epd()) else {
            break;
        };
        let Ok(next) = pos.apply_uci(mv) else {
            break;
        };

        pv.push(mv.clone());
        pos = next;
        epds.insert(pos.epd());
    }

    (pv, epds)
}

/// Minimax value of `pos` at `remaining` plies of budget, from `pos`'s
/// side-to-move perspective. `reprobe` forces a fresh CDB lookup even if a
/// complete cache entry already exists (used for the root every iteration);
/// positions on the previous iteration's PV are reprobed regardless of this
/// flag, via `ctx.previous_pv`.
fn search_node(
    pos: Position,
    remaining: i32,
    ply: u32,
    reprobe: bool,
    ctx: Arc<SearchContext>,
) -> BoxFuture<'static, Score> {
    Box::pin(async move {
        ctx.stats.observe_level(ply as u64);
        ctx.stats.sample_inflight(&ctx.client.inflight);

        match pos.is_terminal() {
            Terminal::Checkmate => return Score::Mate(-1),
            Terminal::Stalemate | Terminal::Draw => return Score::Centipawns(0),
            Terminal::None => {}
        }

        let fp = Fingerprint::from(&pos.board);
        let legal = pos.board.legal_moves::<true>();

        // PV nodes from the previous iteration are reprobed too, even if
        // their cache entry is already complete — they're the leaves most
        // worth pushing CDB to extend.
        let force_reprobe = reprobe || ctx.previous_pv.contains(&pos.epd());
        if force_reprobe {
            ctx.stats.record_reprobe();
        }

        let lookup_started = Instant::now();
        let result = match ctx.cache.lookup(&ctx.client, &fp, force_reprobe, ctx.config.learn).await {
            Ok(result) => result,
            Err(err) => {
                ctx.stats.record_cdb_time(lookup_started.elapsed());
                ctx.stats.record_unscored();
                return downgrade(err);
            }
        };
        ctx.stats.record_cdb_time(lookup_started.elapsed());
        ctx.stats.record_queryall();

        if !result.known {
            ctx.stats.record_enqueue();
            ctx.stats.record_unscored();
            return Score::Unknown;
        }

        if result.moves.is_empty() {
            if !legal.is_empty() {
                ctx.cache.requeue(&ctx.client, &fp).await.ok();
                ctx.stats.record_requeue();
            }
            ctx.stats.record_unscored();
            return Score::Unknown;
        }

        if !result.is_complete(legal.len()) {
            ctx.cache.requeue(&ctx.client, &fp).await.ok();
            ctx.stats.record_requeue();
        }

        if result.tb_hit && !ctx.config.tb_search {
            let best = &result.moves[0];
            return best.score.clip_cursed(ctx.config.cursed_wins);
        }

        let best_score = result.moves[0].score.clip_cursed(ctx.config.cursed_wins).ordering_key();

        if remaining <= 0 {
            return result.moves[0].score.clip_cursed(ctx.config.cursed_wins);
        }

        let mut children = Vec::new();

        for scored in &result.moves {
            let s = scored.score.clip_cursed(ctx.config.cursed_wins).ordering_key();

            let r_child = if ctx.config.eval_decay == 0 {
                if children.is_empty() {
                    remaining - 1
                } else {
                    break;
                }
            } else {
                let gap = (best_score - s).max(0) as u32;
                remaining - 1 - (gap / ctx.config.eval_decay) as i32
            };

            if r_child < 0 {
                break;
            }

            let Ok(child_pos) = pos.apply_uci(&scored.uci) else {
                continue;
            };

            let ctx = ctx.clone();
            let uci = scored.uci.clone();
            children.push(tokio::spawn(async move {
                let score = search_node(child_pos, r_child, ply + 1, false, ctx).await;
                (uci, score.negate())
            }));
        }

        let joined = join_all(children).await;

        let mut best: Option<(String, Score)> = None;
        for handle in joined {
            let Ok((uci, score)) = handle else { continue };

            let replace = match &best {
                None => true,
                Some((_, current)) => score.ordering_key() > current.ordering_key(),
            };

            if replace {
                best = Some((uci, score));
            }
        }

        match best {
            Some((uci, score)) => {
                ctx.pv_hints
                    .lock()
                    .expect("pv_hints mutex poisoned")
                    .insert(pos.epd(), uci);
                score
            }
            None => result.moves[0].score.clip_cursed(ctx.config.cursed_wins),
        }
    })
}

fn downgrade(err: CdbError) -> Score {
    match err {
        CdbError::InvalidPosition => Score::Invalid,
        _ => Score::Unknown,
    }
}

/// Auxiliary pass run once the root returns a proven mate: confirm every
/// legal defender reply also loses within the claimed distance.
///
/// `pos` is always a position where the *attacker* (the mating side) is to
/// move. The attacker's own move is narrowed to CDB's best (PV) move —
/// that's the line the root search already committed to — while every
/// legal defender reply after it is checked (width gate disabled for the
/// defender). `mate_in_plies` counts down by 2 per round (one attacker move,
/// one defender reply), bottoming out at 1: the attacker's final move must
/// itself deliver checkmate.
fn prove_mate<'a>(pos: &'a Position, mate_in_plies: i32, ctx: &'a Arc<SearchContext>) -> BoxFuture<'a, bool> {
    Box::pin(async move {
        if mate_in_plies <= 0 {
            return matches!(pos.is_terminal(), Terminal::Checkmate);
        }

        let fp = Fingerprint::from(&pos.board);
        let result = match ctx.cache.lookup(&ctx.client, &fp, false, ctx.config.learn).await {
            Ok(r) => r,
            Err(_) => {
                ctx.cache.requeue(&ctx.client, &fp).await.ok();
                return false;
            }
        };

        let Some(best) = result.best().cloned() else {
            ctx.cache.requeue(&ctx.client, &fp).await.ok();
            ctx.stats.record_requeue();
            return false;
        };

        let Ok(after_attacker) = pos.apply_uci(&best.uci) else {
            return false;
        };

        if mate_in_plies == 1 {
            return matches!(after_attacker.is_terminal(), Terminal::Checkmate);
        }

        let defenses = after_attacker.board.legal_moves::<true>();
        if defenses.is_empty() {
            return matches!(after_attacker.is_terminal(), Terminal::Checkmate);
        }

        let mut all_confirmed = true;

        for mv in defenses {
            let Ok(after_defense) = after_attacker.apply_uci(&mv.to_string()) else { continue };
            all_confirmed &= prove_mate(&after_defense, mate_in_plies - 2, ctx).await;
        }

        all_confirmed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn downgrade_maps_invalid_position_distinctly() {
        assert_eq!(downgrade(CdbError::InvalidPosition), Score::Invalid);
        assert_eq!(downgrade(CdbError::Busy), Score::Unknown);
    }

    #[test]
    fn reconstruct_pv_collects_every_visited_epd() {
        let root =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", chess::board::Variant::Standard)
                .unwrap();
        let after_e4 = root.apply_uci("e2e4").unwrap();

        let ctx = SearchContext {
            client: Arc::new(CdbClient::with_base_url("http://127.0.0.1:0", 1, None, false, true)),
            cache: Arc::new(PositionCache::new()),
            stats: Statistics::new(),
            config: Config::default(),
            pv_hints: Mutex::new(HashMap::from([(root.epd(), "e2e4".to_string())])),
            previous_pv: HashSet::new(),
        };

        let (pv, epds) = reconstruct_pv(&root, &ctx);

        assert_eq!(pv, vec!["e2e4".to_string()]);
        assert!(epds.contains(&root.epd()));
        assert!(epds.contains(&after_e4.epd()));
    }
}
