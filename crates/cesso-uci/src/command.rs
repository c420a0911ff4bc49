//! UCI command parsing.

use std::time::Duration;

use cesso_core::{Board, Move};

use crate::error::UciError;

/// Parameters accepted by the `go` command.
#[derive(Debug, Default, Clone)]
pub struct GoParams {
    /// Fixed search depth in plies (`go depth N`).
    pub depth: Option<u8>,
    /// White's remaining time.
    pub wtime: Option<Duration>,
    /// Black's remaining time.
    pub btime: Option<Duration>,
    /// White's increment per move.
    pub winc: Option<Duration>,
    /// Black's increment per move.
    pub binc: Option<Duration>,
    /// Moves remaining until the next time control.
    pub movestogo: Option<u32>,
    /// Fixed time to use for this move (`go movetime N`).
    pub movetime: Option<Duration>,
    /// `go infinite` — search until `stop`.
    pub infinite: bool,
    /// `go ponder` — search the expected opponent reply.
    pub ponder: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset engine state.
    UciNewGame,
    /// `position` -- set up a board position with optional moves applied.
    Position(Board),
    /// `go [...]` -- start a search with the given parameters.
    Go(GoParams),
    /// `ponderhit` -- the opponent played the expected ponder move.
    PonderHit,
    /// `setoption name <name> [value <value>]` -- change an engine option.
    SetOption {
        /// The option name.
        name: String,
        /// The option value, if one was given.
        value: Option<String>,
    },
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per UCI spec).
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "ponderhit" => Ok(Command::PonderHit),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (mut board, rest) = if tokens[0] == "startpos" {
        let rest = &tokens[1..];
        (Board::starting_position(), rest)
    } else if tokens[0] == "fen" {
        // FEN is 6 space-separated fields
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board: Board = fen.parse().map_err(|_| UciError::InvalidFen {
            fen: fen.clone(),
        })?;
        (board, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    // Apply moves if present: "moves e2e4 d7d5 ..."
    if !rest.is_empty() && rest[0] == "moves" {
        for uci_str in &rest[1..] {
            let mv = Move::from_uci(uci_str, &board).ok_or_else(|| UciError::InvalidMove {
                uci_move: uci_str.to_string(),
            })?;
            board = board.make_move(mv);
        }
    }

    Ok(Command::Position(board))
}

/// Parse the `go` command arguments.
///
/// Supports `depth`, `wtime`/`btime`/`winc`/`binc`, `movestogo`, `movetime`,
/// `infinite`, and `ponder`. A bare `go` searches with no time limit.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                params.depth = Some(parse_arg(tokens, &mut i, "depth")?);
            }
            "wtime" => {
                params.wtime = Some(parse_millis_arg(tokens, &mut i, "wtime")?);
            }
            "btime" => {
                params.btime = Some(parse_millis_arg(tokens, &mut i, "btime")?);
            }
            "winc" => {
                params.winc = Some(parse_millis_arg(tokens, &mut i, "winc")?);
            }
            "binc" => {
                params.binc = Some(parse_millis_arg(tokens, &mut i, "binc")?);
            }
            "movestogo" => {
                params.movestogo = Some(parse_arg(tokens, &mut i, "movestogo")?);
            }
            "movetime" => {
                params.movetime = Some(parse_millis_arg(tokens, &mut i, "movetime")?);
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            _ => {
                // Unrecognized go subcommand (e.g. "nodes", "mate") — skip the token.
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse `setoption name <name> [value <value>]`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    let value_idx = tokens.iter().position(|t| *t == "value");
    let name_end = value_idx.unwrap_or(tokens.len());

    // tokens[0] should be "name"; the name itself may contain spaces.
    let name_start = if tokens.first() == Some(&"name") { 1 } else { 0 };
    let name = tokens[name_start..name_end].join(" ");

    let value = value_idx.map(|idx| tokens[idx + 1..].join(" "));

    Ok(Command::SetOption { name, value })
}

/// Parse the value following `tokens[*i]` as `T`, advancing `*i` by 2.
fn parse_arg<T: std::str::FromStr>(tokens: &[&str], i: &mut usize, param: &str) -> Result<T, UciError> {
    let value = tokens.get(*i + 1).ok_or_else(|| UciError::MissingGoValue {
        param: param.to_string(),
    })?;
    let parsed = value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })?;
    *i += 2;
    Ok(parsed)
}

/// Parse the value following `tokens[*i]` as milliseconds, advancing `*i` by 2.
fn parse_millis_arg(tokens: &[&str], i: &mut usize, param: &str) -> Result<Duration, UciError> {
    let ms: u64 = parse_arg(tokens, i, param)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uci() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
    }

    #[test]
    fn parse_isready() {
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
    }

    #[test]
    fn parse_quit() {
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
    }

    #[test]
    fn parse_ponderhit() {
        assert!(matches!(parse_command("ponderhit").unwrap(), Command::PonderHit));
    }

    #[test]
    fn parse_ucinewgame() {
        assert!(matches!(
            parse_command("ucinewgame").unwrap(),
            Command::UciNewGame
        ));
    }

    #[test]
    fn parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5").unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        assert!(matches!(cmd, Command::Position(_)));
    }

    #[test]
    fn parse_go_depth() {
        let cmd = parse_command("go depth 6").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.depth, Some(6)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_bare_has_no_limits() {
        let cmd = parse_command("go").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.depth, None);
                assert!(!params.infinite);
            }
            _ => panic!("expected Go with no parameters"),
        }
    }

    #[test]
    fn parse_go_infinite() {
        let cmd = parse_command("go infinite").unwrap();
        match cmd {
            Command::Go(params) => assert!(params.infinite),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_ponder() {
        let cmd = parse_command("go ponder wtime 300000 btime 300000").unwrap();
        match cmd {
            Command::Go(params) => {
                assert!(params.ponder);
                assert_eq!(params.wtime, Some(Duration::from_millis(300_000)));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_full_clock() {
        let cmd = parse_command("go wtime 60000 btime 50000 winc 1000 binc 1000 movestogo 20").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.wtime, Some(Duration::from_millis(60_000)));
                assert_eq!(params.btime, Some(Duration::from_millis(50_000)));
                assert_eq!(params.winc, Some(Duration::from_millis(1_000)));
                assert_eq!(params.binc, Some(Duration::from_millis(1_000)));
                assert_eq!(params.movestogo, Some(20));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_movetime() {
        let cmd = parse_command("go movetime 5000").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.movetime, Some(Duration::from_millis(5000))),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_invalid_depth_errors() {
        let result = parse_command("go depth notanumber");
        assert!(result.is_err());
    }

    #[test]
    fn parse_setoption_threads() {
        let cmd = parse_command("setoption name Threads value 4").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Threads");
                assert_eq!(value.as_deref(), Some("4"));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_hash() {
        let cmd = parse_command("setoption name Hash value 128").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Hash");
                assert_eq!(value.as_deref(), Some("128"));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_no_value() {
        let cmd = parse_command("setoption name Ponder").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Ponder");
                assert_eq!(value, None);
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_multiword_name() {
        let cmd = parse_command("setoption name Move Overhead value 30").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Move Overhead");
                assert_eq!(value.as_deref(), Some("30"));
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_unknown_command() {
        let cmd = parse_command("foobar").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_empty_line() {
        let cmd = parse_command("").unwrap();
        assert!(matches!(cmd, Command::Unknown(_)));
    }

    #[test]
    fn parse_position_missing_keyword() {
        let result = parse_command("position");
        assert!(result.is_err());
    }

    #[test]
    fn parse_position_invalid_fen() {
        let result = parse_command("position fen invalid");
        assert!(result.is_err());
    }

    #[test]
    fn parse_stop() {
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
    }
}
