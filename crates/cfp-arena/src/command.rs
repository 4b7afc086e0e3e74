//! Stateless parser for observer commands.
//!
//! Pure text-to-enum conversion; the hub decides what each command
//! means. First tokens are matched case-insensitively, keyword values
//! may span multiple tokens, unknown commands parse to
//! [`Parsed::Unknown`] and are ignored upstream. A recognized command
//! with a broken payload parses to [`Parsed::Invalid`] so the hub can
//! tell the offending observer what was wrong with it.

use cfp_protocol::{join_tokens, keyword_index, split_tokens};
use cfp_types::EngineId;

/// A fully parsed observer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCommand {
    /// Request the full session snapshot.
    Init,
    /// Reset the game to the starting position.
    NewGame,
    /// Seat engines; `None` leaves the slot as it is.
    SetPlayers {
        /// Engine for player 1, or `None` when the command said `-1`.
        player1: Option<EngineId>,
        /// Engine for player 2, or `None` when the command said `-1`.
        player2: Option<EngineId>,
    },
    /// Start the turn loop.
    Play,
    /// Pause the turn loop.
    Pause,
    /// List loadable engine binaries.
    EnginePaths,
    /// Load the engine at a path relative to the engine directory.
    EngineLoad {
        /// Relative path, may contain spaces.
        path: String,
    },
    /// Unload a loaded engine.
    EngineUnload {
        /// Which engine.
        id: EngineId,
    },
    /// List one engine's options.
    Options {
        /// Which engine.
        id: EngineId,
    },
    /// Change one engine option.
    SetOption {
        /// Which engine.
        id: EngineId,
        /// Option name, may contain spaces.
        name: String,
        /// New value; absent for button triggers.
        value: Option<String>,
    },
}

/// Outcome of parsing one observer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Blank line.
    Empty,
    /// First token not recognized; ignored per the transport rules.
    Unknown,
    /// Recognized command with a broken payload; the reason goes back
    /// to the observer as an error output.
    Invalid(String),
    /// A well-formed command.
    Command(HubCommand),
}

/// Stateless observer-command parser.
pub struct CommandParser;

impl CommandParser {
    /// Parses one observer line.
    #[must_use]
    pub fn parse(line: &str) -> Parsed {
        let tokens = split_tokens(line);
        let Some(first) = tokens.first() else {
            return Parsed::Empty;
        };
        let rest = &tokens[1..];
        match first.to_ascii_lowercase().as_str() {
            "init" => Parsed::Command(HubCommand::Init),
            "newgame" => Parsed::Command(HubCommand::NewGame),
            "play" => Parsed::Command(HubCommand::Play),
            "pause" => Parsed::Command(HubCommand::Pause),
            "enginepaths" => Parsed::Command(HubCommand::EnginePaths),
            "setplayers" => parse_set_players(rest),
            "engine" => parse_engine(rest),
            "options" => parse_options(rest),
            "setoption" => parse_set_option(rest),
            _ => Parsed::Unknown,
        }
    }
}

/// Parses a player field that is either an engine id or `-1`.
fn parse_player(text: &str, which: &str) -> Result<Option<EngineId>, Parsed> {
    if text == "-1" {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| Parsed::Invalid(format!("couldn't read {which} '{text}'")))
}

fn parse_set_players(args: &[&str]) -> Parsed {
    let Some(p1_index) = keyword_index(args, "player1") else {
        return Parsed::Invalid("couldn't find player1 in command".into());
    };
    let Some(p2_index) = keyword_index(args, "player2") else {
        return Parsed::Invalid("couldn't find player2 in command".into());
    };
    let p1_text = join_tokens(args, p1_index + 1, p2_index);
    let p2_text = join_tokens(args, p2_index + 1, args.len());
    let player1 = match parse_player(&p1_text, "player1") {
        Ok(v) => v,
        Err(invalid) => return invalid,
    };
    let player2 = match parse_player(&p2_text, "player2") {
        Ok(v) => v,
        Err(invalid) => return invalid,
    };
    Parsed::Command(HubCommand::SetPlayers { player1, player2 })
}

fn parse_engine(args: &[&str]) -> Parsed {
    let Some(operation) = args.first() else {
        return Parsed::Invalid("engine command needs load or unload".into());
    };
    let rest = &args[1..];
    match operation.to_ascii_lowercase().as_str() {
        "load" => {
            let Some(path_index) = keyword_index(rest, "path") else {
                return Parsed::Invalid("couldn't find path in command".into());
            };
            let path = join_tokens(rest, path_index + 1, rest.len());
            if path.is_empty() {
                return Parsed::Invalid("engine path is empty".into());
            }
            Parsed::Command(HubCommand::EngineLoad { path })
        }
        "unload" => {
            let Some(id_index) = keyword_index(rest, "id") else {
                return Parsed::Invalid("couldn't find id in command".into());
            };
            let id_text = join_tokens(rest, id_index + 1, rest.len());
            match id_text.parse() {
                Ok(id) => Parsed::Command(HubCommand::EngineUnload { id }),
                Err(_) => Parsed::Invalid(format!("couldn't read engine id '{id_text}'")),
            }
        }
        _ => Parsed::Invalid(format!("unknown engine operation '{operation}'")),
    }
}

fn parse_options(args: &[&str]) -> Parsed {
    let Some(id_text) = args.last() else {
        return Parsed::Invalid("options command needs an engine id".into());
    };
    match id_text.parse() {
        Ok(id) => Parsed::Command(HubCommand::Options { id }),
        Err(_) => Parsed::Invalid(format!("couldn't read engine id '{id_text}'")),
    }
}

fn parse_set_option(args: &[&str]) -> Parsed {
    let Some(id_index) = keyword_index(args, "engineid") else {
        return Parsed::Invalid("couldn't find engineid in command".into());
    };
    let Some(name_index) = keyword_index(args, "name") else {
        return Parsed::Invalid("couldn't find name in command".into());
    };
    let value_index = keyword_index(args, "value");
    let name_end = value_index.unwrap_or(args.len());

    let id_text = join_tokens(args, id_index + 1, name_index);
    let Ok(id) = id_text.parse() else {
        return Parsed::Invalid(format!("couldn't read engine id '{id_text}'"));
    };
    let name = join_tokens(args, name_index + 1, name_end);
    if name.is_empty() {
        return Parsed::Invalid("option name is empty".into());
    }
    let value = value_index.map(|index| join_tokens(args, index + 1, args.len()));
    Parsed::Command(HubCommand::SetOption { id, name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> HubCommand {
        match CommandParser::parse(line) {
            Parsed::Command(cmd) => cmd,
            other => panic!("expected a command from '{line}', got {other:?}"),
        }
    }

    #[test]
    fn bare_commands() {
        assert_eq!(command("init"), HubCommand::Init);
        assert_eq!(command("NEWGAME"), HubCommand::NewGame);
        assert_eq!(command("Play"), HubCommand::Play);
        assert_eq!(command("pause"), HubCommand::Pause);
        assert_eq!(command("enginepaths"), HubCommand::EnginePaths);
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(CommandParser::parse(""), Parsed::Empty);
        assert_eq!(CommandParser::parse("   "), Parsed::Empty);
        assert_eq!(CommandParser::parse("frobnicate all"), Parsed::Unknown);
    }

    #[test]
    fn set_players() {
        assert_eq!(
            command("setplayers player1 0 player2 3"),
            HubCommand::SetPlayers {
                player1: Some(EngineId::new(0)),
                player2: Some(EngineId::new(3)),
            }
        );
        assert_eq!(
            command("setplayers player1 -1 player2 2"),
            HubCommand::SetPlayers {
                player1: None,
                player2: Some(EngineId::new(2)),
            }
        );
    }

    #[test]
    fn set_players_rejects_broken_payloads() {
        assert!(matches!(
            CommandParser::parse("setplayers player2 2"),
            Parsed::Invalid(_)
        ));
        assert!(matches!(
            CommandParser::parse("setplayers player1 x player2 2"),
            Parsed::Invalid(_)
        ));
    }

    #[test]
    fn engine_load_keeps_spaces_in_paths() {
        assert_eq!(
            command("engine load path deep blue/engine"),
            HubCommand::EngineLoad {
                path: "deep blue/engine".into()
            }
        );
    }

    #[test]
    fn engine_unload() {
        assert_eq!(
            command("engine unload id 4"),
            HubCommand::EngineUnload {
                id: EngineId::new(4)
            }
        );
        assert!(matches!(
            CommandParser::parse("engine unload id four"),
            Parsed::Invalid(_)
        ));
        assert!(matches!(
            CommandParser::parse("engine discard id 4"),
            Parsed::Invalid(_)
        ));
    }

    #[test]
    fn options_takes_the_last_token_as_id() {
        assert_eq!(
            command("options engineid 2"),
            HubCommand::Options {
                id: EngineId::new(2)
            }
        );
    }

    #[test]
    fn set_option_with_multi_word_name_and_value() {
        assert_eq!(
            command("setoption engineid 1 name Search Depth value 12"),
            HubCommand::SetOption {
                id: EngineId::new(1),
                name: "Search Depth".into(),
                value: Some("12".into()),
            }
        );
    }

    #[test]
    fn set_option_without_value_is_a_trigger() {
        assert_eq!(
            command("setoption engineid 0 name Clear Hash"),
            HubCommand::SetOption {
                id: EngineId::new(0),
                name: "Clear Hash".into(),
                value: None,
            }
        );
    }

    #[test]
    fn set_option_rejects_broken_payloads() {
        assert!(matches!(
            CommandParser::parse("setoption name Depth value 3"),
            Parsed::Invalid(_)
        ));
        assert!(matches!(
            CommandParser::parse("setoption engineid 0 value 3"),
            Parsed::Invalid(_)
        ));
        assert!(matches!(
            CommandParser::parse("setoption engineid 0 name value 3"),
            Parsed::Invalid(_)
        ));
    }
}
