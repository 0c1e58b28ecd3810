// Line-oriented console front end: parses typed commands into `UserCommand`s
// and prints `UiUpdate`s as plain text.

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use scorecenter_drawer::{DrawOp, DrawerEvent, PointerAction};

use crate::protocol::{DrawerCommand, Header, UiUpdate, UserCommand};

const HELP: &[&str] = &[
    "commands:",
    "  sport <name> | league <name> | team <name> | player <name>",
    "  up            select the parent of the current selection",
    "  tree          show everything loaded so far",
    "  open <n> | close <n> | toggle <n> | click <n>   drive drawer panel n (1-based)",
    "  press <x> <y> | drag <x> <y> | release <x> <y>  pointer input in pixels",
    "  help | quit",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: String,
        expected: &'static str,
    },

    #[error("'{0}' is not a valid number")]
    BadNumber(String),

    #[error("panel numbers start at 1")]
    PanelZero,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one input line. Command words are case-insensitive; names keep
/// their spelling and may contain spaces.
pub fn parse_command(line: &str) -> Result<UserCommand, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let word = word.to_lowercase();

    let name = |expected| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument {
                command: word.clone(),
                expected,
            })
        } else {
            Ok(rest.to_string())
        }
    };

    match word.as_str() {
        "sport" => name("a sport name").map(UserCommand::SelectSport),
        "league" => name("a league name").map(UserCommand::SelectLeague),
        "team" => name("a team name").map(UserCommand::SelectTeam),
        "player" => name("a player name").map(UserCommand::SelectPlayer),
        "up" | "back" => Ok(UserCommand::Up),
        "tree" => Ok(UserCommand::ShowTree),
        "open" => panel(&word, rest).map(|i| UserCommand::Drawer(DrawerCommand::Open(i))),
        "close" => panel(&word, rest).map(|i| UserCommand::Drawer(DrawerCommand::Close(i))),
        "toggle" => panel(&word, rest).map(|i| UserCommand::Drawer(DrawerCommand::Toggle(i))),
        "click" => panel(&word, rest).map(|i| UserCommand::Drawer(DrawerCommand::Click(i))),
        "press" => pointer(&word, rest, PointerAction::Down),
        "drag" => pointer(&word, rest, PointerAction::Move),
        "release" => pointer(&word, rest, PointerAction::Up),
        "quit" | "exit" | "q" => Ok(UserCommand::Quit),
        _ => Err(CommandError::Unknown(word.clone())),
    }
}

/// 1-based panel number to a zero-based index.
fn panel(command: &str, arg: &str) -> Result<usize, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            expected: "a panel number",
        });
    }
    let n: usize = arg
        .parse()
        .map_err(|_| CommandError::BadNumber(arg.to_string()))?;
    n.checked_sub(1).ok_or(CommandError::PanelZero)
}

fn pointer(command: &str, args: &str, action: PointerAction) -> Result<UserCommand, CommandError> {
    let mut parts = args.split_whitespace();
    let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            expected: "x and y coordinates",
        });
    };
    let coord = |s: &str| {
        s.parse::<f32>()
            .map_err(|_| CommandError::BadNumber(s.to_string()))
    };
    Ok(UserCommand::Pointer {
        action,
        x: coord(x)?,
        y: coord(y)?,
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_update(update: &UiUpdate) -> Vec<String> {
    match update {
        UiUpdate::Header(header) => vec![render_header(header)],
        UiUpdate::Sections(labels) => vec![labels
            .iter()
            .enumerate()
            .map(|(i, label)| format!("[{}] {label}", i + 1))
            .collect::<Vec<_>>()
            .join("  ")],
        UiUpdate::Loading(section) => vec![format!("loading {}...", section.to_lowercase())],
        UiUpdate::News(items) if items.is_empty() => vec!["no headlines".into()],
        UiUpdate::News(items) => {
            let mut lines = vec!["news:".to_string()];
            for item in items {
                let label = item.published_label();
                if label.is_empty() {
                    lines.push(format!("  {}", item.headline));
                } else {
                    lines.push(format!("  {} ({label})", item.headline));
                }
            }
            lines
        }
        UiUpdate::Teams(names) => {
            let mut lines = vec![format!("teams ({}):", names.len())];
            lines.extend(names.iter().map(|n| format!("  {n}")));
            lines
        }
        UiUpdate::Roster(rows) => {
            let mut lines = vec![format!("roster ({}):", rows.len())];
            lines.extend(rows.iter().map(|r| {
                if r.position.is_empty() {
                    format!("  {}", r.name)
                } else {
                    format!("  {:<4} {}", r.position, r.name)
                }
            }));
            lines
        }
        UiUpdate::Tree(lines) if lines.is_empty() => vec!["(empty)".into()],
        UiUpdate::Tree(lines) => lines.clone(),
        UiUpdate::Drawer {
            events,
            expanded,
            plan,
        } => render_drawer(events, *expanded, plan),
        UiUpdate::Notice(message) => vec![format!("! {message}")],
    }
}

fn render_header(header: &Header) -> String {
    let parts: Vec<&str> = [&header.sport, &header.league, &header.team, &header.player]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect();
    if parts.is_empty() {
        "== ScoreCenter ==".into()
    } else {
        format!("== {} ==", parts.join(" > "))
    }
}

fn render_drawer(events: &[DrawerEvent], expanded: Option<usize>, plan: &[DrawOp]) -> Vec<String> {
    let mut lines = Vec::new();
    for event in events {
        match event {
            DrawerEvent::Opened(i) => lines.push(format!("drawer: panel {} opened", i + 1)),
            DrawerEvent::Closed(i) => lines.push(format!("drawer: panel {} closed", i + 1)),
            DrawerEvent::ScrollStarted | DrawerEvent::ScrollEnded => {}
        }
    }
    let state = match expanded {
        Some(i) => format!("panel {} expanded", i + 1),
        None => "all panels closed".into(),
    };
    let handles: Vec<String> = plan
        .iter()
        .filter_map(|op| match op {
            DrawOp::Handle { panel, at } => Some(format!("{}@{at}", panel + 1)),
            _ => None,
        })
        .collect();
    lines.push(format!("drawer: {state} (handles {})", handles.join(" ")));
    lines
}

// ---------------------------------------------------------------------------
// Console loop
// ---------------------------------------------------------------------------

/// Read commands from stdin and print updates until the user quits, stdin
/// ends, or the app loop goes away.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    write_lines(&mut out, &["ScoreCenter. Type 'help' for commands.".to_string()]).await?;

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    let _ = cmd_tx.send(UserCommand::Quit).await;
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    // nothing typed
                } else if line.eq_ignore_ascii_case("help") {
                    let help: Vec<String> = HELP.iter().map(|s| s.to_string()).collect();
                    write_lines(&mut out, &help).await?;
                } else {
                    match parse_command(line) {
                        Ok(UserCommand::Quit) => {
                            let _ = cmd_tx.send(UserCommand::Quit).await;
                            break;
                        }
                        Ok(cmd) => {
                            if cmd_tx.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => write_lines(&mut out, &[format!("! {e}")]).await?,
                    }
                }
            }

            update = ui_rx.recv() => {
                match update {
                    Some(update) => write_lines(&mut out, &render_update(&update)).await?,
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn write_lines(out: &mut tokio::io::Stdout, lines: &[String]) -> anyhow::Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    out.write_all(text.as_bytes())
        .await
        .context("failed to write to stdout")?;
    out.flush().await.context("failed to flush stdout")?;
    Ok(())
}
