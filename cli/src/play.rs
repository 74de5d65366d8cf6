use anyhow::{Context, Result, anyhow, bail};
use minesweep_core::{ActionResult, Game, GameManager, GameSession, GameSpec, SkinManager};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;

use crate::config::Settings;

pub const DEFAULT_SESSION: &str = "local";

const HELP: &str = "\
commands:
  <pos>...        open tiles, e.g. `a1 b3`
  mark <pos>...   toggle marks
  board           write the board image
  send            push the board image from the background writer
  new [level]     start a new game
  stop            end the game without finishing it
  sessions        list running games
  quit            leave
prefix any command with `@name` to play in another session";

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Open(&'a str),
    Mark(&'a str),
    Board,
    Send,
    New(Option<&'a str>),
    Stop,
    Sessions,
    Help,
    Quit,
    Empty,
}

/// Splits an optional `@session` prefix off `line` and parses the rest.
pub fn parse_line(line: &str) -> (Option<&str>, Command<'_>) {
    let mut line = line.trim();
    let mut key = None;
    if let Some(rest) = line.strip_prefix('@') {
        let (name, rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if !name.is_empty() {
            key = Some(name);
        }
        line = rest.trim();
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let command = match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "mark" | "m" => Command::Mark(rest),
        "board" => Command::Board,
        "send" => Command::Send,
        "new" => Command::New(Some(rest).filter(|level| !level.is_empty())),
        "stop" => Command::Stop,
        "sessions" => Command::Sessions,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Open(line),
    };
    (key, command)
}

/// Interactive front end over a [`GameManager`], one game per session name.
pub struct Console<W> {
    settings: Settings,
    skins: SkinManager,
    manager: GameManager,
    games_started: u64,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(settings: Settings, skins: SkinManager, out: W) -> Self {
        Self {
            settings,
            skins,
            manager: GameManager::new(),
            games_started: 0,
            out,
        }
    }

    pub fn run(&mut self, input: impl BufRead) -> Result<()> {
        writeln!(self.out, "type `help` for commands")?;
        for line in input.lines() {
            let line = line.context("reading command")?;
            let (key, command) = parse_line(&line);
            let key = key.unwrap_or(DEFAULT_SESSION).to_owned();
            if command == Command::Quit {
                break;
            }
            if let Err(err) = self.execute(&key, command) {
                log::error!("{:#}", err);
                writeln!(self.out, "error: {err:#}")?;
            }
        }
        for key in self.manager.keys() {
            self.manager.stop(&key);
        }
        Ok(())
    }

    pub fn execute(&mut self, key: &str, command: Command<'_>) -> Result<()> {
        match command {
            Command::Empty | Command::Quit => Ok(()),
            Command::Help => Ok(writeln!(self.out, "{HELP}")?),
            Command::Sessions => {
                for key in self.manager.keys() {
                    if let Some(session) = self.manager.get(&key) {
                        let game = session.game();
                        writeln!(self.out, "@{key}: {} {:?}", game.spec(), game.state())?;
                    }
                }
                Ok(())
            }
            Command::New(level) => self.new_game(key, level),
            Command::Stop => {
                if self.manager.stop(key) {
                    writeln!(self.out, "[{key}] game stopped")?;
                } else {
                    writeln!(self.out, "[{key}] no game is running")?;
                }
                Ok(())
            }
            Command::Open(positions) => {
                let (session, result) = self
                    .manager
                    .open_many(key, positions)
                    .ok_or_else(|| no_game(key))?;
                self.report(key, &session, result)
            }
            Command::Mark(positions) => {
                let (session, result) = self
                    .manager
                    .mark_many(key, positions)
                    .ok_or_else(|| no_game(key))?;
                self.report(key, &session, result)
            }
            Command::Board => {
                let session = self.session(key)?;
                let path = write_board(session.game(), &self.settings.output_dir, key)?;
                writeln!(self.out, "[{key}] board written to {}", path.display())?;
                Ok(())
            }
            Command::Send => {
                let session = self.session(key)?;
                let receivers = session.game().request_render();
                writeln!(self.out, "[{key}] render requested ({receivers} writers)")?;
                Ok(())
            }
        }
    }

    fn new_game(&mut self, key: &str, level: Option<&str>) -> Result<()> {
        let spec = match level {
            Some(name) => self.settings.level(name).ok_or_else(|| {
                anyhow!(
                    "unknown level {name:?}, try one of: {}",
                    self.settings.level_names().join(", ")
                )
            })?,
            None => self.settings.spec,
        };
        let skin = self.pick_skin()?;
        // each game of a seeded run gets its own but reproducible layout
        let seed = self
            .settings
            .seed
            .map(|seed| seed.wrapping_add(self.games_started));

        let session = self
            .manager
            .start(key, spec, &self.skins, &skin, self.settings.scale, seed)
            .with_context(|| format!("starting game {key:?}"))?;
        self.games_started += 1;
        spawn_pusher(key, session.game(), self.settings.output_dir.clone());
        let name = key.to_owned();
        session.game().add_listener(move |state| {
            if state.is_final() {
                log::info!("game {:?} finished: {:?}", name, state);
            }
        });

        writeln!(self.out, "[{key}] new {spec} game with skin {skin:?}")?;
        self.show(key, &session)
    }

    fn pick_skin(&self) -> Result<String> {
        let skin = match self.settings.skin.as_deref() {
            Some(choice) => match choice.parse::<usize>() {
                Ok(index) => self.skins.get_by_index(index),
                Err(_) => Some(choice),
            },
            None => self.skins.get_by_index(0),
        };
        match skin {
            Some(skin) => Ok(skin.to_owned()),
            None => bail!("no skins found in {}", self.skins.skins_dir().display()),
        }
    }

    fn session(&self, key: &str) -> Result<Arc<GameSession>> {
        self.manager.get(key).ok_or_else(|| no_game(key))
    }

    fn report(&mut self, key: &str, session: &GameSession, result: ActionResult) -> Result<()> {
        if let Some(message) = &result.message {
            writeln!(self.out, "[{key}] {message}")?;
        }
        if result.need_render {
            self.show(key, session)?;
        }
        if result.game_over {
            writeln!(self.out, "[{key}] game over, type `new` to play again")?;
        }
        Ok(())
    }

    fn show(&mut self, key: &str, session: &GameSession) -> Result<()> {
        let game = session.game();
        let path = write_board(game, &self.settings.output_dir, key)?;
        writeln!(
            self.out,
            "[{key}] {} mines left, board at {}",
            game.mines_left(),
            path.display()
        )?;
        Ok(())
    }
}

fn no_game(key: &str) -> anyhow::Error {
    anyhow!("no game is running in {key:?}, type `new` to start one")
}

fn write_board(game: &Game, dir: &Path, name: &str) -> Result<PathBuf> {
    let png = game.draw().context("rendering board")?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{name}.png"));
    std::fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Writes `<key>-pushed.png` whenever the game asks for a render, until the game is dropped.
fn spawn_pusher(key: &str, game: &Arc<Game>, dir: PathBuf) {
    let requests = game.render_requests();
    let weak: Weak<Game> = Arc::downgrade(game);
    let name = format!("{key}-pushed");
    thread::spawn(move || {
        for request in requests {
            let Some(game) = weak.upgrade() else { break };
            match write_board(&game, &dir, &name) {
                Ok(path) => log::info!("pushed {:?} board to {}", request.state, path.display()),
                Err(err) => log::error!("failed to push board: {:#}", err),
            }
        }
        log::debug!("pusher for {:?} stopped", name);
    });
}

/// Board from `--rows`, `--cols` and `--mines`, `None` when none of them were given.
pub fn custom_spec(rows: Option<usize>, cols: Option<usize>, mines: Option<usize>) -> Result<Option<GameSpec>> {
    match (rows, cols, mines) {
        (None, None, None) => Ok(None),
        (Some(rows), Some(cols), Some(mines)) => Ok(Some(GameSpec::new(rows, cols, mines)?)),
        _ => bail!("--rows, --cols and --mines must be given together"),
    }
}
