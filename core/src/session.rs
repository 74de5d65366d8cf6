use hashbrown::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::*;

/// Parses `a1` / `B12` into zero-based `(row, col)`.
///
/// Columns are 1-based in the text, so `a0` parses to column `-1` and is left for the engine to reject as out of
/// range.
pub fn parse_position(pos: &str) -> Option<(isize, isize)> {
    let mut chars = pos.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row = (letter.to_ascii_lowercase() as u8 - b'a') as isize;
    // all digits, so only overflow fails and leaves the column off the board
    let col = digits.parse::<isize>().unwrap_or(isize::MAX) - 1;
    Some((row, col))
}

/// What a text command did, for the caller to report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionResult {
    pub message: Option<String>,
    pub need_render: bool,
    pub game_over: bool,
}

impl ActionResult {
    fn rejected(message: String) -> Self {
        Self {
            message: Some(message),
            ..Default::default()
        }
    }

    fn changed() -> Self {
        Self {
            need_render: true,
            ..Default::default()
        }
    }

    fn finished(state: GameState) -> Self {
        let message = match state {
            GameState::Win => "Congratulations, you won!",
            _ => "Boom! Better luck next time.",
        };
        Self {
            message: Some(message.to_owned()),
            need_render: true,
            game_over: true,
        }
    }

    fn ended() -> Self {
        Self {
            message: Some("This game is already over".to_owned()),
            need_render: false,
            game_over: true,
        }
    }
}

/// One running game driven by text commands.
#[derive(Clone)]
pub struct GameSession {
    game: Arc<Game>,
}

impl GameSession {
    pub fn new(game: Arc<Game>) -> Self {
        Self { game }
    }

    pub fn game(&self) -> &Arc<Game> {
        &self.game
    }

    pub fn open(&self, pos: &str) -> ActionResult {
        let Some((row, col)) = parse_position(pos) else {
            return ActionResult::rejected(format!("Position {pos} is not valid"));
        };

        match self.game.open(row, col) {
            OpenResult::Out => ActionResult::rejected(format!("Position {pos} is off the board")),
            OpenResult::Dup => ActionResult::rejected(format!("Position {pos} is already open")),
            OpenResult::Ended => ActionResult::ended(),
            OpenResult::Win | OpenResult::Fail => ActionResult::finished(self.game.state()),
            OpenResult::Continue => ActionResult::changed(),
        }
    }

    pub fn mark(&self, pos: &str) -> ActionResult {
        let Some((row, col)) = parse_position(pos) else {
            return ActionResult::rejected(format!("Position {pos} is not valid"));
        };

        match self.game.mark(row, col) {
            MarkResult::Out => ActionResult::rejected(format!("Position {pos} is off the board")),
            MarkResult::Opened => {
                ActionResult::rejected(format!("Position {pos} is already open and cannot be marked"))
            }
            MarkResult::Ended => ActionResult::ended(),
            MarkResult::Win => ActionResult::finished(GameState::Win),
            MarkResult::Continue => ActionResult::changed(),
        }
    }

    /// Opens every whitespace separated position in turn, stopping once the game is over.
    pub fn open_many(&self, positions: &str) -> ActionResult {
        self.batch(positions, Self::open)
    }

    /// Marks every whitespace separated position in turn, stopping once the game is over.
    pub fn mark_many(&self, positions: &str) -> ActionResult {
        self.batch(positions, Self::mark)
    }

    fn batch(&self, positions: &str, action: fn(&Self, &str) -> ActionResult) -> ActionResult {
        let mut total = ActionResult::default();
        for pos in positions.split_whitespace() {
            let result = action(self, pos);
            total.need_render |= result.need_render;
            if result.message.is_some() {
                total.message = result.message;
            }
            if result.game_over {
                total.game_over = true;
                break;
            }
        }
        total
    }
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("A game is already running here")]
    AlreadyRunning,
    #[error(transparent)]
    Skin(#[from] SkinError),
}

/// Independent games keyed by chat session, at most one per key.
#[derive(Default)]
pub struct GameManager {
    sessions: Mutex<HashMap<String, Arc<GameSession>>>,
}

impl GameManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `game` under `key`, unless a game is already running there.
    pub fn create(&self, key: &str, game: Arc<Game>) -> Option<Arc<GameSession>> {
        let mut sessions = self.sessions();
        if sessions.contains_key(key) {
            return None;
        }
        let session = Arc::new(GameSession::new(game));
        sessions.insert(key.to_owned(), Arc::clone(&session));
        log::debug!("session {:?} created", key);
        Some(session)
    }

    /// Loads the skin, builds the game and registers it under `key`.
    ///
    /// Mines are laid out from `seed`, or from the clock when it is `None`.
    pub fn start(
        &self,
        key: &str,
        spec: GameSpec,
        skins: &SkinManager,
        skin_name: &str,
        scale: u32,
        seed: Option<u64>,
    ) -> Result<Arc<GameSession>, StartError> {
        if self.is_running(key) {
            return Err(StartError::AlreadyRunning);
        }
        let skin = skins.load(skin_name, &spec)?;
        let renderer = Renderer::new(spec, skin).with_scale(scale);
        log::info!("starting {} game for {:?} with skin {:?}", spec, key, skin_name);
        let placer = seed.map_or_else(RandomPlacer::from_clock, RandomPlacer::new);
        self.create(key, Arc::new(Game::with_placer(renderer, placer)))
            .ok_or(StartError::AlreadyRunning)
    }

    /// Opens `positions` in the game under `key`, dropping the game once it is over.
    ///
    /// The session is handed back with the result so the final board can still be drawn.
    pub fn open_many(&self, key: &str, positions: &str) -> Option<(Arc<GameSession>, ActionResult)> {
        self.play(key, |session| session.open_many(positions))
    }

    /// Marks `positions` in the game under `key`, dropping the game once it is over.
    pub fn mark_many(&self, key: &str, positions: &str) -> Option<(Arc<GameSession>, ActionResult)> {
        self.play(key, |session| session.mark_many(positions))
    }

    fn play(
        &self,
        key: &str,
        action: impl FnOnce(&GameSession) -> ActionResult,
    ) -> Option<(Arc<GameSession>, ActionResult)> {
        let session = self.get(key)?;
        let result = action(&session);
        if result.game_over {
            let mut sessions = self.sessions();
            // a replacement game may have been registered meanwhile
            if sessions.get(key).is_some_and(|current| Arc::ptr_eq(current, &session)) {
                sessions.remove(key);
                log::debug!("session {:?} finished", key);
            }
        }
        Some((session, result))
    }

    pub fn get(&self, key: &str) -> Option<Arc<GameSession>> {
        self.sessions().get(key).cloned()
    }

    /// Returns whether a game was running.
    pub fn stop(&self, key: &str) -> bool {
        let removed = self.sessions().remove(key).is_some();
        if removed {
            log::debug!("session {:?} stopped", key);
        }
        removed
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.sessions().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.sessions().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<GameSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skin::testing::{sheet, skin, temp_dir};

    fn session(spec: GameSpec, mines: &[Coord2]) -> GameSession {
        let renderer = Renderer::new(spec, skin(&spec)).with_scale(1);
        let game = Game::with_placer(renderer, FixedPlacer::new(&spec, mines).unwrap());
        GameSession::new(Arc::new(game))
    }

    #[test]
    fn parses_letter_and_column() {
        assert_eq!(parse_position("a1"), Some((0, 0)));
        assert_eq!(parse_position("B12"), Some((1, 11)));
        assert_eq!(parse_position("z7"), Some((25, 6)));
        assert_eq!(parse_position("a0"), Some((0, -1)));
    }

    #[test]
    fn rejects_malformed_positions() {
        for bad in ["", "a", "1a", "aa1", "a1b", "a-1", "é1", " a1"] {
            assert_eq!(parse_position(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn huge_column_is_off_the_board() {
        assert_eq!(parse_position("a99999999999999999999"), Some((0, isize::MAX - 1)));

        let session = session(GameSpec::new(3, 3, 1).unwrap(), &[(2, 2)]);
        let result = session.open("a99999999999999999999");
        assert!(result.message.unwrap().contains("off the board"));
    }

    #[test]
    fn invalid_position_never_reaches_the_game() {
        let session = session(GameSpec::new(3, 3, 1).unwrap(), &[(2, 2)]);

        let result = session.open("11");

        assert_eq!(result.message.as_deref(), Some("Position 11 is not valid"));
        assert!(!result.need_render);
        assert_eq!(session.game().state(), GameState::Prepare);
    }

    #[test]
    fn reports_engine_results() {
        let session = session(GameSpec::new(3, 3, 2).unwrap(), &[(2, 2), (0, 2)]);

        assert!(session.open("a4").message.unwrap().contains("off the board"));
        assert!(session.open("a0").message.unwrap().contains("off the board"));
        assert_eq!(session.open("a1"), ActionResult::changed());
        assert!(session.open("a1").message.unwrap().contains("already open"));
        assert!(session.mark("a1").message.unwrap().contains("cannot be marked"));
        assert_eq!(session.mark("c3"), ActionResult::changed());
    }

    #[test]
    fn batch_stops_at_game_over() {
        let session = session(GameSpec::new(3, 3, 2).unwrap(), &[(2, 2), (0, 2)]);

        let result = session.open_many("a1 c3 b3");

        assert!(result.game_over);
        assert!(result.need_render);
        // b3 would have replaced the message had it been tried
        assert_eq!(result.message.as_deref(), Some("Boom! Better luck next time."));
        assert_eq!(session.open("b3"), ActionResult::ended());
    }

    #[test]
    fn batch_marks_to_a_win() {
        let session = session(GameSpec::new(3, 3, 2).unwrap(), &[(2, 2), (0, 2)]);
        session.open("a1");

        let result = session.mark_many("c3 zz a3");

        assert!(result.game_over);
        assert_eq!(result.message.as_deref(), Some("Congratulations, you won!"));
        assert_eq!(session.game().state(), GameState::Win);
    }

    #[test]
    fn manager_keeps_one_game_per_key() {
        let manager = GameManager::new();
        let spec = GameSpec::new(3, 3, 1).unwrap();
        let game = || Arc::new(Game::new(Renderer::new(spec, skin(&spec))));

        assert!(!manager.is_running("room"));
        let first = manager.create("room", game()).unwrap();
        assert!(manager.create("room", game()).is_none());
        assert!(manager.create("other", game()).is_some());
        assert!(Arc::ptr_eq(&manager.get("room").unwrap(), &first));
        assert_eq!(manager.keys(), ["other", "room"]);

        first.open("a1");
        assert_eq!(manager.get("other").unwrap().game().state(), GameState::Prepare);

        assert!(manager.stop("room"));
        assert!(!manager.stop("room"));
        assert!(manager.get("room").is_none());
        assert!(manager.create("room", game()).is_some());
    }

    #[test]
    fn finished_games_leave_the_manager() {
        let manager = GameManager::new();
        let spec = GameSpec::new(3, 3, 2).unwrap();
        let game = |mines: &[Coord2]| {
            let renderer = Renderer::new(spec, skin(&spec)).with_scale(1);
            Arc::new(Game::with_placer(renderer, FixedPlacer::new(&spec, mines).unwrap()))
        };
        manager.create("lost", game(&[(2, 2), (0, 2)]));
        manager.create("won", game(&[(2, 2), (0, 2)]));

        let (_, result) = manager.open_many("lost", "a1").unwrap();
        assert!(!result.game_over);
        assert!(manager.is_running("lost"));

        let (session, result) = manager.open_many("lost", "c3").unwrap();
        assert!(result.game_over);
        assert_eq!(session.game().state(), GameState::Fail);
        assert!(session.game().draw().is_ok());
        assert!(!manager.is_running("lost"));
        assert!(manager.open_many("lost", "a1").is_none());

        manager.open_many("won", "a1");
        let (_, result) = manager.mark_many("won", "c3 a3").unwrap();
        assert!(result.game_over);
        assert!(!manager.is_running("won"));
        assert!(manager.keys().is_empty());
    }

    #[test]
    fn start_propagates_skin_errors() {
        let dir = temp_dir("start");
        sheet().save(dir.join("classic.bmp")).unwrap();
        let mut skins = SkinManager::new(&dir);
        skins.scan();
        let manager = GameManager::new();
        let spec = Level::Beginner.spec();

        assert!(matches!(
            manager.start("room", spec, &skins, "missing", 4, None),
            Err(StartError::Skin(SkinError::NotFound(_)))
        ));
        assert!(!manager.is_running("room"));

        let session = manager.start("room", spec, &skins, "classic", 2, Some(7)).unwrap();
        assert_eq!(session.game().renderer().scale(), 2);
        assert!(matches!(
            manager.start("room", spec, &skins, "classic", 2, None),
            Err(StartError::AlreadyRunning)
        ));
    }
}
