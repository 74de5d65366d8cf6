use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::*;

/// Callback fired after a move changed the board, with the state it left the game in.
pub type Listener = Arc<dyn Fn(GameState) + Send + Sync>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Asks whoever owns the game to push the current board image somewhere.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    pub state: GameState,
}

/// A game shared between the threads that play it.
///
/// Every [`open`](Self::open) and [`mark`](Self::mark) runs entirely under one lock, listeners are called after
/// it is released so they may call back into the game. [`draw`](Self::draw) copies the tiles under the lock and
/// composes the image outside of it.
pub struct Game {
    engine: Mutex<PlayEngine>,
    renderer: Renderer,
    started_at: DateTime<Utc>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    render_requests: Mutex<Vec<Sender<RenderRequest>>>,
}

impl Game {
    pub fn new(renderer: Renderer) -> Self {
        let engine = PlayEngine::new(renderer.spec());
        Self::from_engine(engine, renderer)
    }

    pub fn with_placer(renderer: Renderer, placer: impl MinePlacer + Send + 'static) -> Self {
        let engine = PlayEngine::with_placer(renderer.spec(), placer);
        Self::from_engine(engine, renderer)
    }

    fn from_engine(engine: PlayEngine, renderer: Renderer) -> Self {
        Self {
            engine: Mutex::new(engine),
            renderer,
            started_at: Utc::now(),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            render_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn spec(&self) -> GameSpec {
        self.renderer.spec()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> GameState {
        self.engine().state()
    }

    pub fn mines_left(&self) -> isize {
        self.engine().mines_left()
    }

    /// Copy of the current tiles.
    pub fn snapshot(&self) -> (Array2<Tile>, GameState) {
        let engine = self.engine();
        (engine.tiles().clone(), engine.state())
    }

    pub fn open(&self, row: isize, col: isize) -> OpenResult {
        let (outcome, state) = {
            let mut engine = self.engine();
            let outcome = engine.open(row, col);
            (outcome, engine.state())
        };
        if outcome.has_update() {
            self.notify(state);
        }
        outcome
    }

    pub fn mark(&self, row: isize, col: isize) -> MarkResult {
        let (outcome, state) = {
            let mut engine = self.engine();
            let outcome = engine.mark(row, col);
            (outcome, engine.state())
        };
        if outcome.has_update() {
            self.notify(state);
        }
        outcome
    }

    /// Renders the board as PNG bytes.
    pub fn draw(&self) -> Result<Vec<u8>, RenderError> {
        let (tiles, state) = self.snapshot();
        self.renderer.render(&tiles, state, self.started_at)
    }

    pub fn add_listener(&self, listener: impl Fn(GameState) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }

    /// Subscribes to render requests, dropping the receiver unsubscribes.
    pub fn render_requests(&self) -> Receiver<RenderRequest> {
        let (tx, rx) = channel();
        lock(&self.render_requests).push(tx);
        rx
    }

    /// Posts a render request to every subscriber, returns how many received it.
    pub fn request_render(&self) -> usize {
        let request = RenderRequest {
            state: self.state(),
        };
        let mut senders = lock(&self.render_requests);
        senders.retain(|tx| tx.send(request).is_ok());
        log::debug!("render requested, {} subscribers", senders.len());
        senders.len()
    }

    fn notify(&self, state: GameState) {
        // iterate a copy so listeners can add or remove listeners
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    fn engine(&self) -> MutexGuard<'_, PlayEngine> {
        lock(&self.engine)
    }
}

/// Moves never leave the engine half-updated across a panic, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
