//! Per-path subscriber multiplexing over shared follow engines.
//!
//! One service task owns the whole registry: the path → tracked-file map,
//! the platform watcher and the poll timer. Attach/detach arrive as
//! commands from cloneable handles, so every state transition happens
//! between await points on a single task and no lock guards the map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, sleep};

use crate::config::TailConfig;
use crate::jail::PathJail;

use super::error::TailError;
use super::follow::{FollowEngine, WakeReason};
use super::subscriber::{Subscriber, SubscriberId};
use super::watch::{self, ChangeNotifier};

/// Receipt for one attached subscriber; needed to detach it.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub path: PathBuf,
    pub id: SubscriberId,
}

enum Command {
    Attach {
        name: String,
        subscriber: Box<dyn Subscriber>,
        reply: oneshot::Sender<Result<Subscription, TailError>>,
    },
    Detach {
        path: PathBuf,
        id: SubscriberId,
    },
    Shutdown,
}

/// Handle for talking to a running [`TailService`]. Cheap to clone; the
/// service drains and exits once every handle is dropped.
#[derive(Clone)]
pub struct TailHandle {
    tx: mpsc::Sender<Command>,
}

impl TailHandle {
    /// Attach `subscriber` to the file `name` resolves to under the root.
    ///
    /// The subscriber receives its own replay of the current last-K lines
    /// before joining the live broadcast; subscribers already attached see
    /// nothing of it.
    pub async fn attach(
        &self,
        name: &str,
        subscriber: impl Subscriber + 'static,
    ) -> Result<Subscription, TailError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Attach {
                name: name.to_string(),
                subscriber: Box::new(subscriber),
                reply,
            })
            .await
            .map_err(|_| TailError::ServiceStopped)?;
        rx.await.map_err(|_| TailError::ServiceStopped)?
    }

    /// Remove a subscriber. Dropping the last one for a path releases the
    /// file handle and the native watch.
    pub async fn detach(&self, subscription: &Subscription) -> Result<(), TailError> {
        self.tx
            .send(Command::Detach {
                path: subscription.path.clone(),
                id: subscription.id,
            })
            .await
            .map_err(|_| TailError::ServiceStopped)
    }

    /// Ask the service to drain every tracked file and exit.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// Per-path shared state: one engine, one watch, N subscribers.
struct TrackedFile {
    engine: FollowEngine,
    subscribers: Vec<(SubscriberId, Box<dyn Subscriber>)>,
    watched: bool,
    /// Set on destruction; a wake that still reaches aliased state becomes
    /// a no-op.
    closed: bool,
}

/// The subscriber multiplexer.
///
/// Built with [`TailService::builder`], then driven by [`run`](Self::run)
/// on its own task while [`TailHandle`]s feed it attach/detach commands.
pub struct TailService {
    jail: PathJail,
    config: TailConfig,
    files: HashMap<PathBuf, TrackedFile>,
    notifier: ChangeNotifier,
    event_rx: mpsc::Receiver<notify::Result<notify::Event>>,
    cmd_rx: mpsc::Receiver<Command>,
    next_id: u64,
}

impl TailService {
    pub fn builder() -> TailServiceBuilder {
        TailServiceBuilder::new()
    }

    /// Drive the service until every handle is dropped or a shutdown is
    /// requested, then drain all tracked files.
    pub async fn run(mut self) {
        crate::log_event!("tail", "started", "root {}", self.jail.root().display());
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let tick = sleep(interval);
            tokio::pin!(tick);

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Attach { name, subscriber, reply }) => {
                        let result = self.attach(&name, subscriber);
                        let _ = reply.send(result);
                    }
                    Some(Command::Detach { path, id }) => self.detach(&path, id),
                    Some(Command::Shutdown) | None => break,
                },

                Some(res) = self.event_rx.recv() => match res {
                    Ok(event) => self.on_native_event(event),
                    Err(e) => tracing::error!("[watch] event error: {e}"),
                },

                _ = &mut tick => self.poll_tick(),
            }
        }

        self.drain();
        crate::log_event!("tail", "stopped");
    }

    fn attach(
        &mut self,
        name: &str,
        mut subscriber: Box<dyn Subscriber>,
    ) -> Result<Subscription, TailError> {
        let path = self.jail.resolve(name)?;

        // Catch the engine up before the replay snapshot moves the shared
        // offset, so lines current viewers haven't seen yet reach them
        // instead of vanishing into the newcomer's replay.
        if self.files.contains_key(&path) {
            self.wake(&path, WakeReason::Timer);
        }

        let created = if self.files.contains_key(&path) {
            false
        } else {
            let engine = FollowEngine::open(&path, self.config.chunk_size)?;
            let watched = self.notifier.watch_file(&path);
            self.files.insert(
                path.clone(),
                TrackedFile {
                    engine,
                    subscribers: Vec::new(),
                    watched,
                    closed: false,
                },
            );
            crate::log_event!("tail", "tracking", "{}", path.display());
            true
        };

        let replay = self
            .files
            .get_mut(&path)
            .expect("tracked entry exists after insert")
            .engine
            .replay(self.config.init_lines);

        let replay = match replay {
            Ok(lines) => lines,
            Err(e) => {
                // A first attach that cannot read leaves nothing behind.
                if created {
                    self.destroy(&path);
                }
                return Err(e);
            }
        };

        // Replay goes to the attaching subscriber only.
        for line in &replay {
            if let Err(e) = subscriber.deliver(line) {
                tracing::warn!("[tail] replay delivery failed: {e}");
                break;
            }
        }

        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let tracked = self
            .files
            .get_mut(&path)
            .expect("tracked entry exists after insert");
        tracked.subscribers.push((id, subscriber));
        crate::log_event!(
            "tail",
            "attached",
            "{} ({} viewers)",
            path.display(),
            tracked.subscribers.len()
        );

        Ok(Subscription { path, id })
    }

    fn detach(&mut self, path: &Path, id: SubscriberId) {
        let Some(tracked) = self.files.get_mut(path) else {
            crate::debug_event!("tail", "detach for untracked path", "{}", path.display());
            return;
        };

        tracked.subscribers.retain(|(sid, _)| *sid != id);
        crate::log_event!(
            "tail",
            "detached",
            "{} ({} viewers left)",
            path.display(),
            tracked.subscribers.len()
        );

        if tracked.subscribers.is_empty() {
            self.destroy(path);
        }
    }

    fn on_native_event(&mut self, event: notify::Event) {
        if !watch::wakes_engine(&event.kind) {
            return;
        }
        for path in event.paths {
            if self.files.contains_key(&path) {
                self.wake(&path, WakeReason::NativeEvent);
            }
        }
    }

    /// The recurring fallback: wake every tracked file. Between loop turns
    /// every engine sits in trailing state, so this is the same wake set a
    /// per-file timer would produce.
    fn poll_tick(&mut self) {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in paths {
            self.wake(&path, WakeReason::Timer);
        }
    }

    /// Run one engine wake and fan the result out. Missing entry or closed
    /// flag means a teardown won the race; nothing to do.
    fn wake(&mut self, path: &Path, reason: WakeReason) {
        let Some(tracked) = self.files.get_mut(path) else {
            return;
        };
        if tracked.closed {
            return;
        }

        let lines = match tracked.engine.on_wake(reason) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("[tail] wake failed: {e}");
                return;
            }
        };

        for line in &lines {
            broadcast(&mut tracked.subscribers, line);
        }

        tracked.subscribers.retain(|(id, sub)| {
            if sub.is_closed() {
                crate::debug_event!("tail", "pruning closed subscriber", "{id}");
                false
            } else {
                true
            }
        });

        if tracked.subscribers.is_empty() {
            self.destroy(path);
        }
    }

    /// Tear down one tracked file: remove it from the map, drop the native
    /// watch, close the handle. Safe to call twice.
    fn destroy(&mut self, path: &Path) {
        let Some(mut tracked) = self.files.remove(path) else {
            return;
        };
        tracked.closed = true;
        if tracked.watched {
            self.notifier.unwatch_file(path);
        }
        crate::log_event!("tail", "released", "{}", path.display());
    }

    fn drain(&mut self) {
        let paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        for path in paths {
            self.destroy(&path);
        }
    }
}

/// Deliver one line to every subscriber; a failure is logged and skipped,
/// never aborting the fan-out.
fn broadcast(subscribers: &mut [(SubscriberId, Box<dyn Subscriber>)], line: &[u8]) {
    for (id, sub) in subscribers.iter_mut() {
        if let Err(e) = sub.deliver(line) {
            tracing::warn!("[tail] delivery to subscriber {id} failed: {e}");
        }
    }
}

/// Builder for a [`TailService`] and its first [`TailHandle`].
pub struct TailServiceBuilder {
    root: PathBuf,
    config: TailConfig,
}

impl TailServiceBuilder {
    pub fn new() -> Self {
        let defaults = crate::config::Settings::default();
        Self {
            root: defaults.root,
            config: defaults.tail,
        }
    }

    /// Set the jail root the service is confined to.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn config(mut self, config: TailConfig) -> Self {
        self.config = config;
        self
    }

    pub fn init_lines(mut self, lines: usize) -> Self {
        self.config.init_lines = lines;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Build the service and a handle to it. Fails only if the platform
    /// watcher backend cannot be created.
    pub fn build(self) -> Result<(TailService, TailHandle), TailError> {
        let (notifier, event_rx) = ChangeNotifier::new()?;
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let service = TailService {
            jail: PathJail::new(self.root),
            config: self.config,
            files: HashMap::new(),
            notifier,
            event_rx,
            cmd_rx,
            next_id: 0,
        };

        Ok((service, TailHandle { tx: cmd_tx }))
    }
}

impl Default for TailServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
