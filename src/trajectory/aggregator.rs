//! Background collection of trajectory points.
//!
//! Events are routed to `track_id % workers`, so every event of one track is
//! handled by the same worker in submission order. Each worker owns one
//! shard of the trajectory map.

use super::storage::TrajectoryStore;
use super::{local_timestamp, Trajectory, TrajectoryEvent, TrajectoryRecord};
use crate::error::TrackError;
use crate::object::{ObjectClass, Point};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Shard = Mutex<HashMap<u64, Trajectory>>;

enum Message {
    Event(TrajectoryEvent),
    /// Sentinel: the worker exits after handling everything queued before it.
    Stop,
}

/// Counters reported when the aggregator is joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// `Update` events applied.
    pub updates: usize,
    /// Trajectories written to storage.
    pub flushed: usize,
    /// `Disappear` events for ids with no points.
    pub empty_flushes: usize,
    /// Writes rejected by the store. These trajectories are lost.
    pub failed_writes: usize,
}

#[derive(Default)]
struct Counters {
    updates: AtomicUsize,
    flushed: AtomicUsize,
    empty_flushes: AtomicUsize,
    failed_writes: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> AggregatorStats {
        AggregatorStats {
            updates: self.updates.load(Ordering::Acquire),
            flushed: self.flushed.load(Ordering::Acquire),
            empty_flushes: self.empty_flushes.load(Ordering::Acquire),
            failed_writes: self.failed_writes.load(Ordering::Acquire),
        }
    }
}

pub struct TrajectoryAggregator {
    /// `None` once the sentinels have been sent.
    senders: RwLock<Option<Vec<Sender<Message>>>>,
    handles: Vec<JoinHandle<()>>,
    shards: Arc<[Shard]>,
    counters: Arc<Counters>,
}

impl TrajectoryAggregator {
    /// Starts `workers` threads writing finished trajectories to `store`.
    pub fn new(workers: usize, store: Arc<dyn TrajectoryStore>) -> Result<Self, TrackError> {
        if workers == 0 {
            return Err(TrackError::Config("aggregator needs at least one worker".to_string()));
        }

        let shards: Arc<[Shard]> = (0..workers).map(|_| Mutex::new(HashMap::new())).collect();
        let counters = Arc::new(Counters::default());
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = unbounded();
            let worker = Worker {
                index,
                rx,
                shards: Arc::clone(&shards),
                counters: Arc::clone(&counters),
                store: Arc::clone(&store),
            };
            let handle = thread::Builder::new()
                .name(format!("trajectory-worker-{}", index))
                .spawn(move || worker.run())
                .map_err(|e| TrackError::Config(format!("cannot spawn worker: {}", e)))?;
            senders.push(tx);
            handles.push(handle);
        }
        info!("trajectory aggregator started with {} workers", workers);

        Ok(Self {
            senders: RwLock::new(Some(senders)),
            handles,
            shards,
            counters,
        })
    }

    pub fn workers(&self) -> usize {
        self.shards.len()
    }

    /// Queues one event without waiting for it to be processed.
    pub fn submit(&self, event: TrajectoryEvent) -> Result<(), TrackError> {
        let guard = self.senders.read();
        let senders = guard.as_ref().ok_or(TrackError::AggregatorClosed)?;
        let worker = (event.track_id() % senders.len() as u64) as usize;
        senders[worker]
            .send(Message::Event(event))
            .map_err(|_| TrackError::AggregatorClosed)
    }

    pub fn submit_all<I>(&self, events: I) -> Result<(), TrackError>
    where
        I: IntoIterator<Item = TrajectoryEvent>,
    {
        events.into_iter().try_for_each(|event| self.submit(event))
    }

    /// Sends one sentinel per worker. Later `submit` calls fail with
    /// [`TrackError::AggregatorClosed`]. Calling this twice is a no-op.
    pub fn shutdown(&self) {
        let Some(senders) = self.senders.write().take() else {
            return;
        };
        debug!("sending {} shutdown sentinels", senders.len());
        for tx in &senders {
            // A worker that already exited has nothing left to drain.
            let _ = tx.send(Message::Stop);
        }
    }

    /// Shuts down, waits for every queued event to be handled and returns
    /// the final counters.
    pub fn join(mut self) -> AggregatorStats {
        self.shutdown();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("trajectory worker panicked");
            }
        }
        let stats = self.counters.snapshot();
        let live = self.live_trajectories();
        if live > 0 {
            debug!("{} trajectories still open at shutdown were not persisted", live);
        }
        info!("trajectory aggregator stopped: {:?}", stats);
        stats
    }

    pub fn stats(&self) -> AggregatorStats {
        self.counters.snapshot()
    }

    /// Number of tracks with points that have not been flushed yet.
    pub fn live_trajectories(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Copy of the points collected so far for `track_id`.
    pub fn trajectory(&self, track_id: u64) -> Option<Trajectory> {
        let shard = &self.shards[(track_id % self.shards.len() as u64) as usize];
        shard.lock().get(&track_id).cloned()
    }
}

impl Drop for TrajectoryAggregator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    index: usize,
    rx: Receiver<Message>,
    shards: Arc<[Shard]>,
    counters: Arc<Counters>,
    store: Arc<dyn TrajectoryStore>,
}

impl Worker {
    fn run(self) {
        for message in self.rx.iter() {
            match message {
                Message::Event(TrajectoryEvent::Update {
                    track_id,
                    class,
                    point,
                    ..
                }) => self.append(track_id, class, point),
                Message::Event(TrajectoryEvent::Disappear { track_id }) => self.flush(track_id),
                Message::Stop => break,
            }
        }
        debug!("trajectory worker {} exiting", self.index);
    }

    fn shard(&self, track_id: u64) -> &Shard {
        &self.shards[(track_id % self.shards.len() as u64) as usize]
    }

    fn append(&self, track_id: u64, class: ObjectClass, point: Point) {
        self.counters.updates.fetch_add(1, Ordering::AcqRel);
        self.shard(track_id)
            .lock()
            .entry(track_id)
            .or_insert_with(|| Trajectory::new(class))
            .points
            .push(point);
    }

    fn flush(&self, track_id: u64) {
        let trajectory = self.shard(track_id).lock().remove(&track_id);
        let Some(trajectory) = trajectory.filter(|t| !t.points.is_empty()) else {
            debug!("track {} disappeared with no points", track_id);
            self.counters.empty_flushes.fetch_add(1, Ordering::AcqRel);
            return;
        };

        let record = TrajectoryRecord {
            object_id: track_id,
            object_type: trajectory.class.name().to_string(),
            path: trajectory.points,
            timestamp: local_timestamp(),
        };
        match self.store.insert(&record) {
            Ok(()) => {
                debug!("track {} flushed with {} points", track_id, record.path.len());
                self.counters.flushed.fetch_add(1, Ordering::AcqRel);
            }
            Err(err) => {
                warn!("dropping trajectory of track {}: {}", track_id, err);
                self.counters.failed_writes.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}
