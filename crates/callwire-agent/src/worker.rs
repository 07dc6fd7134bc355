//! Job dispatch for the agent worker.
//!
//! The worker polls the room service for rooms matching its prefix and runs
//! one entrypoint task per new room. A job is never retried: the room stays
//! marked as served until it disappears from the room list, so a room that is
//! recreated later is picked up again.

use crate::config::AgentConfig;
use crate::entrypoint::entrypoint;
use crate::error::AgentError;
use crate::provider::ProviderFactory;
use crate::room::LiveKitJob;
use async_trait::async_trait;
use callwire_sip::twirp::http_base_url;
use callwire_sip::LiveKitConfig;
use livekit_api::services::room::RoomClient;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Source of jobs and the way each one is run.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Names of the rooms that currently exist.
    async fn list_rooms(&self) -> Result<Vec<String>, AgentError>;

    /// Serves `room` until the call is over.
    async fn run_job(&self, room: String) -> Result<(), AgentError>;
}

/// Runs the entrypoint against LiveKit rooms.
pub struct LiveKitDispatcher {
    livekit: LiveKitConfig,
    agent: AgentConfig,
    factory: Arc<dyn ProviderFactory>,
    room_client: RoomClient,
}

impl LiveKitDispatcher {
    pub fn new(
        livekit: LiveKitConfig,
        agent: AgentConfig,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        let room_client = RoomClient::with_api_key(
            &http_base_url(&livekit.url),
            &livekit.api_key,
            &livekit.api_secret,
        );
        Self {
            livekit,
            agent,
            factory,
            room_client,
        }
    }
}

#[async_trait]
impl Dispatcher for LiveKitDispatcher {
    async fn list_rooms(&self) -> Result<Vec<String>, AgentError> {
        let rooms = self
            .room_client
            .list_rooms(Vec::new())
            .await
            .map_err(|e| AgentError::RoomService(e.to_string()))?;
        Ok(rooms.into_iter().map(|room| room.name).collect())
    }

    async fn run_job(&self, room: String) -> Result<(), AgentError> {
        let job = LiveKitJob::new(
            self.livekit.clone(),
            &room,
            &self.agent.identity,
            &self.agent.name,
            self.agent.participant_timeout(),
            self.agent.poll_interval(),
        );

        let result = match entrypoint(&job, self.factory.as_ref(), &self.agent).await {
            Ok(session) => {
                let closed = job.wait_until_room_closed().await;
                session.close().await;
                closed
            }
            Err(e) => Err(e),
        };
        job.disconnect().await;
        result
    }
}

pub struct Worker<D: Dispatcher> {
    dispatcher: Arc<D>,
    room_prefix: String,
    poll_interval: Duration,
    /// Room served by each running task.
    jobs: HashMap<Id, String>,
    /// Rooms whose job has ended; cleared once the room itself is gone.
    finished: HashSet<String>,
    tasks: JoinSet<()>,
}

impl<D: Dispatcher> Worker<D> {
    pub fn new(dispatcher: D, room_prefix: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            room_prefix: room_prefix.into(),
            poll_interval,
            jobs: HashMap::new(),
            finished: HashSet::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn active_rooms(&self) -> usize {
        self.jobs.len()
    }

    /// Serves jobs until `shutdown` resolves, then aborts the running ones.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            prefix = %self.room_prefix,
            poll_ms = self.poll_interval.as_millis() as u64,
            "agent worker started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => self.dispatch_new_rooms().await,
                Some(joined) = self.tasks.join_next_with_id() => self.reap(joined),
            }
        }

        info!(active = self.jobs.len(), "agent worker shutting down");
        self.tasks.shutdown().await;
    }

    /// Records the end of a job. A room is served once per lifetime, whether
    /// its job succeeded, failed or panicked.
    fn reap(&mut self, joined: Result<(Id, ()), JoinError>) {
        let id = match joined {
            Ok((id, ())) => id,
            Err(e) => {
                error!("agent job task failed: {}", e);
                e.id()
            }
        };
        if let Some(room) = self.jobs.remove(&id) {
            self.finished.insert(room);
        }
    }

    async fn dispatch_new_rooms(&mut self) {
        let rooms = match self.dispatcher.list_rooms().await {
            Ok(rooms) => rooms,
            Err(e) => {
                warn!(error = %e, "failed to list rooms");
                return;
            }
        };

        self.finished.retain(|room| rooms.contains(room));

        for room in rooms {
            if !room.starts_with(&self.room_prefix)
                || self.finished.contains(&room)
                || self.jobs.values().any(|active| *active == room)
            {
                continue;
            }

            info!(room = %room, "dispatching agent job");
            let dispatcher = self.dispatcher.clone();
            let job_room = room.clone();
            let handle = self.tasks.spawn(async move {
                match dispatcher.run_job(job_room.clone()).await {
                    Ok(()) => info!(room = %job_room, "agent job finished"),
                    Err(e) => error!(room = %job_room, error = %e, "agent job failed"),
                }
            });
            self.jobs.insert(handle.id(), room);
        }
    }
}
