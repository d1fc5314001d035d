//! Session lifecycle controller.
//!
//! One controller instance drives every job the worker accepts. The steps
//! of a session run strictly in order: connect, wait for the participant,
//! usage gate, recording, agent start, delayed shutdown, tracking update.
//! External failures are not retried; they abort the session.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::shutdown::ShutdownTimer;
use super::{SessionJob, SessionOutcome};
use crate::agent::{AgentConfig, ConversationEngine};
use crate::limiter::UsageLimiter;
use crate::room::control::S3Upload;
use crate::room::{ConnectOptions, EgressRequest, RoomControl, RoomError, RoomTransport};
use crate::script::InterviewScript;
use crate::table::TrackingStore;

/// External collaborators a session runs against.
pub struct SessionDeps {
    pub transport: Arc<dyn RoomTransport>,
    pub control: Arc<dyn RoomControl>,
    pub engine: Arc<dyn ConversationEngine>,
    pub tracking: Arc<dyn TrackingStore>,
    pub limiter: Arc<UsageLimiter>,
}

/// Per-process session knobs.
pub struct SessionPolicy {
    pub timeout: Duration,
    pub join_timeout: Option<Duration>,
    pub test_participant_name: String,
    pub script: InterviewScript,
    pub storage: S3Upload,
}

pub struct SessionController {
    deps: SessionDeps,
    policy: SessionPolicy,
}

impl SessionController {
    pub fn new(deps: SessionDeps, policy: SessionPolicy) -> Self {
        Self { deps, policy }
    }

    pub async fn run(&self, job: SessionJob) -> Result<SessionOutcome> {
        let started_at = chrono::Utc::now();
        info!(room = %job.room_name, "connecting to room");
        let mut conn = self
            .deps
            .transport
            .connect(&job.room_name, ConnectOptions::default())
            .await
            .context("failed to connect to room")?;

        let participant = match self.policy.join_timeout {
            Some(limit) => tokio::time::timeout(limit, conn.wait_for_participant())
                .await
                .map_err(|_| RoomError::JoinTimeout)??,
            None => conn.wait_for_participant().await?,
        };
        info!(
            room = %job.room_name,
            identity = %participant.identity,
            name = %participant.name,
            "participant joined"
        );

        if !self.deps.limiter.check_and_increment(&participant.identity) {
            conn.shutdown("usage limit exceeded").await?;
            self.deps.control.delete_room(&job.room_name).await?;
            return Ok(SessionOutcome::Rejected {
                identity: participant.identity,
            });
        }

        if participant.name != self.policy.test_participant_name {
            let prefix = format!("{}/{}/", job.room_name, Uuid::new_v4());
            let req = EgressRequest::room_composite(&job.room_name, prefix, self.policy.storage.clone());
            self.deps
                .control
                .start_room_composite_egress(&req)
                .await
                .context("failed to start recording")?;
        } else {
            info!(room = %job.room_name, "test participant, skipping recording");
        }

        let config = AgentConfig::from_script(&self.policy.script);
        let opening = self.policy.script.opening_prompt();
        let mut agent = self
            .deps
            .engine
            .start_agent(config, &opening, &job.room_name, &participant)
            .await
            .context("failed to start conversational agent")?;
        agent
            .generate_reply()
            .await
            .context("failed to request the first reply")?;
        info!(room = %job.room_name, "agent started");

        // Delayed shutdown, cancelled if the room closes first. The session
        // keeps running in the background after start-up returns.
        let control = Arc::clone(&self.deps.control);
        let timeout_room = job.room_name.clone();
        let mut timer = ShutdownTimer::arm(self.policy.timeout, async move {
            warn!(room = %timeout_room, "session timeout reached, deleting room");
            if let Err(e) = control.delete_room(&timeout_room).await {
                error!(room = %timeout_room, "failed to delete room: {}", e);
            }
        });

        tokio::spawn(async move {
            conn.closed().await;
            timer.cancel();
            if let Err(e) = agent.stop().await {
                debug!("engine session already closed: {}", e);
            }
        });

        self.deps
            .tracking
            .mark_assessment_completed(&participant.identity)
            .await
            .context("failed to update tracking record")?;
        info!(identity = %participant.identity, "tracking record updated");

        Ok(SessionOutcome::Completed {
            room: job.room_name,
            participant,
            started_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentHandle, EngineError};
    use crate::limiter::MemoryAttemptStore;
    use crate::room::control::EgressInfo;
    use crate::room::{Participant, RoomConnection};
    use crate::table::TableError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio::time::advance;

    #[derive(Default)]
    struct CallLog {
        egress_prefixes: Mutex<Vec<String>>,
        deleted_rooms: Mutex<Vec<String>>,
        shutdown_reasons: Mutex<Vec<String>>,
        agent_starts: Mutex<Vec<(String, String)>>,
        replies: AtomicUsize,
        tracked: Mutex<Vec<String>>,
    }

    struct FakeTransport {
        participant: Option<Participant>,
        log: Arc<CallLog>,
        close: Arc<Notify>,
    }

    #[async_trait]
    impl RoomTransport for FakeTransport {
        async fn connect(
            &self,
            room: &str,
            _opts: ConnectOptions,
        ) -> Result<Box<dyn RoomConnection>, RoomError> {
            Ok(Box::new(FakeConnection {
                room: room.to_string(),
                participant: self.participant.clone(),
                log: Arc::clone(&self.log),
                close: Arc::clone(&self.close),
            }))
        }
    }

    struct FakeConnection {
        room: String,
        participant: Option<Participant>,
        log: Arc<CallLog>,
        close: Arc<Notify>,
    }

    #[async_trait]
    impl RoomConnection for FakeConnection {
        fn room_name(&self) -> &str {
            &self.room
        }

        async fn wait_for_participant(&mut self) -> Result<Participant, RoomError> {
            match self.participant.take() {
                Some(p) => Ok(p),
                None => futures::future::pending().await,
            }
        }

        async fn closed(&mut self) {
            self.close.notified().await;
        }

        async fn shutdown(&mut self, reason: &str) -> Result<(), RoomError> {
            self.log
                .shutdown_reasons
                .lock()
                .unwrap()
                .push(reason.to_string());
            Ok(())
        }
    }

    struct FakeControl {
        log: Arc<CallLog>,
        fail_egress: bool,
    }

    #[async_trait]
    impl RoomControl for FakeControl {
        async fn delete_room(&self, room: &str) -> Result<(), RoomError> {
            self.log.deleted_rooms.lock().unwrap().push(room.to_string());
            Ok(())
        }

        async fn start_room_composite_egress(
            &self,
            req: &EgressRequest,
        ) -> Result<EgressInfo, RoomError> {
            if self.fail_egress {
                return Err(RoomError::Service {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    body: "egress unavailable".to_string(),
                });
            }
            self.log
                .egress_prefixes
                .lock()
                .unwrap()
                .push(req.segment_outputs[0].filename_prefix.clone());
            Ok(EgressInfo {
                egress_id: "EG_1".to_string(),
                status: None,
            })
        }
    }

    struct FakeEngine {
        log: Arc<CallLog>,
    }

    #[async_trait]
    impl ConversationEngine for FakeEngine {
        async fn start_agent(
            &self,
            _config: AgentConfig,
            _opening_prompt: &str,
            room: &str,
            participant: &Participant,
        ) -> Result<Box<dyn AgentHandle>, EngineError> {
            self.log
                .agent_starts
                .lock()
                .unwrap()
                .push((room.to_string(), participant.identity.clone()));
            Ok(Box::new(FakeAgent {
                log: Arc::clone(&self.log),
            }))
        }
    }

    struct FakeAgent {
        log: Arc<CallLog>,
    }

    #[async_trait]
    impl AgentHandle for FakeAgent {
        async fn generate_reply(&mut self) -> Result<(), EngineError> {
            self.log.replies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct FakeTracking {
        log: Arc<CallLog>,
    }

    #[async_trait]
    impl TrackingStore for FakeTracking {
        async fn mark_assessment_completed(&self, email: &str) -> Result<(), TableError> {
            self.log.tracked.lock().unwrap().push(email.to_string());
            Ok(())
        }
    }

    struct Harness {
        controller: SessionController,
        log: Arc<CallLog>,
        close: Arc<Notify>,
    }

    fn harness(participant: Participant) -> Harness {
        harness_with(participant, false, None)
    }

    fn harness_with(
        participant: Participant,
        fail_egress: bool,
        join_timeout: Option<Duration>,
    ) -> Harness {
        let log = Arc::new(CallLog::default());
        let close = Arc::new(Notify::new());
        let deps = SessionDeps {
            transport: Arc::new(FakeTransport {
                participant: Some(participant),
                log: Arc::clone(&log),
                close: Arc::clone(&close),
            }),
            control: Arc::new(FakeControl {
                log: Arc::clone(&log),
                fail_egress,
            }),
            engine: Arc::new(FakeEngine {
                log: Arc::clone(&log),
            }),
            tracking: Arc::new(FakeTracking {
                log: Arc::clone(&log),
            }),
            limiter: Arc::new(UsageLimiter::new(
                Arc::new(MemoryAttemptStore::default()),
                3,
            )),
        };
        let policy = SessionPolicy {
            timeout: Duration::from_secs(600),
            join_timeout,
            test_participant_name: "TEST".to_string(),
            script: InterviewScript::default(),
            storage: S3Upload {
                access_key: "ak".to_string(),
                secret: "sk".to_string(),
                region: "r".to_string(),
                endpoint: "e".to_string(),
                force_path_style: true,
            },
        };
        Harness {
            controller: SessionController::new(deps, policy),
            log,
            close,
        }
    }

    fn candidate() -> Participant {
        Participant {
            identity: "alice@example.com".to_string(),
            name: "Alice".to_string(),
        }
    }

    fn job() -> SessionJob {
        SessionJob {
            room_name: "interview-1".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_session_records_starts_agent_and_tracks() {
        let h = harness(candidate());
        let outcome = h.controller.run(job()).await.unwrap();

        match outcome {
            SessionOutcome::Completed {
                room, participant, ..
            } => {
                assert_eq!(room, "interview-1");
                assert_eq!(participant.identity, "alice@example.com");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let prefixes = h.log.egress_prefixes.lock().unwrap();
        assert_eq!(prefixes.len(), 1);
        assert!(prefixes[0].starts_with("interview-1/"));
        assert!(prefixes[0].ends_with('/'));

        assert_eq!(
            *h.log.agent_starts.lock().unwrap(),
            vec![("interview-1".to_string(), "alice@example.com".to_string())]
        );
        assert_eq!(h.log.replies.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.log.tracked.lock().unwrap(),
            vec!["alice@example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_participant_never_triggers_recording() {
        let h = harness(Participant {
            identity: "qa@example.com".to_string(),
            name: "TEST".to_string(),
        });
        let outcome = h.controller.run(job()).await.unwrap();

        assert!(matches!(outcome, SessionOutcome::Completed { .. }));
        assert!(h.log.egress_prefixes.lock().unwrap().is_empty());
        assert_eq!(h.log.agent_starts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fourth_join_is_rejected_without_agent_or_recording() {
        let h = harness(candidate());
        for n in 1..=3 {
            let outcome = h.controller.run(job()).await.unwrap();
            assert!(
                matches!(outcome, SessionOutcome::Completed { .. }),
                "join {} should be allowed",
                n
            );
        }

        let outcome = h.controller.run(job()).await.unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Rejected {
                identity: "alice@example.com".to_string()
            }
        );

        // Three allowed sessions recorded and started the agent; the
        // rejected one did neither and tore the room down instead.
        assert_eq!(h.log.egress_prefixes.lock().unwrap().len(), 3);
        assert_eq!(h.log.agent_starts.lock().unwrap().len(), 3);
        assert_eq!(
            *h.log.shutdown_reasons.lock().unwrap(),
            vec!["usage limit exceeded".to_string()]
        );
        assert_eq!(
            *h.log.deleted_rooms.lock().unwrap(),
            vec!["interview-1".to_string()]
        );
    }

    #[tokio::test]
    async fn egress_failure_aborts_before_the_agent_starts() {
        let h = harness_with(candidate(), true, None);
        let err = h.controller.run(job()).await.unwrap_err();

        assert!(format!("{:#}", err).contains("failed to start recording"));
        assert!(h.log.agent_starts.lock().unwrap().is_empty());
        assert!(h.log.tracked.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_times_out_when_nobody_joins() {
        let mut h = harness_with(candidate(), false, Some(Duration::from_secs(30)));
        // Replace the transport with one that never produces a participant.
        h.controller.deps.transport = Arc::new(FakeTransport {
            participant: None,
            log: Arc::clone(&h.log),
            close: Arc::clone(&h.close),
        });

        let err = h.controller.run(job()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("timed out waiting for a participant"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_deletes_the_room() {
        let h = harness(candidate());
        h.controller.run(job()).await.unwrap();

        // Let the spawned timer task register its sleep against t=0 before
        // advancing the paused clock.
        tokio::task::yield_now().await;
        advance(Duration::from_secs(599)).await;
        tokio::task::yield_now().await;
        assert!(h.log.deleted_rooms.lock().unwrap().is_empty());

        advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            *h.log.deleted_rooms.lock().unwrap(),
            vec!["interview-1".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn room_close_cancels_the_delayed_shutdown() {
        let h = harness(candidate());
        h.controller.run(job()).await.unwrap();

        // Let the close monitor register, then announce the room closing.
        tokio::task::yield_now().await;
        h.close.notify_one();
        tokio::task::yield_now().await;

        advance(Duration::from_secs(3600)).await;
        tokio::task::yield_now().await;
        assert!(h.log.deleted_rooms.lock().unwrap().is_empty());
    }
}
