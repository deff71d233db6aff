//! The action engine: submission, approval, rejection, and undo.
//!
//! Every mutation of an action record funnels through here. Status moves
//! are guarded conditional updates, so two callers racing over the same
//! record resolve to exactly one winner without locks above the store.
//! Executor and notifier failures become data on the record; the only
//! errors callers ever see are the engine's own storage faults.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use valet_core::plan::{ActionReceipt, Plan};
use valet_core::types::{
    ActionRecord, ActionStatus, ApprovedBy, AutonomyLevel, NotificationKind,
    NotificationPriority, NotifyChannel, Timestamp, UserId,
};
use valet_notify::{NotificationRequest, Notifier};
use valet_store::{ActionRepository, TransitionPatch};

use crate::error::EngineError;
use crate::executor::ExecutorRegistry;
use crate::policy::PolicyResolver;
use crate::undo::{undo_eligibility, UNDO_WINDOW_SECS};

/// Informational notices are purged after a week. Approval requests
/// never expire; they stay until the user acts on them.
const NOTICE_RETENTION_SECS: i64 = 7 * 24 * 3600;

// =============================================================================
// Outcome
// =============================================================================

/// Where a submission or approval ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Refused before a record was created.
    Invalid,
    /// Recorded and waiting for the user.
    PendingApproval,
    Executed,
    Failed,
    /// No claimable record for this id and user.
    NotFound,
}

/// Uniform result for submit and approve.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub status: OutcomeStatus,
    pub action_id: Option<Uuid>,
    pub result: Option<ActionReceipt>,
    pub error: Option<String>,
    pub undo_deadline: Option<Timestamp>,
}

impl Outcome {
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: OutcomeStatus::Invalid,
            action_id: None,
            result: None,
            error: Some(error.into()),
            undo_deadline: None,
        }
    }

    /// Accepted and parked for approval. `success` is true: the submission
    /// itself worked, the action just has not run yet.
    pub fn pending(action_id: Uuid) -> Self {
        Self {
            success: true,
            status: OutcomeStatus::PendingApproval,
            action_id: Some(action_id),
            result: None,
            error: None,
            undo_deadline: None,
        }
    }

    pub fn executed(
        action_id: Uuid,
        result: ActionReceipt,
        undo_deadline: Option<Timestamp>,
    ) -> Self {
        Self {
            success: true,
            status: OutcomeStatus::Executed,
            action_id: Some(action_id),
            result: Some(result),
            error: None,
            undo_deadline,
        }
    }

    pub fn failed(action_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: OutcomeStatus::Failed,
            action_id: Some(action_id),
            result: None,
            error: Some(error.into()),
            undo_deadline: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            success: false,
            status: OutcomeStatus::NotFound,
            action_id: None,
            result: None,
            error: None,
            undo_deadline: None,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct ActionEngine {
    actions: Arc<ActionRepository>,
    policy: PolicyResolver,
    registry: ExecutorRegistry,
    notifier: Arc<dyn Notifier>,
}

impl ActionEngine {
    pub fn new(
        actions: Arc<ActionRepository>,
        policy: PolicyResolver,
        registry: ExecutorRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            actions,
            policy,
            registry,
            notifier,
        }
    }

    /// Take in a proposed plan and run it as far as the user's autonomy
    /// settings allow.
    ///
    /// High runs immediately and notifies on success. Medium notifies
    /// first, then runs. Low parks the record and asks for approval.
    /// The resolved level is frozen onto the record; settings changed
    /// after this point never affect it.
    pub async fn submit(&self, user: &UserId, plan: Plan) -> Result<Outcome, EngineError> {
        if let Err(msg) = plan.action.validate() {
            debug!(user = %user, error = %msg, "Plan refused by validation");
            return Ok(Outcome::invalid(msg));
        }

        let kind = plan.action.kind();
        if self.registry.executor(kind).is_none() {
            debug!(user = %user, kind = %kind, "Plan refused, no executor");
            return Ok(Outcome::invalid(format!(
                "No executor registered for {}",
                kind
            )));
        }

        let level = self.policy.resolve(user, kind);
        let record = ActionRecord::new(user.clone(), plan, level);
        self.actions.insert(&record)?;
        info!(
            action_id = %record.id,
            user = %user,
            kind = %kind,
            level = %level,
            "Action submitted"
        );

        match level {
            AutonomyLevel::Low => {
                self.dispatch_approval_needed(&record).await;
                Ok(Outcome::pending(record.id))
            }
            AutonomyLevel::Medium => {
                // Heads-up goes out before execution and never gates it.
                self.dispatch_action_notice(&record).await;
                self.execute_queued(&record, ApprovedBy::Auto).await
            }
            AutonomyLevel::High => {
                let outcome = self.execute_queued(&record, ApprovedBy::Auto).await?;
                if outcome.success {
                    self.dispatch_action_completed(&record, outcome.undo_deadline)
                        .await;
                }
                Ok(outcome)
            }
        }
    }

    /// Approve a pending action and execute it.
    ///
    /// The claim is a guarded status move, so of any number of
    /// concurrent approvals exactly one proceeds to execution; the rest
    /// see NotFound. A missing, foreign, or already-decided record is
    /// NotFound as well, indistinguishable by design.
    pub async fn approve(&self, action_id: Uuid, user: &UserId) -> Result<Outcome, EngineError> {
        let claimed = self.actions.transition(
            action_id,
            user,
            ActionStatus::PendingApproval,
            TransitionPatch::Claim,
        )?;
        if !claimed {
            debug!(action_id = %action_id, user = %user, "Nothing to approve");
            return Ok(Outcome::not_found());
        }

        let record = match self.actions.find(action_id, user)? {
            Some(record) => record,
            None => {
                warn!(action_id = %action_id, "Claimed record vanished before execution");
                return Ok(Outcome::not_found());
            }
        };
        info!(action_id = %action_id, user = %user, "Action approved");

        let outcome = self.execute_queued(&record, ApprovedBy::User).await?;
        if outcome.success {
            self.dispatch_action_completed(&record, outcome.undo_deadline)
                .await;
        }
        Ok(outcome)
    }

    /// Reject a pending action. Returns false when there is nothing left
    /// to reject: unknown id, foreign user, or a record already decided.
    pub async fn reject(
        &self,
        action_id: Uuid,
        user: &UserId,
        reason: Option<&str>,
    ) -> Result<bool, EngineError> {
        let rejected = self.actions.transition(
            action_id,
            user,
            ActionStatus::PendingApproval,
            TransitionPatch::Rejected { reason },
        )?;
        if rejected {
            info!(action_id = %action_id, user = %user, "Action rejected");
        } else {
            debug!(action_id = %action_id, user = %user, "Nothing to reject");
        }
        Ok(rejected)
    }

    /// Reverse an executed action while its undo window is open.
    ///
    /// False covers every refusal: unknown record, ineligible record,
    /// unconfigured handler, handler failure, or a concurrent undo that
    /// got there first. A handler failure leaves the record executed so
    /// the caller may retry inside the window.
    pub async fn undo(&self, action_id: Uuid, user: &UserId) -> Result<bool, EngineError> {
        let record = match self.actions.find(action_id, user)? {
            Some(record) => record,
            None => {
                debug!(action_id = %action_id, user = %user, "Undo target not found");
                return Ok(false);
            }
        };

        if let Err(reason) = undo_eligibility(&record, Timestamp::now()) {
            info!(action_id = %action_id, reason = %reason, "Undo refused");
            return Ok(false);
        }

        let undo_data = match record.undo_data.as_ref() {
            Some(undo_data) => undo_data,
            None => {
                warn!(action_id = %action_id, "Undo window open but no undo data recorded");
                return Ok(false);
            }
        };

        let handler = match self.registry.undo_handler(record.kind) {
            Some(handler) => handler,
            None => {
                warn!(action_id = %action_id, kind = %record.kind, "No undo handler registered");
                return Ok(false);
            }
        };

        if let Err(e) = handler.undo(&record.user_id, undo_data).await {
            warn!(action_id = %action_id, error = %e, "Undo failed, record unchanged");
            return Ok(false);
        }

        let moved = self.actions.transition(
            action_id,
            user,
            ActionStatus::Executed,
            TransitionPatch::Undone {
                undone_at: Timestamp::now(),
            },
        )?;
        if moved {
            info!(action_id = %action_id, kind = %record.kind, "Action undone");
        }
        Ok(moved)
    }

    // ---- queries ----

    pub fn get(&self, action_id: Uuid, user: &UserId) -> Result<Option<ActionRecord>, EngineError> {
        Ok(self.actions.find(action_id, user)?)
    }

    pub fn list(
        &self,
        user: &UserId,
        status: Option<ActionStatus>,
        limit: u64,
    ) -> Result<Vec<ActionRecord>, EngineError> {
        let records = match status {
            Some(status) => self.actions.list_by_status(user, status, limit)?,
            None => self.actions.list_recent(user, limit)?,
        };
        Ok(records)
    }

    pub fn list_pending(&self, user: &UserId) -> Result<Vec<ActionRecord>, EngineError> {
        self.list(user, Some(ActionStatus::PendingApproval), 100)
    }

    // ---- execution ----

    /// Run a queued record through its executor and persist the result.
    async fn execute_queued(
        &self,
        record: &ActionRecord,
        approved_by: ApprovedBy,
    ) -> Result<Outcome, EngineError> {
        let executor = match self.registry.executor(record.kind) {
            Some(executor) => executor,
            None => {
                // Checked at submit; still reachable through approve if
                // the wiring changed underneath a pending record.
                let msg = format!("No executor registered for {}", record.kind);
                warn!(action_id = %record.id, "{}", msg);
                self.actions.transition(
                    record.id,
                    &record.user_id,
                    ActionStatus::Queued,
                    TransitionPatch::Failed { error: &msg },
                )?;
                return Ok(Outcome::failed(record.id, msg));
            }
        };

        match executor.execute(&record.user_id, &record.params).await {
            Ok(execution) => {
                let now = Timestamp::now();
                let undo_deadline = if record.is_undoable && execution.undo.is_some() {
                    Some(now.plus_seconds(UNDO_WINDOW_SECS))
                } else {
                    None
                };
                let moved = self.actions.transition(
                    record.id,
                    &record.user_id,
                    ActionStatus::Queued,
                    TransitionPatch::Executed {
                        receipt: &execution.receipt,
                        undo: execution.undo.as_ref(),
                        undo_deadline,
                        approved_by,
                        approved_at: now,
                    },
                )?;
                if !moved {
                    warn!(action_id = %record.id, "Executed but record had already left queued");
                }
                info!(action_id = %record.id, kind = %record.kind, "Action executed");
                Ok(Outcome::executed(record.id, execution.receipt, undo_deadline))
            }
            Err(e) => {
                let msg = e.to_string();
                warn!(action_id = %record.id, kind = %record.kind, error = %msg, "Action failed");
                self.actions.transition(
                    record.id,
                    &record.user_id,
                    ActionStatus::Queued,
                    TransitionPatch::Failed { error: &msg },
                )?;
                Ok(Outcome::failed(record.id, msg))
            }
        }
    }

    // ---- notifications ----

    async fn dispatch_approval_needed(&self, record: &ActionRecord) {
        let req = NotificationRequest::new(
            record.user_id.clone(),
            NotificationKind::ApprovalNeeded,
            "Approval needed",
            record.description.clone(),
        )
        .with_priority(NotificationPriority::High)
        .with_action_link(format!("/actions/{}", record.id), "Review")
        .with_related_action(record.id);
        self.dispatch(record, req).await;
    }

    async fn dispatch_action_notice(&self, record: &ActionRecord) {
        let req = NotificationRequest::new(
            record.user_id.clone(),
            NotificationKind::ActionNotice,
            "Action started",
            record.description.clone(),
        )
        .with_related_action(record.id)
        .with_expiry(NOTICE_RETENTION_SECS);
        self.dispatch(record, req).await;
    }

    async fn dispatch_action_completed(
        &self,
        record: &ActionRecord,
        undo_deadline: Option<Timestamp>,
    ) {
        let message = if undo_deadline.is_some() {
            format!("{} (undo available for 5 minutes)", record.description)
        } else {
            record.description.clone()
        };
        let req = NotificationRequest::new(
            record.user_id.clone(),
            NotificationKind::ActionCompleted,
            "Action completed",
            message,
        )
        .with_related_action(record.id)
        .with_expiry(NOTICE_RETENTION_SECS);
        self.dispatch(record, req).await;
    }

    /// Send one notification and record which channels took it. Both the
    /// send and the bookkeeping are best effort.
    async fn dispatch(&self, record: &ActionRecord, req: NotificationRequest) {
        let delivered = self.notifier.send(req).await;
        let channels: Vec<NotifyChannel> = [
            NotifyChannel::InApp,
            NotifyChannel::Email,
            NotifyChannel::Push,
        ]
        .into_iter()
        .filter(|channel| delivered.get(channel).copied().unwrap_or(false))
        .collect();

        if let Err(e) = self
            .actions
            .record_notification(record.id, &channels, Timestamp::now())
        {
            warn!(action_id = %record.id, error = %e, "Failed to record notification channels");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tokio::sync::mpsc;

    use valet_core::plan::{
        ActionParams, CalendarBlockParams, EmailSendParams, MessagePostParams, StatusSetParams,
        UndoData,
    };
    use valet_core::types::{ActionKind, AutonomySetting};
    use valet_notify::{NotificationDispatcher, OutboundEmail};
    use valet_services::{InMemoryServices, ServiceFactory};
    use valet_store::{Database, NotificationRepository, PrefsRepository, SettingsRepository};

    use crate::executor::CalendarBlockExecutor;

    struct Harness {
        engine: ActionEngine,
        services: Arc<InMemoryServices>,
        actions: Arc<ActionRepository>,
        settings: Arc<SettingsRepository>,
        notifications: Arc<NotificationRepository>,
        _outbox_rx: mpsc::Receiver<OutboundEmail>,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::in_memory().unwrap());
        let actions = Arc::new(ActionRepository::new(db.clone()));
        let settings = Arc::new(SettingsRepository::new(db.clone()));
        let notifications = Arc::new(NotificationRepository::new(db.clone()));
        let prefs = Arc::new(PrefsRepository::new(db.clone()));
        let (tx, rx) = mpsc::channel(32);
        let notifier: Arc<dyn Notifier> = Arc::new(NotificationDispatcher::new(
            notifications.clone(),
            prefs,
            tx,
            100,
        ));

        let services = Arc::new(InMemoryServices::new());
        let factory: Arc<dyn ServiceFactory> = services.clone();
        let registry = ExecutorRegistry::with_defaults(factory);
        let engine = ActionEngine::new(
            actions.clone(),
            PolicyResolver::new(settings.clone()),
            registry,
            notifier,
        );

        Harness {
            engine,
            services,
            actions,
            settings,
            notifications,
            _outbox_rx: rx,
        }
    }

    fn plan_calendar() -> Plan {
        Plan {
            action: ActionParams::CalendarBlock(CalendarBlockParams {
                title: "Deep work".to_string(),
                start: Timestamp(1_700_000_000),
                duration_minutes: 50,
            }),
            description: "Block 50 minutes for deep work".to_string(),
            goal_id: None,
        }
    }

    fn plan_send() -> Plan {
        Plan {
            action: ActionParams::EmailSend(EmailSendParams {
                to: vec!["sam@example.com".to_string()],
                cc: vec![],
                subject: "Weekly update".to_string(),
                body: "On track.".to_string(),
            }),
            description: "Send the weekly update to Sam".to_string(),
            goal_id: None,
        }
    }

    fn plan_post() -> Plan {
        Plan {
            action: ActionParams::MessagePost(MessagePostParams {
                channel: "#standup".to_string(),
                message: "Running late".to_string(),
            }),
            description: "Tell #standup you are running late".to_string(),
            goal_id: None,
        }
    }

    fn plan_status(status: &str) -> Plan {
        Plan {
            action: ActionParams::StatusSet(StatusSetParams {
                status: status.to_string(),
                until: None,
            }),
            description: format!("Set status to {}", status),
            goal_id: None,
        }
    }

    struct NullNotifier;

    #[async_trait::async_trait]
    impl Notifier for NullNotifier {
        async fn send(&self, _req: NotificationRequest) -> HashMap<NotifyChannel, bool> {
            HashMap::new()
        }
    }

    // ---- submission paths ----

    #[tokio::test]
    async fn test_high_autonomy_executes_immediately() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_calendar()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, OutcomeStatus::Executed);
        assert!(outcome.undo_deadline.is_some());
        assert_eq!(h.services.events().len(), 1);

        let record = h
            .engine
            .get(outcome.action_id.unwrap(), &user)
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ActionStatus::Executed);
        assert_eq!(record.approved_by, Some(ApprovedBy::Auto));
        assert!(!record.requires_approval);
        assert!(record.notification_sent);
        assert!(record.notified_via.contains(&NotifyChannel::InApp));

        let notices = h.notifications.list_recent(&user, 10).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::ActionCompleted);
    }

    #[tokio::test]
    async fn test_medium_autonomy_notifies_then_executes() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_status("Focused")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Executed);
        assert_eq!(h.services.current_status().as_deref(), Some("Focused"));

        // The heads-up went out; no completion notice for medium.
        let notices = h.notifications.list_recent(&user, 10).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::ActionNotice);

        let record = h
            .engine
            .get(outcome.action_id.unwrap(), &user)
            .unwrap()
            .unwrap();
        assert_eq!(record.autonomy_level_used, AutonomyLevel::Medium);
        assert_eq!(record.approved_by, Some(ApprovedBy::Auto));
        assert!(record.notification_sent);
        // Nothing to restore on a first set, so no undo window opens.
        assert!(outcome.undo_deadline.is_none());
    }

    #[tokio::test]
    async fn test_low_autonomy_waits_for_approval() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, OutcomeStatus::PendingApproval);
        assert!(outcome.result.is_none());
        assert!(h.services.posts().is_empty());

        let record = h
            .engine
            .get(outcome.action_id.unwrap(), &user)
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ActionStatus::PendingApproval);
        assert!(record.requires_approval);
        assert!(record.approved_by.is_none());

        let notices = h.notifications.list_recent(&user, 10).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::ApprovalNeeded);
        assert_eq!(notices[0].priority, NotificationPriority::High);
        assert_eq!(
            notices[0].action_url.as_deref(),
            Some(format!("/actions/{}", record.id).as_str())
        );
    }

    #[tokio::test]
    async fn test_invalid_plan_leaves_no_record() {
        let h = harness();
        let user = UserId::new("alice");

        let plan = Plan {
            action: ActionParams::CalendarBlock(CalendarBlockParams {
                title: "   ".to_string(),
                start: Timestamp(1_700_000_000),
                duration_minutes: 50,
            }),
            description: "Block focus time".to_string(),
            goal_id: None,
        };
        let outcome = h.engine.submit(&user, plan).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, OutcomeStatus::Invalid);
        assert!(outcome.action_id.is_none());
        assert_eq!(h.actions.count().unwrap(), 0);
        assert!(h.notifications.list_recent(&user, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_invalid_without_record() {
        let db = Arc::new(Database::in_memory().unwrap());
        let actions = Arc::new(ActionRepository::new(db.clone()));
        let settings = Arc::new(SettingsRepository::new(db.clone()));
        let services = Arc::new(InMemoryServices::new());

        // Only the calendar executor is wired.
        let mut registry = ExecutorRegistry::new();
        let factory: Arc<dyn ServiceFactory> = services;
        registry.register(Arc::new(CalendarBlockExecutor::new(factory)));

        let engine = ActionEngine::new(
            actions.clone(),
            PolicyResolver::new(settings),
            registry,
            Arc::new(NullNotifier),
        );

        let outcome = engine
            .submit(&UserId::new("alice"), plan_post())
            .await
            .unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Invalid);
        assert_eq!(actions.count().unwrap(), 0);
    }

    // ---- policy interaction ----

    #[tokio::test]
    async fn test_override_changes_submission_path() {
        let h = harness();
        let user = UserId::new("alice");

        // Stock policy parks an email send for approval.
        let outcome = h.engine.submit(&user, plan_send()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::PendingApproval);
        assert!(h.services.sent_emails().is_empty());

        // Granting high autonomy flips the same plan to immediate execution.
        h.settings
            .upsert(&AutonomySetting {
                user_id: user.clone(),
                kind: ActionKind::EmailSend,
                level: AutonomyLevel::High,
                require_notification: true,
                require_confirmation: false,
                updated_at: Timestamp::now(),
            })
            .unwrap();

        let outcome = h.engine.submit(&user, plan_send()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Executed);
        assert_eq!(h.services.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn test_level_is_frozen_at_submission() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        // Raising autonomy after the fact changes nothing for the record
        // already in flight.
        h.settings
            .upsert(&AutonomySetting {
                user_id: user.clone(),
                kind: ActionKind::MessagePost,
                level: AutonomyLevel::High,
                require_notification: true,
                require_confirmation: false,
                updated_at: Timestamp::now(),
            })
            .unwrap();

        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::PendingApproval);
        assert_eq!(record.autonomy_level_used, AutonomyLevel::Low);

        let approved = h.engine.approve(id, &user).await.unwrap();
        assert_eq!(approved.status, OutcomeStatus::Executed);
        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.autonomy_level_used, AutonomyLevel::Low);
    }

    // ---- approval and rejection ----

    #[tokio::test]
    async fn test_approve_executes_as_user() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        let approved = h.engine.approve(id, &user).await.unwrap();
        assert!(approved.success);
        assert_eq!(approved.status, OutcomeStatus::Executed);
        assert_eq!(h.services.posts().len(), 1);

        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Executed);
        assert_eq!(record.approved_by, Some(ApprovedBy::User));
        assert!(record.approved_at.is_some());

        // Approval notice plus completion notice.
        let kinds: Vec<NotificationKind> = h
            .notifications
            .list_recent(&user, 10)
            .unwrap()
            .iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::ApprovalNeeded));
        assert!(kinds.contains(&NotificationKind::ActionCompleted));
    }

    #[tokio::test]
    async fn test_second_approve_is_not_found() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        let first = h.engine.approve(id, &user).await.unwrap();
        let second = h.engine.approve(id, &user).await.unwrap();
        assert_eq!(first.status, OutcomeStatus::Executed);
        assert_eq!(second.status, OutcomeStatus::NotFound);
        assert!(!second.success);
        assert_eq!(h.services.posts().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_approvals_execute_once() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        let engine = Arc::new(h.engine);
        let (a, b) = (engine.clone(), engine.clone());
        let (user_a, user_b) = (user.clone(), user.clone());
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.approve(id, &user_a).await.unwrap() }),
            tokio::spawn(async move { b.approve(id, &user_b).await.unwrap() }),
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        let executed = [&ra, &rb]
            .iter()
            .filter(|o| o.status == OutcomeStatus::Executed)
            .count();
        let not_found = [&ra, &rb]
            .iter()
            .filter(|o| o.status == OutcomeStatus::NotFound)
            .count();
        assert_eq!(executed, 1);
        assert_eq!(not_found, 1);
        assert_eq!(h.services.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_scoped_to_owner() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        let foreign = h.engine.approve(id, &UserId::new("mallory")).await.unwrap();
        assert_eq!(foreign.status, OutcomeStatus::NotFound);
        assert!(h.services.posts().is_empty());

        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::PendingApproval);
    }

    #[tokio::test]
    async fn test_reject_blocks_later_approval() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        assert!(h.engine.reject(id, &user, Some("not today")).await.unwrap());
        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Rejected);
        assert_eq!(record.rejection_reason.as_deref(), Some("not today"));

        let approved = h.engine.approve(id, &user).await.unwrap();
        assert_eq!(approved.status, OutcomeStatus::NotFound);
        assert!(h.services.posts().is_empty());

        // Second reject finds nothing pending.
        assert!(!h.engine.reject(id, &user, None).await.unwrap());
    }

    // ---- failure containment ----

    #[tokio::test]
    async fn test_executor_failure_marks_record_failed() {
        let h = harness();
        let user = UserId::new("alice");
        h.services.set_failing("calendar", true);

        let outcome = h.engine.submit(&user, plan_calendar()).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        let error = outcome.error.unwrap();
        assert!(error.contains("simulated outage"));

        let record = h
            .engine
            .get(outcome.action_id.unwrap(), &user)
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ActionStatus::Failed);
        assert!(record.error.unwrap().contains("simulated outage"));
        assert!(record.result.is_none());
        assert!(record.undo_deadline.is_none());

        // No completion notice for a failed high-autonomy action.
        assert!(h.notifications.list_recent(&user, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approved_execution_failure_marks_record_failed() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_post()).await.unwrap();
        let id = outcome.action_id.unwrap();

        h.services.set_failing("chat", true);
        let approved = h.engine.approve(id, &user).await.unwrap();
        assert_eq!(approved.status, OutcomeStatus::Failed);

        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Failed);
        // Approval metadata only lands on a successful execution.
        assert_eq!(record.approved_by, None);
    }

    #[tokio::test]
    async fn test_notifier_failure_never_blocks_execution() {
        let db = Arc::new(Database::in_memory().unwrap());
        let actions = Arc::new(ActionRepository::new(db.clone()));
        let settings = Arc::new(SettingsRepository::new(db.clone()));
        let services = Arc::new(InMemoryServices::new());
        let factory: Arc<dyn ServiceFactory> = services.clone();

        let engine = ActionEngine::new(
            actions,
            PolicyResolver::new(settings),
            ExecutorRegistry::with_defaults(factory),
            Arc::new(NullNotifier),
        );

        let user = UserId::new("alice");
        let outcome = engine.submit(&user, plan_calendar()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Executed);
        assert_eq!(services.events().len(), 1);

        let record = engine.get(outcome.action_id.unwrap(), &user).unwrap().unwrap();
        assert!(!record.notification_sent);
        assert!(record.notified_via.is_empty());
    }

    // ---- undo ----

    #[tokio::test]
    async fn test_undo_within_window() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_calendar()).await.unwrap();
        let id = outcome.action_id.unwrap();

        assert!(h.engine.undo(id, &user).await.unwrap());
        assert_eq!(h.services.deleted_events(), vec!["evt-1".to_string()]);

        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Undone);
        assert!(record.undone_at.is_some());
    }

    #[tokio::test]
    async fn test_undo_twice_refused() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_calendar()).await.unwrap();
        let id = outcome.action_id.unwrap();

        assert!(h.engine.undo(id, &user).await.unwrap());
        assert!(!h.engine.undo(id, &user).await.unwrap());
        // The service saw exactly one delete.
        assert_eq!(h.services.deleted_events().len(), 1);
    }

    #[tokio::test]
    async fn test_undo_after_window_refused() {
        let h = harness();
        let user = UserId::new("alice");

        // A record whose window closed ten seconds ago.
        let mut record = ActionRecord::new(user.clone(), plan_calendar(), AutonomyLevel::High);
        record.status = ActionStatus::Executed;
        record.result = Some(ActionReceipt::CalendarBlock {
            event_id: "evt-1".to_string(),
            calendar_id: "primary".to_string(),
        });
        record.undo_data = Some(UndoData::CalendarBlock {
            event_id: "evt-1".to_string(),
            calendar_id: "primary".to_string(),
        });
        record.undo_deadline = Some(Timestamp::now().plus_seconds(-10));
        h.actions.insert(&record).unwrap();

        assert!(!h.engine.undo(record.id, &user).await.unwrap());
        let found = h.engine.get(record.id, &user).unwrap().unwrap();
        assert_eq!(found.status, ActionStatus::Executed);
    }

    #[tokio::test]
    async fn test_undo_non_undoable_kind_refused() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_send()).await.unwrap();
        let id = outcome.action_id.unwrap();
        let approved = h.engine.approve(id, &user).await.unwrap();
        assert_eq!(approved.status, OutcomeStatus::Executed);
        // A sent email never opens a window.
        assert!(approved.undo_deadline.is_none());

        assert!(!h.engine.undo(id, &user).await.unwrap());
    }

    #[tokio::test]
    async fn test_undo_unknown_record_refused() {
        let h = harness();
        assert!(!h
            .engine
            .undo(Uuid::new_v4(), &UserId::new("alice"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_status_set_without_previous_has_no_undo() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_status("focused")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Executed);
        assert!(outcome.undo_deadline.is_none());

        let id = outcome.action_id.unwrap();
        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert!(record.is_undoable);
        assert!(record.undo_data.is_none());
        assert!(record.undo_deadline.is_none());

        assert!(!h.engine.undo(id, &user).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_set_undo_restores_previous() {
        let h = harness();
        let user = UserId::new("alice");

        h.engine.submit(&user, plan_status("available")).await.unwrap();
        let outcome = h.engine.submit(&user, plan_status("focused")).await.unwrap();
        assert!(outcome.undo_deadline.is_some());

        assert!(h.engine.undo(outcome.action_id.unwrap(), &user).await.unwrap());
        assert_eq!(h.services.current_status().as_deref(), Some("available"));
    }

    #[tokio::test]
    async fn test_failed_undo_leaves_record_retryable() {
        let h = harness();
        let user = UserId::new("alice");

        let outcome = h.engine.submit(&user, plan_calendar()).await.unwrap();
        let id = outcome.action_id.unwrap();

        h.services.set_failing("calendar", true);
        assert!(!h.engine.undo(id, &user).await.unwrap());
        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Executed);

        // Service recovers inside the window; the retry succeeds.
        h.services.set_failing("calendar", false);
        assert!(h.engine.undo(id, &user).await.unwrap());
        let record = h.engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Undone);
    }

    #[tokio::test]
    async fn test_missing_undo_handler_refused_quietly() {
        let db = Arc::new(Database::in_memory().unwrap());
        let actions = Arc::new(ActionRepository::new(db.clone()));
        let settings = Arc::new(SettingsRepository::new(db.clone()));
        let services = Arc::new(InMemoryServices::new());
        let factory: Arc<dyn ServiceFactory> = services;

        // Executor wired, undo handler forgotten.
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(CalendarBlockExecutor::new(factory)));

        let engine = ActionEngine::new(
            actions,
            PolicyResolver::new(settings),
            registry,
            Arc::new(NullNotifier),
        );

        let user = UserId::new("alice");
        let outcome = engine.submit(&user, plan_calendar()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Executed);

        let id = outcome.action_id.unwrap();
        assert!(!engine.undo(id, &user).await.unwrap());
        let record = engine.get(id, &user).unwrap().unwrap();
        assert_eq!(record.status, ActionStatus::Executed);
    }

    // ---- queries ----

    #[tokio::test]
    async fn test_listings() {
        let h = harness();
        let user = UserId::new("alice");

        h.engine.submit(&user, plan_post()).await.unwrap();
        h.engine.submit(&user, plan_calendar()).await.unwrap();
        h.engine.submit(&UserId::new("bob"), plan_post()).await.unwrap();

        let pending = h.engine.list_pending(&user).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, ActionKind::MessagePost);

        let all = h.engine.list(&user, None, 50).unwrap();
        assert_eq!(all.len(), 2);

        let executed = h
            .engine
            .list(&user, Some(ActionStatus::Executed), 50)
            .unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].kind, ActionKind::CalendarBlock);
    }

    // ---- outcome wire shape ----

    #[test]
    fn test_outcome_serializes_snake_case() {
        let outcome = Outcome::executed(
            Uuid::new_v4(),
            ActionReceipt::EmailSend {
                message_id: "msg-1".to_string(),
            },
            Some(Timestamp(1_700_000_300)),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "executed");
        assert_eq!(value["success"], true);
        assert_eq!(value["undo_deadline"], 1_700_000_300);
        assert_eq!(value["result"]["kind"], "email_send");

        let not_found = serde_json::to_value(Outcome::not_found()).unwrap();
        assert_eq!(not_found["status"], "not_found");
        assert!(not_found["action_id"].is_null());
    }
}
