use std::ops::Deref;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::error::CacheError;
use super::inflight::{InFlight, InFlightGuard, OperationClass};
use super::mutation::{Mutation, MutationKind};
use crate::gateway::{GatewayError, TaskGateway};
use crate::model::{FilterCriteria, Session, Task, TaskId};

const EVENTS_CAPACITY: usize = 64;

/// Point-in-time view of the cached task collection.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    tasks: Arc<Vec<Task>>,
}

impl Snapshot {
    /// Bumped on every change the store makes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

impl Deref for Snapshot {
    type Target = [Task];

    fn deref(&self) -> &Self::Target {
        &self.tasks
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SnapshotChanged { version: u64 },
    RefreshFailed(CacheError),
    MutationFailed {
        task_id: TaskId,
        kind: MutationKind,
        error: CacheError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { version: u64 },
    /// A newer refresh started while this one was in flight.
    Superseded,
}

struct StoreState {
    tasks: Arc<Vec<Task>>,
    version: u64,
    // advances whenever server truth replaces the snapshot
    refresh_epoch: u64,
    latest_refresh: u64,
    criteria: FilterCriteria,
}

struct Rollback {
    tasks: Arc<Vec<Task>>,
    refresh_epoch: u64,
}

/// Client-side cache of the task collection.
///
/// All reads are synchronous. Writes go through [`TaskCacheStore::mutate`],
/// which applies the optimistic effect before returning, and are settled by
/// [`PendingMutation::submit`]. Refresh results always win: a refresh that
/// lands while a mutation is outstanding voids that mutation's rollback.
pub struct TaskCacheStore<G: TaskGateway> {
    gateway: G,
    session: RwLock<Session>,
    state: Mutex<StoreState>,
    in_flight: Mutex<InFlight>,
    events: broadcast::Sender<StoreEvent>,
    next_placeholder: AtomicI64,
}

impl<G: TaskGateway> TaskCacheStore<G> {
    pub fn new(gateway: G, session: Session) -> Self {
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        Self {
            gateway,
            session: RwLock::new(session),
            state: Mutex::new(StoreState {
                tasks: Arc::new(vec![]),
                version: 0,
                refresh_epoch: 0,
                latest_refresh: 0,
                criteria: FilterCriteria::default(),
            }),
            in_flight: Mutex::new(InFlight::default()),
            events,
            next_placeholder: AtomicI64::new(-1),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn read(&self) -> Snapshot {
        let state = self.state.lock();
        Snapshot {
            version: state.version,
            tasks: state.tasks.clone(),
        }
    }

    /// Criteria of the most recent refresh.
    pub fn criteria(&self) -> FilterCriteria {
        self.state.lock().criteria.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Swaps credentials. A different identity drops everything cached for
    /// the previous one, including refreshes still in flight.
    pub fn set_session(&self, session: Session) {
        let changed = {
            let mut current = self.session.write();
            let changed = current.owner_id() != session.owner_id()
                || current.is_authenticated() != session.is_authenticated();
            *current = session;
            changed
        };
        if changed {
            let version = {
                let mut state = self.state.lock();
                state.tasks = Arc::new(vec![]);
                state.version += 1;
                state.refresh_epoch += 1;
                state.latest_refresh += 1;
                state.version
            };
            info!("session changed, task cache cleared");
            self.notify(StoreEvent::SnapshotChanged { version });
        }
    }

    pub fn in_flight(&self, class: OperationClass) -> usize {
        self.in_flight.lock().count(class)
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight(OperationClass::List) > 0
    }

    /// Fetches the collection and replaces the snapshot with it, unless a
    /// newer refresh was started in the meantime.
    #[instrument(skip(self))]
    pub async fn refresh(&self, criteria: FilterCriteria) -> Result<RefreshOutcome, CacheError> {
        let generation = {
            let mut state = self.state.lock();
            state.latest_refresh += 1;
            state.criteria = criteria.clone();
            state.latest_refresh
        };
        let session = self.session();
        let _in_flight = InFlightGuard::enter(&self.in_flight, OperationClass::List);

        let result = self.gateway.list(&session, &criteria).await;

        let applied = {
            let mut state = self.state.lock();
            if generation != state.latest_refresh {
                debug!(
                    generation,
                    latest = state.latest_refresh,
                    "discarding superseded refresh"
                );
                return Ok(RefreshOutcome::Superseded);
            }
            result.map(|tasks| {
                state.tasks = Arc::new(tasks);
                state.version += 1;
                state.refresh_epoch += 1;
                (state.version, state.tasks.len())
            })
        };

        match applied {
            Ok((version, count)) => {
                debug!(generation, version, count, "snapshot refreshed");
                self.notify(StoreEvent::SnapshotChanged { version });
                Ok(RefreshOutcome::Applied { version })
            }
            Err(err) => {
                let err = CacheError::from(err);
                warn!(generation, reason = %err, "refresh failed, keeping previous snapshot");
                self.notify(StoreEvent::RefreshFailed(err.clone()));
                Err(err)
            }
        }
    }

    /// Refreshes with the criteria of the last refresh.
    pub async fn invalidate(&self) -> Result<RefreshOutcome, CacheError> {
        let criteria = self.criteria();
        self.refresh(criteria).await
    }

    /// Validates `mutation`, captures the rollback snapshot and applies the
    /// optimistic effect before returning. Nothing is sent until the returned
    /// [`PendingMutation`] is submitted; dropping it rolls the effect back.
    pub fn mutate(&self, mutation: Mutation) -> Result<PendingMutation<'_, G>, CacheError> {
        mutation.validate()?;
        let session = self.session();
        if !session.is_authenticated() {
            return Err(GatewayError::Unauthenticated.into());
        }
        if let Some(id) = mutation.target().filter(|id| id.is_provisional()) {
            return Err(CacheError::ProvisionalTask(id));
        }

        let subject = mutation.target().unwrap_or_else(|| {
            TaskId::new(self.next_placeholder.fetch_sub(1, Ordering::SeqCst))
        });
        let owner = session.owner_id().unwrap_or_default();

        let (rollback, version) = {
            let mut state = self.state.lock();
            let rollback = Rollback {
                tasks: state.tasks.clone(),
                refresh_epoch: state.refresh_epoch,
            };
            let mut tasks = state.tasks.as_ref().clone();
            mutation.apply_optimistic(&mut tasks, subject, owner);
            state.tasks = Arc::new(tasks);
            state.version += 1;
            (rollback, state.version)
        };
        debug!(kind = %mutation.kind(), task_id = %subject, version, "optimistic update applied");
        self.notify(StoreEvent::SnapshotChanged { version });

        Ok(PendingMutation {
            store: self,
            _in_flight: InFlightGuard::enter(&self.in_flight, OperationClass::Mutate(subject)),
            mutation,
            subject,
            session,
            rollback: Some(rollback),
        })
    }

    // Swaps the optimistic copy for the server's version when it is still there.
    fn commit(&self, subject: TaskId, confirmed: Option<&Task>) {
        let Some(confirmed) = confirmed else {
            return;
        };
        let version = {
            let mut state = self.state.lock();
            let Some(position) = state.tasks.iter().position(|t| t.id == subject) else {
                return;
            };
            let mut tasks = state.tasks.as_ref().clone();
            tasks[position] = confirmed.clone();
            state.tasks = Arc::new(tasks);
            state.version += 1;
            state.version
        };
        self.notify(StoreEvent::SnapshotChanged { version });
    }

    fn rollback(&self, rollback: Rollback, subject: TaskId) {
        let version = {
            let mut state = self.state.lock();
            if state.refresh_epoch != rollback.refresh_epoch {
                debug!(task_id = %subject, "snapshot refreshed since capture, rollback skipped");
                return;
            }
            state.tasks = rollback.tasks;
            state.version += 1;
            state.version
        };
        debug!(task_id = %subject, version, "optimistic update rolled back");
        self.notify(StoreEvent::SnapshotChanged { version });
    }

    fn notify(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// A mutation whose optimistic effect is visible and whose request has not
/// been settled yet. Holds the only rollback snapshot for it.
#[must_use = "dropping a pending mutation rolls it back"]
pub struct PendingMutation<'a, G: TaskGateway> {
    store: &'a TaskCacheStore<G>,
    _in_flight: InFlightGuard<'a>,
    mutation: Mutation,
    subject: TaskId,
    session: Session,
    rollback: Option<Rollback>,
}

impl<'a, G: TaskGateway> PendingMutation<'a, G> {
    /// Id of the addressed task, or the placeholder id of a created one.
    pub fn subject(&self) -> TaskId {
        self.subject
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Sends the mutation. On success the confirmed task replaces its
    /// optimistic copy; the confirmed task is returned (`None` for deletes).
    /// On failure the pre-mutation snapshot is restored and the error
    /// returned. Either way the store refreshes before this returns, since a
    /// restored snapshot may still carry other mutations' optimistic effects.
    #[instrument(skip(self), fields(kind = %self.mutation.kind(), task_id = %self.subject))]
    pub async fn submit(mut self) -> Result<Option<Task>, CacheError> {
        let gateway = self.store.gateway();
        let result = match &self.mutation {
            Mutation::Create(draft) => gateway.create(&self.session, draft).await.map(Some),
            Mutation::Update(id, patch) => gateway.update(&self.session, *id, patch).await.map(Some),
            Mutation::Delete(id) => gateway.delete(&self.session, *id).await.map(|_| None),
        };

        match result {
            Ok(confirmed) => {
                self.rollback = None;
                self.store.commit(self.subject, confirmed.as_ref());
                info!("mutation confirmed");
                if let Err(err) = self.store.invalidate().await {
                    // already reported to subscribers by refresh
                    warn!(reason = %err, "reconciling refresh after confirmation failed");
                }
                Ok(confirmed)
            }
            Err(err) => {
                let err = CacheError::from(err);
                warn!(reason = %err, "mutation rejected, rolling back");
                if let Some(rollback) = self.rollback.take() {
                    self.store.rollback(rollback, self.subject);
                }
                self.store.notify(StoreEvent::MutationFailed {
                    task_id: self.subject,
                    kind: self.mutation.kind(),
                    error: err.clone(),
                });
                if let Err(reason) = self.store.invalidate().await {
                    warn!(reason = %reason, "reconciling refresh after rejection failed");
                }
                Err(err)
            }
        }
    }
}

impl<G: TaskGateway> Drop for PendingMutation<'_, G> {
    fn drop(&mut self) {
        if let Some(rollback) = self.rollback.take() {
            self.store.rollback(rollback, self.subject);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        ChannelTaskGateway, GatewayRequest, GatewayResponse, MemoryTaskGateway,
    };
    use crate::model::{TaskDraft, TaskPatch, TaskStatus};
    use crate::testing::{ids, statuses, task};

    fn session() -> Session {
        Session::bearer("tok", Some(1))
    }

    async fn seeded(tasks: Vec<Task>) -> TaskCacheStore<MemoryTaskGateway> {
        let store = TaskCacheStore::new(MemoryTaskGateway::with_tasks(tasks), session());
        store.refresh(FilterCriteria::default()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        // GIVEN
        let store = TaskCacheStore::new(
            MemoryTaskGateway::with_tasks(vec![
                task(1, "a", TaskStatus::Todo),
                task(2, "b", TaskStatus::Done),
            ]),
            session(),
        );
        assert!(store.read().is_empty());

        // WHEN
        let outcome = store.refresh(FilterCriteria::default()).await.unwrap();

        // THEN
        let snapshot = store.read();
        assert_eq!(outcome, RefreshOutcome::Applied { version: snapshot.version() });
        assert_eq!(ids(&snapshot), vec![1, 2]);
        assert!(!store.is_fetching());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        // GIVEN
        let store = seeded(vec![task(1, "a", TaskStatus::Todo)]).await;
        let before = store.read();
        let mut events = store.subscribe();
        store
            .gateway()
            .fail_next(GatewayError::Unreachable("connection refused".into()));

        // WHEN
        let err = store.refresh(FilterCriteria::default()).await.unwrap_err();

        // THEN
        assert_eq!(
            err,
            CacheError::Gateway(GatewayError::Unreachable("connection refused".into()))
        );
        assert_eq!(store.read().tasks(), before.tasks());
        assert_eq!(store.read().version(), before.version());
        assert_eq!(events.try_recv().unwrap(), StoreEvent::RefreshFailed(err));
    }

    #[tokio::test]
    async fn test_update_is_visible_before_the_request_resolves() {
        // GIVEN
        let (gateway, mut rx) = ChannelTaskGateway::new(8);
        let store = TaskCacheStore::new(gateway, session());
        let seed = async {
            let (_, responder) = rx.recv().await.unwrap();
            responder
                .send(GatewayResponse::List(vec![
                    task(1, "a", TaskStatus::Todo),
                    task(2, "b", TaskStatus::Done),
                ]))
                .unwrap();
        };
        let (seeded, ()) = tokio::join!(store.refresh(FilterCriteria::default()), seed);
        seeded.unwrap();

        // WHEN
        let pending = store
            .mutate(Mutation::Update(
                TaskId::new(1),
                TaskPatch::status(TaskStatus::Done),
            ))
            .unwrap();

        // THEN
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::Done), (2, TaskStatus::Done)]
        );
        assert_eq!(store.in_flight(OperationClass::Mutate(TaskId::new(1))), 1);

        let host = async {
            let (request, responder) = rx.recv().await.unwrap();
            assert_eq!(
                request,
                GatewayRequest::Update(TaskId::new(1), TaskPatch::status(TaskStatus::Done))
            );
            assert_eq!(store.read().get(TaskId::new(1)).unwrap().status, TaskStatus::Done);
            responder
                .send(GatewayResponse::Task(task(1, "a", TaskStatus::Done)))
                .unwrap();

            let (request, responder) = rx.recv().await.unwrap();
            assert_eq!(request, GatewayRequest::List(FilterCriteria::default()));
            responder
                .send(GatewayResponse::List(vec![
                    task(1, "a", TaskStatus::Done),
                    task(2, "b", TaskStatus::Done),
                ]))
                .unwrap();
        };
        let (confirmed, ()) = tokio::join!(pending.submit(), host);

        assert_eq!(confirmed.unwrap().unwrap().status, TaskStatus::Done);
        assert_eq!(store.in_flight(OperationClass::Mutate(TaskId::new(1))), 0);
    }

    #[tokio::test]
    async fn test_failed_update_restores_exact_snapshot() {
        // GIVEN
        let store = seeded(vec![
            task(1, "a", TaskStatus::Todo),
            task(2, "b", TaskStatus::InProgress),
        ])
        .await;
        let before = store.read();
        let mut events = store.subscribe();
        store.gateway().fail_next(GatewayError::RemoteRejected {
            status: 404,
            message: "Task not found".into(),
        });

        // WHEN
        let pending = store
            .mutate(Mutation::Update(
                TaskId::new(2),
                TaskPatch::status(TaskStatus::Done),
            ))
            .unwrap();
        assert_eq!(store.read().get(TaskId::new(2)).unwrap().status, TaskStatus::Done);
        let err = pending.submit().await.unwrap_err();

        // THEN
        assert_eq!(err.to_string(), "request rejected with status 404: Task not found");
        assert_eq!(store.read().tasks(), before.tasks());
        let mut seen = vec![];
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&StoreEvent::MutationFailed {
            task_id: TaskId::new(2),
            kind: MutationKind::Update,
            error: err
        }));
    }

    #[tokio::test]
    async fn test_failed_delete_restores_task() {
        let store = seeded(vec![task(1, "a", TaskStatus::Todo), task(2, "b", TaskStatus::Todo)]).await;
        let before = store.read();
        store
            .gateway()
            .fail_next(GatewayError::Unreachable("timeout".into()));

        let pending = store.mutate(Mutation::Delete(TaskId::new(1))).unwrap();
        assert_eq!(ids(&store.read()), vec![2]);
        pending.submit().await.unwrap_err();

        assert_eq!(store.read().tasks(), before.tasks());
    }

    #[tokio::test]
    async fn test_create_swaps_placeholder_for_server_task() {
        // GIVEN
        let store = seeded(vec![task(1, "a", TaskStatus::Done)]).await;

        // WHEN
        let pending = store
            .mutate(Mutation::Create(TaskDraft::new("Write docs").with_priority(2)))
            .unwrap();
        let placeholder = pending.subject();

        // THEN
        assert!(placeholder.is_provisional());
        let optimistic = store.read();
        let provisional = optimistic.get(placeholder).unwrap();
        assert_eq!(provisional.status, TaskStatus::Todo);
        assert_eq!(provisional.owner_id, 1);
        assert_eq!(ids(&optimistic), vec![1, placeholder.get()]);

        let created = pending.submit().await.unwrap().unwrap();
        assert_eq!(created.id, TaskId::new(2));
        assert_eq!(ids(&store.read()), vec![1, 2]);
        assert!(store.read().iter().all(|t| !t.is_provisional()));
        // seed refresh, create, reconciling refresh
        assert_eq!(store.gateway().calls(), 3);
    }

    #[tokio::test]
    async fn test_placeholders_are_unique() {
        let store = seeded(vec![]).await;

        let first = store.mutate(Mutation::Create(TaskDraft::new("a"))).unwrap();
        let second = store.mutate(Mutation::Create(TaskDraft::new("b"))).unwrap();

        assert_ne!(first.subject(), second.subject());
        assert_eq!(store.read().len(), 2);
        drop(second);
        drop(first);
        assert!(store.read().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mutation_applies_nothing() {
        let store = seeded(vec![task(1, "a", TaskStatus::Todo)]).await;
        let before = store.read();
        let calls = store.gateway().calls();

        let err = store
            .mutate(Mutation::Create(TaskDraft::new("").with_priority(8)))
            .err()
            .unwrap();

        assert!(matches!(err, CacheError::Validation(_)));
        assert_eq!(store.read().version(), before.version());
        assert_eq!(store.gateway().calls(), calls);
    }

    #[tokio::test]
    async fn test_anonymous_mutation_is_refused_up_front() {
        let store = seeded(vec![task(1, "a", TaskStatus::Todo)]).await;
        store.set_session(Session::bearer("tok", Some(1)));
        let before = store.read();
        let calls = store.gateway().calls();
        store.set_session(Session::anonymous());
        let cleared = store.read();

        let err = store.mutate(Mutation::Delete(TaskId::new(1))).err().unwrap();

        assert!(err.is_unauthenticated());
        assert!(cleared.is_empty());
        assert!(cleared.version() > before.version());
        assert_eq!(store.read().version(), cleared.version());
        assert_eq!(store.gateway().calls(), calls);
    }

    #[tokio::test]
    async fn test_provisional_task_cannot_be_updated() {
        let store = seeded(vec![]).await;
        let pending = store.mutate(Mutation::Create(TaskDraft::new("a"))).unwrap();
        let placeholder = pending.subject();

        let err = store
            .mutate(Mutation::Update(placeholder, TaskPatch::status(TaskStatus::Done)))
            .err()
            .unwrap();

        assert_eq!(err, CacheError::ProvisionalTask(placeholder));
        drop(pending);
    }

    #[tokio::test]
    async fn test_dropped_mutation_rolls_back_without_request() {
        let store = seeded(vec![task(1, "a", TaskStatus::Todo)]).await;
        let before = store.read();
        let calls = store.gateway().calls();

        let pending = store.mutate(Mutation::Delete(TaskId::new(1))).unwrap();
        assert!(store.read().is_empty());
        drop(pending);

        assert_eq!(store.read().tasks(), before.tasks());
        assert_eq!(store.gateway().calls(), calls);
        assert_eq!(store.in_flight(OperationClass::Mutate(TaskId::new(1))), 0);
    }

    #[tokio::test]
    async fn test_latest_refresh_wins() {
        // GIVEN
        let (gateway, mut rx) = ChannelTaskGateway::new(8);
        let store = TaskCacheStore::new(gateway, session());
        let criteria_a = FilterCriteria::default().with_status(TaskStatus::Todo);
        let criteria_b = FilterCriteria::default().with_status(TaskStatus::Done);

        // WHEN request B resolves before request A
        let host = async {
            let (request_a, responder_a) = rx.recv().await.unwrap();
            let (request_b, responder_b) = rx.recv().await.unwrap();
            assert_eq!(request_a, GatewayRequest::List(criteria_a.clone()));
            assert_eq!(request_b, GatewayRequest::List(criteria_b.clone()));
            responder_b
                .send(GatewayResponse::List(vec![task(2, "b", TaskStatus::Done)]))
                .unwrap();
            while store.read().version() == 0 {
                tokio::task::yield_now().await;
            }
            responder_a
                .send(GatewayResponse::List(vec![task(1, "a", TaskStatus::Todo)]))
                .unwrap();
        };
        let (a, b, ()) = tokio::join!(
            store.refresh(criteria_a.clone()),
            store.refresh(criteria_b.clone()),
            host
        );

        // THEN
        assert_eq!(a.unwrap(), RefreshOutcome::Superseded);
        assert!(matches!(b.unwrap(), RefreshOutcome::Applied { .. }));
        assert_eq!(ids(&store.read()), vec![2]);
        assert_eq!(store.criteria(), criteria_b);
    }

    #[tokio::test]
    async fn test_superseded_failure_is_ignored() {
        let (gateway, mut rx) = ChannelTaskGateway::new(8);
        let store = TaskCacheStore::new(gateway, session());
        let mut events = store.subscribe();

        let host = async {
            let (_, responder_a) = rx.recv().await.unwrap();
            let (_, responder_b) = rx.recv().await.unwrap();
            responder_b.send(GatewayResponse::List(vec![])).unwrap();
            responder_a
                .send(GatewayResponse::Error(GatewayError::Unreachable("late".into())))
                .unwrap();
        };
        let (a, b, ()) = tokio::join!(
            store.refresh(FilterCriteria::default()),
            store.refresh(FilterCriteria::default()),
            host
        );

        assert_eq!(a.unwrap(), RefreshOutcome::Superseded);
        assert!(b.is_ok());
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, StoreEvent::RefreshFailed(_)));
        }
    }

    #[tokio::test]
    async fn test_refresh_during_mutation_beats_rollback() {
        // GIVEN
        let (gateway, mut rx) = ChannelTaskGateway::new(8);
        let store = TaskCacheStore::new(gateway, session());
        let seed = async {
            let (_, responder) = rx.recv().await.unwrap();
            responder
                .send(GatewayResponse::List(vec![task(1, "a", TaskStatus::Todo)]))
                .unwrap();
        };
        let (seeded, ()) = tokio::join!(store.refresh(FilterCriteria::default()), seed);
        seeded.unwrap();

        let pending = store
            .mutate(Mutation::Update(
                TaskId::new(1),
                TaskPatch::status(TaskStatus::Done),
            ))
            .unwrap();
        let optimistic_version = store.read().version();

        // WHEN the server snapshot lands before the mutation fails
        let host = async {
            let (first, first_responder) = rx.recv().await.unwrap();
            let (second, second_responder) = rx.recv().await.unwrap();
            let (update, list) = match (&first, &second) {
                (GatewayRequest::Update(..), GatewayRequest::List(_)) => {
                    (first_responder, second_responder)
                }
                _ => (second_responder, first_responder),
            };
            list.send(GatewayResponse::List(vec![
                task(1, "a", TaskStatus::InProgress),
                task(3, "c", TaskStatus::Todo),
            ]))
            .unwrap();
            while store.read().version() == optimistic_version {
                tokio::task::yield_now().await;
            }
            update
                .send(GatewayResponse::Error(GatewayError::Unreachable("reset".into())))
                .unwrap();

            // the rejection reconciles with one more list
            let (request, responder) = rx.recv().await.unwrap();
            assert!(matches!(request, GatewayRequest::List(_)));
            assert_eq!(
                statuses(&store.read()),
                vec![(1, TaskStatus::InProgress), (3, TaskStatus::Todo)],
                "rollback must not undo the refreshed snapshot"
            );
            responder
                .send(GatewayResponse::List(vec![
                    task(1, "a", TaskStatus::InProgress),
                    task(3, "c", TaskStatus::Todo),
                ]))
                .unwrap();
        };
        let (submitted, refreshed, ()) = tokio::join!(
            pending.submit(),
            store.refresh(FilterCriteria::default()),
            host
        );

        // THEN
        assert!(submitted.is_err());
        assert!(refreshed.is_ok());
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::InProgress), (3, TaskStatus::Todo)]
        );
    }

    async fn seeded_channel(
        tasks: Vec<Task>,
    ) -> (
        TaskCacheStore<ChannelTaskGateway>,
        tokio::sync::mpsc::Receiver<crate::gateway::RequestResponse>,
    ) {
        let (gateway, mut rx) = ChannelTaskGateway::new(8);
        let store = TaskCacheStore::new(gateway, session());
        let seed = async {
            let (_, responder) = rx.recv().await.unwrap();
            responder.send(GatewayResponse::List(tasks)).unwrap();
        };
        let (seeded, ()) = tokio::join!(store.refresh(FilterCriteria::default()), seed);
        seeded.unwrap();
        (store, rx)
    }

    fn move_to_done(id: i64) -> Mutation {
        Mutation::Update(TaskId::new(id), TaskPatch::status(TaskStatus::Done))
    }

    #[tokio::test]
    async fn test_two_rejected_mutations_end_on_server_state() {
        // GIVEN
        let server = vec![task(1, "a", TaskStatus::Todo), task(2, "b", TaskStatus::Todo)];
        let (store, mut rx) = seeded_channel(server.clone()).await;
        let first = store.mutate(move_to_done(1)).unwrap();
        let second = store.mutate(move_to_done(2)).unwrap();
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::Done), (2, TaskStatus::Done)]
        );

        // WHEN the first update is rejected, then the second
        let host = async {
            let (_, first_update) = rx.recv().await.unwrap();
            let (_, second_update) = rx.recv().await.unwrap();
            first_update
                .send(GatewayResponse::Error(GatewayError::Unreachable("reset".into())))
                .unwrap();
            let (request, first_list) = rx.recv().await.unwrap();
            assert!(matches!(request, GatewayRequest::List(_)));
            second_update
                .send(GatewayResponse::Error(GatewayError::Unreachable("reset".into())))
                .unwrap();
            let (request, second_list) = rx.recv().await.unwrap();
            assert!(matches!(request, GatewayRequest::List(_)));
            second_list.send(GatewayResponse::List(server.clone())).unwrap();
            first_list.send(GatewayResponse::List(server.clone())).unwrap();
        };
        let (first, second, ()) = tokio::join!(first.submit(), second.submit(), host);

        // THEN
        assert!(first.is_err());
        assert!(second.is_err());
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::Todo), (2, TaskStatus::Todo)]
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_confirmed_and_rejected_mutations_end_on_server_state() {
        // GIVEN
        let (store, mut rx) = seeded_channel(vec![
            task(1, "a", TaskStatus::Todo),
            task(2, "b", TaskStatus::Todo),
        ])
        .await;
        let server = vec![task(1, "a", TaskStatus::Done), task(2, "b", TaskStatus::Todo)];
        let first = store.mutate(move_to_done(1)).unwrap();
        let second = store.mutate(move_to_done(2)).unwrap();

        // WHEN the first update is confirmed and the second rejected
        let host = async {
            let (_, first_update) = rx.recv().await.unwrap();
            let (_, second_update) = rx.recv().await.unwrap();
            first_update
                .send(GatewayResponse::Task(task(1, "a", TaskStatus::Done)))
                .unwrap();
            let (request, first_list) = rx.recv().await.unwrap();
            assert!(matches!(request, GatewayRequest::List(_)));
            second_update
                .send(GatewayResponse::Error(GatewayError::RemoteRejected {
                    status: 404,
                    message: "Task not found".into(),
                }))
                .unwrap();
            let (request, second_list) = rx.recv().await.unwrap();
            assert!(matches!(request, GatewayRequest::List(_)));
            second_list.send(GatewayResponse::List(server.clone())).unwrap();
            first_list.send(GatewayResponse::List(server.clone())).unwrap();
        };
        let (first, second, ()) = tokio::join!(first.submit(), second.submit(), host);

        // THEN
        assert_eq!(first.unwrap().unwrap().status, TaskStatus::Done);
        assert!(second.is_err());
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::Done), (2, TaskStatus::Todo)]
        );
    }

    #[tokio::test]
    async fn test_each_mutation_restores_its_own_pre_state() {
        // GIVEN
        let (store, mut rx) = seeded_channel(vec![
            task(1, "a", TaskStatus::Todo),
            task(2, "b", TaskStatus::Todo),
        ])
        .await;
        let first = store.mutate(move_to_done(1)).unwrap();
        let second = store.mutate(move_to_done(2)).unwrap();

        // WHEN the second update is rejected while the first is outstanding
        let host = async {
            let (_, first_update) = rx.recv().await.unwrap();
            let (_, second_update) = rx.recv().await.unwrap();
            second_update
                .send(GatewayResponse::Error(GatewayError::Unreachable("reset".into())))
                .unwrap();
            let (_, second_list) = rx.recv().await.unwrap();
            // the first change is still pending and stays visible
            assert_eq!(
                statuses(&store.read()),
                vec![(1, TaskStatus::Done), (2, TaskStatus::Todo)]
            );
            second_list
                .send(GatewayResponse::List(vec![
                    task(1, "a", TaskStatus::Todo),
                    task(2, "b", TaskStatus::Todo),
                ]))
                .unwrap();
            first_update
                .send(GatewayResponse::Task(task(1, "a", TaskStatus::Done)))
                .unwrap();
            let (_, first_list) = rx.recv().await.unwrap();
            first_list
                .send(GatewayResponse::List(vec![
                    task(1, "a", TaskStatus::Done),
                    task(2, "b", TaskStatus::Todo),
                ]))
                .unwrap();
        };
        let (first, second, ()) = tokio::join!(first.submit(), second.submit(), host);

        // THEN
        assert!(first.is_ok());
        assert!(second.is_err());
        assert_eq!(
            statuses(&store.read()),
            vec![(1, TaskStatus::Done), (2, TaskStatus::Todo)]
        );
    }
}
