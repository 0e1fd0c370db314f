//! Runs against a live backend. Needs `TASKBOARD_TOKEN`, and optionally
//! `TASKBOARD_E2E_URL` (defaults to the local development server).
#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::Arc;
    use std::time::Duration;

    use url::Url;

    use crate::board::{BoardReconciler, DragOutcome, DragSession, DropTarget};
    use crate::cache::{Mutation, TaskCacheStore};
    use crate::gateway::{GatewayError, HttpTaskGateway, TaskGateway};
    use crate::model::{FilterCriteria, Session, TaskDraft, TaskStatus};

    fn store() -> Arc<TaskCacheStore<HttpTaskGateway>> {
        let url = env::var("TASKBOARD_E2E_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string());
        let token = env::var("TASKBOARD_TOKEN").expect("TASKBOARD_TOKEN must be set");
        let gateway = HttpTaskGateway::new(
            &Url::parse(&url).unwrap(),
            Some(Duration::from_secs(10)),
            None,
        )
        .unwrap();
        Arc::new(TaskCacheStore::new(gateway, Session::bearer(token, None)))
    }

    fn marker() -> String {
        format!("e2e-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_e2e_create_move_delete() {
        let store = store();
        let title = marker();
        store.refresh(FilterCriteria::default()).await.unwrap();

        let created = store
            .mutate(Mutation::Create(TaskDraft::new(&title).with_priority(3)))
            .unwrap()
            .submit()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.status, TaskStatus::Todo);
        assert!(store.read().get(created.id).is_some());

        let reconciler = BoardReconciler::new(store.clone());
        let mut drag = DragSession::start(created.id);
        drag.hover(DropTarget::parse_column("in_progress").unwrap());
        let outcome = reconciler.complete_drag(drag).await.unwrap();
        assert!(matches!(outcome, DragOutcome::Moved(_)));
        assert_eq!(
            store.read().get(created.id).unwrap().status,
            TaskStatus::InProgress
        );

        store
            .mutate(Mutation::Delete(created.id))
            .unwrap()
            .submit()
            .await
            .unwrap();
        assert!(store.read().get(created.id).is_none());
    }

    #[tokio::test]
    async fn test_e2e_search_filters_on_server() {
        let store = store();
        let title = marker();
        let mut handles = vec![];
        for n in 0..3 {
            let store = store.clone();
            let title = format!("{}-{}", title, n);
            handles.push(tokio::spawn(async move {
                let session = store.session();
                store
                    .gateway()
                    .create(&session, &TaskDraft::new(title))
                    .await
                    .unwrap()
            }));
        }
        let created: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        store
            .refresh(FilterCriteria::default().with_search(&title))
            .await
            .unwrap();
        assert_eq!(store.read().len(), created.len());

        let session = store.session();
        for task in created {
            store.gateway().delete(&session, task.id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_e2e_unknown_task_is_rejected() {
        let store = store();
        let err = store
            .gateway()
            .delete(&store.session(), i64::MAX.into())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RemoteRejected { status: 404, .. }));
    }
}
