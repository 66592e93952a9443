//! Property tests for the per-creator draft.

use chrono::Utc;
use incident_core::IncidentService;
use incident_storage::{InMemoryIncidentStorage, IncidentStore, QueryWindow, UserStore};
use incident_types::{
    CallerContext, Incident, IncidentFields, IncidentFilter, Role, Severity, User,
};
use proptest::prelude::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High)
    ]
}

fn arb_fields() -> impl Strategy<Value = IncidentFields> {
    (
        proptest::option::of("[a-z]{1,12}"),
        proptest::option::of(proptest::option::of("[a-z ]{0,24}")),
        proptest::option::of(arb_severity()),
    )
        .prop_map(|(title, description, severity)| IncidentFields {
            title,
            description,
            severity,
            ..Default::default()
        })
}

#[derive(Debug, Clone)]
enum Op {
    AutoSave(IncidentFields),
    Create { fields: IncidentFields, finalize: bool },
    DeleteDraft,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_fields().prop_map(Op::AutoSave),
        2 => (arb_fields(), any::<bool>())
            .prop_map(|(fields, finalize)| Op::Create { fields, finalize }),
        1 => Just(Op::DeleteDraft),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn drafts_of(storage: &InMemoryIncidentStorage, caller: &CallerContext) -> Vec<Incident> {
    let filter = IncidentFilter {
        include_drafts: true,
        ..IncidentFilter::new().involving(caller.id)
    };
    storage
        .list_incidents(&filter, QueryWindow::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.is_draft && i.creator_id == caller.id)
        .collect()
}

async fn setup() -> (IncidentService, Arc<InMemoryIncidentStorage>, CallerContext) {
    let storage = Arc::new(InMemoryIncidentStorage::new());
    let user = User::new("u1@example.com", Role::User, Utc::now());
    storage.insert_user(user.clone()).await.unwrap();
    (
        IncidentService::with_storage(storage.clone()),
        storage,
        CallerContext::user(user.id),
    )
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever sequence of saves a caller issues, at most one draft exists,
    /// and drafts always carry status DRAFT.
    #[test]
    fn at_most_one_draft_per_creator(ops in prop::collection::vec(arb_op(), 1..24)) {
        runtime().block_on(async {
            let (service, storage, caller) = setup().await;

            for op in ops {
                // Rejections (e.g. a missing title) are fine; the invariant
                // must hold either way.
                let _ = match op {
                    Op::AutoSave(fields) => service.auto_save(&caller, fields).await.map(|_| ()),
                    Op::Create { fields, finalize } => service
                        .create_or_promote(&caller, fields, finalize)
                        .await
                        .map(|_| ()),
                    Op::DeleteDraft => service.delete_draft(&caller).await,
                };

                let drafts = drafts_of(&storage, &caller).await;
                assert!(drafts.len() <= 1, "found {} drafts", drafts.len());
                for draft in drafts {
                    assert_eq!(draft.status, incident_types::Status::Draft);
                }
            }
        });
    }

    /// Repeated autosaves never drop a field the later payloads omitted.
    #[test]
    fn autosave_keeps_omitted_fields(
        seed in "[a-z]{1,12}",
        patches in prop::collection::vec(arb_fields(), 0..16),
    ) {
        runtime().block_on(async {
            let (service, _storage, caller) = setup().await;

            let mut expected = service
                .auto_save(&caller, IncidentFields::default().with_title(seed))
                .await
                .unwrap();

            for patch in patches {
                if let Some(title) = &patch.title {
                    expected.title = title.clone();
                }
                if let Some(description) = &patch.description {
                    expected.description = description.clone();
                }
                if let Some(severity) = patch.severity {
                    expected.severity = severity;
                }

                let draft = service.auto_save(&caller, patch).await.unwrap();
                assert_eq!(draft.id, expected.id);
                assert_eq!(draft.title, expected.title);
                assert_eq!(draft.description, expected.description);
                assert_eq!(draft.severity, expected.severity);
                assert_eq!(draft.assigned_to_id, Some(caller.id));
            }
        });
    }
}
