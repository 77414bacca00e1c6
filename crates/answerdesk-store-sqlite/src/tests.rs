//! Integration tests for `SqliteStore` against an in-memory database.

use answerdesk_core::{
  Error as CoreError,
  entry::{EntryContent, Provenance},
  identity::Role,
  notify::{NewAuditRecord, NewNotification},
  plan::PlanTier,
  request::{Decision, NewRequest, RequestAction, RequestStatus, Snapshot},
  store::{HitReceipt, QnaStore, RequestQuery, StatsQuery, TENANT_SEARCH_LIMIT, TenantQuery},
  tenant::{NewTenant, Tenant},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn tenant(s: &SqliteStore, key: &str) -> Tenant {
  s.create_tenant(NewTenant {
    name:        format!("{key} inc"),
    email:       format!("owner@{key}.example"),
    website_key: key.into(),
  })
  .await
  .unwrap()
}

/// A tenant on the monthly plan, so modify and delete have room.
async fn paid_tenant(s: &SqliteStore, key: &str) -> Tenant {
  let t = tenant(s, key).await;
  s.apply_plan(t.tenant_id, PlanTier::Monthly, true).await.unwrap().0
}

fn qa(question: &str, answer: &str) -> EntryContent {
  EntryContent::new(question, answer).unwrap()
}

async fn submit(s: &SqliteStore, tenant_id: Uuid, action: RequestAction) -> Uuid {
  s.submit_request(NewRequest {
    tenant_id,
    action,
    submitted_by: "owner".into(),
    submitted_role: Role::Tenant,
  })
  .await
  .unwrap()
  .request_id
}

async fn approve(s: &SqliteStore, id: Uuid) -> crate::Result<answerdesk_core::request::ModificationRequest> {
  s.decide_request(id, Decision::Approve, None, "ops".into()).await
}

async fn revert(s: &SqliteStore, id: Uuid) -> crate::Result<answerdesk_core::request::ModificationRequest> {
  s.revert_request(id, RequestStatus::Rejected, Some("undo".into()), "ops".into())
    .await
}

async fn usage(s: &SqliteStore, id: Uuid) -> answerdesk_core::tenant::Usage {
  s.get_tenant(id).await.unwrap().unwrap().usage
}

// ─── Tenants ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_tenant_starts_on_trial() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  assert_eq!(t.plan, PlanTier::Trial);
  assert_eq!(t.usage.questions_allowed, 5);
  assert_eq!(t.usage.hits_allowed, 50);
  assert_eq!((t.window.end - t.window.start).num_days(), 2);
  assert!(t.is_active);

  let by_key = s.get_tenant_by_key(" acme ").await.unwrap().unwrap();
  assert_eq!(by_key.tenant_id, t.tenant_id);
}

#[tokio::test]
async fn duplicate_website_key_is_rejected() {
  let s = store().await;
  tenant(&s, "acme").await;
  let err = s
    .create_tenant(NewTenant {
      name:        "Other".into(),
      email:       "x@example.com".into(),
      website_key: "acme".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateTenantKey(_))));
  assert_eq!(s.list_tenants(TenantQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn set_tenant_active_toggles_flag() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let off = s.set_tenant_active(t.tenant_id, false).await.unwrap();
  assert!(!off.is_active);

  let err = s.set_tenant_active(Uuid::new_v4(), true).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::TenantNotFound(_))));
}

#[tokio::test]
async fn search_matches_name_email_or_key_ignoring_case() {
  let s = store().await;
  let acme = tenant(&s, "acme").await;
  let globex = s
    .create_tenant(NewTenant {
      name:        "Globex Corporation".into(),
      email:       "HANK@globex.example".into(),
      website_key: "gx-01".into(),
    })
    .await
    .unwrap();

  let keys = |ts: Vec<Tenant>| ts.into_iter().map(|t| t.website_key).collect::<Vec<_>>();
  let by_name = s.list_tenants(TenantQuery::search("CORPORATION")).await.unwrap();
  assert_eq!(keys(by_name), ["gx-01"]);
  let by_email = s.list_tenants(TenantQuery::search("hank@")).await.unwrap();
  assert_eq!(by_email[0].tenant_id, globex.tenant_id);
  let by_key = s.list_tenants(TenantQuery::search("ACM")).await.unwrap();
  assert_eq!(by_key[0].tenant_id, acme.tenant_id);
  // Both emails end in ".example".
  let both = s.list_tenants(TenantQuery::search(".example")).await.unwrap();
  assert_eq!(keys(both), ["acme", "gx-01"]);
  assert!(s.list_tenants(TenantQuery::search("initech")).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_is_capped() {
  let s = store().await;
  for n in 0..TENANT_SEARCH_LIMIT + 5 {
    tenant(&s, &format!("shop-{n}")).await;
  }
  let found = s.list_tenants(TenantQuery::search("shop")).await.unwrap();
  assert_eq!(found.len(), TENANT_SEARCH_LIMIT);
  assert_eq!(found[0].website_key, "shop-0");
  let all = s.list_tenants(TenantQuery::default()).await.unwrap();
  assert_eq!(all.len(), TENANT_SEARCH_LIMIT + 5);
}

#[tokio::test]
async fn delete_tenant_cascades_to_its_rows_only() {
  let s = store().await;
  let gone = paid_tenant(&s, "acme").await;
  let kept = tenant(&s, "globex").await;
  for t in [&gone, &kept] {
    let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
    s.record_hit(t.tenant_id, entry.entry_id).await.unwrap();
    s.record_unmatched(t.tenant_id, "Refunds?".into()).await.unwrap();
    submit(&s, t.tenant_id, RequestAction::Add { content: qa("Refunds?", "30 days") }).await;
    s.record_notification(NewNotification::to_tenant(
      t.tenant_id,
      "Hello",
      "Welcome.",
      "welcome",
      serde_json::json!({}),
    ))
    .await
    .unwrap();
  }
  s.append_audit(NewAuditRecord::new(
    "ops",
    "tenant.create",
    Some(gone.tenant_id),
    serde_json::json!({}),
  ))
  .await
  .unwrap();

  let deleted = s.delete_tenant(gone.tenant_id).await.unwrap();
  assert_eq!(deleted.website_key, "acme");
  assert!(s.get_tenant(gone.tenant_id).await.unwrap().is_none());

  let stats = s.list_stats(StatsQuery::default()).await.unwrap();
  assert_eq!(stats.len(), 2);
  assert!(stats.iter().all(|row| row.tenant_id == kept.tenant_id));
  let requests = s.list_requests(RequestQuery::default()).await.unwrap();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].request.tenant_id, kept.tenant_id);
  assert_eq!(s.list_entries(kept.tenant_id).await.unwrap().len(), 1);
  assert!(s.list_notifications(gone.tenant_id.to_string(), 50).await.unwrap().is_empty());
  assert_eq!(s.list_notifications(kept.tenant_id.to_string(), 50).await.unwrap().len(), 1);
  assert_eq!(s.list_audit(10).await.unwrap().len(), 1);

  // The key is free again.
  tenant(&s, "acme").await;
}

#[tokio::test]
async fn delete_unknown_tenant_is_not_found() {
  let s = store().await;
  let err = s.delete_tenant(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::TenantNotFound(_))));
}

// ─── Usage ledger ────────────────────────────────────────────────────────────

#[tokio::test]
async fn consume_hit_fails_closed_at_allowance() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  for _ in 0..50 {
    assert!(s.consume_hit(t.tenant_id).await.unwrap());
  }
  assert!(!s.consume_hit(t.tenant_id).await.unwrap());
  assert_eq!(usage(&s, t.tenant_id).await.hits_used, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_hits_never_exceed_allowance() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  let id = t.tenant_id;
  let tasks: Vec<_> = (0..80)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { s.consume_hit(id).await.unwrap() })
    })
    .collect();

  let mut granted = 0;
  for task in tasks {
    if task.await.unwrap() {
      granted += 1;
    }
  }
  assert_eq!(granted, 50);
  assert_eq!(usage(&s, t.tenant_id).await.hits_used, 50);
}

#[tokio::test]
async fn adjust_refuses_to_go_negative() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  let u = s.adjust_questions_used(t.tenant_id, 2).await.unwrap();
  assert_eq!(u.questions_used, 2);
  let err = s.adjust_questions_used(t.tenant_id, -3).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CounterUnderflow)));
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 2);

  let err = s.adjust_modifications_used(t.tenant_id, -1).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CounterUnderflow)));
}

#[tokio::test]
async fn trial_to_monthly_new_cycle_resets_usage() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  s.add_entry(t.tenant_id, qa("Hours?", "9 to 5.")).await.unwrap();
  s.consume_hit(t.tenant_id).await.unwrap();

  let (after, change) = s.apply_plan(t.tenant_id, PlanTier::Monthly, true).await.unwrap();
  assert!(change.reset_usage);
  assert_eq!(after.usage.questions_used, 0);
  assert_eq!(after.usage.hits_used, 0);
  assert_eq!(after.usage.modifications_used, 0);
  assert_eq!(after.usage.questions_allowed, 15);
  assert_eq!((after.window.end - after.window.start).num_days(), 30);

  let stored = s.get_tenant(t.tenant_id).await.unwrap().unwrap();
  assert_eq!(stored.plan, PlanTier::Monthly);
  assert_eq!(stored.window, after.window);
}

#[tokio::test]
async fn paid_renewal_inside_window_stacks() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  s.consume_hit(t.tenant_id).await.unwrap();

  let (after, change) = s.apply_plan(t.tenant_id, PlanTier::Yearly, false).await.unwrap();
  assert!(!change.reset_usage);
  assert_eq!(after.window.start, t.window.start);
  assert_eq!(after.window.end, t.window.end + chrono::Duration::days(365));
  assert_eq!(after.usage.hits_used, 1);
  assert_eq!(after.usage.hits_allowed, 1200);
}

#[tokio::test]
async fn sync_allowances_repairs_drift_only() {
  let s = store().await;
  let drifted = tenant(&s, "acme").await;
  let fine = tenant(&s, "globex").await;
  s.consume_hit(drifted.tenant_id).await.unwrap();
  s.execute_raw(
    "UPDATE tenants SET hits_allowed = 7, questions_allowed = 1 WHERE tenant_id = ?1",
    drifted.tenant_id,
  )
  .await
  .unwrap();

  let corrected = s.sync_allowances().await.unwrap();
  assert_eq!(corrected, vec![drifted.tenant_id]);

  let repaired = s.get_tenant(drifted.tenant_id).await.unwrap().unwrap();
  assert_eq!(repaired.usage.hits_allowed, 50);
  assert_eq!(repaired.usage.questions_allowed, 5);
  assert_eq!(repaired.usage.hits_used, 1);
  assert_eq!(repaired.window, drifted.window);
  assert!(!corrected.contains(&fine.tenant_id));

  assert!(s.sync_allowances().await.unwrap().is_empty());
}

// ─── Direct corpus administration ────────────────────────────────────────────

#[tokio::test]
async fn add_entry_enforces_duplicates_and_quota() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  s.add_entry(t.tenant_id, qa("What are your hours?", "9-5")).await.unwrap();
  let err = s
    .add_entry(t.tenant_id, qa("  what ARE your hours?", "24/7"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateQuestion(_))));

  for i in 1..5 {
    s.add_entry(t.tenant_id, qa(&format!("Question {i}?"), "Yes.")).await.unwrap();
  }
  let err = s.add_entry(t.tenant_id, qa("One more?", "No.")).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::QuestionQuotaExceeded { used: 5, allowed: 5 })
  ));
  assert_eq!(s.list_entries(t.tenant_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn corpus_changes_are_refused_after_expiry() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  s.execute_raw(
    "UPDATE tenants SET subscription_end = '2000-01-01T00:00:00.000000Z' WHERE tenant_id = ?1",
    t.tenant_id,
  )
  .await
  .unwrap();

  let add = s.add_entry(t.tenant_id, qa("New?", "x")).await.unwrap_err();
  let update = s.update_entry(entry.entry_id, qa("Hours?", "10-6")).await.unwrap_err();
  let delete = s.delete_entry(entry.entry_id).await.unwrap_err();
  for err in [add, update, delete] {
    assert!(matches!(err, Error::Core(CoreError::SubscriptionExpired(_))));
  }
}

#[tokio::test]
async fn list_entries_keeps_insertion_order() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  for q in ["First?", "Second?", "Third?"] {
    s.add_entry(t.tenant_id, qa(q, "a")).await.unwrap();
  }
  let questions: Vec<_> = s
    .list_entries(t.tenant_id)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.question)
    .collect();
  assert_eq!(questions, ["First?", "Second?", "Third?"]);
}

#[tokio::test]
async fn direct_delete_unbinds_and_merges_stats() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();

  s.record_hit(t.tenant_id, entry.entry_id).await.unwrap();
  s.record_hit(t.tenant_id, entry.entry_id).await.unwrap();
  s.delete_entry(entry.entry_id).await.unwrap();
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 0);

  s.record_unmatched(t.tenant_id, "Hours?".into()).await.unwrap();
  let rows = s
    .list_stats(StatsQuery { tenant_id: Some(t.tenant_id), bound: None })
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  assert!(!rows[0].is_bound());
  assert_eq!(rows[0].count, 3);
}

// ─── Query telemetry ─────────────────────────────────────────────────────────

#[tokio::test]
async fn record_hit_consumes_and_counts_together() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();

  assert_eq!(
    s.record_hit(t.tenant_id, entry.entry_id).await.unwrap(),
    HitReceipt::Consumed
  );
  let bound = s
    .list_stats(StatsQuery { tenant_id: Some(t.tenant_id), bound: Some(true) })
    .await
    .unwrap();
  assert_eq!(bound.len(), 1);
  assert_eq!(bound[0].question_id, Some(entry.entry_id));
  assert_eq!(bound[0].count, 1);
  assert_eq!(usage(&s, t.tenant_id).await.hits_used, 1);
}

#[tokio::test]
async fn record_hit_at_limit_changes_nothing() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  for _ in 0..50 {
    s.consume_hit(t.tenant_id).await.unwrap();
  }

  assert_eq!(
    s.record_hit(t.tenant_id, entry.entry_id).await.unwrap(),
    HitReceipt::LimitReached
  );
  let stats = s.list_stats(StatsQuery::default()).await.unwrap();
  assert!(stats.is_empty());
}

#[tokio::test]
async fn record_hit_on_removed_entry_changes_nothing() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  s.delete_entry(entry.entry_id).await.unwrap();

  assert_eq!(
    s.record_hit(t.tenant_id, entry.entry_id).await.unwrap(),
    HitReceipt::EntryRemoved
  );
  assert_eq!(usage(&s, t.tenant_id).await.hits_used, 0);
}

#[tokio::test]
async fn unmatched_questions_accumulate_by_exact_text() {
  let s = store().await;
  let t = tenant(&s, "acme").await;

  s.record_unmatched(t.tenant_id, "Do you ship?".into()).await.unwrap();
  let again = s.record_unmatched(t.tenant_id, "Do you ship?".into()).await.unwrap();
  s.record_unmatched(t.tenant_id, "do you ship?".into()).await.unwrap();

  assert_eq!(again.count, 2);
  assert!(!again.is_bound());
  let unbound = s
    .list_stats(StatsQuery { tenant_id: Some(t.tenant_id), bound: Some(false) })
    .await
    .unwrap();
  assert_eq!(unbound.len(), 2);
  assert_eq!(unbound[0].question_text, "Do you ship?");
  assert_eq!(usage(&s, t.tenant_id).await.hits_used, 0);
}

#[tokio::test]
async fn summary_and_ranking_reflect_activity() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let a = s.add_entry(t.tenant_id, qa("A?", "a")).await.unwrap();
  let b = s.add_entry(t.tenant_id, qa("B?", "b")).await.unwrap();
  s.add_entry(t.tenant_id, qa("C?", "c")).await.unwrap();
  s.record_hit(t.tenant_id, a.entry_id).await.unwrap();
  for _ in 0..3 {
    s.record_hit(t.tenant_id, b.entry_id).await.unwrap();
  }
  s.record_unmatched(t.tenant_id, "Refunds?".into()).await.unwrap();
  submit(&s, t.tenant_id, RequestAction::Add { content: qa("Refunds?", "30 days") }).await;

  let summary = s.stats_summary(t.tenant_id).await.unwrap();
  assert_eq!(summary.valid_questions_count, 3);
  assert_eq!(summary.requested_questions_count, 1);
  assert_eq!(summary.pending_requests_count, 1);
  assert_eq!(summary.hits_used, 4);

  let ranked = s.ranked_entries(t.tenant_id).await.unwrap();
  assert_eq!(ranked.len(), 2);
  assert_eq!(ranked[0].entry.entry_id, b.entry_id);
  assert_eq!(ranked[0].asked_count, 3);
  assert_eq!(ranked[1].entry.entry_id, a.entry_id);
}

// ─── Requests: approval ──────────────────────────────────────────────────────

#[tokio::test]
async fn approve_add_over_quota_leaves_request_pending() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  for i in 0..5 {
    s.add_entry(t.tenant_id, qa(&format!("Q{i}?"), "a")).await.unwrap();
  }
  let id = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Q5?", "a") }).await;

  let err = approve(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::QuestionQuotaExceeded { .. })));

  let req = s.get_request(id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Pending);
  assert!(req.snapshot.is_none());
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 5);
  assert_eq!(s.list_entries(t.tenant_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn approve_add_duplicate_is_refused() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Add { content: qa("HOURS?", "x") }).await;

  let err = approve(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateQuestion(_))));
  assert_eq!(
    s.get_request(id).await.unwrap().unwrap().status,
    RequestStatus::Pending
  );
}

#[tokio::test]
async fn approve_add_binds_history_and_revert_unbinds_it() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  for _ in 0..4 {
    s.record_unmatched(t.tenant_id, "Do you ship?".into()).await.unwrap();
  }
  let id = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Do you ship?", "Yes") }).await;

  let approved = approve(&s, id).await.unwrap();
  assert_eq!(approved.status, RequestStatus::Approved);
  assert_eq!(approved.decided_by.as_deref(), Some("ops"));
  let Some(Snapshot::Added { entry_id }) = approved.snapshot else {
    panic!("expected add snapshot, got {:?}", approved.snapshot);
  };
  let entry = s.get_entry(entry_id).await.unwrap().unwrap();
  assert_eq!(entry.provenance, Provenance::Request { request_id: id });
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 1);

  let bound = s
    .list_stats(StatsQuery { tenant_id: Some(t.tenant_id), bound: Some(true) })
    .await
    .unwrap();
  assert_eq!(bound.len(), 1);
  assert_eq!(bound[0].question_id, Some(entry_id));
  assert_eq!(bound[0].count, 4);

  let reverted = revert(&s, id).await.unwrap();
  assert_eq!(reverted.status, RequestStatus::Rejected);
  assert!(reverted.was_reverted);
  assert!(reverted.reverted_at.is_some());
  assert!(s.get_entry(entry_id).await.unwrap().is_none());
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 0);

  let rows = s.list_stats(StatsQuery::default()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert!(!rows[0].is_bound());
  assert_eq!(rows[0].count, 4);

  let err = revert(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyReverted(_))));
  assert_eq!(usage(&s, t.tenant_id).await.questions_used, 0);
}

#[tokio::test]
async fn modify_needs_modification_allowance() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Modify {
    entry_id: entry.entry_id,
    content:  qa("Hours?", "10-6"),
  })
  .await;

  let err = approve(&s, id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::ModificationQuotaExceeded { used: 0, allowed: 0 })
  ));
  assert_eq!(s.get_entry(entry.entry_id).await.unwrap().unwrap().answer, "9-5");
}

#[tokio::test]
async fn approve_modify_then_revert_restores_content() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Modify {
    entry_id: entry.entry_id,
    content:  qa("Opening hours?", "10-6"),
  })
  .await;

  approve(&s, id).await.unwrap();
  let changed = s.get_entry(entry.entry_id).await.unwrap().unwrap();
  assert_eq!(changed.question, "Opening hours?");
  assert_eq!(usage(&s, t.tenant_id).await.modifications_used, 1);

  revert(&s, id).await.unwrap();
  let restored = s.get_entry(entry.entry_id).await.unwrap().unwrap();
  assert_eq!(restored.question, "Hours?");
  assert_eq!(restored.answer, "9-5");
  assert_eq!(usage(&s, t.tenant_id).await.modifications_used, 0);
}

#[tokio::test]
async fn approve_modify_onto_existing_question_is_refused() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let price = s.add_entry(t.tenant_id, qa("Price?", "Free")).await.unwrap();

  let direct = s.update_entry(price.entry_id, qa("HOURS?", "x")).await.unwrap_err();
  assert!(matches!(direct, Error::Core(CoreError::DuplicateQuestion(_))));

  let id = submit(&s, t.tenant_id, RequestAction::Modify {
    entry_id: price.entry_id,
    content:  qa("HOURS?", "x"),
  })
  .await;
  let err = approve(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateQuestion(_))));

  let questions: Vec<String> =
    s.list_entries(t.tenant_id).await.unwrap().into_iter().map(|e| e.question).collect();
  assert_eq!(questions, ["Hours?", "Price?"]);
  assert_eq!(usage(&s, t.tenant_id).await.modifications_used, 0);
  let pending = s.get_request(id).await.unwrap().unwrap();
  assert_eq!(pending.status, RequestStatus::Pending);
}

#[tokio::test]
async fn modify_may_change_only_the_case_of_its_own_question() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Modify {
    entry_id: entry.entry_id,
    content:  qa("Hours?", "9-5"),
  })
  .await;
  approve(&s, id).await.unwrap();
  assert_eq!(s.get_entry(entry.entry_id).await.unwrap().unwrap().question, "Hours?");
}

#[tokio::test]
async fn revert_modify_onto_a_reused_question_is_refused() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Modify {
    entry_id: entry.entry_id,
    content:  qa("Opening?", "10-6"),
  })
  .await;
  approve(&s, id).await.unwrap();
  s.add_entry(t.tenant_id, qa("hours?", "always")).await.unwrap();

  let err = revert(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateQuestion(_))));

  let questions: Vec<String> =
    s.list_entries(t.tenant_id).await.unwrap().into_iter().map(|e| e.question).collect();
  assert_eq!(questions, ["Opening?", "hours?"]);
  let still = s.get_request(id).await.unwrap().unwrap();
  assert_eq!(still.status, RequestStatus::Approved);
  assert!(!still.was_reverted);
  assert_eq!(usage(&s, t.tenant_id).await.modifications_used, 1);
}

#[tokio::test]
async fn modify_of_missing_or_foreign_entry_is_refused() {
  let s = store().await;
  let acme = paid_tenant(&s, "acme").await;
  let globex = paid_tenant(&s, "globex").await;
  let foreign = s.add_entry(globex.tenant_id, qa("Hours?", "9-5")).await.unwrap();

  for target in [foreign.entry_id, Uuid::new_v4()] {
    let id = submit(&s, acme.tenant_id, RequestAction::Modify {
      entry_id: target,
      content:  qa("Hours?", "never"),
    })
    .await;
    let err = approve(&s, id).await.unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::EntryNotFound(_))));
  }
  assert_eq!(s.get_entry(foreign.entry_id).await.unwrap().unwrap().answer, "9-5");
}

#[tokio::test]
async fn approve_delete_then_revert_restores_entry_and_history() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("What are your hours?", "Nine to five.")).await.unwrap();
  for _ in 0..3 {
    s.record_hit(t.tenant_id, entry.entry_id).await.unwrap();
  }
  let id = submit(&s, t.tenant_id, RequestAction::Delete { entry_id: entry.entry_id }).await;

  let approved = approve(&s, id).await.unwrap();
  assert!(matches!(approved.snapshot, Some(Snapshot::Deleted { .. })));
  assert!(s.list_entries(t.tenant_id).await.unwrap().is_empty());
  let u = usage(&s, t.tenant_id).await;
  assert_eq!((u.questions_used, u.modifications_used), (0, 1));

  revert(&s, id).await.unwrap();
  let entries = s.list_entries(t.tenant_id).await.unwrap();
  assert_eq!(entries.len(), 1);
  let restored = &entries[0];
  assert_ne!(restored.entry_id, entry.entry_id);
  assert_eq!(restored.question, entry.question);
  assert_eq!(restored.answer, entry.answer);
  assert_eq!(restored.provenance, Provenance::Restored { request_id: id });
  let u = usage(&s, t.tenant_id).await;
  assert_eq!((u.questions_used, u.modifications_used), (1, 0));

  let bound = s
    .list_stats(StatsQuery { tenant_id: Some(t.tenant_id), bound: Some(true) })
    .await
    .unwrap();
  assert_eq!(bound.len(), 1);
  assert_eq!(bound[0].question_id, Some(restored.entry_id));
  assert_eq!(bound[0].count, 3);
}

#[tokio::test]
async fn revert_of_delete_refuses_when_question_reappeared() {
  let s = store().await;
  let t = paid_tenant(&s, "acme").await;
  let entry = s.add_entry(t.tenant_id, qa("Hours?", "9-5")).await.unwrap();
  let id = submit(&s, t.tenant_id, RequestAction::Delete { entry_id: entry.entry_id }).await;
  approve(&s, id).await.unwrap();
  s.add_entry(t.tenant_id, qa("hours?", "always")).await.unwrap();

  let err = revert(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateQuestion(_))));
  let req = s.get_request(id).await.unwrap().unwrap();
  assert_eq!(req.status, RequestStatus::Approved);
  assert!(!req.was_reverted);
}

// ─── Requests: state machine ─────────────────────────────────────────────────

#[tokio::test]
async fn reject_is_terminal_and_has_no_effect() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let id = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Hours?", "9-5") }).await;

  let rejected = s
    .decide_request(id, Decision::Reject, Some("not now".into()), "ops".into())
    .await
    .unwrap();
  assert_eq!(rejected.status, RequestStatus::Rejected);
  assert_eq!(rejected.admin_notes.as_deref(), Some("not now"));
  assert!(s.list_entries(t.tenant_id).await.unwrap().is_empty());

  let err = approve(&s, id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::NotPending { status: RequestStatus::Rejected, .. })
  ));
  let err = revert(&s, id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotRevertible { .. })));
}

#[tokio::test]
async fn revert_only_lands_on_rejected() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let id = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Hours?", "9-5") }).await;
  approve(&s, id).await.unwrap();

  let err = s
    .revert_request(id, RequestStatus::Pending, None, "ops".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::Validation(_))));
  assert_eq!(
    s.get_request(id).await.unwrap().unwrap().status,
    RequestStatus::Approved
  );
}

#[tokio::test]
async fn unknown_request_is_not_found() {
  let s = store().await;
  let err = approve(&s, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::RequestNotFound(_))));
}

#[tokio::test]
async fn queue_lists_newest_first_with_asked_count() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  for _ in 0..2 {
    s.record_unmatched(t.tenant_id, "Refunds?".into()).await.unwrap();
  }
  let first = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Refunds?", "30 days") }).await;
  let second = submit(&s, t.tenant_id, RequestAction::Add { content: qa("Parking?", "Yes") }).await;
  s.decide_request(second, Decision::Reject, None, "ops".into()).await.unwrap();

  let all = s.list_requests(RequestQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].request.request_id, second);

  let pending = s
    .list_requests(RequestQuery { tenant_id: Some(t.tenant_id), status: Some(RequestStatus::Pending) })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].request.request_id, first);
  assert_eq!(pending[0].asked_count, 2);
}

// ─── Notifications and audit ─────────────────────────────────────────────────

#[tokio::test]
async fn notifications_are_scoped_and_marked_read_once() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  let inbox = t.tenant_id.to_string();

  let n = s
    .record_notification(NewNotification::to_tenant(
      t.tenant_id,
      "Approved",
      "Your request was approved.",
      "request_decided",
      serde_json::json!({ "status": "approved" }),
    ))
    .await
    .unwrap();
  s.record_notification(NewNotification::to_operators(
    "New request",
    "acme submitted a request.",
    "question_request",
    serde_json::json!({}),
  ))
  .await
  .unwrap();

  let listed = s.list_notifications(inbox.clone(), 50).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].body.payload["status"], "approved");
  assert_eq!(s.unread_notifications(inbox.clone()).await.unwrap(), 1);

  assert!(s.mark_notification_read(n.notification_id, inbox.clone()).await.unwrap());
  assert!(!s.mark_notification_read(n.notification_id, inbox.clone()).await.unwrap());
  assert_eq!(s.unread_notifications(inbox).await.unwrap(), 0);

  let err = s
    .mark_notification_read(n.notification_id, "operators".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NotificationNotFound(_))));
}

#[tokio::test]
async fn audit_log_lists_newest_first() {
  let s = store().await;
  let t = tenant(&s, "acme").await;
  for action in ["tenant.create", "plan.apply", "entry.add"] {
    s.append_audit(NewAuditRecord::new(
      "ops",
      action,
      Some(t.tenant_id),
      serde_json::json!({ "n": action }),
    ))
    .await
    .unwrap();
  }

  let records = s.list_audit(2).await.unwrap();
  assert_eq!(records.len(), 2);
  assert_eq!(records[0].record.action, "entry.add");
  assert_eq!(records[1].record.action, "plan.apply");
  assert_eq!(records[0].record.tenant_id, Some(t.tenant_id));
}
