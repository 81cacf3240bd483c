//! Integration tests for the loopdesk intake and notification pipeline
//!
//! These tests run the grouping engine, triage service, poller, and
//! delivery reconciler together over a real (on-disk) SQLite store to
//! verify the end-to-end flows.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use loopdesk_core::clients::ChatGateway;
use loopdesk_core::config::GroupingConfig;
use loopdesk_core::db::Database;
use loopdesk_core::notify::{DeliveryReconciler, NotificationPoller};
use loopdesk_core::types::{IncidentStatus, NewReport};
use loopdesk_core::{BatchFilter, Error, GroupOutcome, GroupingEngine, Result, SubmitOutcome, TriageService};
use tempfile::TempDir;

/// Gateway that can be told per-channel whether to accept, recording every
/// message that lands.
struct FakeGateway {
    thread_ok: bool,
    direct_ok: bool,
    landed: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
}

impl FakeGateway {
    fn new(thread_ok: bool, direct_ok: bool) -> Self {
        Self {
            thread_ok,
            direct_ok,
            landed: Mutex::new(vec![]),
            attempts: AtomicUsize::new(0),
        }
    }

    fn landed(&self) -> Vec<(String, String)> {
        self.landed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for FakeGateway {
    async fn send_to_thread(&self, thread_ref: &str, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.thread_ok {
            return Err(Error::Gateway("thread unavailable".to_string()));
        }
        self.landed
            .lock()
            .unwrap()
            .push((format!("thread:{}", thread_ref), text.to_string()));
        Ok(())
    }

    async fn send_direct(&self, user_ref: &str, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.direct_ok {
            return Err(Error::Gateway("dm closed".to_string()));
        }
        self.landed
            .lock()
            .unwrap()
            .push((format!("dm:{}", user_ref), text.to_string()));
        Ok(())
    }

    async fn send_to_fallback(&self, user_ref: &str, text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.landed
            .lock()
            .unwrap()
            .push((format!("fallback:{}", user_ref), text.to_string()));
        Ok(())
    }
}

fn open_db(dir: &TempDir) -> Arc<Database> {
    let path = dir.path().join("incidents.db");
    let db = Database::open(&path).expect("open database");
    db.migrate().expect("run migrations");
    Arc::new(db)
}

fn service(db: Arc<Database>) -> TriageService {
    let grouping = GroupingEngine::new(db.clone(), &GroupingConfig::default(), None);
    TriageService::new(db, grouping, None)
}

fn report(query: &str, category: Option<&str>, sub: Option<&str>, user: &str) -> NewReport {
    NewReport {
        query: query.to_string(),
        category: category.map(String::from),
        subcategory: sub.map(String::from),
        users: vec![user.to_string()],
        ..Default::default()
    }
}

fn filed_id(outcome: &SubmitOutcome) -> loopdesk_core::IncidentId {
    match outcome {
        SubmitOutcome::Filed(o) => o.incident().id.clone(),
        other => panic!("expected a filed incident, got {:?}", other),
    }
}

// ============================================
// Grouping flows
// ============================================

#[tokio::test]
async fn test_group_id_invariant_across_joins() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let first = svc
        .submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
        .await
        .unwrap();
    let second = svc
        .submit(report("cannot connect to vpn", Some("Network"), Some("VPN"), "200"), true)
        .await
        .unwrap();
    let third = svc
        .submit(report("vpn tunnel keeps dropping", Some("Network"), Some("VPN"), "300"), true)
        .await
        .unwrap();

    let first_id = filed_id(&first);
    // Every joiner carries the originating incident's id as its group id
    for outcome in [&second, &third] {
        let SubmitOutcome::Filed(GroupOutcome::Joined { incident, group_id }) = outcome else {
            panic!("expected a join");
        };
        assert_eq!(*group_id, first_id);
        assert_eq!(incident.group_id, first_id);
    }

    // The originator is its own group
    let original = db.get_incident(&first_id).unwrap().unwrap();
    assert_eq!(original.group_id, first_id);

    // And all three records are listed under the group
    assert_eq!(db.list_group(&first_id).unwrap().len(), 3);
}

#[tokio::test]
async fn test_dissimilar_reports_never_group() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    svc.submit(report("office wifi keeps dropping", Some("Network"), Some("WiFi"), "100"), true)
        .await
        .unwrap();
    // Same category, different subcategory, no shared query tokens:
    // below every threshold in the cascade.
    let out = svc
        .submit(report("outlook rejects my login", Some("Network"), Some("Email"), "200"), true)
        .await
        .unwrap();

    assert!(matches!(out, SubmitOutcome::Filed(GroupOutcome::Created(_))));
    assert_eq!(db.list_open().unwrap().len(), 2);
}

#[tokio::test]
async fn test_join_wakes_stalled_group_member() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let a = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
            .await
            .unwrap(),
    );
    let b = filed_id(
        &svc.submit(report("vpn is down for me too", Some("Network"), Some("VPN"), "200"), true)
            .await
            .unwrap(),
    );
    svc.ask_for_info(&a, "Which office are you in?").unwrap();

    // A third report joins through the still-open member and wakes the
    // parked one.
    svc.submit(report("vpn is still broken", Some("Network"), Some("VPN"), "300"), true)
        .await
        .unwrap();

    let woken = db.get_incident(&a).unwrap().unwrap();
    assert_eq!(woken.status, IncidentStatus::Pending);
    assert!(woken.history.iter().any(|h| h.message == "vpn is still broken"));

    let sibling = db.get_incident(&b).unwrap().unwrap();
    assert!(sibling.history.iter().any(|h| h.message == "vpn is still broken"));
}

// ============================================
// Notification pipeline
// ============================================

#[tokio::test]
async fn test_poll_deliver_ack_does_not_redeliver() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let id = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
            .await
            .unwrap(),
    );
    svc.resolve(&id, "Restart the VPN client and verify your password.")
        .await
        .unwrap();

    let gateway = Arc::new(FakeGateway::new(true, true));
    let poller = NotificationPoller::new(db.clone(), DeliveryReconciler::new(gateway.clone()));

    let first = poller.tick().await.unwrap();
    assert_eq!(first.delivered, 1);

    // Repeated cycles stay quiet: the ack is durable in the store.
    for _ in 0..3 {
        let again = poller.tick().await.unwrap();
        assert_eq!(again.due, 0);
    }
    assert_eq!(gateway.landed().len(), 1);
    assert!(db.get_incident(&id).unwrap().unwrap().notified);
}

#[tokio::test]
async fn test_channel_cascade_lands_exactly_one_message() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let id = filed_id(
        &svc.submit(
            NewReport {
                thread_ref: Some("th-42".to_string()),
                ..report("vpn is down", Some("Network"), Some("VPN"), "100")
            },
            true,
        )
        .await
        .unwrap(),
    );
    svc.resolve(&id, "Restart the VPN client and verify your password.")
        .await
        .unwrap();

    // Thread and DM both refuse; only the fallback channel accepts.
    let gateway = Arc::new(FakeGateway::new(false, false));
    let poller = NotificationPoller::new(db.clone(), DeliveryReconciler::new(gateway.clone()));

    let result = poller.tick().await.unwrap();
    assert_eq!(result.delivered, 1);

    let landed = gateway.landed();
    assert_eq!(landed.len(), 1);
    assert!(landed[0].0.starts_with("fallback:"));
    assert!(landed[0].1.contains(id.as_str()));

    // All three channels were attempted, in order, exactly once each
    assert_eq!(gateway.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_then_acked_once() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let id = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "alice"), true)
            .await
            .unwrap(),
    );
    svc.resolve(&id, "Restart the VPN client and verify your password.")
        .await
        .unwrap();

    // No thread ref and no numeric user: only the fallback channel applies,
    // and this gateway rejects everything.
    struct DownGateway;

    #[async_trait]
    impl ChatGateway for DownGateway {
        async fn send_to_thread(&self, _t: &str, _x: &str) -> Result<()> {
            Err(Error::Gateway("down".to_string()))
        }
        async fn send_direct(&self, _u: &str, _x: &str) -> Result<()> {
            Err(Error::Gateway("down".to_string()))
        }
        async fn send_to_fallback(&self, _u: &str, _x: &str) -> Result<()> {
            Err(Error::Gateway("down".to_string()))
        }
    }

    let down = NotificationPoller::new(db.clone(), DeliveryReconciler::new(Arc::new(DownGateway)));
    let first = down.tick().await.unwrap();
    assert_eq!(first.failed, 1);
    assert!(!db.get_incident(&id).unwrap().unwrap().notified);

    // Gateway recovers; the next cycle delivers and acks.
    let gateway = Arc::new(FakeGateway::new(true, true));
    let up = NotificationPoller::new(db.clone(), DeliveryReconciler::new(gateway.clone()));
    let second = up.tick().await.unwrap();
    assert_eq!(second.delivered, 1);
    assert_eq!(up.tick().await.unwrap().due, 0);
}

#[tokio::test]
async fn test_ask_for_info_notifies_with_admin_question() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let id = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
            .await
            .unwrap(),
    );
    svc.ask_for_info(&id, "Which office are you in?").unwrap();

    let gateway = Arc::new(FakeGateway::new(true, true));
    let poller = NotificationPoller::new(db.clone(), DeliveryReconciler::new(gateway.clone()));
    poller.tick().await.unwrap();

    let landed = gateway.landed();
    assert_eq!(landed.len(), 1);
    assert_eq!(landed[0].0, "dm:100");
    assert!(landed[0].1.contains("Which office are you in?"));

    // The user's reply re-arms the incident; resolving it notifies again.
    svc.add_user_reply(&id, "Berlin.").unwrap();
    assert_eq!(poller.tick().await.unwrap().due, 0);

    svc.resolve(&id, "Restart the VPN client and verify your password.")
        .await
        .unwrap();
    let result = poller.tick().await.unwrap();
    assert_eq!(result.delivered, 1);
    assert_eq!(gateway.landed().len(), 2);
}

// ============================================
// Lifecycle and store behavior
// ============================================

#[tokio::test]
async fn test_delete_removes_incident_from_every_scan() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let id = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
            .await
            .unwrap(),
    );
    svc.resolve(&id, "Restart the VPN client and verify your password.")
        .await
        .unwrap();
    assert!(svc.delete(&id).unwrap());

    assert!(db.get_incident(&id).unwrap().is_none());
    assert!(db.list_notifiable().unwrap().is_empty());
    assert!(db.list_open().unwrap().is_empty());

    // A fresh report with the same text opens a new group under a new id
    let reborn = filed_id(
        &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
            .await
            .unwrap(),
    );
    assert_ne!(reborn, id);
}

#[tokio::test]
async fn test_batch_resolution_flags_each_incident_for_delivery() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let svc = service(db.clone());

    let mut ids = Vec::new();
    for (q, u) in [("email bounces", "100"), ("mail app crashes", "200")] {
        let r = NewReport {
            category: Some("Email".to_string()),
            ..report(q, None, None, u)
        };
        ids.push(filed_id(&svc.submit(r, true).await.unwrap()));
    }

    let resolved = svc
        .resolve_batch(
            &BatchFilter::Category("Email".to_string()),
            "Check the mail server status page and restart the client.",
        )
        .await
        .unwrap();
    assert_eq!(resolved.len(), 2);

    let gateway = Arc::new(FakeGateway::new(true, true));
    let poller = NotificationPoller::new(db.clone(), DeliveryReconciler::new(gateway.clone()));
    let result = poller.tick().await.unwrap();
    assert_eq!(result.delivered, 2);

    // Each reporter got their own message, both carrying the shared answer
    let landed = gateway.landed();
    assert_eq!(landed.len(), 2);
    for (_, text) in &landed {
        assert!(text.contains("Check the mail server status page"));
    }
}

#[tokio::test]
async fn test_incident_ids_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("incidents.db");

    let first_id = {
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let db = Arc::new(db);
        let svc = service(db);
        filed_id(
            &svc.submit(report("vpn is down", Some("Network"), Some("VPN"), "100"), true)
                .await
                .unwrap(),
        )
    };

    // Reopen: allocation continues past persisted ids, never reusing one
    let db = Arc::new(Database::open(&path).unwrap());
    db.migrate().unwrap();
    let svc = service(db.clone());
    let second_id = filed_id(
        &svc.submit(report("printer jammed", Some("Hardware"), Some("Printer"), "200"), true)
            .await
            .unwrap(),
    );

    assert_eq!(first_id.number().unwrap() + 1, second_id.number().unwrap());
    assert_eq!(db.list_incidents().unwrap().len(), 2);
}
