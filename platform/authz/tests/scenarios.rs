use std::sync::Arc;

use platform_authz::{
    Effect, HierarchyPath, Membership, MemoryStore, Pattern, Policy, PolicyDraft, PolicyEngine,
    PrincipalId,
};

fn path(raw: &str) -> HierarchyPath {
    HierarchyPath::parse(raw).unwrap()
}

fn membership(org_path: &str, position: &str) -> Membership {
    Membership {
        principal: PrincipalId::parse("U").unwrap(),
        org_path: path(org_path),
        position_key: position.into(),
        active: true,
    }
}

fn head_policy(spread: &str, actions: &[&str]) -> Policy {
    PolicyDraft {
        scope: "/faculty/".into(),
        position_key: Some("head".into()),
        spread: Some(spread.into()),
        actions: actions.iter().map(|a| a.to_string()).collect(),
        enabled: Some(true),
        ..PolicyDraft::default()
    }
    .validate()
    .unwrap()
}

fn engine(memberships: Vec<Membership>, policies: Vec<Policy>) -> PolicyEngine {
    PolicyEngine::new(Arc::new(MemoryStore::new(memberships, policies)))
}

async fn event_create(engine: &PolicyEngine, org: &str) -> bool {
    let requested = vec!["event:create".to_string()];
    let result = engine
        .abilities("U", org, Some(requested.as_slice()))
        .await
        .unwrap();
    assert_eq!(result.abilities.len(), 1);
    result.abilities["event:create"]
}

#[tokio::test]
async fn subtree_policy_reaches_lab_but_not_sibling_department() {
    let engine = engine(
        vec![membership("/faculty/cs", "head")],
        vec![head_policy("subtree", &["event:create"])],
    );
    assert!(event_create(&engine, "/faculty/cs/lab1").await);
    assert!(!event_create(&engine, "/faculty/ee").await);
}

#[tokio::test]
async fn exact_policy_stays_on_membership_node() {
    let engine = engine(
        vec![membership("/faculty/cs", "head")],
        vec![head_policy("exact", &["event:create"])],
    );
    assert!(event_create(&engine, "/faculty/cs").await);
    assert!(!event_create(&engine, "/faculty/cs/lab1").await);
}

#[tokio::test]
async fn where_can_act_returns_anchor_not_descendants() {
    let engine = engine(
        vec![membership("/faculty/cs", "head")],
        vec![head_policy("subtree", &["event:create"])],
    );
    let orgs = engine.where_can_act("U", "event:create").await.unwrap();
    assert_eq!(orgs, vec![path("/faculty/cs")]);
}

#[tokio::test]
async fn star_action_grants_any_requested_action() {
    let engine = engine(
        vec![membership("/faculty/cs", "head")],
        vec![head_policy("exact", &["*"])],
    );
    let requested = vec!["post:create".to_string(), "club:archive".to_string()];
    let result = engine
        .abilities("U", "/faculty/cs", Some(requested.as_slice()))
        .await
        .unwrap();
    assert!(result.abilities.values().all(|allowed| *allowed));
}

#[tokio::test]
async fn position_specific_deny_beats_open_allow() {
    let deny = PolicyDraft {
        scope: "/faculty".into(),
        position_key: Some("head".into()),
        effect: Some("deny".into()),
        actions: vec!["post:create".into()],
        ..PolicyDraft::default()
    }
    .validate()
    .unwrap();
    let allow = PolicyDraft {
        scope: "/faculty".into(),
        effect: Some("allow".into()),
        actions: vec!["post:create".into()],
        ..PolicyDraft::default()
    }
    .validate()
    .unwrap();
    assert_eq!(deny.effect, Effect::Deny);
    assert_eq!(allow.resources, vec![Pattern::Any]);

    let engine = engine(vec![membership("/faculty", "head")], vec![allow, deny]);
    assert!(!engine.can("U", "/faculty", "post:create", "post").await.unwrap());
    // someone without the head position only sees the open allow
    assert!(engine.can("V", "/faculty", "post:create", "post").await.unwrap());
}
