//! Fingerprint properties over an on-disk workspace.

use hoard_conformance::{profile, Workspace};
use hoard_graph::GraphTarget;
use hoard_hasher::{
    is_cacheable, CacheOutputType, CacheProfile, ContentHasher, ContentHashing,
    GraphContentHasher, GraphHashes, HashError,
};

async fn fingerprints(ws: &Workspace) -> GraphHashes {
    fingerprints_for(ws, &profile(), &[]).await.unwrap()
}

async fn fingerprints_for(
    ws: &Workspace,
    profile: &CacheProfile,
    salt: &[String],
) -> Result<GraphHashes, HashError> {
    GraphContentHasher::default()
        .content_hashes(
            &ws.graph(),
            is_cacheable,
            profile,
            CacheOutputType::XcFramework,
            salt,
        )
        .await
}

#[tokio::test]
async fn only_cacheable_targets_are_reported() {
    let ws = Workspace::new();
    let hashes = fingerprints(&ws).await;
    assert_eq!(hashes.len(), 3);
    assert!(hashes.get(&ws.id("App")).is_none());
    assert_eq!(hashes.hashed_targets, 3);
}

#[tokio::test]
async fn fingerprints_are_deterministic() {
    let ws = Workspace::new();
    assert_eq!(fingerprints(&ws).await.hashes, fingerprints(&ws).await.hashes);
}

#[tokio::test]
async fn fingerprints_do_not_depend_on_workspace_location() {
    let a = Workspace::new();
    let b = Workspace::new();
    let ha = fingerprints(&a).await;
    let hb = fingerprints(&b).await;
    for module in ["Core", "Features", "Analytics"] {
        assert_eq!(ha.get(&a.id(module)), hb.get(&b.id(module)), "{module}");
    }
}

#[tokio::test]
async fn editing_a_leaf_ripples_to_dependents_only() {
    let ws = Workspace::new();
    let before = fingerprints(&ws).await;

    ws.write_source("Core", "a.swift", "// Core a, edited\n");
    let after = fingerprints(&ws).await;

    assert_ne!(before.get(&ws.id("Core")), after.get(&ws.id("Core")));
    assert_ne!(before.get(&ws.id("Features")), after.get(&ws.id("Features")));
    assert_eq!(before.get(&ws.id("Analytics")), after.get(&ws.id("Analytics")));
}

#[tokio::test]
async fn editing_a_dependent_leaves_its_dependency_alone() {
    let ws = Workspace::new();
    let before = fingerprints(&ws).await;

    ws.write_source("Features", "b.swift", "// Features b, edited\n");
    let after = fingerprints(&ws).await;

    assert_eq!(before.get(&ws.id("Core")), after.get(&ws.id("Core")));
    assert_ne!(before.get(&ws.id("Features")), after.get(&ws.id("Features")));
}

#[tokio::test]
async fn profile_and_salt_change_every_fingerprint() {
    let ws = Workspace::new();
    let base = fingerprints(&ws).await;
    let release = fingerprints_for(&ws, &CacheProfile::new("Release", "ios-simulator"), &[])
        .await
        .unwrap();
    let salted = fingerprints_for(&ws, &profile(), &["swift-5.10".to_string()])
        .await
        .unwrap();

    for (id, hash) in &base.hashes {
        assert_ne!(release.get(id), Some(hash), "{id}");
        assert_ne!(salted.get(id), Some(hash), "{id}");
    }
}

#[tokio::test]
async fn missing_source_names_the_target() {
    let ws = Workspace::new();
    std::fs::remove_file(ws.project_dir("Core").join("Sources/b.swift")).unwrap();
    let err = fingerprints_for(&ws, &profile(), &[]).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'Core'"), "{message}");
    assert!(message.contains("b.swift"), "{message}");
}

#[tokio::test]
async fn directory_hash_ignores_listing_order() {
    let ws = Workspace::new();
    let first = ws.root().join("assets-1");
    let second = ws.root().join("assets-2");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    for name in ["x.png", "y.png", "z.png"] {
        std::fs::write(first.join(name), name).unwrap();
    }
    for name in ["z.png", "x.png", "y.png"] {
        std::fs::write(second.join(name), name).unwrap();
    }

    let hasher = ContentHasher::default();
    assert_eq!(
        hasher.hash_path(&first).await.unwrap(),
        hasher.hash_path(&second).await.unwrap()
    );
}

#[tokio::test]
async fn custom_selection_hashes_dependencies_too() {
    let ws = Workspace::new();
    let only_features = |t: &GraphTarget<'_>| t.target.name == "Features";
    let hashes = GraphContentHasher::default()
        .content_hashes(
            &ws.graph(),
            only_features,
            &profile(),
            CacheOutputType::XcFramework,
            &[],
        )
        .await
        .unwrap();
    assert_eq!(hashes.len(), 1);
    assert_eq!(hashes.hashed_targets, 2);
    assert_eq!(
        hashes.get(&ws.id("Features")),
        fingerprints(&ws).await.get(&ws.id("Features"))
    );
}
