// tests/integration/directory_test.rs

//! End-to-end tests of the user directory operations and their invariants.

use super::test_helpers::{TestContext, actor_for};
use rolegate::core::acl::{Actor, Role};
use rolegate::core::directory::{NewUser, UserId, UserUpdate};
use rolegate::core::{AccessError, ErrorKind};
use std::collections::BTreeSet;

fn tags(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

// ===== create =====

#[tokio::test]
async fn test_create_with_secret_does_not_require_change() {
    let ctx = TestContext::new().await;

    let created = ctx
        .directory
        .create(
            &ctx.admin,
            NewUser::new("alice", "user")
                .with_secret("s3cret-password")
                .with_display_name("Alice")
                .with_visible_tags(["prod"])
                .with_hidden_tags(["internal"]),
        )
        .await
        .unwrap();

    assert!(created.temporary_secret.is_none());
    let user = created.user;
    assert_eq!(user.username, "alice");
    assert_eq!(user.display_name.as_deref(), Some("Alice"));
    assert_eq!(user.role, Role::User);
    assert!(!user.must_change_credential);
    assert!(user.is_first_login);
    assert_eq!(user.visible_tags, tags(&["prod"]));
    assert_eq!(user.hidden_tags, tags(&["internal"]));
    assert!(user.last_login_at.is_none());

    let listed = ctx.list().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1], user);
}

#[tokio::test]
async fn test_create_without_secret_returns_temporary_secret_once() {
    let ctx = TestContext::new().await;

    let created = ctx
        .directory
        .create(&ctx.admin, NewUser::new("bob", "readonly"))
        .await
        .unwrap();

    let secret = created.temporary_secret.expect("generated secret");
    assert_eq!(secret.expose().chars().count(), 16);
    assert!(created.user.must_change_credential);
    assert!(created.user.visible_tags.is_empty());
    assert!(created.user.hidden_tags.is_empty());

    // The generated secret is the account's working credential.
    let authenticated = ctx
        .directory
        .authenticate("bob", secret.expose())
        .await
        .unwrap()
        .expect("temporary secret authenticates");
    assert_eq!(authenticated.id, created.user.id);
}

#[tokio::test]
async fn test_create_duplicate_username_fails() {
    let ctx = TestContext::new().await;
    ctx.create_user("carol", Role::User).await;

    let err = ctx
        .directory
        .create(&ctx.admin, NewUser::new("carol", "readonly"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::DuplicateUsername(ref name) if name == "carol"));
    assert_eq!(ctx.list().await.len(), 2);
}

#[tokio::test]
async fn test_username_uniqueness_is_case_sensitive() {
    let ctx = TestContext::new().await;
    ctx.create_user("dave", Role::User).await;
    ctx.create_user("Dave", Role::User).await;
    assert_eq!(ctx.list().await.len(), 3);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let ctx = TestContext::new().await;

    let cases = [
        (NewUser::new("ab", "user"), ErrorKind::InvalidUsername),
        (NewUser::new("a".repeat(51), "user"), ErrorKind::InvalidUsername),
        (NewUser::new("bad name", "user"), ErrorKind::InvalidUsername),
        (NewUser::new("bad.name", "user"), ErrorKind::InvalidUsername),
        (NewUser::new("erin", "superuser"), ErrorKind::InvalidRole),
        (NewUser::new("erin", "Admin"), ErrorKind::InvalidRole),
        (
            NewUser::new("erin", "user").with_secret("short"),
            ErrorKind::InvalidCredential,
        ),
        (
            NewUser::new("erin", "user").with_secret("x".repeat(101)),
            ErrorKind::InvalidCredential,
        ),
        (
            NewUser::new("erin", "user").with_display_name("d".repeat(101)),
            ErrorKind::InvalidDisplayName,
        ),
    ];

    for (input, expected) in cases {
        let err = ctx.directory.create(&ctx.admin, input).await.unwrap_err();
        assert_eq!(err.kind(), expected, "unexpected error: {err}");
    }
    assert_eq!(ctx.list().await.len(), 1);
}

#[tokio::test]
async fn test_create_accepts_boundary_usernames() {
    let ctx = TestContext::new().await;
    ctx.create_user("a_-", Role::Readonly).await;
    ctx.create_user(&"Z9".repeat(25), Role::Readonly).await;
    assert_eq!(ctx.list().await.len(), 3);
}

#[tokio::test]
async fn test_create_normalizes_tags() {
    let ctx = TestContext::new().await;
    let created = ctx
        .directory
        .create(
            &ctx.admin,
            NewUser::new("frank", "user").with_visible_tags([" prod ", "", "  ", "web"]),
        )
        .await
        .unwrap();
    assert_eq!(created.user.visible_tags, tags(&["prod", "web"]));
}

// ===== authorization =====

#[tokio::test]
async fn test_non_admin_mutations_are_forbidden_and_change_nothing() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("grace", Role::User).await;
    let readonly = ctx.create_user("heidi", Role::Readonly).await;
    let before = ctx.list().await;

    for actor in [&user, &readonly] {
        let err = ctx
            .directory
            .create(actor, NewUser::new("mallory", "admin"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = ctx
            .directory
            .update(
                actor,
                ctx.admin.id,
                UserUpdate {
                    role: Some("readonly".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = ctx.directory.delete(actor, ctx.admin.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = ctx
            .directory
            .reset_credential(actor, ctx.admin.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = ctx.directory.list(actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    assert_eq!(ctx.list().await, before);
}

#[tokio::test]
async fn test_user_cannot_promote_themselves() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("ivan", Role::User).await;

    let err = ctx
        .directory
        .update(
            &user,
            user.id,
            UserUpdate {
                role: Some("admin".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(ctx.directory.get(&ctx.admin, user.id).await.unwrap().role, Role::User);
}

// ===== update =====

#[tokio::test]
async fn test_update_fields() {
    let ctx = TestContext::new().await;
    let judy = ctx.create_user("judy", Role::User).await;

    let updated = ctx
        .directory
        .update(
            &ctx.admin,
            judy.id,
            UserUpdate {
                display_name: Some("Judy H.".to_string()),
                role: Some("readonly".to_string()),
                must_change_credential: Some(true),
                visible_tags: Some(tags(&["staging"])),
                hidden_tags: Some(tags(&["db"])),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.username, "judy");
    assert_eq!(updated.display_name.as_deref(), Some("Judy H."));
    assert_eq!(updated.role, Role::Readonly);
    assert!(updated.must_change_credential);
    assert_eq!(updated.visible_tags, tags(&["staging"]));
    assert_eq!(updated.hidden_tags, tags(&["db"]));
    assert!(updated.updated_at >= updated.created_at);
}

#[tokio::test]
async fn test_update_tag_lists_replace_keep_and_clear() {
    let ctx = TestContext::new().await;
    let created = ctx
        .directory
        .create(
            &ctx.admin,
            NewUser::new("ken", "user")
                .with_secret("correct-horse-battery")
                .with_visible_tags(["prod", "web"])
                .with_hidden_tags(["internal"]),
        )
        .await
        .unwrap();
    let id = created.user.id;

    // Omitted lists are kept.
    let kept = ctx
        .directory
        .update(
            &ctx.admin,
            id,
            UserUpdate {
                display_name: Some("Ken".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(kept.visible_tags, tags(&["prod", "web"]));
    assert_eq!(kept.hidden_tags, tags(&["internal"]));

    // Supplied lists replace, they do not merge.
    let replaced = ctx
        .directory
        .update(
            &ctx.admin,
            id,
            UserUpdate {
                visible_tags: Some(tags(&["staging"])),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(replaced.visible_tags, tags(&["staging"]));
    assert_eq!(replaced.hidden_tags, tags(&["internal"]));

    // An empty list clears the filter.
    let cleared = ctx
        .directory
        .update(
            &ctx.admin,
            id,
            UserUpdate {
                visible_tags: Some(BTreeSet::new()),
                hidden_tags: Some(BTreeSet::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(cleared.tag_filter().is_unrestricted());
    assert!(ctx.directory.tag_filter(id).await.unwrap().is_unrestricted());
}

#[tokio::test]
async fn test_update_blank_display_name_clears_it() {
    let ctx = TestContext::new().await;
    let created = ctx
        .directory
        .create(
            &ctx.admin,
            NewUser::new("leo", "user").with_display_name("Leo"),
        )
        .await
        .unwrap();

    let updated = ctx
        .directory
        .update(
            &ctx.admin,
            created.user.id,
            UserUpdate {
                display_name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, None);
}

#[tokio::test]
async fn test_update_rejects_invalid_role_without_changes() {
    let ctx = TestContext::new().await;
    let mia = ctx.create_user("mia", Role::User).await;

    let err = ctx
        .directory
        .update(
            &ctx.admin,
            mia.id,
            UserUpdate {
                display_name: Some("Mia".to_string()),
                role: Some("root".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRole);

    let user = ctx.directory.get(&ctx.admin, mia.id).await.unwrap();
    assert_eq!(user.display_name, None);
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn test_update_unknown_user_is_not_found() {
    let ctx = TestContext::new().await;
    let err = ctx
        .directory
        .update(&ctx.admin, UserId::new(), UserUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ===== last admin =====

#[tokio::test]
async fn test_last_admin_cannot_be_demoted() {
    let ctx = TestContext::new().await;

    for role in ["user", "readonly"] {
        let err = ctx
            .directory
            .update(
                &ctx.admin,
                ctx.admin.id,
                UserUpdate {
                    role: Some(role.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LastAdminViolation);
    }

    // Re-asserting the admin role is not a demotion.
    let same = ctx
        .directory
        .update(
            &ctx.admin,
            ctx.admin.id,
            UserUpdate {
                role: Some("admin".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.role, Role::Admin);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deleted() {
    let ctx = TestContext::new().await;
    let other_admin = ctx.create_user("nina", Role::Admin).await;

    // Demote the bootstrap admin so that `nina` becomes the only admin.
    ctx.directory
        .update(
            &other_admin,
            ctx.admin.id,
            UserUpdate {
                role: Some("user".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A session that still carries the admin role for `root` tries to delete
    // the only remaining admin.
    let stale_admin = Actor::new(ctx.admin.id, "root", Role::Admin);
    let err = ctx
        .directory
        .delete(&stale_admin, other_admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LastAdminViolation);
    assert_eq!(ctx.list().await.len(), 2);
}

#[tokio::test]
async fn test_two_admins_permit_demoting_one() {
    let ctx = TestContext::new().await;
    let olga = ctx.create_user("olga", Role::Admin).await;

    let demoted = ctx
        .directory
        .update(
            &ctx.admin,
            olga.id,
            UserUpdate {
                role: Some("readonly".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::Readonly);

    // Now the bootstrap admin is the last one again.
    let err = ctx
        .directory
        .update(
            &ctx.admin,
            ctx.admin.id,
            UserUpdate {
                role: Some("user".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LastAdminViolation);
}

#[tokio::test]
async fn test_admin_may_demote_themselves_when_another_admin_exists() {
    let ctx = TestContext::new().await;
    ctx.create_user("peggy", Role::Admin).await;

    let demoted = ctx
        .directory
        .update(
            &ctx.admin,
            ctx.admin.id,
            UserUpdate {
                role: Some("user".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::User);
}

// ===== delete =====

#[tokio::test]
async fn test_delete_user() {
    let ctx = TestContext::new().await;
    let quinn = ctx.create_user("quinn", Role::User).await;

    ctx.directory.delete(&ctx.admin, quinn.id).await.unwrap();

    let usernames: Vec<_> = ctx.list().await.into_iter().map(|u| u.username).collect();
    assert_eq!(usernames, vec!["root"]);

    let err = ctx.directory.delete(&ctx.admin, quinn.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_self_delete_is_always_forbidden() {
    let ctx = TestContext::new().await;
    ctx.create_user("rupert", Role::Admin).await;
    let user = ctx.create_user("sybil", Role::User).await;
    let readonly = ctx.create_user("trent", Role::Readonly).await;

    for actor in [&ctx.admin, &user, &readonly] {
        let err = ctx.directory.delete(actor, actor.id).await.unwrap_err();
        assert_eq!(err, AccessError::SelfDeleteForbidden);
    }
    assert_eq!(ctx.list().await.len(), 4);
}

// ===== reset =====

#[tokio::test]
async fn test_reset_credential_twice() {
    let ctx = TestContext::new().await;
    let victor = ctx.create_user("victor", Role::User).await;

    let first = ctx
        .directory
        .reset_credential(&ctx.admin, victor.id)
        .await
        .unwrap();
    let user = ctx.directory.get(&ctx.admin, victor.id).await.unwrap();
    assert!(user.must_change_credential);

    let second = ctx
        .directory
        .reset_credential(&ctx.admin, victor.id)
        .await
        .unwrap();
    assert_ne!(first.expose(), second.expose());

    let user = ctx.directory.get(&ctx.admin, victor.id).await.unwrap();
    assert!(user.must_change_credential);

    // Only the latest secret works.
    let directory = &ctx.directory;
    assert!(
        directory
            .authenticate("victor", "correct-horse-battery")
            .await
            .unwrap()
            .is_none()
    );
    assert!(directory.authenticate("victor", first.expose()).await.unwrap().is_none());
    assert!(directory.authenticate("victor", second.expose()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_admin_cannot_waive_rotation_after_reset() {
    let ctx = TestContext::new().await;
    let wanda = ctx.create_user("wanda", Role::User).await;
    let temporary = ctx
        .directory
        .reset_credential(&ctx.admin, wanda.id)
        .await
        .unwrap();

    let err = ctx
        .directory
        .update(
            &ctx.admin,
            wanda.id,
            UserUpdate {
                display_name: Some("Wanda".to_string()),
                must_change_credential: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);

    let user = ctx.directory.get(&ctx.admin, wanda.id).await.unwrap();
    assert!(user.must_change_credential);
    assert_eq!(user.display_name, None);

    // Only the user's own change clears the flag.
    let user = ctx
        .directory
        .change_credential(&wanda, temporary.expose(), "wanda-new-password")
        .await
        .unwrap();
    assert!(!user.must_change_credential);
}

#[tokio::test]
async fn test_admin_can_force_rotation() {
    let ctx = TestContext::new().await;
    let xena = ctx.create_user("xena", Role::Readonly).await;

    let user = ctx
        .directory
        .update(
            &ctx.admin,
            xena.id,
            UserUpdate {
                must_change_credential: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(user.must_change_credential);
}

#[tokio::test]
async fn test_reset_unknown_user_is_not_found() {
    let ctx = TestContext::new().await;
    let err = ctx
        .directory
        .reset_credential(&ctx.admin, UserId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ===== list / get =====

#[tokio::test]
async fn test_list_is_ordered_by_creation() {
    let ctx = TestContext::new().await;
    for name in ["wendy", "alan", "mike", "bella"] {
        ctx.create_user(name, Role::Readonly).await;
    }

    let users = ctx.list().await;
    let usernames: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(usernames, vec!["root", "wendy", "alan", "mike", "bella"]);
    assert!(users.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn test_listed_users_do_not_expose_credential_hash() {
    let ctx = TestContext::new().await;
    ctx.create_user("xavier", Role::User).await;

    let json = serde_json::to_string(&ctx.list().await).unwrap();
    assert!(!json.contains("credential_hash"));
    assert!(!json.contains("$argon2"));
}

#[tokio::test]
async fn test_get_unknown_user_is_not_found() {
    let ctx = TestContext::new().await;
    let err = ctx
        .directory
        .get(&ctx.admin, UserId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ===== self-service credential change and login =====

#[tokio::test]
async fn test_change_credential_clears_rotation_flag() {
    let ctx = TestContext::new().await;
    let created = ctx
        .directory
        .create(&ctx.admin, NewUser::new("yvonne", "user"))
        .await
        .unwrap();
    let yvonne = actor_for(&created.user);
    let temporary = created.temporary_secret.unwrap();

    let err = ctx
        .directory
        .change_credential(&yvonne, "not-the-password", "a-brand-new-password")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);

    let err = ctx
        .directory
        .change_credential(&yvonne, temporary.expose(), "short")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);

    let user = ctx
        .directory
        .change_credential(&yvonne, temporary.expose(), "a-brand-new-password")
        .await
        .unwrap();
    assert!(!user.must_change_credential);

    assert!(
        ctx.directory
            .authenticate("yvonne", "a-brand-new-password")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        ctx.directory
            .authenticate("yvonne", temporary.expose())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_bootstrap_admin_can_rotate_their_secret() {
    let ctx = TestContext::new().await;
    let user = ctx
        .directory
        .change_credential(&ctx.admin, &ctx.admin_secret, "root-password-2")
        .await
        .unwrap();
    assert!(!user.must_change_credential);
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_authenticate_records_login() {
    let ctx = TestContext::new().await;
    ctx.create_user("zack", Role::User).await;

    assert!(ctx.directory.authenticate("zack", "wrong-password").await.unwrap().is_none());
    assert!(ctx.directory.authenticate("nobody", "whatever-pass").await.unwrap().is_none());

    let user = ctx
        .directory
        .authenticate("zack", "correct-horse-battery")
        .await
        .unwrap()
        .expect("valid credentials");
    assert!(user.last_login_at.is_some());
    assert!(!user.is_first_login);
}

#[tokio::test]
async fn test_bootstrap_is_noop_when_admin_exists() {
    let ctx = TestContext::new().await;
    assert!(ctx.directory.bootstrap_admin("another").await.unwrap().is_none());
    assert_eq!(ctx.list().await.len(), 1);
}

#[tokio::test]
async fn test_role_counts() {
    let ctx = TestContext::new().await;
    ctx.create_user("amy", Role::User).await;
    ctx.create_user("ben", Role::User).await;
    ctx.create_user("cal", Role::Readonly).await;

    let counts = ctx.directory.role_counts().await;
    assert_eq!(counts.get(&Role::Admin), Some(&1));
    assert_eq!(counts.get(&Role::User), Some(&2));
    assert_eq!(counts.get(&Role::Readonly), Some(&1));
}
