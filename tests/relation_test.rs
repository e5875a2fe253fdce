mod common;

use common::{Account, Post, Profile, Role, setup};
use pretty_assertions::assert_eq;
use tabula::prelude::*;

fn account(conn: &mut SqlxConnection, name: &str, email: &str) -> anyhow::Result<Model> {
    Ok(Account::create(conn, [("name", name), ("email", email)])?)
}

fn key(model: &Model) -> Value {
    model.key().cloned().unwrap_or_default()
}

#[test]
fn test_has_many_and_belongs_to() -> anyhow::Result<()> {
    let mut conn = setup();
    let ana = account(&mut conn, "Ana", "a@x.com")?;
    let bea = account(&mut conn, "Bea", "b@x.com")?;

    for title in ["One", "Two"] {
        Post::create(&mut conn, [("title", Value::from(title)), ("account_id", key(&ana))])?;
    }
    Post::create(&mut conn, [("title", Value::from("Other")), ("account_id", key(&bea))])?;

    let posts = ana.has_many::<Post>().all(&mut conn)?;
    assert_eq!(posts.len(), 2);
    assert_eq!(ana.relation("posts")?.count(&mut conn)?, 2);

    let owner = posts[0].belongs_to::<Account>().first(&mut conn)?;
    assert_eq!(owner.map(|m| m.get("name")), Some(Value::from("Ana")));

    let titles: Vec<Value> = ana
        .has_many::<Post>()
        .query()
        .order_by("title", "desc")
        .pluck(&mut conn, "title")?;
    assert_eq!(titles, vec![Value::from("Two"), Value::from("One")]);
    Ok(())
}

#[test]
fn test_has_one() -> anyhow::Result<()> {
    let mut conn = setup();
    let ana = account(&mut conn, "Ana", "a@x.com")?;
    assert!(ana.has_one::<Profile>().first(&mut conn)?.is_none());

    Profile::create(&mut conn, [("bio", Value::from("Hi")), ("account_id", key(&ana))])?;
    let Related::One(Some(profile)) = ana.relation("profile")?.get(&mut conn)? else {
        panic!("expected a profile");
    };
    assert_eq!(profile.get("bio"), Value::from("Hi"));
    Ok(())
}

#[test]
fn test_relation_excludes_trashed_rows() -> anyhow::Result<()> {
    let mut conn = setup();
    let ana = account(&mut conn, "Ana", "a@x.com")?;
    let mut post = Post::create(&mut conn, [("title", Value::from("Gone")), ("account_id", key(&ana))])?;
    post.soft_delete(&mut conn)?;

    assert_eq!(ana.has_many::<Post>().count(&mut conn)?, 0);
    assert_eq!(ana.has_many::<Post>().query().with_trashed().count(&mut conn)?, 1);
    Ok(())
}

#[test]
fn test_belongs_to_many_attach_detach() -> anyhow::Result<()> {
    let mut conn = setup();
    let ana = account(&mut conn, "Ana", "a@x.com")?;
    let admin = Role::create(&mut conn, [("name", "admin")])?;
    let editor = Role::create(&mut conn, [("name", "editor")])?;
    Role::create(&mut conn, [("name", "viewer")])?;

    let roles = ana.belongs_to_many::<Role>();
    assert_eq!(roles.pivot_table(), Some("account_role"));
    assert_eq!(roles.attach(&mut conn, [key(&admin), key(&editor)])?, 2);

    let names: Vec<Value> = roles.query().order_by("name", "asc").pluck(&mut conn, "name")?;
    assert_eq!(names, vec![Value::from("admin"), Value::from("editor")]);

    assert_eq!(roles.detach(&mut conn, [key(&admin)])?, 1);
    assert_eq!(roles.count(&mut conn)?, 1);
    assert_eq!(roles.detach_all(&mut conn)?, 1);
    assert!(roles.all(&mut conn)?.is_empty());
    Ok(())
}

#[test]
fn test_attach_requires_saved_owner() -> anyhow::Result<()> {
    let mut conn = setup();
    let draft = Account::make([("name", "Ana")]);
    let err = draft.belongs_to_many::<Role>().attach(&mut conn, [1]).unwrap_err();
    assert!(matches!(err, OrmError::InvalidState(_)));
    assert!(draft.has_many::<Post>().all(&mut conn)?.is_empty());
    Ok(())
}

#[test]
fn test_load_caches_and_serializes() -> anyhow::Result<()> {
    let mut conn = setup();
    let mut ana = account(&mut conn, "Ana", "a@x.com")?;
    Post::create(&mut conn, [("title", Value::from("Hello")), ("account_id", key(&ana))])?;

    assert!(ana.loaded("posts").is_none());
    let loaded = ana.load(&mut conn, "posts")?;
    assert_eq!(loaded.many().len(), 1);

    // Later writes are not seen until the relation is loaded again.
    Post::create(&mut conn, [("title", Value::from("Again")), ("account_id", key(&ana))])?;
    assert_eq!(ana.loaded("posts").map(|r| r.many().len()), Some(1));

    let json = ana.to_json();
    assert_eq!(json["posts"][0]["title"], "Hello");
    assert!(matches!(ana.load(&mut conn, "followers"), Err(OrmError::Query { .. })));
    Ok(())
}

#[test]
fn test_missing_pivot_table_is_query_error() -> anyhow::Result<()> {
    let mut conn = setup();
    let ana = account(&mut conn, "Ana", "a@x.com")?;
    Schema::new(&mut conn).drop("account_role")?;

    let err = ana.belongs_to_many::<Role>().all(&mut conn).unwrap_err();
    assert!(matches!(err, OrmError::Query { .. }), "got {err:?}");
    Ok(())
}
