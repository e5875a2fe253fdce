use pretty_assertions::assert_eq;
use tabula::prelude::*;

struct Note;

fn reject_blank(model: &mut Model) -> OrmResult<()> {
    if model.get("body").as_str().is_some_and(|s| s.trim().is_empty()) {
        return Err(OrmError::InvalidState("note body is blank".to_string()));
    }
    Ok(())
}

fn stamp_slug(model: &mut Model) -> OrmResult<()> {
    let slug = model.get("title").to_string().to_lowercase().replace(' ', "-");
    model.set_raw("slug", slug);
    Ok(())
}

fn refuse_delete(_: &mut Model) -> OrmResult<()> {
    Err(OrmError::InvalidState("notes are permanent".to_string()))
}

fn trim(value: Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(s.trim().to_string()),
        other => other,
    }
}

fn shout(_: &Model, value: Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(s.to_uppercase()),
        other => other,
    }
}

impl Entity for Note {
    const NAME: &'static str = "Note";

    fn configure(meta: EntityMeta) -> EntityMeta {
        meta.fillable(&["title", "body", "pinned"])
            .cast("pinned", Cast::Bool)
            .mutator("title", trim)
            .accessor("title", shout)
            .on(ModelEvent::Saving, reject_blank)
            .on(ModelEvent::Creating, stamp_slug)
            .on(ModelEvent::Deleting, refuse_delete)
    }
}

fn setup() -> SqlxConnection {
    let mut conn = SqlxConnection::connect("sqlite::memory:").expect("in-memory sqlite");
    Schema::new(&mut conn)
        .create("notes", |table| {
            table.id();
            table.string("title", 100);
            table.string("slug", 100).nullable();
            table.text("body");
            table.boolean("pinned").default(false);
        })
        .expect("create notes");
    conn
}

#[test]
fn test_pre_event_error_aborts_save() {
    let mut conn = setup();
    let mut note = Note::make([("title", "Todo"), ("body", "   ")]);

    let err = note.save(&mut conn).unwrap_err();
    assert!(matches!(err, OrmError::InvalidState(_)));
    assert!(!note.exists());
    assert_eq!(Note::query().count(&mut conn).unwrap(), 0);
}

#[test]
fn test_creating_hook_can_set_attributes() -> anyhow::Result<()> {
    let mut conn = setup();
    let note = Note::create(&mut conn, [("title", "  Weekly Plan "), ("body", "ship it")])?;

    assert_eq!(note.get_raw("title"), Some(&Value::from("Weekly Plan")));
    assert_eq!(note.get("title"), Value::from("WEEKLY PLAN"));

    let stored = Note::find_or_fail(&mut conn, note.key().cloned().unwrap_or_default())?;
    assert_eq!(stored.get_raw("slug"), Some(&Value::from("weekly-plan")));
    Ok(())
}

#[test]
fn test_deleting_hook_keeps_row() -> anyhow::Result<()> {
    let mut conn = setup();
    let mut note = Note::create(&mut conn, [("title", "Keep"), ("body", "forever")])?;

    assert!(note.delete(&mut conn).is_err());
    assert!(note.exists());
    assert_eq!(Note::query().count(&mut conn)?, 1);
    Ok(())
}

#[test]
fn test_bool_cast() -> anyhow::Result<()> {
    let mut conn = setup();
    let note = Note::create(
        &mut conn,
        [("title", Value::from("Pin")), ("body", Value::from("x")), ("pinned", Value::from(true))],
    )?;
    let stored = Note::find_or_fail(&mut conn, note.key().cloned().unwrap_or_default())?;
    assert_eq!(stored.get("pinned"), Value::Bool(true));
    assert_eq!(stored.to_json()["pinned"], true);
    Ok(())
}
