#![allow(dead_code)]

use tabula::prelude::*;

pub struct Account;

impl Entity for Account {
    const NAME: &'static str = "Account";

    fn configure(meta: EntityMeta) -> EntityMeta {
        meta.fillable(&["name", "email"])
            .hidden(&["email"])
            .timestamps(true)
            .rules("name", "required|min:2")
            .rules("email", "required|email")
            .relation("posts", RelationDef::has_many::<Post>())
            .relation("profile", RelationDef::has_one::<Profile>())
            .relation("roles", RelationDef::belongs_to_many::<Role>())
    }
}

pub struct Post;

impl Entity for Post {
    const NAME: &'static str = "Post";

    fn configure(meta: EntityMeta) -> EntityMeta {
        meta.fillable(&["title", "body", "account_id", "views"])
            .cast("views", Cast::Int)
            .timestamps(true)
            .soft_deletes(true)
            .scope("popular", |q| q.where_op("views", ">=", 100))
            .relation("account", RelationDef::belongs_to::<Account>())
    }
}

pub struct Profile;

impl Entity for Profile {
    const NAME: &'static str = "Profile";

    fn configure(meta: EntityMeta) -> EntityMeta {
        meta.fillable(&["bio", "account_id"])
    }
}

pub struct Role;

impl Entity for Role {
    const NAME: &'static str = "Role";

    fn configure(meta: EntityMeta) -> EntityMeta {
        meta.guarded(&["id"])
    }
}

/// An in-memory database with every table the test entities use.
pub fn setup() -> SqlxConnection {
    let mut conn = SqlxConnection::connect("sqlite::memory:").expect("in-memory sqlite");
    let mut schema = Schema::new(&mut conn);

    schema
        .create("accounts", |table| {
            table.id();
            table.string("name", 100);
            table.string("email", 255).unique();
            table.timestamps();
        })
        .expect("create accounts");
    schema
        .create("posts", |table| {
            table.id();
            table.string("title", 255);
            table.text("body").nullable();
            table.integer("views").default(0);
            table
                .foreign_id("account_id")
                .nullable()
                .constrained()
                .cascade_on_delete();
            table.timestamps();
            table.soft_deletes();
        })
        .expect("create posts");
    schema
        .create("profiles", |table| {
            table.id();
            table.text("bio").nullable();
            table.foreign_id("account_id");
        })
        .expect("create profiles");
    schema
        .create("roles", |table| {
            table.id();
            table.string("name", 50);
        })
        .expect("create roles");
    schema
        .create("account_role", |table| {
            table.foreign_id("account_id");
            table.foreign_id("role_id");
            table.primary(&["account_id", "role_id"]);
        })
        .expect("create account_role");

    conn
}
