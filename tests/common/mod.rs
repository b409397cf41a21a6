//! Shared fixtures: a blog schema and helpers over `MockDatabase`.

#![allow(dead_code)]

use lifeguard_related::mock::MockDatabase;
use lifeguard_related::schema::{ModelDef, RelationDef, RelationKind, Schema};
use sea_query::Value;

/// SQL text of every statement run so far
pub fn statements(db: &MockDatabase) -> Vec<String> {
    db.statements().into_iter().map(|s| s.sql).collect()
}

pub fn ids(ids: &[i32]) -> Vec<Value> {
    ids.iter().copied().map(Value::from).collect()
}

/// users, posts, comments (polymorphic), roles (pivot), teams
pub fn blog_schema() -> Schema {
    Schema::builder()
        .model(
            ModelDef::new("User", "users")
                .relation("posts", RelationDef::has_many("Post", "user_id"))
                .relation("profile", RelationDef::has_one("Profile", "user_id"))
                .relation("team", RelationDef::belongs_to("Team", "team_id"))
                .relation("roles", RelationDef::belongs_to_many("Role", "role_user", "user_id", "role_id"))
                .relation(
                    "comments",
                    RelationDef::new(
                        RelationKind::HasManyThrough {
                            through: "Post".into(),
                            first_key: "user_id".into(),
                            second_key: "commentable_id".into(),
                        },
                        "Comment",
                    ),
                ),
        )
        .model(
            ModelDef::new("Post", "posts")
                .relation("author", RelationDef::belongs_to("User", "user_id"))
                .relation("comments", RelationDef::morph_many("Comment", "commentable")),
        )
        .model(ModelDef::new("Comment", "comments"))
        .model(ModelDef::new("Profile", "profiles"))
        .model(ModelDef::new("Role", "roles"))
        .model(ModelDef::new("Team", "teams"))
        .build()
}
