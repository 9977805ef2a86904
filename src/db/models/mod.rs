pub mod event;
pub mod user;

pub mod sql_fragment {
    pub const USER_FIELDS: &str = r#"
        id,
        display_name,
        total_points,
        activity_count,
        level,
        created_at,
        updated_at
    "#;

    pub const EVENT_FIELDS: &str = r#"
        id,
        user_id,
        points,
        tag,
        chat_id,
        message_id,
        created_at
    "#;
}
