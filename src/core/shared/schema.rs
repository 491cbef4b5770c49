diesel::table! {
    tickets (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        category -> Nullable<Text>,
        priority -> Nullable<Text>,
        status -> Text,
        created_at -> Timestamptz,
    }
}
