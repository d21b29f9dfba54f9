diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Text,
        email -> Text,
        password_hash -> Text,
        role -> Text,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        category -> Text,
        priority -> Text,
        status -> Text,
        created_by -> Uuid,
        assigned_to -> Nullable<Uuid>,
        sla_deadline -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
        closed_at -> Nullable<Timestamptz>,
        attachments -> Jsonb,
        history -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        author_id -> Uuid,
        content -> Text,
        mentions -> Array<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        user_id -> Uuid,
        ticket_id -> Uuid,
        kind -> Text,
        message -> Text,
        read -> Bool,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, tickets, comments, notifications);
