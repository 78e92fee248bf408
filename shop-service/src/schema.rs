diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        password_hash -> Nullable<Varchar>,
        role -> Varchar,
        provider -> Varchar,
        avatar -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        title -> Varchar,
        slug -> Varchar,
        description -> Text,
        images -> Array<Text>,
        price -> Numeric,
        compare_at_price -> Nullable<Numeric>,
        discount_percent -> Nullable<Int4>,
        category -> Varchar,
        stock -> Int4,
        variants -> Jsonb,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cart_items (id) {
        id -> Uuid,
        user_id -> Uuid,
        product_id -> Uuid,
        title -> Varchar,
        price_snapshot -> Numeric,
        variant -> Jsonb,
        qty -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        order_number -> Varchar,
        user_id -> Uuid,
        subtotal -> Numeric,
        discount_total -> Numeric,
        grand_total -> Numeric,
        status -> Varchar,
        shipping_address -> Nullable<Jsonb>,
        payment_ref -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        position -> Int4,
        product_id -> Uuid,
        title -> Varchar,
        price_at_purchase -> Numeric,
        qty -> Int4,
        variant -> Jsonb,
    }
}

diesel::table! {
    checkout_requests (user_id, idempotency_key) {
        user_id -> Uuid,
        idempotency_key -> Varchar,
        order_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(cart_items -> users (user_id));
diesel::joinable!(orders -> users (user_id));
diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(checkout_requests -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    products,
    cart_items,
    orders,
    order_items,
    checkout_requests,
);
