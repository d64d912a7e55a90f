diesel::table! {
    orders (order_id) {
        order_id -> Varchar,
        customer_id -> Varchar,
        status -> Varchar,
        total_amount -> Numeric,
        order_date -> Timestamptz,
        items_json -> Text,
    }
}
