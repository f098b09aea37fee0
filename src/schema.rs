table! {
    accounts (id) {
        id -> Int8,
        email -> Varchar,
        username -> Varchar,
        password -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        account_number -> Int8,
        account_balance -> Numeric,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    transactions (id) {
        id -> Int8,
        account_id -> Int8,
        amount -> Numeric,
        balance -> Numeric,
        status -> Varchar,
        transaction_status -> Varchar,
        account_number -> Varchar,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

joinable!(transactions -> accounts (account_id));

allow_tables_to_appear_in_same_query!(
    accounts,
    transactions,
);
