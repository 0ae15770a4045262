diesel::table! {
    accounts (user_id) {
        user_id -> Text,
        balance -> Text,
    }
}

diesel::table! {
    entries (id) {
        id -> BigInt,
        user_id -> Text,
        kind -> Text,
        amount -> Text,
        balance_before -> Text,
        balance_after -> Text,
        description -> Text,
        wager_id -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    events (id) {
        id -> Text,
        kind -> Text,
        name -> Text,
        status -> Text,
        home_sector -> Nullable<Text>,
        away_sector -> Nullable<Text>,
        home_score -> Integer,
        away_score -> Integer,
        base_home -> Nullable<Text>,
        base_draw -> Nullable<Text>,
        base_away -> Nullable<Text>,
        live_home -> Nullable<Text>,
        live_draw -> Nullable<Text>,
        live_away -> Nullable<Text>,
        outcome -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    champion_quotes (event_id, sector_id) {
        event_id -> Text,
        sector_id -> Text,
        price -> Text,
        is_active -> Integer,
    }
}

diesel::table! {
    scorer_quotes (event_id, player_id) {
        event_id -> Text,
        player_id -> Text,
        price -> Text,
        is_active -> Integer,
        scored -> Integer,
        goals -> Integer,
    }
}

diesel::table! {
    wagers (id) {
        id -> Text,
        user_id -> Text,
        event_id -> Text,
        market -> Text,
        selection -> Text,
        stake -> Text,
        price_at_placement -> Text,
        potential_payout -> Text,
        status -> Text,
        created_at -> Text,
        resolved_at -> Nullable<Text>,
    }
}

diesel::table! {
    profit_approvals (id) {
        id -> Text,
        user_id -> Text,
        wager_id -> Text,
        market -> Text,
        principal -> Text,
        profit -> Text,
        price_at_placement -> Text,
        description -> Text,
        status -> Text,
        reviewer_id -> Nullable<Text>,
        decided_at -> Nullable<Text>,
        rejection_reason -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::joinable!(wagers -> events (event_id));
diesel::joinable!(profit_approvals -> wagers (wager_id));

diesel::allow_tables_to_appear_in_same_query!(
    accounts,
    entries,
    events,
    champion_quotes,
    scorer_quotes,
    wagers,
    profit_approvals,
);
