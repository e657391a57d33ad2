mod common;

use axum::http::{Method, StatusCode};
use common::{checkout_event, order_body, order_id_of, response_json, TestApp, ORIGIN};
use rust_decimal_macros::dec;

#[tokio::test]
async fn unpaid_online_orders_stay_hidden_until_confirmed() {
    let app = TestApp::new().await;
    let user = app.create_user("history@example.com").await;
    let apple = app.seed_product("Apple", dec!(100), true).await;
    let address = app.seed_address(user.id).await;

    let cod = app
        .request(
            Method::POST,
            "/api/order/cod",
            Some(order_body(&[(apple.id, 1)], Some(address.id))),
            Some(&user.token),
        )
        .await;
    let cod_id = order_id_of(&response_json(cod).await);

    let online = app
        .request_with_headers(
            Method::POST,
            "/api/order/stripe",
            Some(order_body(&[(apple.id, 3)], Some(address.id))),
            Some(&user.token),
            &[("origin", ORIGIN)],
        )
        .await;
    let online_id = order_id_of(&response_json(online).await);

    let seller = app.seller_token();
    for (uri, token) in [
        ("/api/order/user", user.token.as_str()),
        ("/api/order/seller", seller.as_str()),
    ] {
        let response = app.request(Method::GET, uri, None, Some(token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        let orders = body["orders"].as_array().expect("orders array");
        assert_eq!(orders.len(), 1, "{}", uri);
        assert_eq!(orders[0]["id"], cod_id.to_string());
    }

    let confirmed = app
        .post_webhook(&checkout_event(
            "checkout.session.completed",
            Some(online_id),
            Some(user.id),
        ))
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/order/user", None, Some(&user.token))
        .await;
    let body = response_json(response).await;
    let orders = body["orders"].as_array().expect("orders array");
    assert_eq!(orders.len(), 2);
    for order in orders {
        assert!(order["payment_type"] == "cod" || order["is_paid"] == true);
    }
}

#[tokio::test]
async fn orders_are_expanded_and_newest_first() {
    let app = TestApp::new().await;
    let user = app.create_user("expanded@example.com").await;
    let apple = app.seed_product("Apple", dec!(100), true).await;
    let pear = app.seed_product("Pear", dec!(5), true).await;
    let address = app.seed_address(user.id).await;

    let mut placed = Vec::new();
    for product in [apple.id, pear.id] {
        let response = app
            .request(
                Method::POST,
                "/api/order/cod",
                Some(order_body(&[(product, 1)], Some(address.id))),
                Some(&user.token),
            )
            .await;
        placed.push(order_id_of(&response_json(response).await));
        // Distinct creation timestamps
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let response = app
        .request(Method::GET, "/api/order/user", None, Some(&user.token))
        .await;
    let body = response_json(response).await;
    let orders = body["orders"].as_array().expect("orders array");
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], placed[1].to_string());
    assert_eq!(orders[1]["id"], placed[0].to_string());

    let newest = &orders[0];
    assert_eq!(newest["items"][0]["product"]["name"], "Pear");
    assert_eq!(newest["address"]["street"], "12 Analytical Row");
}

#[tokio::test]
async fn users_only_see_their_own_orders() {
    let app = TestApp::new().await;
    let alice = app.create_user("alice@example.com").await;
    let bob = app.create_user("bob@example.com").await;
    let apple = app.seed_product("Apple", dec!(100), true).await;
    let address = app.seed_address(alice.id).await;

    let placed = app
        .request(
            Method::POST,
            "/api/order/cod",
            Some(order_body(&[(apple.id, 1)], Some(address.id))),
            Some(&alice.token),
        )
        .await;
    assert_eq!(placed.status(), StatusCode::CREATED);

    let response = app
        .request(Method::GET, "/api/order/user", None, Some(&bob.token))
        .await;
    let body = response_json(response).await;
    assert!(body["orders"].as_array().expect("orders array").is_empty());

    let response = app
        .request(Method::GET, "/api/order/seller", None, Some(&app.seller_token()))
        .await;
    let body = response_json(response).await;
    assert_eq!(body["orders"].as_array().expect("orders array").len(), 1);
}

#[tokio::test]
async fn seller_listing_requires_the_seller_session() {
    let app = TestApp::new().await;
    let user = app.create_user("nosell@example.com").await;

    let anonymous = app
        .request(Method::GET, "/api/order/seller", None, None)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let customer = app
        .request(Method::GET, "/api/order/seller", None, Some(&user.token))
        .await;
    assert_eq!(customer.status(), StatusCode::UNAUTHORIZED);
}
