//! End-to-end tests driving the router.

use axum::http::StatusCode;
use axum_test::TestServer;
use galley_menu::CatalogSeed;
use galley_node::{create_router, AppState};
use galley_orders::RefreshPolicy;
use serde_json::{json, Value};

const SEED: &str = r#"{
    "categories": [{ "name": "Antipasti" }, { "name": "Vini", "is_food": false }],
    "attributes": ["nuts"],
    "ingredients": [
        { "name": "Burrata", "attributes": ["vegetarian", "dairy"] },
        { "name": "Prosciutto", "attributes": ["pork"] },
        { "name": "Arugula", "attributes": ["vegetarian", "vegan"] },
        { "name": "Balsamic Glaze", "attributes": ["vegetarian", "vegan", "alcohol"] },
        { "name": "Chianti", "attributes": ["vegetarian", "vegan", "alcohol"] }
    ],
    "offerings": [
        {
            "name": "Burrata con Prosciutto",
            "price": "14.50",
            "category": "Antipasti",
            "quantity": 100,
            "recommended": true,
            "mandatory": ["Burrata", "Prosciutto"],
            "removable": ["Arugula", "Balsamic Glaze"]
        },
        {
            "name": "Chianti Classico",
            "price": "9.00",
            "category": "Vini",
            "quantity": 10,
            "mandatory": ["Chianti"]
        }
    ]
}"#;

struct Fixture {
    server: TestServer,
    state: AppState,
    burrata: u64,
    chianti: u64,
}

async fn fixture() -> Fixture {
    let state = AppState::new(RefreshPolicy::default());
    CatalogSeed::from_json(SEED)
        .unwrap()
        .apply(state.store.as_ref())
        .await
        .unwrap();

    let burrata = state
        .composer
        .list_offerings()
        .await
        .unwrap()
        .into_iter()
        .find(|o| o.name == "Burrata con Prosciutto")
        .unwrap();
    let chianti = state
        .composer
        .list_offerings()
        .await
        .unwrap()
        .into_iter()
        .find(|o| o.name == "Chianti Classico")
        .unwrap();

    let server = TestServer::new(create_router(state.clone())).unwrap();
    Fixture {
        server,
        state,
        burrata: burrata.id.0,
        chianti: chianti.id.0,
    }
}

async fn ingredient_id(state: &AppState, name: &str) -> u64 {
    state.catalog.find_ingredient(name).await.unwrap().id.0
}

#[tokio::test]
async fn test_health() {
    let f = fixture().await;

    let response = f.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["store_version"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_categories_filtered_by_food() {
    let f = fixture().await;

    let all: Vec<Value> = f.server.get("/api/v1/categories").await.json();
    assert_eq!(all.len(), 2);

    let drinks: Vec<Value> = f
        .server
        .get("/api/v1/categories")
        .add_query_param("is_food", "false")
        .await
        .json();
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0]["name"], "Vini");
}

#[tokio::test]
async fn test_menu_with_dietary_filter() {
    let f = fixture().await;

    let menu: Vec<Value> = f.server.get("/api/v1/menu").await.json();
    assert_eq!(menu.len(), 2);

    let food: Vec<Value> = f
        .server
        .get("/api/v1/menu")
        .add_query_param("is_food", "true")
        .await
        .json();
    assert_eq!(food.len(), 1);
    assert_eq!(food[0]["offering"]["name"], "Burrata con Prosciutto");
    assert_eq!(food[0]["category"], "Antipasti");

    let no_alcohol: Vec<Value> = f
        .server
        .get("/api/v1/menu")
        .add_query_param("avoid", "alcohol")
        .await
        .json();
    assert_eq!(no_alcohol.len(), 1);
    assert_eq!(
        no_alcohol[0]["feasibility"]["verdict"],
        "feasible_with_modification"
    );
}

#[tokio::test]
async fn test_composition_and_profile() {
    let f = fixture().await;

    let composition: Vec<Value> = f
        .server
        .get(&format!("/api/v1/offerings/{}/composition", f.burrata))
        .await
        .json();
    assert_eq!(composition.len(), 4);
    assert_eq!(composition[0]["ingredient"]["name"], "Burrata");
    assert_eq!(composition[0]["is_removable"], false);

    let profile: Value = f
        .server
        .get(&format!("/api/v1/offerings/{}/profile", f.burrata))
        .await
        .json();
    let exclusionary: Vec<String> =
        serde_json::from_value(profile["exclusionary"].clone()).unwrap();
    assert!(exclusionary.contains(&"pork".to_string()));
    assert!(exclusionary.contains(&"dairy".to_string()));
}

#[tokio::test]
async fn test_feasibility_verdicts() {
    let f = fixture().await;
    let path = format!("/api/v1/offerings/{}/feasibility", f.burrata);

    let pork: Value = f
        .server
        .post(&path)
        .json(&json!({ "excluded": ["pork"] }))
        .await
        .json();
    assert_eq!(pork["verdict"], "infeasible");

    let nuts: Value = f
        .server
        .post(&path)
        .json(&json!({ "excluded": ["nuts"] }))
        .await
        .json();
    assert_eq!(nuts["verdict"], "feasible");

    let glaze = ingredient_id(&f.state, "Balsamic Glaze").await;
    let alcohol: Value = f
        .server
        .post(&path)
        .json(&json!({ "excluded": ["alcohol"] }))
        .await
        .json();
    assert_eq!(alcohol["verdict"], "feasible_with_modification");
    assert_eq!(alcohol["remove"], json!([glaze]));

    f.server
        .post("/api/v1/offerings/9999/feasibility")
        .json(&json!({ "excluded": ["pork"] }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_attribute_report() {
    let f = fixture().await;

    let report: Value = f
        .server
        .post(&format!("/api/v1/offerings/{}/attributes", f.burrata))
        .json(&json!({ "check": ["pork", "nuts"] }))
        .await
        .json();
    assert_eq!(report["offering"], "Burrata con Prosciutto");
    assert_eq!(report["checks"][0]["attribute"], "pork");
    assert_eq!(report["checks"][0]["present"], true);
    assert_eq!(report["checks"][1]["present"], false);
}

#[tokio::test]
async fn test_place_and_out_of_stock() {
    let f = fixture().await;

    let response = f
        .server
        .post("/api/v1/orders/1/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 4 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let placed: Value = response.json();
    assert_eq!(placed["item"]["status"], "pending");
    assert_eq!(placed["item"]["offering"], "Chianti Classico");

    let rejected = f
        .server
        .post("/api/v1/orders/1/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 7 }))
        .await;
    rejected.assert_status(StatusCode::CONFLICT);
    let body: Value = rejected.json();
    assert_eq!(body["error"], "out_of_stock");

    f.server
        .post("/api/v1/orders/1/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_place_rejects_mandatory_removal() {
    let f = fixture().await;
    let prosciutto = ingredient_id(&f.state, "Prosciutto").await;

    let response = f
        .server
        .post("/api/v1/orders/2/items")
        .json(&json!({
            "offering_id": f.burrata,
            "quantity": 1,
            "removed_ingredients": [prosciutto]
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let items: Vec<Value> = f.server.get("/api/v1/orders/2/items").await.json();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_place_infers_removals_from_instructions() {
    let f = fixture().await;
    let arugula = ingredient_id(&f.state, "Arugula").await;

    let placed: Value = f
        .server
        .post("/api/v1/orders/3/items")
        .json(&json!({
            "offering_id": f.burrata,
            "quantity": 1,
            "special_instructions": "No arugula please"
        }))
        .await
        .json();
    assert_eq!(placed["inferred_removals"], true);
    assert_eq!(placed["item"]["removed"][0]["id"], json!(arugula));

    let id = placed["item"]["id"].as_u64().unwrap();
    let detail: Value = f.server.get(&format!("/api/v1/items/{}", id)).await.json();
    assert_eq!(detail["removed"][0]["name"], "Arugula");
}

#[tokio::test]
async fn test_item_lifecycle_through_settlement() {
    let f = fixture().await;

    let placed: Value = f
        .server
        .post("/api/v1/orders/4/items")
        .json(&json!({ "offering_id": f.burrata, "quantity": 2 }))
        .await
        .json();
    let id = placed["item"]["id"].as_u64().unwrap();

    let advanced: Value = f
        .server
        .post(&format!("/api/v1/items/{}/advance", id))
        .await
        .json();
    assert_eq!(advanced["status"], "preparing");

    f.server
        .post(&format!("/api/v1/items/{}/advance", id))
        .await
        .assert_status_ok();

    let status: Value = f
        .server
        .get(&format!("/api/v1/items/{}/status", id))
        .await
        .json();
    assert_eq!(status["status"], "served");

    f.server
        .post(&format!("/api/v1/items/{}/cancel", id))
        .await
        .assert_status(StatusCode::CONFLICT);

    let receipt: Value = f.server.get("/api/v1/orders/4/receipt").await.json();
    assert_eq!(receipt["total"], "29.00");
    assert_eq!(receipt["lines"][0]["quantity"], 2);

    let settlement: Value = f
        .server
        .post("/api/v1/orders/4/settle")
        .json(&json!({}))
        .await
        .json();
    assert_eq!(settlement["paid"], json!([id]));

    let second: Value = f
        .server
        .post("/api/v1/orders/4/settle")
        .json(&json!({}))
        .await
        .json();
    assert_eq!(second["already_paid"], json!([id]));

    let unpaid: Value = f.server.get("/api/v1/orders/4/receipt").await.json();
    assert!(unpaid["lines"].as_array().unwrap().is_empty());

    let with_paid: Value = f
        .server
        .get("/api/v1/orders/4/receipt")
        .add_query_param("include_paid", "true")
        .add_query_param("include_status", "true")
        .await
        .json();
    assert_eq!(with_paid["lines"][0]["status"], "paid");
}

#[tokio::test]
async fn test_cancel_restores_stock() {
    let f = fixture().await;

    let placed: Value = f
        .server
        .post("/api/v1/orders/5/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 10 }))
        .await
        .json();
    let id = placed["item"]["id"].as_u64().unwrap();

    let cancelled: Value = f
        .server
        .post(&format!("/api/v1/items/{}/cancel", id))
        .await
        .json();
    assert_eq!(cancelled["status"], "cancelled");

    f.server
        .post("/api/v1/orders/5/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 10 }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_update_quantity_outcomes() {
    let f = fixture().await;

    let placed: Value = f
        .server
        .post("/api/v1/orders/6/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 2 }))
        .await
        .json();
    let id = placed["item"]["id"].as_u64().unwrap();
    let path = format!("/api/v1/items/{}/quantity", id);

    let adjusted: Value = f.server.put(&path).json(&json!({ "quantity": 3 })).await.json();
    assert_eq!(adjusted["outcome"], "adjusted");
    assert_eq!(adjusted["item"]["quantity"], 3);

    f.server
        .post(&format!("/api/v1/items/{}/advance", id))
        .await
        .assert_status_ok();

    let placed_again: Value = f.server.put(&path).json(&json!({ "quantity": 1 })).await.json();
    assert_eq!(placed_again["outcome"], "placed");
    assert_ne!(placed_again["item"]["id"], json!(id));

    let cancelled: Value = f.server.put(&path).json(&json!({ "quantity": 0 })).await.json();
    assert_eq!(cancelled["outcome"], "cancelled");

    let items: Vec<Value> = f.server.get("/api/v1/orders/6/items").await.json();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_refresh_endpoint_with_nothing_due() {
    let f = fixture().await;

    f.server
        .post("/api/v1/orders/7/items")
        .json(&json!({ "offering_id": f.chianti, "quantity": 1 }))
        .await
        .assert_status(StatusCode::CREATED);

    let report: Value = f
        .server
        .post("/api/v1/refresh")
        .add_query_param("order_id", "7")
        .await
        .json();
    assert!(report["advanced"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let f = fixture().await;

    let response = f.server.get("/api/v1/items/424242").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "not_found");
}
