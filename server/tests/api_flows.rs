//! End-to-end flows against a real Postgres.
//!
//! Set `TEST_DATABASE_URL` to run them; without it every test returns early.
//! Names are suffixed with a random value so the suite can rerun on the same database.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use foodgram_server::{app, db};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// 1x1 transparent PNG
const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

struct TestApp {
    router: Router,
    suffix: String,
}

impl TestApp {
    fn connect() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = db::create_pool(&url, 4).expect("failed to set up test database");
        Some(Self {
            router: app(Arc::new(pool)),
            suffix: format!("{:08x}", rand::random::<u32>()),
        })
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.call(method, uri, token, body).await;
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    /// Register a user and return (id, token).
    async fn user(&self, name: &str) -> (i64, String) {
        let username = format!("{}_{}", name, self.suffix);
        let email = format!("{}@example.com", username);
        let (status, created) = self
            .json(
                Method::POST,
                "/api/users",
                None,
                Some(json!({
                    "email": email,
                    "username": username,
                    "first_name": name,
                    "last_name": "Tester",
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);

        let (status, login) = self
            .json(
                Method::POST,
                "/api/auth/token/login",
                None,
                Some(json!({"email": email, "password": "correct horse battery"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", login);

        (
            created["id"].as_i64().unwrap(),
            login["auth_token"].as_str().unwrap().to_string(),
        )
    }

    async fn create(&self, uri: &str, token: &str, body: Value) -> i64 {
        let (status, created) = self.json(Method::POST, uri, Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);
        created["id"].as_i64().unwrap()
    }
}

fn errors_message(body: &Value) -> &str {
    body["errors"][0].as_str().unwrap_or_default()
}

#[tokio::test]
async fn subscriptions_reject_self_and_duplicates() {
    let Some(app) = TestApp::connect() else {
        return;
    };
    let (author_id, _) = app.user("author").await;
    let (reader_id, reader) = app.user("reader").await;

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/users/{}/subscribe", reader_id),
            Some(&reader),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_message(&body), "You cannot subscribe to yourself.");

    let subscribe = format!("/api/users/{}/subscribe", author_id);
    let (status, body) = app.json(Method::POST, &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["is_subscribed"], json!(true));
    assert_eq!(body["recipes_count"], json!(0));

    let (status, body) = app.json(Method::POST, &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_message(&body), "You are already subscribed to this user.");

    let (status, _) = app.call(Method::DELETE, &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::DELETE, &subscribe, Some(&reader), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn favorites_cart_and_shopping_list() {
    let Some(app) = TestApp::connect() else {
        return;
    };
    let (_, author) = app.user("cook").await;
    let (_, shopper) = app.user("shopper").await;

    let tag = app
        .create(
            "/api/tags",
            &author,
            json!({
                "name": format!("Breakfast {}", app.suffix),
                "color": format!("#{}", &app.suffix[..6]),
                "slug": format!("breakfast-{}", app.suffix),
            }),
        )
        .await;
    let flour_name = format!("flour {}", app.suffix);
    let flour = app
        .create(
            "/api/ingredients",
            &author,
            json!({"name": flour_name, "measurement_unit": "g"}),
        )
        .await;

    let mut recipes = Vec::new();
    for (name, amount) in [("Pancakes", 100), ("Crepes", 50)] {
        recipes.push(
            app.create(
                "/api/recipes",
                &author,
                json!({
                    "ingredients": [{"id": flour, "amount": amount}],
                    "tags": [tag],
                    "image": TINY_PNG,
                    "name": name,
                    "text": "Mix and fry.",
                    "cooking_time": 20,
                }),
            )
            .await,
        );
    }

    let favorite = format!("/api/recipes/{}/favorite", recipes[0]);
    let (status, body) = app.json(Method::POST, &favorite, Some(&shopper), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["image"], json!(format!("/api/recipes/{}/image", recipes[0])));
    let (status, body) = app.json(Method::POST, &favorite, Some(&shopper), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_message(&body), "Recipe is already in favorites.");

    for id in &recipes {
        let (status, body) = app
            .json(
                Method::POST,
                &format!("/api/recipes/{}/shopping_cart", id),
                Some(&shopper),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/recipes/{}/shopping_cart", recipes[0]),
            Some(&shopper),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(errors_message(&body), "Recipe is already in the shopping cart.");

    let (status, recipe) = app
        .json(
            Method::GET,
            &format!("/api/recipes/{}", recipes[0]),
            Some(&shopper),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recipe["is_favorited"], json!(true));
    assert_eq!(recipe["is_in_shopping_cart"], json!(true));

    let (status, list) = app
        .call(
            Method::GET,
            "/api/recipes/download_shopping_cart",
            Some(&shopper),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, format!("- {} (g) — 150\n", flour_name));
}

#[tokio::test]
async fn recipe_writes_enforce_cooking_time_and_authorship() {
    let Some(app) = TestApp::connect() else {
        return;
    };
    let (_, author) = app.user("chef").await;
    let (_, stranger) = app.user("stranger").await;

    let tag = app
        .create(
            "/api/tags",
            &author,
            json!({
                "name": format!("Dinner {}", app.suffix),
                "color": format!("#{}", &app.suffix[2..8]),
                "slug": format!("dinner-{}", app.suffix),
            }),
        )
        .await;
    let salt = app
        .create(
            "/api/ingredients",
            &author,
            json!({"name": format!("salt {}", app.suffix), "measurement_unit": "pinch"}),
        )
        .await;

    let payload = |cooking_time: i64| {
        json!({
            "ingredients": [{"id": salt, "amount": 1}],
            "tags": [tag],
            "image": TINY_PNG,
            "name": "Salted water",
            "text": "Boil.",
            "cooking_time": cooking_time,
        })
    };

    let (status, body) = app
        .json(Method::POST, "/api/recipes", Some(&author), Some(payload(301)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("cooking_time").is_some(), "{}", body);

    let id = app.create("/api/recipes", &author, payload(10)).await;
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/recipes/{}", id),
            Some(&stranger),
            Some(payload(15)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut update = payload(15);
    if let Some(fields) = update.as_object_mut() {
        fields.remove("image");
    }
    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/api/recipes/{}/", id),
            Some(&author),
            Some(update),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["cooking_time"], json!(15));

    let (status, _) = app
        .call(Method::GET, &format!("/api/recipes/{}/image", id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
