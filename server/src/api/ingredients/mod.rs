pub mod create;
pub mod get;
pub mod list;

use crate::models::Ingredient;
use crate::AppState;
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

/// Returns the router for /api/ingredients endpoints (mounted at /api/ingredients)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_ingredients).post(create::create_ingredient))
        .route("/{id}", get(get::get_ingredient))
}

#[derive(OpenApi)]
#[openapi(
    paths(list::list_ingredients, get::get_ingredient, create::create_ingredient),
    components(schemas(Ingredient, create::CreateIngredientRequest))
)]
pub struct ApiDoc;
