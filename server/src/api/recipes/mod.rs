pub mod create;
pub mod delete;
pub mod favorite;
pub mod get;
pub mod image;
pub mod list;
pub mod payload;
pub mod read;
pub mod shopping_cart;
pub mod update;

use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

/// Returns the router for /api/recipes endpoints (mounted at /api/recipes)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_recipes).post(create::create_recipe))
        .route(
            "/download_shopping_cart",
            get(shopping_cart::download_shopping_cart),
        )
        .route(
            "/{id}",
            get(get::get_recipe)
                .put(update::update_recipe)
                .patch(update::update_recipe)
                .delete(delete::delete_recipe),
        )
        .route("/{id}/image", get(image::get_recipe_image))
        .route(
            "/{id}/favorite",
            post(favorite::add_favorite).delete(favorite::remove_favorite),
        )
        .route(
            "/{id}/shopping_cart",
            post(shopping_cart::add_to_cart).delete(shopping_cart::remove_from_cart),
        )
        .layer(payload::body_limit())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list::list_recipes,
        get::get_recipe,
        create::create_recipe,
        update::update_recipe,
        delete::delete_recipe,
        image::get_recipe_image,
        favorite::add_favorite,
        favorite::remove_favorite,
        shopping_cart::add_to_cart,
        shopping_cart::remove_from_cart,
        shopping_cart::download_shopping_cart,
    ),
    components(schemas(
        read::RecipeResponse,
        read::ShortRecipeResponse,
        read::IngredientAmountResponse,
        payload::RecipeWriteRequest,
        payload::IngredientAmountRequest,
    ))
)]
pub struct ApiDoc;
