//! Food catalog MCP tools

use serde::Serialize;

use crate::diet::DietStore;
use crate::models::{FoodId, FoodItem, FoodItemCreate, Nutrients, CALORIES};
use super::{plan_error, Workspace};

#[derive(Debug, Serialize)]
pub struct AddFoodResponse {
    pub id: FoodId,
    pub name: String,
    pub catalog_size: usize,
}

/// Summary of a food for search results
#[derive(Debug, Serialize)]
pub struct FoodSummary {
    pub id: FoodId,
    pub name: String,
    pub calories_per_100g: f64,
    pub default_quantity_grams: f64,
}

impl From<&FoodItem> for FoodSummary {
    fn from(item: &FoodItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            calories_per_100g: item.nutrients.get(CALORIES),
            default_quantity_grams: item.default_quantity_grams,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchFoodsResponse {
    pub items: Vec<FoodSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FoodDetail {
    pub id: FoodId,
    pub name: String,
    pub nutrients_per_100g: Nutrients,
    pub default_quantity_grams: f64,
    pub created_at: String,
}

/// Register a food and make it usable in the session right away
pub async fn add_food<S: DietStore + ?Sized>(
    store: &S,
    ws: &mut Workspace,
    data: FoodItemCreate,
) -> Result<AddFoodResponse, String> {
    let id = ws.catalog.register(store, &data).await.map_err(plan_error)?;
    let item = ws.catalog.get(id).map_err(plan_error)?;

    Ok(AddFoodResponse {
        id,
        name: item.name.clone(),
        catalog_size: ws.catalog.len(),
    })
}

pub fn search_foods(ws: &Workspace, query: &str, limit: i64) -> SearchFoodsResponse {
    let limit = limit.clamp(1, 100) as usize;
    let items: Vec<FoodSummary> = ws.catalog.search(query, limit).into_iter().map(FoodSummary::from).collect();
    let total = items.len();
    SearchFoodsResponse { items, total }
}

pub fn get_food(ws: &Workspace, id: FoodId) -> Result<FoodDetail, String> {
    let item = ws.catalog.get(id).map_err(plan_error)?;
    Ok(FoodDetail {
        id: item.id,
        name: item.name.clone(),
        nutrients_per_100g: item.nutrients.clone(),
        default_quantity_grams: item.default_quantity_grams,
        created_at: item.created_at.clone(),
    })
}
