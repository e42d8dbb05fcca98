use crate::model::department::DEPARTMENTS;
use actix_web::{HttpResponse, Responder};

/// Department catalogue for the registration form
#[utoipa::path(
    get,
    path = "/api/data/departments",
    responses(
        (status = 200, description = "Department names", body = [String], example = json!([
            "Human Resources", "Finance", "DevOps"
        ]))
    ),
    tag = "Data"
)]
pub async fn departments() -> impl Responder {
    HttpResponse::Ok().json(DEPARTMENTS)
}
