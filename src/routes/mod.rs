pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::refresh)
            .service(auth::verify),
    )
    .service(
        // Literal segments (search, bulk) must register before `{id}`.
        web::scope("/tasks")
            .service(tasks::search_tasks)
            .service(tasks::bulk_update_tasks)
            .service(tasks::bulk_delete_tasks)
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::update_task_status)
            .service(tasks::toggle_task)
            .service(tasks::delete_task),
    );
}
