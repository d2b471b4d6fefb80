pub mod forms;
pub mod health;
pub mod n8n;
pub mod processes;
pub mod runs;
pub mod teams;
pub mod workflows;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows                                   list, create
/// /workflows/{id}                              get, update, delete
/// /workflows/{id}/n8n/{n8n_id}/{event}         connect, disconnect (PUT, DELETE)
/// /workflows/{id}/processes                    tree, create
/// /workflows/{id}/runs                         list, initialize
///
/// /processes/{id}                              update, delete
/// /processes/{id}/n8n/{n8n_id}/{event}         connect, disconnect (PUT, DELETE)
///
/// /workflow-runs/{id}                          detail, delete
/// /workflow-runs/{id}/archive                  archive (POST)
/// /workflow-runs/{id}/reactivate               reactivate (POST)
///
/// /process-runs/{id}                           detail, save (GET, PUT)
/// /process-runs/{id}/complete                  complete (POST)
/// /process-runs/{id}/reset                     reset (POST)
///
/// /forms                                       list, create
/// /forms/{id}                                  get, update, delete
/// /forms/{id}/submissions                      list, start
///
/// /form-submissions/{id}                       get, save (GET, PUT)
/// /form-submissions/{id}/submit                submit (POST)
/// /form-submissions/{id}/review                start review (POST)
/// /form-submissions/{id}/reject                reject (POST)
/// /form-submissions/{id}/approve               approve (POST)
/// /form-submissions/{id}/archive               archive / unarchive (POST)
///
/// /n8n-workflows                               list, create
/// /n8n-workflows/{id}                          delete
///
/// /teams                                       list, create
/// /teams/{id}                                  delete
/// /teams/{id}/members                          list
/// /teams/{id}/members/{user_id}                add, remove (PUT, DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/workflows", workflows::router())
        .nest("/processes", processes::router())
        .merge(runs::router())
        .merge(forms::router())
        .nest("/n8n-workflows", n8n::router())
        .nest("/teams", teams::router())
}
