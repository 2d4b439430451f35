//! Page shells. Each one reports which page rendered, who is viewing it and
//! the notice the route guard attached to the redirect that led here.

use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::auth::{CurrentSession, MaybeSession, Session};
use crate::errors::AppResult;
use crate::models::page::{Page, PageNotice, Viewer};

#[utoipa::path(get, path = "/", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn home(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(notice): Query<PageNotice>,
) -> Json<Page> {
    let viewer = match session {
        Some(session) => Some(viewer(&state, &session).await),
        None => None,
    };
    Json(page("home", "학원 관리", viewer, notice))
}

#[utoipa::path(get, path = "/signin", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn sign_in(Query(notice): Query<PageNotice>) -> Json<Page> {
    Json(page("signin", "로그인", None, notice))
}

#[utoipa::path(get, path = "/signup", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn sign_up(Query(notice): Query<PageNotice>) -> Json<Page> {
    Json(page("signup", "회원가입", None, notice))
}

#[utoipa::path(get, path = "/dashboard/student", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn student_dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(notice): Query<PageNotice>,
) -> AppResult<Json<Page>> {
    let viewer = viewer(&state, &session).await;
    Ok(Json(page("student_dashboard", "학생 대시보드", Some(viewer), notice)))
}

#[utoipa::path(get, path = "/dashboard/instructor", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn instructor_dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(notice): Query<PageNotice>,
) -> AppResult<Json<Page>> {
    let viewer = viewer(&state, &session).await;
    Ok(Json(page("instructor_dashboard", "강사 대시보드", Some(viewer), notice)))
}

#[utoipa::path(get, path = "/dashboard2/admin", tag = "Pages", params(PageNotice), responses((status = 200, body = Page)))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(notice): Query<PageNotice>,
) -> AppResult<Json<Page>> {
    let viewer = viewer(&state, &session).await;
    Ok(Json(page("admin_dashboard", "관리자 대시보드", Some(viewer), notice)))
}

async fn viewer(state: &AppState, session: &Session) -> Viewer {
    Viewer {
        id: session.user.id,
        role: state.roles.resolve_role(Some(session)).await,
    }
}

fn page(name: &str, title: &str, viewer: Option<Viewer>, notice: PageNotice) -> Page {
    Page {
        page: name.to_string(),
        title: title.to_string(),
        viewer,
        notice,
    }
}
