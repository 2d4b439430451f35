use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Role;

/// Query parameters the route guard attaches to redirects.
#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageNotice {
    pub error: Option<String>,
    pub message: Option<String>,
    pub redirected_from: Option<String>,
}

impl PageNotice {
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.message.is_none() && self.redirected_from.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Viewer {
    pub id: Uuid,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page {
    pub page: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Viewer>,
    #[serde(skip_serializing_if = "PageNotice::is_empty", default)]
    pub notice: PageNotice,
}
