use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::pillar::Pillar;
use crate::models::resource::ResourceType;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResourcePayload {
    #[validate(length(min = 2, max = 200, message = "Indique o título."))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub pillar: Pillar,
    pub resource_type: ResourceType,
    #[validate(url)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateResourcePayload {
    #[validate(length(min = 2, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub pillar: Option<Pillar>,
    pub resource_type: Option<ResourceType>,
    #[validate(url)]
    pub content_url: Option<String>,
    pub is_premium: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceQuery {
    pub pillar: Option<Pillar>,
    #[serde(rename = "type")]
    pub resource_type: Option<ResourceType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThumbnailResponse {
    pub thumbnail_url: String,
}
