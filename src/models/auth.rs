// src/models/auth.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::visit::AgentSnapshot;

// Estrutura de dados ("claims") dentro do JWT.
// Os tokens são emitidos pelo serviço de login da plataforma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // Subject (ID do usuário)
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub permissions: Vec<String>, // Ex: ["visits:write", "feedback:archive"]
    pub exp: usize,      // Expiration time (quando o token expira)
    pub iat: usize,      // Issued At (quando o token foi criado)
}

// O usuário já validado, disponível nos handlers
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    #[schema(example = "Carla Mendes")]
    pub name: String,
    #[schema(example = "carla@imobiliaria.com.br")]
    pub email: String,
    pub permissions: Vec<String>,
}

impl CurrentUser {
    pub fn has_permission(&self, slug: &str) -> bool {
        self.permissions.iter().any(|p| p == slug)
    }

    // Snapshot gravado na visita como "corretor responsável"
    pub fn as_agent(&self) -> AgentSnapshot {
        AgentSnapshot {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            permissions: claims.permissions,
        }
    }
}
