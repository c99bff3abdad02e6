// src/services/auth.rs

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, CurrentUser},
};

/// Valida os JWTs emitidos pelo login da plataforma.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<CurrentUser, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(CurrentUser::from(token_data.claims))
    }

    // Emissão local: usada em dev e nos testes de integração
    pub fn create_token(&self, user: &CurrentUser) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(8);

        let claims = Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            permissions: user.permissions.clone(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            name: "Carla".into(),
            email: "carla@imob.com.br".into(),
            permissions: vec!["visits:write".into()],
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let service = AuthService::new("segredo".into());
        let user = user();
        let token = service.create_token(&user).unwrap();

        let current = service.validate_token(&token).unwrap();
        assert_eq!(current.id, user.id);
        assert!(current.has_permission("visits:write"));
        assert!(!current.has_permission("feedback:archive"));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = AuthService::new("outro".into()).create_token(&user()).unwrap();
        assert!(matches!(
            AuthService::new("segredo".into()).validate_token(&token),
            Err(AppError::InvalidToken)
        ));
    }
}
