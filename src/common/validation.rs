// src/common/validation.rs

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::ValidationError;

use crate::common::error::AppError;

pub const MIN_OBSERVATION_CHARS: usize = 10;

// ---
// Validações customizadas usadas nos payloads (`#[validate(custom(...))]`)
// ---

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("O campo não pode ficar em branco.".into());
        return Err(err);
    }
    Ok(())
}

// Conta só o texto útil: espaços nas pontas são descartados antes de gravar
pub fn min_observation_len(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < MIN_OBSERVATION_CHARS {
        let mut err = ValidationError::new("length");
        err.add_param("min".into(), &MIN_OBSERVATION_CHARS);
        err.message = Some("As observações devem ter no mínimo 10 caracteres.".into());
        return Err(err);
    }
    Ok(())
}

pub fn must_be_true(value: &bool) -> Result<(), ValidationError> {
    if !*value {
        let mut err = ValidationError::new("declaration_required");
        err.message = Some("É necessário confirmar a declaração de veracidade.".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

/// Converte o texto recebido em um dos valores fixos de um enum.
/// Valor desconhecido é erro de validação, nunca um default silencioso.
pub fn parse_choice<T: DeserializeOwned>(field: &'static str, value: &str) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        AppError::field(
            field,
            "invalid_choice",
            &format!("Valor '{}' não é uma opção válida.", value),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Cor {
        Azul,
        Verde,
    }

    #[test]
    fn parse_choice_accepts_known_values_only() {
        assert_eq!(parse_choice::<Cor>("cor", "azul").unwrap(), Cor::Azul);
        assert_eq!(parse_choice::<Cor>("cor", "verde").unwrap(), Cor::Verde);
        assert!(matches!(parse_choice::<Cor>("cor", "Azul"), Err(AppError::ValidationError(_))));
        assert!(matches!(parse_choice::<Cor>("cor", ""), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(not_blank(" \t\n").is_err());
        assert!(not_blank("ok").is_ok());
    }

    #[test]
    fn observation_length_ignores_padding() {
        assert!(min_observation_len("         a").is_err());
        assert!(min_observation_len("   curta   ").is_err());
        assert!(min_observation_len("  Gostou da vista  ").is_ok());
        assert!(min_observation_len("ótima área").is_ok());
    }

    #[test]
    fn declaration_must_be_checked() {
        assert!(must_be_true(&false).is_err());
        assert!(must_be_true(&true).is_ok());
    }
}
