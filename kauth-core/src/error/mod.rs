pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown auth method: {0}")]
    UnknownAuthMethod(String),

    #[error("Unknown security test: {0}")]
    UnknownSecurityTest(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event handler error: {0}")]
    HandlerError(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let auth_error = Error::Auth(AuthError::InvalidCredentials);
        assert_eq!(
            auth_error.to_string(),
            "Authentication error: Invalid credentials"
        );

        let storage_error = Error::Storage(StorageError::Serialization("eof".to_string()));
        assert_eq!(
            storage_error.to_string(),
            "Storage error: Serialization error: eof"
        );
    }

    #[test]
    fn test_session_error_variants() {
        assert_eq!(SessionError::NotFound.to_string(), "Session not found");
        assert_eq!(
            SessionError::InvalidToken("malformed".to_string()).to_string(),
            "Invalid token: malformed"
        );
    }

    #[test]
    fn test_validation_error_variants() {
        let unknown = ValidationError::UnknownAuthMethod("cookie".to_string());
        assert_eq!(unknown.to_string(), "Unknown auth method: cookie");

        let missing_field = ValidationError::MissingField("email".to_string());
        assert_eq!(missing_field.to_string(), "Missing required field: email");
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = SessionError::NotFound.into();
        assert!(matches!(error, Error::Session(SessionError::NotFound)));

        let error: Error = AuthError::InvalidCredentials.into();
        assert!(matches!(error, Error::Auth(_)));

        let error: Error = CryptoError::PasswordHash("bad salt".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Cryptographic error: Password hashing failed: bad salt"
        );

        let error: Error = ValidationError::InvalidEmail("x".to_string()).into();
        assert!(matches!(error, Error::Validation(ValidationError::InvalidEmail(_))));
    }
}
