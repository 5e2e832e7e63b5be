use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use sfp_engine::{
    traits::{GatewayError, OrderStoreError},
    LifecycleError,
    SweepError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("This request has already been processed")]
    ReplayDetected,
    #[error("Invalid webhook signature. {0}")]
    InvalidWebhookSignature(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment for order [{0}] was never completed")]
    PaymentNeverCompleted(String),
    #[error("A reconciliation sweep is already in progress")]
    SweepInProgress,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::NoKeysConfigured => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::IdentityProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::ReplayDetected => StatusCode::CONFLICT,
            Self::InvalidWebhookSignature(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentNeverCompleted(_) => StatusCode::BAD_REQUEST,
            Self::SweepInProgress => StatusCode::CONFLICT,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authentication headers. x-api-key, x-timestamp, x-nonce and x-signature are all required.")]
    MissingCredentials,
    #[error("The request timestamp is missing, malformed, or outside the allowed window.")]
    StaleOrFutureTimestamp,
    #[error("Unknown API key.")]
    UnknownKey,
    #[error("The request signature is invalid.")]
    SignatureMismatch,
    #[error("The server has no API keys configured.")]
    NoKeysConfigured,
    #[error("Missing or invalid bearer token.")]
    InvalidBearerToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The identity provider could not be reached. {0}")]
    IdentityProviderUnavailable(String),
}

impl From<LifecycleError> for ServerError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidQuantity(_) | LifecycleError::MalformedMetadata(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            LifecycleError::ProductNotFound(_) => Self::NoRecordFound(e.to_string()),
            LifecycleError::Store(e) => e.into(),
            LifecycleError::Gateway(GatewayError::NotFound(r)) => {
                Self::NoRecordFound(format!("The payment gateway has no record of {r}"))
            },
            LifecycleError::Gateway(e) => Self::GatewayError(e.to_string()),
        }
    }
}

impl From<OrderStoreError> for ServerError {
    fn from(e: OrderStoreError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<SweepError> for ServerError {
    fn from(e: SweepError) -> Self {
        match e {
            SweepError::AlreadyRunning => Self::SweepInProgress,
            SweepError::Store(e) => e.into(),
        }
    }
}
