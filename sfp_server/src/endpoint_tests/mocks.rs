use mockall::mock;
use sfp_engine::{
    db_types::Role,
    traits::{GatewayError, NewPaymentIntent, PaymentGateway, PaymentIntent},
};

use crate::auth::{IdentityError, IdentityProvider};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError>;
        async fn retrieve_payment_intent(&self, payment_reference: &str) -> Result<PaymentIntent, GatewayError>;
    }
}

mock! {
    pub Identity {}
    impl IdentityProvider for Identity {
        async fn verify_token(&self, token: &str) -> Result<String, IdentityError>;
        async fn fetch_role(&self, user_id: &str) -> Result<Role, IdentityError>;
    }
}
