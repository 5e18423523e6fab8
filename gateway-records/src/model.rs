//! Gateway-facing model behaviour

use record_core::{Action, Entity, GatewayConfig, Payload};

/// Entity the [`Gateway`](crate::Gateway) can send
///
/// `request_body` starts from the registry's in-scope attributes; models
/// with associations override it to add their token-or-nested fields.
pub trait Model: Entity + Clone {
    /// Body sent for `action`
    fn request_body(&mut self, action: Action, _config: &GatewayConfig) -> Payload {
        self.attributes_for(action)
    }
}
